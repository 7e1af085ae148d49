use std::path::{Path, PathBuf};
use log::{info, warn};
use crate::audio::scanner::LibraryScanner;
use crate::audio::tags::TagAccessor;
use crate::config::LibraryPaths;
use crate::library::assign::{Assignment, AssignmentPlan, IdentifierAssigner, IdentifierWrite};
use crate::library::identifier::IdentifierGenerator;
use crate::library::inventory::Inventory;
use crate::library::links::{LinkReconciler, ReconcilePlan, ReconcileSummary};
use crate::{Result, SkippedFile};

/// Outcome of a full scan, assign and reconcile pass.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub written: Vec<IdentifierWrite>,
    pub links: ReconcileSummary,
    /// Files dropped while scanning or assigning; link skips live in `links`.
    pub skipped: Vec<SkippedFile>,
}

impl RunSummary {
    pub fn files_identified(&self) -> usize {
        self.written.len()
    }

    pub fn links_created(&self) -> usize {
        self.links.created.len() + self.links.replaced.len()
    }

    pub fn links_removed(&self) -> usize {
        self.links.removed.len()
    }

    pub fn all_skipped(&self) -> impl Iterator<Item = &SkippedFile> {
        self.skipped.iter().chain(self.links.skipped.iter())
    }

    pub fn print(&self) {
        println!("\nRun Summary:");
        println!("  Files scanned...... {}", self.files_scanned);
        println!("  Files identified... {}", self.files_identified());
        println!("  Links created...... {}", self.links_created());
        println!("  Links removed...... {}", self.links_removed());
        println!("  Links unchanged.... {}", self.links.unchanged);

        let skipped: Vec<_> = self.all_skipped().collect();
        println!("  Files skipped...... {}", skipped.len());
        for skip in skipped {
            println!("    {}: {}", skip.path.display(), skip.reason);
        }
    }
}

/// What a full run would do, computed without writing anything.
#[derive(Debug, Clone)]
pub struct DryRun {
    pub assignments: AssignmentPlan,
    pub links: ReconcilePlan,
}

/// Files whose identifier field was removed.
#[derive(Debug, Clone, Default)]
pub struct ClearSummary {
    pub cleared: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// Batch entry points: scan, assign and reconcile, alone or in sequence.
pub struct Pipeline<'a, T: TagAccessor + ?Sized> {
    tags: &'a T,
    recover: bool,
}

impl<'a, T: TagAccessor + ?Sized> Pipeline<'a, T> {
    pub fn new(tags: &'a T) -> Self {
        Self {
            tags,
            recover: false,
        }
    }

    /// Reuse identifiers from mirror entries that still link to unidentified files.
    pub fn recover_from_mirror(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    pub fn scan(&self, source: impl AsRef<Path>) -> Result<Inventory> {
        LibraryScanner::new(self.tags).scan(source)
    }

    fn assigner<G: IdentifierGenerator>(
        &self,
        generator: G,
        mirror: Option<&Path>,
    ) -> Result<IdentifierAssigner<'a, T, G>> {
        let assigner = IdentifierAssigner::new(self.tags, generator);
        match mirror {
            Some(mirror) if self.recover => {
                let listing = LinkReconciler::new(mirror).list_entries()?;
                Ok(assigner.with_recovery(&listing.entries))
            }
            _ => Ok(assigner),
        }
    }

    pub fn assign_identifiers<G: IdentifierGenerator>(
        &self,
        inventory: Inventory,
        generator: G,
        mirror: Option<&Path>,
    ) -> Result<Assignment> {
        Ok(self.assigner(generator, mirror)?.assign(inventory))
    }

    pub fn plan_identifiers<G: IdentifierGenerator>(
        &self,
        inventory: &Inventory,
        generator: G,
        mirror: Option<&Path>,
    ) -> Result<AssignmentPlan> {
        Ok(self.assigner(generator, mirror)?.plan(inventory))
    }

    pub fn reconcile_links(&self, inventory: &Inventory, mirror: impl AsRef<Path>) -> Result<ReconcileSummary> {
        LinkReconciler::new(mirror.as_ref()).reconcile(inventory)
    }

    pub fn run<G: IdentifierGenerator>(&self, paths: &LibraryPaths, generator: G) -> Result<RunSummary> {
        let paths = paths.validate()?;
        let mirror = paths.mirror()?;

        info!("Scanning {}", paths.source.display());
        let inventory = self.scan(&paths.source)?;
        self.process(inventory, mirror, generator)
    }

    /// Assigns identifiers and reconciles links for a scanned inventory.
    /// A file on another filesystem than the mirror aborts the run before
    /// any tag is written.
    pub fn process<G: IdentifierGenerator>(
        &self,
        inventory: Inventory,
        mirror: &Path,
        generator: G,
    ) -> Result<RunSummary> {
        LinkReconciler::new(mirror).ensure_same_device(&inventory)?;
        let files_scanned = inventory.len();
        let mut skipped = inventory.skipped.clone();

        info!("Assigning identifiers");
        let assignment = self.assign_identifiers(inventory, generator, Some(mirror))?;
        skipped.extend(assignment.skipped);

        info!("Reconciling links in {}", mirror.display());
        let links = self.reconcile_links(&assignment.inventory, mirror)?;

        Ok(RunSummary {
            files_scanned,
            written: assignment.written,
            links,
            skipped,
        })
    }

    /// The writes and link operations `run` would perform.
    pub fn dry_run<G: IdentifierGenerator>(&self, paths: &LibraryPaths, generator: G) -> Result<DryRun> {
        let paths = paths.validate()?;
        let mirror = paths.mirror()?;

        let mut inventory = self.scan(&paths.source)?;
        let reconciler = LinkReconciler::new(mirror);
        reconciler.ensure_same_device(&inventory)?;
        let assignments = self.plan_identifiers(&inventory, generator, Some(mirror))?;
        for write in &assignments.writes {
            inventory.set_identifier(&write.path, write.identifier.clone());
        }
        let links = reconciler.plan(&inventory)?;

        Ok(DryRun { assignments, links })
    }

    /// Removes the identifier field from every file that carries one.
    pub fn clear_identifiers(&self, inventory: &Inventory) -> ClearSummary {
        let mut summary = ClearSummary::default();
        for file in inventory.files() {
            if file.identifier.raw().is_none() {
                continue;
            }
            match self.tags.clear_identifier(&file.path) {
                Ok(()) => summary.cleared.push(file.path.clone()),
                Err(e) => {
                    warn!("Cannot clear identifier of {}: {}", file.path.display(), e);
                    summary.skipped.push(SkippedFile::new(&file.path, e));
                }
            }
        }
        info!("Cleared {} identifiers", summary.cleared.len());
        summary
    }
}
