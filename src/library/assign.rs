use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use log::{debug, info, warn};
use serde::Serialize;
use crate::audio::tags::TagAccessor;
use crate::library::identifier::{Identifier, IdentifierGenerator};
use crate::library::inventory::{IdentifierState, Inventory};
use crate::library::links::MirrorEntry;
use crate::utils::file_ops::FileIdentity;
use crate::{AudioError, Result, SkippedFile};

/// Generation attempts per file before the generator is considered broken.
pub const DEFAULT_MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignReason {
    Missing,
    Malformed,
    Duplicate,
}

impl fmt::Display for AssignReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignReason::Missing => "missing",
            AssignReason::Malformed => "malformed",
            AssignReason::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierOrigin {
    Generated,
    /// Taken back from a mirror entry that still shares the file's inode.
    Recovered,
}

/// One pending or completed tag write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierWrite {
    pub path: PathBuf,
    pub identifier: Identifier,
    pub reason: AssignReason,
    pub origin: IdentifierOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentPlan {
    pub writes: Vec<IdentifierWrite>,
    /// Files that could not be given an identifier at all.
    pub failures: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    /// Every remaining file holds a unique valid identifier.
    pub inventory: Inventory,
    pub written: Vec<IdentifierWrite>,
    pub skipped: Vec<SkippedFile>,
}

pub struct IdentifierAssigner<'a, T: TagAccessor + ?Sized, G: IdentifierGenerator> {
    tags: &'a T,
    generator: G,
    max_attempts: usize,
    recoverable: HashMap<FileIdentity, Identifier>,
}

impl<'a, T: TagAccessor + ?Sized, G: IdentifierGenerator> IdentifierAssigner<'a, T, G> {
    pub fn new(tags: &'a T, generator: G) -> Self {
        Self {
            tags,
            generator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            recoverable: HashMap::new(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Lets unidentified files take back the identifier of a mirror entry
    /// that is still a hard link to them.
    pub fn with_recovery(mut self, entries: &[MirrorEntry]) -> Self {
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        for entry in sorted {
            self.recoverable
                .entry(entry.identity)
                .or_insert_with(|| entry.identifier.clone());
        }
        self
    }

    /// Decides which files need a new identifier and picks one for each.
    /// Nothing is written.
    pub fn plan(&mut self, inventory: &Inventory) -> AssignmentPlan {
        let owners = inventory.owners();
        let mut taken: HashSet<Identifier> = owners.keys().map(|id| (*id).clone()).collect();
        let mut plan = AssignmentPlan::default();

        for file in inventory.files() {
            let reason = match &file.identifier {
                IdentifierState::Missing => AssignReason::Missing,
                IdentifierState::Malformed(_) => AssignReason::Malformed,
                IdentifierState::Valid(id) => {
                    if owners.get(id).map_or(false, |owner| owner.path == file.path) {
                        continue;
                    }
                    AssignReason::Duplicate
                }
            };

            if let Some(recovered) = self.recoverable.get(&file.identity) {
                if taken.insert(recovered.clone()) {
                    debug!("Recovering {} for {}", recovered, file.path.display());
                    plan.writes.push(IdentifierWrite {
                        path: file.path.clone(),
                        identifier: recovered.clone(),
                        reason,
                        origin: IdentifierOrigin::Recovered,
                    });
                    continue;
                }
            }

            match self.fresh_identifier(&taken) {
                Ok(identifier) => {
                    taken.insert(identifier.clone());
                    plan.writes.push(IdentifierWrite {
                        path: file.path.clone(),
                        identifier,
                        reason,
                        origin: IdentifierOrigin::Generated,
                    });
                }
                Err(e) => {
                    warn!("No identifier for {}: {}", file.path.display(), e);
                    plan.failures.push(SkippedFile::new(&file.path, e));
                }
            }
        }

        plan
    }

    fn fresh_identifier(&mut self, taken: &HashSet<Identifier>) -> Result<Identifier> {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generator.next();
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            debug!("Generated identifier {} collides (attempt {})", candidate, attempt);
        }
        Err(AudioError::GeneratorExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Writes the planned identifiers one file at a time. A failed write
    /// leaves that file out of the returned inventory; the rest carry on.
    pub fn apply(&self, mut inventory: Inventory, plan: AssignmentPlan) -> Assignment {
        let mut excluded: HashSet<PathBuf> = plan.failures.iter().map(|s| s.path.clone()).collect();
        let mut skipped = plan.failures;
        let mut written = Vec::with_capacity(plan.writes.len());

        for write in plan.writes {
            match self.tags.write_identifier(&write.path, &write.identifier) {
                Ok(()) => {
                    info!(
                        "Assigned {} to {} ({})",
                        write.identifier,
                        write.path.display(),
                        write.reason
                    );
                    inventory.set_identifier(&write.path, write.identifier.clone());
                    written.push(write);
                }
                Err(e) => {
                    warn!("Could not write identifier to {}: {}", write.path.display(), e);
                    skipped.push(SkippedFile::new(
                        &write.path,
                        format!("could not write identifier: {}", e),
                    ));
                    excluded.insert(write.path);
                }
            }
        }

        inventory.exclude(&excluded);
        Assignment {
            inventory,
            written,
            skipped,
        }
    }

    pub fn assign(&mut self, inventory: Inventory) -> Assignment {
        let plan = self.plan(&inventory);
        self.apply(inventory, plan)
    }
}
