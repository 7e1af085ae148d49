//! Keeps the mirror directory in step with the inventory.
//!
//! Every identified file gets exactly one hard link named `<id>.<ext>` in the
//! mirror; entries for identifiers that no longer exist are removed. Entries
//! whose stem is not an identifier were not created by this tool and are
//! never touched.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use serde::Serialize;
use crate::library::identifier::Identifier;
use crate::library::inventory::{AudioFile, Inventory};
use crate::utils::file_ops::{FileIdentity, FileManager};
use crate::{AudioError, Result, SkippedFile};

/// One mirror directory entry named by an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub identifier: Identifier,
    pub path: PathBuf,
    pub identity: FileIdentity,
}

impl MirrorEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MirrorListing {
    pub entries: Vec<MirrorEntry>,
    /// Entries the tool does not own: directories, non-identifier names.
    pub foreign: Vec<PathBuf>,
}

impl MirrorListing {
    fn by_name(&self) -> HashMap<&str, &MirrorEntry> {
        self.entries
            .iter()
            .filter_map(|e| e.file_name().map(|name| (name, e)))
            .collect()
    }

    fn foreign_names(&self) -> HashSet<&str> {
        self.foreign
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// The mirror entry shares the file's inode.
    Active,
    Missing,
    /// Something else occupies the link name.
    Conflict,
    Unidentified,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "active",
            LinkStatus::Missing => "missing",
            LinkStatus::Conflict => "conflict",
            LinkStatus::Unidentified => "unidentified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Create { source: PathBuf, link_name: String },
    /// The entry exists but points at another inode.
    Replace { source: PathBuf, link_name: String },
    Remove { link: PathBuf },
}

impl LinkAction {
    pub fn describe(&self) -> String {
        match self {
            LinkAction::Create { source, link_name } => {
                format!("link {} -> {}", link_name, source.display())
            }
            LinkAction::Replace { source, link_name } => {
                format!("relink {} -> {}", link_name, source.display())
            }
            LinkAction::Remove { link } => format!("remove {}", link.display()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Removals first, then replacements, then creations.
    pub actions: Vec<LinkAction>,
    pub unchanged: usize,
    pub skipped: Vec<SkippedFile>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: Vec<PathBuf>,
    pub replaced: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub unchanged: usize,
    pub skipped: Vec<SkippedFile>,
}

impl ReconcileSummary {
    /// Number of filesystem mutations performed.
    pub fn operations(&self) -> usize {
        self.created.len() + self.replaced.len() * 2 + self.removed.len()
    }
}

pub struct LinkReconciler {
    file_manager: FileManager,
}

impl LinkReconciler {
    pub fn new(mirror_dir: impl Into<PathBuf>) -> Self {
        Self {
            file_manager: FileManager::new(mirror_dir),
        }
    }

    pub fn mirror_dir(&self) -> &Path {
        self.file_manager.mirror_dir()
    }

    fn mirror_identity(&self) -> Result<FileIdentity> {
        let mirror = self.mirror_dir();
        match fs::metadata(mirror) {
            Ok(metadata) if metadata.is_dir() => FileIdentity::of(mirror),
            Ok(_) => Err(AudioError::Config(format!(
                "mirror {} is not a directory",
                mirror.display()
            ))),
            Err(e) => Err(AudioError::Config(format!(
                "mirror {} is not accessible: {}",
                mirror.display(),
                e
            ))),
        }
    }

    pub fn list_entries(&self) -> Result<MirrorListing> {
        self.mirror_identity()?;
        let mut listing = MirrorListing::default();

        for entry in fs::read_dir(self.mirror_dir())? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                listing.foreign.push(path);
                continue;
            }

            let identifier = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(Identifier::parse);
            match identifier {
                Some(identifier) => {
                    let identity = FileIdentity::of(&path)?;
                    listing.entries.push(MirrorEntry { identifier, path, identity });
                }
                None => {
                    debug!("Ignoring foreign mirror entry {}", path.display());
                    listing.foreign.push(path);
                }
            }
        }

        listing.entries.sort_by(|a, b| a.path.cmp(&b.path));
        listing.foreign.sort();
        Ok(listing)
    }

    /// Fails with [`AudioError::CrossDevice`] when any scanned file lives on
    /// another filesystem than the mirror.
    pub fn ensure_same_device(&self, inventory: &Inventory) -> Result<()> {
        let mirror_device = self.mirror_identity()?.device;
        match inventory.files().iter().find(|f| f.identity.device != mirror_device) {
            Some(file) => Err(AudioError::CrossDevice {
                file: file.path.clone(),
                mirror: self.mirror_dir().to_path_buf(),
            }),
            None => Ok(()),
        }
    }

    /// Link status of every file in the inventory, keyed by source path.
    pub fn link_statuses(&self, inventory: &Inventory) -> Result<HashMap<PathBuf, LinkStatus>> {
        let listing = self.list_entries()?;
        let by_name = listing.by_name();
        let foreign = listing.foreign_names();

        let statuses = inventory
            .files()
            .iter()
            .map(|file| (file.path.clone(), Self::status_of(file, &by_name, &foreign)))
            .collect();
        Ok(statuses)
    }

    fn status_of(file: &AudioFile, by_name: &HashMap<&str, &MirrorEntry>, foreign: &HashSet<&str>) -> LinkStatus {
        let Some(link_name) = file.link_name() else {
            return LinkStatus::Unidentified;
        };
        match by_name.get(link_name.as_str()) {
            Some(entry) if entry.identity == file.identity => LinkStatus::Active,
            Some(_) => LinkStatus::Conflict,
            None if foreign.contains(link_name.as_str()) => LinkStatus::Conflict,
            None => LinkStatus::Missing,
        }
    }

    /// Computes the operations that bring the mirror in line with `inventory`
    /// without touching anything. Fails before any mutation when a source
    /// file lives on another filesystem than the mirror.
    pub fn plan(&self, inventory: &Inventory) -> Result<ReconcilePlan> {
        let mirror_device = self.mirror_identity()?.device;
        let listing = self.list_entries()?;
        let by_name = listing.by_name();
        let foreign = listing.foreign_names();

        let mut plan = ReconcilePlan::default();
        let mut expected: HashSet<String> = HashSet::new();
        let mut replacements = Vec::new();
        let mut creations = Vec::new();

        for holder in inventory.duplicate_holders() {
            if let Some(id) = holder.identifier.valid() {
                warn!("{} carries duplicate identifier {}, not linking", holder.path.display(), id);
                plan.skipped.push(SkippedFile::new(
                    &holder.path,
                    format!("identifier {} is owned by another file", id),
                ));
            }
        }

        for (file, id) in inventory.identified() {
            let Some(extension) = file.extension() else {
                plan.skipped.push(SkippedFile::new(&file.path, "no usable file extension"));
                continue;
            };
            let link_name = id.link_name(extension);
            expected.insert(link_name.clone());

            // The file may have changed since the scan.
            let identity = match FileIdentity::of(&file.path) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Cannot stat {}: {}", file.path.display(), e);
                    plan.skipped.push(SkippedFile::new(&file.path, e));
                    continue;
                }
            };
            if identity.device != mirror_device {
                return Err(AudioError::CrossDevice {
                    file: file.path.clone(),
                    mirror: self.mirror_dir().to_path_buf(),
                });
            }

            if foreign.contains(link_name.as_str()) {
                plan.skipped.push(SkippedFile::new(
                    &file.path,
                    format!("{} is occupied by a foreign entry", link_name),
                ));
                continue;
            }

            match by_name.get(link_name.as_str()) {
                Some(entry) if entry.identity == identity => plan.unchanged += 1,
                Some(_) => replacements.push(LinkAction::Replace {
                    source: file.path.clone(),
                    link_name,
                }),
                None => creations.push(LinkAction::Create {
                    source: file.path.clone(),
                    link_name,
                }),
            }
        }

        for entry in &listing.entries {
            let stale = entry.file_name().map_or(true, |name| !expected.contains(name));
            if stale {
                plan.actions.push(LinkAction::Remove {
                    link: entry.path.clone(),
                });
            }
        }
        plan.actions.extend(replacements);
        plan.actions.extend(creations);

        debug!(
            "Reconcile plan: {} actions, {} unchanged, {} skipped",
            plan.actions.len(),
            plan.unchanged,
            plan.skipped.len()
        );
        Ok(plan)
    }

    /// Executes a plan. Per-entry failures are recorded and skipped; a
    /// cross-device link failure aborts.
    pub fn apply(&self, plan: ReconcilePlan) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary {
            unchanged: plan.unchanged,
            skipped: plan.skipped,
            ..Default::default()
        };

        for action in plan.actions {
            match action {
                LinkAction::Remove { link } => match self.file_manager.remove_link(&link) {
                    Ok(()) => {
                        info!("Removed stale link {}", link.display());
                        summary.removed.push(link);
                    }
                    Err(e) => {
                        warn!("Could not remove {}: {}", link.display(), e);
                        summary.skipped.push(SkippedFile::new(&link, e));
                    }
                },
                LinkAction::Replace { source, link_name } => {
                    let link = self.mirror_dir().join(&link_name);
                    match self.file_manager.remove_link(&link) {
                        Ok(()) => {}
                        Err(AudioError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!("Could not replace {}: {}", link.display(), e);
                            summary.skipped.push(SkippedFile::new(&source, e));
                            continue;
                        }
                    }
                    if let Some(path) = self.link(&source, &link_name, &mut summary.skipped)? {
                        info!("Relinked {} -> {}", path.display(), source.display());
                        summary.replaced.push(path);
                    }
                }
                LinkAction::Create { source, link_name } => {
                    if let Some(path) = self.link(&source, &link_name, &mut summary.skipped)? {
                        info!("Linked {} -> {}", path.display(), source.display());
                        summary.created.push(path);
                    }
                }
            }
        }

        Ok(summary)
    }

    fn link(&self, source: &Path, link_name: &str, skipped: &mut Vec<SkippedFile>) -> Result<Option<PathBuf>> {
        match self.file_manager.create_link(source, link_name) {
            Ok(path) => Ok(Some(path)),
            Err(e @ AudioError::CrossDevice { .. }) => Err(e),
            Err(e) => {
                warn!("Could not link {}: {}", source.display(), e);
                skipped.push(SkippedFile::new(source, e));
                Ok(None)
            }
        }
    }

    pub fn reconcile(&self, inventory: &Inventory) -> Result<ReconcileSummary> {
        let plan = self.plan(inventory)?;
        self.apply(plan)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use crate::audio::format::AudioFormat;
    use crate::library::inventory::tests::id;
    use crate::library::inventory::IdentifierState;

    struct Fixture {
        _temp_dir: TempDir,
        source: PathBuf,
        mirror: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let mirror = temp_dir.path().join("mirror");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&mirror).unwrap();
        Fixture { _temp_dir: temp_dir, source, mirror }
    }

    fn audio(path: &Path, state: IdentifierState) -> AudioFile {
        if !path.exists() {
            fs::write(path, path.display().to_string()).unwrap();
        }
        AudioFile {
            path: path.to_path_buf(),
            format: AudioFormat::from_path(path).unwrap(),
            identity: FileIdentity::of(path).unwrap(),
            identifier: state,
        }
    }

    fn inventory(root: &Path, files: Vec<AudioFile>) -> Inventory {
        Inventory::new(root, files, Vec::new())
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_creates_missing_links() {
        let fx = fixture();
        let a = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(1)));
        let b = audio(&fx.source.join("b.mp3"), IdentifierState::Valid(id(2)));
        let unidentified = audio(&fx.source.join("c.ogg"), IdentifierState::Missing);
        let inv = inventory(&fx.source, vec![a.clone(), b, unidentified]);

        let summary = LinkReconciler::new(&fx.mirror).reconcile(&inv).unwrap();

        assert_eq!(summary.created.len(), 2);
        assert_eq!(names(&fx.mirror), vec![format!("{}.flac", id(1)), format!("{}.mp3", id(2))]);
        let link = fx.mirror.join(format!("{}.flac", id(1)));
        assert_eq!(FileIdentity::of(&link).unwrap(), a.identity);
    }

    #[test]
    fn test_second_pass_is_a_noop() {
        let fx = fixture();
        let a = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(1)));
        let inv = inventory(&fx.source, vec![a]);
        let reconciler = LinkReconciler::new(&fx.mirror);

        reconciler.reconcile(&inv).unwrap();
        let plan = reconciler.plan(&inv).unwrap();

        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn test_removes_links_for_vanished_identifiers() {
        let fx = fixture();
        let stale = fx.mirror.join(format!("{}.flac", id(9)));
        fs::write(&stale, "old").unwrap();
        let keep = audio(&fx.source.join("keep.flac"), IdentifierState::Valid(id(1)));
        let inv = inventory(&fx.source, vec![keep]);

        let summary = LinkReconciler::new(&fx.mirror).reconcile(&inv).unwrap();

        assert_eq!(summary.removed, vec![stale]);
        assert_eq!(names(&fx.mirror), vec![format!("{}.flac", id(1))]);
    }

    #[test]
    fn test_replaces_entry_pointing_at_another_inode() {
        let fx = fixture();
        let a = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(1)));
        let wrong = fx.mirror.join(format!("{}.flac", id(1)));
        fs::write(&wrong, "different file").unwrap();
        let inv = inventory(&fx.source, vec![a.clone()]);
        let reconciler = LinkReconciler::new(&fx.mirror);

        let plan = reconciler.plan(&inv).unwrap();
        assert!(matches!(plan.actions.as_slice(), [LinkAction::Replace { .. }]));

        let summary = reconciler.apply(plan).unwrap();
        assert_eq!(summary.replaced, vec![wrong.clone()]);
        assert_eq!(FileIdentity::of(&wrong).unwrap(), a.identity);
    }

    #[test]
    fn test_changed_extension_moves_the_link() {
        let fx = fixture();
        let old = fx.mirror.join(format!("{}.mp3", id(1)));
        let song = audio(&fx.source.join("song.flac"), IdentifierState::Valid(id(1)));
        fs::hard_link(&song.path, &old).unwrap();
        let inv = inventory(&fx.source, vec![song]);

        let summary = LinkReconciler::new(&fx.mirror).reconcile(&inv).unwrap();

        assert_eq!(summary.removed, vec![old]);
        assert_eq!(names(&fx.mirror), vec![format!("{}.flac", id(1))]);
    }

    #[test]
    fn test_foreign_entries_are_left_alone() {
        let fx = fixture();
        fs::write(fx.mirror.join("README.txt"), "notes").unwrap();
        fs::create_dir(fx.mirror.join("playlists")).unwrap();
        let occupied = format!("{}.flac", id(2));
        fs::create_dir(fx.mirror.join(&occupied)).unwrap();
        let a = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(2)));
        let inv = inventory(&fx.source, vec![a.clone()]);
        let reconciler = LinkReconciler::new(&fx.mirror);

        let summary = reconciler.reconcile(&inv).unwrap();

        assert!(summary.removed.is_empty());
        assert!(summary.created.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, a.path);
        assert_eq!(names(&fx.mirror), vec![occupied, "README.txt".to_string(), "playlists".to_string()]);

        let statuses = reconciler.link_statuses(&inv).unwrap();
        assert_eq!(statuses[&a.path], LinkStatus::Conflict);
    }

    #[test]
    fn test_duplicate_identifier_links_only_the_owner() {
        let fx = fixture();
        let a = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(5)));
        let b = audio(&fx.source.join("b.flac"), IdentifierState::Valid(id(5)));
        let inv = inventory(&fx.source, vec![b.clone(), a.clone()]);

        let summary = LinkReconciler::new(&fx.mirror).reconcile(&inv).unwrap();

        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, b.path);
        let link = fx.mirror.join(format!("{}.flac", id(5)));
        assert_eq!(FileIdentity::of(&link).unwrap(), a.identity);
    }

    #[test]
    fn test_link_statuses() {
        let fx = fixture();
        let active = audio(&fx.source.join("a.flac"), IdentifierState::Valid(id(1)));
        let missing = audio(&fx.source.join("b.flac"), IdentifierState::Valid(id(2)));
        let conflict = audio(&fx.source.join("c.flac"), IdentifierState::Valid(id(3)));
        let bare = audio(&fx.source.join("d.flac"), IdentifierState::Malformed("x".into()));
        fs::hard_link(&active.path, fx.mirror.join(format!("{}.flac", id(1)))).unwrap();
        fs::write(fx.mirror.join(format!("{}.flac", id(3))), "other").unwrap();
        let inv = inventory(
            &fx.source,
            vec![active.clone(), missing.clone(), conflict.clone(), bare.clone()],
        );

        let statuses = LinkReconciler::new(&fx.mirror).link_statuses(&inv).unwrap();

        assert_eq!(statuses[&active.path], LinkStatus::Active);
        assert_eq!(statuses[&missing.path], LinkStatus::Missing);
        assert_eq!(statuses[&conflict.path], LinkStatus::Conflict);
        assert_eq!(statuses[&bare.path], LinkStatus::Unidentified);
    }

    #[test]
    fn test_missing_mirror_is_a_configuration_error() {
        let fx = fixture();
        let inv = inventory(&fx.source, Vec::new());
        let reconciler = LinkReconciler::new(fx.mirror.join("absent"));
        assert!(matches!(reconciler.plan(&inv), Err(AudioError::Config(_))));
    }
}
