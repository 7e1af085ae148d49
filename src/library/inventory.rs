use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::audio::format::AudioFormat;
use crate::library::identifier::Identifier;
use crate::utils::file_ops::FileIdentity;
use crate::SkippedFile;

/// What the identifier field of a file held when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierState {
    Missing,
    Malformed(String),
    Valid(Identifier),
}

impl IdentifierState {
    pub fn from_tag_value(value: Option<String>) -> Self {
        match value {
            None => IdentifierState::Missing,
            Some(raw) => match Identifier::parse(&raw) {
                Some(id) => IdentifierState::Valid(id),
                None => IdentifierState::Malformed(raw),
            },
        }
    }

    pub fn valid(&self) -> Option<&Identifier> {
        match self {
            IdentifierState::Valid(id) => Some(id),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IdentifierState::Missing => "missing",
            IdentifierState::Malformed(_) => "invalid",
            IdentifierState::Valid(_) => "valid",
        }
    }

    /// The raw stored value, valid or not.
    pub fn raw(&self) -> Option<&str> {
        match self {
            IdentifierState::Missing => None,
            IdentifierState::Malformed(raw) => Some(raw),
            IdentifierState::Valid(id) => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub identity: FileIdentity,
    pub identifier: IdentifierState,
}

impl AudioFile {
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// `<id>.<ext>` for identified files.
    pub fn link_name(&self) -> Option<String> {
        let id = self.identifier.valid()?;
        Some(id.link_name(self.extension()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub missing: usize,
    pub duplicates: usize,
}

/// Snapshot of every supported file under one source root, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    root: PathBuf,
    files: Vec<AudioFile>,
    pub skipped: Vec<SkippedFile>,
}

impl Inventory {
    pub fn new(root: impl Into<PathBuf>, mut files: Vec<AudioFile>, skipped: Vec<SkippedFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            root: root.into(),
            files,
            skipped,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[AudioFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&AudioFile> {
        let path = path.as_ref();
        self.files
            .binary_search_by(|f| f.path.as_path().cmp(path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    pub fn identifier_counts(&self) -> HashMap<&Identifier, usize> {
        let mut counts = HashMap::new();
        for id in self.files.iter().filter_map(|f| f.identifier.valid()) {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts
    }

    /// Every valid identifier paired with the file that owns it. When several
    /// files carry the same identifier the one with the smallest path wins.
    pub fn owners(&self) -> HashMap<&Identifier, &AudioFile> {
        let mut owners = HashMap::new();
        for file in &self.files {
            if let Some(id) = file.identifier.valid() {
                owners.entry(id).or_insert(file);
            }
        }
        owners
    }

    /// Files holding a valid identifier that a smaller path already owns.
    pub fn duplicate_holders(&self) -> Vec<&AudioFile> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|f| match f.identifier.valid() {
                Some(id) => !seen.insert(id),
                None => false,
            })
            .collect()
    }

    /// Identified files that own their identifier, in path order.
    pub fn identified(&self) -> impl Iterator<Item = (&AudioFile, &Identifier)> {
        let mut seen = HashSet::new();
        self.files.iter().filter_map(move |f| {
            let id = f.identifier.valid()?;
            seen.insert(id).then_some((f, id))
        })
    }

    pub fn stats(&self) -> ScanStats {
        let mut stats = ScanStats {
            files: self.files.len(),
            duplicates: self.duplicate_holders().len(),
            ..Default::default()
        };
        for file in &self.files {
            match file.identifier {
                IdentifierState::Missing => stats.missing += 1,
                IdentifierState::Malformed(_) => stats.invalid += 1,
                IdentifierState::Valid(_) => stats.valid += 1,
            }
        }
        stats
    }

    /// Records a freshly written identifier. Returns false for unknown paths.
    pub(crate) fn set_identifier(&mut self, path: &Path, identifier: Identifier) -> bool {
        match self.files.binary_search_by(|f| f.path.as_path().cmp(path)) {
            Ok(idx) => {
                self.files[idx].identifier = IdentifierState::Valid(identifier);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn exclude(&mut self, paths: &HashSet<PathBuf>) {
        self.files.retain(|f| !paths.contains(&f.path));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn id(n: u8) -> Identifier {
        Identifier::parse(&format!("{}-al", format!("{:02x}", n).repeat(16))).unwrap()
    }

    pub(crate) fn file(path: &str, inode: u64, state: IdentifierState) -> AudioFile {
        AudioFile {
            path: PathBuf::from(path),
            format: AudioFormat::from_path(path).unwrap_or(AudioFormat::Flac),
            identity: FileIdentity { device: 1, inode },
            identifier: state,
        }
    }

    #[test]
    fn test_tag_value_classification() {
        assert_eq!(IdentifierState::from_tag_value(None), IdentifierState::Missing);
        assert_eq!(
            IdentifierState::from_tag_value(Some("garbage".into())),
            IdentifierState::Malformed("garbage".into())
        );
        assert_eq!(
            IdentifierState::from_tag_value(Some(id(1).to_string())),
            IdentifierState::Valid(id(1))
        );
    }

    #[test]
    fn test_files_are_sorted_and_searchable() {
        let inventory = Inventory::new(
            "/lib",
            vec![
                file("/lib/b.flac", 2, IdentifierState::Missing),
                file("/lib/a.flac", 1, IdentifierState::Valid(id(1))),
            ],
            Vec::new(),
        );
        let paths: Vec<_> = inventory.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/lib/a.flac"), PathBuf::from("/lib/b.flac")]);
        assert_eq!(inventory.get("/lib/b.flac").map(|f| f.identity.inode), Some(2));
        assert!(inventory.get("/lib/c.flac").is_none());
    }

    #[test]
    fn test_smallest_path_owns_duplicate_identifier() {
        let inventory = Inventory::new(
            "/lib",
            vec![
                file("/lib/z.flac", 3, IdentifierState::Valid(id(7))),
                file("/lib/m.flac", 2, IdentifierState::Valid(id(7))),
                file("/lib/a.flac", 1, IdentifierState::Valid(id(8))),
            ],
            Vec::new(),
        );

        let owners = inventory.owners();
        assert_eq!(owners[&id(7)].path, PathBuf::from("/lib/m.flac"));
        let losers: Vec<_> = inventory.duplicate_holders().iter().map(|f| f.path.clone()).collect();
        assert_eq!(losers, vec![PathBuf::from("/lib/z.flac")]);
        assert_eq!(inventory.identified().count(), 2);
        assert_eq!(inventory.identifier_counts()[&id(7)], 2);
    }

    #[test]
    fn test_stats_count_each_state() {
        let inventory = Inventory::new(
            "/lib",
            vec![
                file("/lib/a.flac", 1, IdentifierState::Valid(id(1))),
                file("/lib/b.flac", 2, IdentifierState::Valid(id(1))),
                file("/lib/c.mp3", 3, IdentifierState::Malformed("x".into())),
                file("/lib/d.ogg", 4, IdentifierState::Missing),
            ],
            Vec::new(),
        );
        assert_eq!(
            inventory.stats(),
            ScanStats { files: 4, valid: 2, invalid: 1, missing: 1, duplicates: 1 }
        );
    }

    #[test]
    fn test_link_name_uses_source_extension() {
        let f = file("/lib/Song.FLAC", 1, IdentifierState::Valid(id(3)));
        assert_eq!(f.link_name(), Some(format!("{}.FLAC", id(3))));
        let g = file("/lib/new.flac", 2, IdentifierState::Missing);
        assert_eq!(g.link_name(), None);
    }
}
