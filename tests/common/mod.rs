#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use audiolink::{AudioError, AudioFormat, Identifier, IdentifierGenerator, LibraryPaths, Result, TagAccessor};

/// Stores the identifier as the whole file content. Writes happen in place,
/// so the identifier follows renames and hard links like a real tag does.
pub struct ContentTags;

impl TagAccessor for ContentTags {
    fn supports(&self, path: &Path) -> bool {
        AudioFormat::from_path(path).is_some()
    }

    fn read_identifier(&self, path: &Path) -> Result<Option<String>> {
        let content = fs::read_to_string(path)?;
        if content == "BROKEN" {
            return Err(AudioError::UnsupportedFormat("corrupt tag".into()));
        }
        Ok(Some(content).filter(|c| !c.is_empty()))
    }

    fn write_identifier(&self, path: &Path, identifier: &Identifier) -> Result<()> {
        fs::write(path, identifier.as_str())?;
        Ok(())
    }

    fn clear_identifier(&self, path: &Path) -> Result<()> {
        fs::write(path, "")?;
        Ok(())
    }
}

pub fn id(n: u32) -> Identifier {
    Identifier::parse(&format!("{:032x}-al", n)).unwrap()
}

/// Hands out `id(start)`, `id(start + 1)` and so on.
pub struct Sequence(pub u32);

impl IdentifierGenerator for Sequence {
    fn next(&mut self) -> Identifier {
        self.0 += 1;
        id(self.0 - 1)
    }
}

pub struct Library {
    _temp_dir: TempDir,
    pub source: PathBuf,
    pub mirror: PathBuf,
}

impl Library {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        let source = root.join("music");
        let mirror = root.join("links");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&mirror).unwrap();
        Self { _temp_dir: temp_dir, source, mirror }
    }

    pub fn paths(&self) -> LibraryPaths {
        LibraryPaths::new(&self.source).with_mirror(&self.mirror)
    }

    pub fn add(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.source.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn tag(&self, relative: &str) -> String {
        fs::read_to_string(self.source.join(relative)).unwrap()
    }

    /// Sorted file names in the mirror.
    pub fn mirror_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.mirror)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn links_to(&self, link_name: &str, relative: &str) -> bool {
        let link = fs::metadata(self.mirror.join(link_name)).unwrap();
        let file = fs::metadata(self.source.join(relative)).unwrap();
        link.dev() == file.dev() && link.ino() == file.ino()
    }
}
