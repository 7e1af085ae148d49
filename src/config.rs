use std::fs;
use std::path::{Path, PathBuf};
use log::debug;
use crate::utils::file_ops::{FileIdentity, FileManager};
use crate::{AudioError, Result};

/// Source library and mirror directory of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    pub source: PathBuf,
    pub mirror: Option<PathBuf>,
}

fn existing_dir(path: &Path, role: &str) -> Result<PathBuf> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(fs::canonicalize(path)?),
        Ok(_) => Err(AudioError::Config(format!("{} {} is not a directory", role, path.display()))),
        Err(e) => Err(AudioError::Config(format!("{} {} is not accessible: {}", role, path.display(), e))),
    }
}

impl LibraryPaths {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: impl Into<PathBuf>) -> Self {
        self.mirror = Some(mirror.into());
        self
    }

    pub fn mirror(&self) -> Result<&Path> {
        self.mirror
            .as_deref()
            .ok_or_else(|| AudioError::Config("no mirror directory configured".into()))
    }

    /// Checks both directories and returns their canonical form.
    ///
    /// The mirror may not be the source, live inside it, or contain it, and
    /// both must sit on one filesystem so hard links between them work.
    pub fn validate(&self) -> Result<Self> {
        let source = existing_dir(&self.source, "source")?;
        let Some(mirror) = self.mirror.as_deref() else {
            return Ok(Self::new(source));
        };
        let mirror = existing_dir(mirror, "mirror")?;

        if mirror.starts_with(&source) {
            return Err(AudioError::Config(format!(
                "mirror {} cannot be inside source {}",
                mirror.display(),
                source.display()
            )));
        }
        if source.starts_with(&mirror) {
            return Err(AudioError::Config(format!(
                "source {} cannot be inside mirror {}",
                source.display(),
                mirror.display()
            )));
        }

        FileManager::new(&mirror).ensure_same_device(&source, FileIdentity::of(&source)?)?;
        debug!("Validated source {} and mirror {}", source.display(), mirror.display());

        Ok(Self {
            source,
            mirror: Some(mirror),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("music");
        let mirror = temp_dir.path().join("links");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&mirror).unwrap();
        (temp_dir, source, mirror)
    }

    #[test]
    fn test_valid_layout_is_canonicalised() {
        let (_temp_dir, source, mirror) = dirs();
        let paths = LibraryPaths::new(&source).with_mirror(&mirror).validate().unwrap();
        assert_eq!(paths.source, fs::canonicalize(&source).unwrap());
        assert_eq!(paths.mirror().unwrap(), fs::canonicalize(&mirror).unwrap());
    }

    #[test]
    fn test_source_only_needs_no_mirror() {
        let (_temp_dir, source, _) = dirs();
        let paths = LibraryPaths::new(&source).validate().unwrap();
        assert!(paths.mirror().is_err());
    }

    #[test]
    fn test_nested_directories_are_rejected() {
        let (_temp_dir, source, mirror) = dirs();
        let inner = source.join("links");
        fs::create_dir(&inner).unwrap();

        let same = LibraryPaths::new(&source).with_mirror(&source).validate();
        assert!(matches!(same, Err(AudioError::Config(_))));

        let inside = LibraryPaths::new(&source).with_mirror(&inner).validate();
        assert!(matches!(inside, Err(AudioError::Config(_))));

        let parent = LibraryPaths::new(&inner).with_mirror(&source).validate();
        assert!(matches!(parent, Err(AudioError::Config(_))));

        assert!(LibraryPaths::new(&source).with_mirror(&mirror).validate().is_ok());
    }

    #[test]
    fn test_missing_or_file_roots_are_rejected() {
        let (temp_dir, source, _) = dirs();
        let file = temp_dir.path().join("file.flac");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            LibraryPaths::new(temp_dir.path().join("absent")).validate(),
            Err(AudioError::Config(_))
        ));
        assert!(matches!(
            LibraryPaths::new(&source).with_mirror(&file).validate(),
            Err(AudioError::Config(_))
        ));
    }
}
