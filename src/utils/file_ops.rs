use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::{AudioError, Result};

/// Device and inode of a directory entry. Two paths with the same identity
/// are hard links to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

impl FileIdentity {
    /// Identity of `path` itself; symbolic links are not followed.
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        let metadata = fs::symlink_metadata(path.as_ref())?;
        Self::from_metadata(&metadata)
    }

    #[cfg(unix)]
    pub fn from_metadata(metadata: &fs::Metadata) -> Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &fs::Metadata) -> Result<Self> {
        Err(AudioError::Config(
            "hard-link identity needs a Unix filesystem (device and inode numbers)".into(),
        ))
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

pub struct FileManager {
    mirror_dir: PathBuf,
}

impl FileManager {
    pub fn new(mirror_dir: impl Into<PathBuf>) -> Self {
        Self {
            mirror_dir: mirror_dir.into(),
        }
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    /// Creates `<mirror>/<link_name>` as a hard link to `source`.
    ///
    /// A cross-volume failure is returned as [`AudioError::CrossDevice`] so the
    /// caller can abort the run instead of skipping the file.
    pub fn create_link(&self, source: impl AsRef<Path>, link_name: &str) -> Result<PathBuf> {
        let source = source.as_ref();
        let destination = self.mirror_dir.join(link_name);

        match fs::hard_link(source, &destination) {
            Ok(()) => Ok(destination),
            Err(e) if is_cross_device(&e) => Err(AudioError::CrossDevice {
                file: source.to_path_buf(),
                mirror: self.mirror_dir.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes one mirror entry. Refuses anything outside the mirror directory.
    pub fn remove_link(&self, link: impl AsRef<Path>) -> Result<()> {
        let link = link.as_ref();
        if link.parent() != Some(self.mirror_dir.as_path()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not an entry of {}", link.display(), self.mirror_dir.display()),
            )
            .into());
        }
        fs::remove_file(link)?;
        Ok(())
    }

    pub fn ensure_same_device(&self, file: impl AsRef<Path>, file_identity: FileIdentity) -> Result<()> {
        let mirror = FileIdentity::of(&self.mirror_dir)?;
        if mirror.device != file_identity.device {
            return Err(AudioError::CrossDevice {
                file: file.as_ref().to_path_buf(),
                mirror: self.mirror_dir.clone(),
            });
        }
        Ok(())
    }
}
