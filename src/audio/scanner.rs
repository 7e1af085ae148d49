use std::collections::HashMap;
use std::path::Path;
use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};
use crate::audio::format::AudioFormat;
use crate::audio::tags::TagAccessor;
use crate::library::inventory::{AudioFile, IdentifierState, Inventory};
use crate::utils::file_ops::FileIdentity;
use crate::utils::parallel::ParallelProcessor;
use crate::{AudioError, Result, SkippedFile};

/// Builds an [`Inventory`] from a source tree. Read-only.
pub struct LibraryScanner<'a, T: TagAccessor + ?Sized> {
    tags: &'a T,
}

impl<T: TagAccessor + ?Sized> ParallelProcessor for LibraryScanner<'_, T> {}

impl<'a, T: TagAccessor + ?Sized> LibraryScanner<'a, T> {
    pub fn new(tags: &'a T) -> Self {
        Self { tags }
    }

    pub fn scan(&self, root: impl AsRef<Path>) -> Result<Inventory> {
        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|e| {
            AudioError::Config(format!("source root {} is not accessible: {}", root.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(AudioError::Config(format!(
                "source root {} is not a directory",
                root.display()
            )));
        }
        let root = std::fs::canonicalize(root)?;

        info!("Scanning directory structure: {}", root.display());
        let (entries, mut skipped) = self.collect_audio_files(&root);
        info!("Found {} potential audio files", entries.len());

        let progress = Self::get_progress_counter();
        let total_files = entries.len();

        let results: Vec<std::result::Result<AudioFile, SkippedFile>> = entries
            .par_iter()
            .map(|entry| {
                let result = self.read_file(entry);
                Self::report_progress(&progress, total_files, "files");
                result.map_err(|e| {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    SkippedFile::new(entry.path(), e)
                })
            })
            .collect();

        let mut files = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(skip) => skipped.push(skip),
            }
        }

        let files = Self::drop_hard_link_aliases(files, &mut skipped);
        let inventory = Inventory::new(root, files, skipped);
        debug!("Inventory holds {} files", inventory.len());
        Ok(inventory)
    }

    fn read_file(&self, entry: &DirEntry) -> Result<AudioFile> {
        let path = entry.path();
        let format = AudioFormat::from_path(path)
            .ok_or_else(|| AudioError::UnsupportedFormat(path.display().to_string()))?;
        let identity = FileIdentity::of(path)?;
        let value = self.tags.read_identifier(path)?;

        Ok(AudioFile {
            path: path.to_path_buf(),
            format,
            identity,
            identifier: IdentifierState::from_tag_value(value),
        })
    }

    fn collect_audio_files(&self, root: &Path) -> (Vec<DirEntry>, Vec<SkippedFile>) {
        let mut skipped = Vec::new();
        let entries = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Error accessing entry: {}", err);
                    if let Some(path) = err.path() {
                        skipped.push(SkippedFile::new(path, &err));
                    }
                    None
                }
            })
            .filter(|e| {
                let is_file = e.file_type().is_file();
                let supported = is_file && self.tags.supports(e.path());
                if is_file && !supported {
                    debug!("Skipping non-audio file: {}", e.path().display());
                }
                supported
            })
            .collect();
        (entries, skipped)
    }

    /// Keeps one path per inode. `files` must be sorted by path so the
    /// smallest path survives.
    fn drop_hard_link_aliases(mut files: Vec<AudioFile>, skipped: &mut Vec<SkippedFile>) -> Vec<AudioFile> {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut first_seen: HashMap<FileIdentity, std::path::PathBuf> = HashMap::new();
        files
            .into_iter()
            .filter(|file| match first_seen.get(&file.identity) {
                Some(original) => {
                    warn!("{} is a hard link to {}, skipping", file.path.display(), original.display());
                    skipped.push(SkippedFile::new(
                        &file.path,
                        format!("hard link to {}", original.display()),
                    ));
                    false
                }
                None => {
                    first_seen.insert(file.identity, file.path.clone());
                    true
                }
            })
            .collect()
    }
}
