use std::path::PathBuf;
use serde::Serialize;

pub mod audio;
pub mod cli;
pub mod config;
pub mod library;
pub mod utils;

/// A file that was left out of the current pass, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedFile {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tag error: {0}")]
    Tag(#[from] lofty::error::LoftyError),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{file} and mirror {mirror} are on different filesystems, hard links cannot cross volumes")]
    CrossDevice { file: PathBuf, mirror: PathBuf },
    #[error("Identifier generator produced {attempts} colliding identifiers in a row")]
    GeneratorExhausted { attempts: usize },
}

pub type Result<T> = std::result::Result<T, AudioError>;

// Re-exports for convenience
pub use audio::format::AudioFormat;
pub use audio::scanner::LibraryScanner;
pub use audio::tags::{LoftyTags, TagAccessor};
pub use config::LibraryPaths;
pub use library::assign::{Assignment, AssignmentPlan, IdentifierAssigner, IdentifierWrite};
pub use library::identifier::{Identifier, IdentifierGenerator, UuidGenerator};
pub use library::inventory::{AudioFile, IdentifierState, Inventory, ScanStats};
pub use library::links::{LinkAction, LinkReconciler, LinkStatus, MirrorEntry, ReconcilePlan, ReconcileSummary};
pub use library::pipeline::{ClearSummary, DryRun, Pipeline, RunSummary};
