//! Resolving a submission's source into text, and the lifecycle of uploaded
//! files.

pub mod loader;
pub mod temp;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::ContentLoader;
pub use temp::{remove_temp_file, TempFile, UploadStorage};

/// Where a job's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Text(String),
    /// A stored upload, owned by whichever path runs the job.
    Upload(PathBuf),
}

impl ContentSource {
    pub fn upload_path(&self) -> Option<&PathBuf> {
        match self {
            ContentSource::Upload(path) => Some(path),
            ContentSource::Text(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Upload '{name}' is no longer available")]
    Unavailable { name: String },

    #[error("Failed to read upload '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store upload in '{}': {source}", directory.display())]
    Write {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
