use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::sanitize;

use super::ContentError;

const MAX_EXTENSION_LEN: usize = 10;

/// Writes uploads into a single directory under unique names.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    directory: PathBuf,
}

impl UploadStorage {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Stores `bytes` as `upload-<uuid><ext>`, keeping the extension of the
    /// original filename when it is a plain one.
    pub fn store(&self, bytes: &[u8], filename: Option<&str>) -> Result<PathBuf, ContentError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| ContentError::Write {
            directory: self.directory.clone(),
            source: e,
        })?;

        let name = format!(
            "upload-{}{}",
            Uuid::new_v4().simple(),
            extension_of(filename)
        );
        let path = self.directory.join(name);

        // create_new fails instead of clobbering an existing file
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ContentError::Write {
                directory: self.directory.clone(),
                source: e,
            })?;
        if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
            let _ = remove_temp_file(&path);
            return Err(ContentError::Write {
                directory: self.directory.clone(),
                source: e,
            });
        }

        log::debug!("Stored upload {} ({} bytes)", sanitize::redact_path(&path), bytes.len());
        Ok(path)
    }
}

fn extension_of(filename: Option<&str>) -> String {
    filename
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Removes a temporary upload. A file that is already gone is not an error.
///
/// Returns whether a file was actually removed.
pub fn remove_temp_file(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Deletes its file when dropped, on every exit path including unwinding.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Takes ownership of an existing file.
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match remove_temp_file(&self.path) {
            Ok(true) => log::debug!("Removed upload {}", sanitize::redact_path(&self.path)),
            Ok(false) => {}
            Err(e) => log::warn!(
                "Failed to remove upload {}: {}",
                sanitize::redact_path(&self.path),
                e
            ),
        }
    }
}
