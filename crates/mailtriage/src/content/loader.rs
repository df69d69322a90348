use std::io::ErrorKind;

use crate::sanitize;

use super::{ContentError, ContentSource};

/// Turns a [`ContentSource`] into the text the pipeline works on.
pub struct ContentLoader;

impl ContentLoader {
    /// Inline text is returned as is. Uploads are read whole and decoded as
    /// UTF-8, replacing invalid sequences.
    pub fn load(source: &ContentSource) -> Result<String, ContentError> {
        match source {
            ContentSource::Text(text) => Ok(text.clone()),
            ContentSource::Upload(path) => {
                let name = sanitize::redact_path(path);
                let bytes = std::fs::read(path).map_err(|e| match e.kind() {
                    ErrorKind::NotFound => ContentError::Unavailable { name: name.clone() },
                    _ => ContentError::Read {
                        name: name.clone(),
                        source: e,
                    },
                })?;
                Ok(decode(&bytes))
            }
        }
    }
}

/// Lossy UTF-8 decoding shared by the loader and the submission path.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_text_is_passthrough() {
        let source = ContentSource::Text("Preciso do relatório até sexta".to_string());
        assert_eq!(
            ContentLoader::load(&source).unwrap(),
            "Preciso do relatório até sexta"
        );
    }

    #[test]
    fn test_load_upload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload-1.txt");
        std::fs::write(&path, "Olá, equipe").unwrap();

        let text = ContentLoader::load(&ContentSource::Upload(path)).unwrap();
        assert_eq!(text, "Olá, equipe");
    }

    #[test]
    fn test_load_invalid_utf8_is_lossy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload-2.txt");
        std::fs::write(&path, [b'o', b'k', 0xff, b'!']).unwrap();

        let text = ContentLoader::load(&ContentSource::Upload(path)).unwrap();
        assert_eq!(text, "ok\u{fffd}!");
    }

    #[test]
    fn test_load_missing_upload_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload-gone.txt");

        match ContentLoader::load(&ContentSource::Upload(path)) {
            Err(ContentError::Unavailable { name }) => assert_eq!(name, "upload-gone.txt"),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = TempDir::new().unwrap();
        let result = ContentLoader::load(&ContentSource::Upload(dir.path().to_path_buf()));
        assert!(matches!(result, Err(ContentError::Read { .. })));
    }
}
