use crate::config::MediaConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// File sent inline in a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    #[schema(example = "leaf.jpg")]
    pub filename: String,
    /// Standard base64 encoding of the file bytes.
    pub content_base64: String,
}

impl UploadedFile {
    pub fn decode(&self) -> Result<Vec<u8>, StorageError> {
        let bytes = STANDARD
            .decode(self.content_base64.trim())
            .map_err(|_| StorageError::InvalidEncoding)?;
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        Ok(bytes)
    }

    fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("The submitted file is not valid base64.")]
    InvalidEncoding,
    #[error("The submitted file is empty.")]
    Empty,
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local-disk media storage; paths handed out are relative to the media root.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    url_prefix: String,
}

impl FileStorage {
    pub fn new(config: &MediaConfig) -> Self {
        FileStorage {
            root: PathBuf::from(&config.root),
            url_prefix: config.url_prefix.clone(),
        }
    }

    pub async fn save(&self, dir: &str, file: &UploadedFile) -> Result<String, StorageError> {
        let bytes = file.decode()?;
        let relative = format!("{}/{}.{}", dir, Uuid::new_v4(), file.extension());
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        log::debug!("Stored upload {} as {}", file.filename, relative);
        Ok(relative)
    }

    /// Best-effort removal; a missing file is not an error.
    pub async fn delete(&self, relative: &str) {
        if relative.is_empty() {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to delete {}: {:?}", relative, e);
            }
        }
    }

    pub fn url(&self, relative: &str) -> Option<String> {
        if relative.is_empty() {
            None
        } else {
            Some(format!("{}{}", self.url_prefix, relative))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> FileStorage {
        FileStorage::new(&MediaConfig {
            root: root.to_string_lossy().to_string(),
            url_prefix: "/media/".to_string(),
        })
    }

    #[actix_rt::test]
    async fn saved_file_lands_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let upload = UploadedFile {
            filename: "Leaf.JPG".to_string(),
            content_base64: STANDARD.encode(b"image-bytes"),
        };

        let path = storage.save("post_images", &upload).await.unwrap();
        assert!(path.starts_with("post_images/"));
        assert!(path.ends_with(".jpg"));
        assert_eq!(std::fs::read(dir.path().join(&path)).unwrap(), b"image-bytes");
        assert_eq!(storage.url(&path), Some(format!("/media/{}", path)));

        storage.delete(&path).await;
        assert!(!dir.path().join(&path).exists());
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        let garbage = UploadedFile {
            filename: "x.png".to_string(),
            content_base64: "%%%".to_string(),
        };
        assert!(matches!(garbage.decode(), Err(StorageError::InvalidEncoding)));

        let empty = UploadedFile {
            filename: "x.png".to_string(),
            content_base64: String::new(),
        };
        assert!(matches!(empty.decode(), Err(StorageError::Empty)));
    }
}
