//! Image file storage

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::models::UploadedFile;

/// URL prefix stored files are served under
pub const IMAGES_URL_PREFIX: &str = "/images";

/// Keeps uploaded files somewhere they can be served from.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Store `file` and return its public URL.
    async fn store(&self, file: &UploadedFile) -> Result<String>;

    /// Remove a file previously returned by [`store`](Self::store).
    async fn remove(&self, url: &str) -> Result<()>;
}

/// Stores files in a local directory.
pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to create upload dir {}", self.root.display()))?;
        }
        Ok(())
    }
}

/// Extension from the original file name, falling back to the MIME type.
fn extension_for(file: &UploadedFile) -> String {
    if let Some(ext) = file
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
    {
        if !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_lowercase();
        }
    }

    match file.content_type.as_deref().unwrap_or_default() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        _ => "bin",
    }
    .to_string()
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn store(&self, file: &UploadedFile) -> Result<String> {
        self.ensure_root().await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(file));
        let path = self.root.join(&file_name);

        fs::write(&path, &file.data)
            .await
            .with_context(|| format!("Failed to save file {}", path.display()))?;

        tracing::debug!("Stored {} bytes as {}", file.size(), file_name);
        Ok(format!("{}/{}", IMAGES_URL_PREFIX, file_name))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let file_name = url
            .strip_prefix(IMAGES_URL_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
            .ok_or_else(|| anyhow!("Not a stored image URL: {}", url))?;

        fs::remove_file(self.root.join(file_name))
            .await
            .with_context(|| format!("Failed to remove {}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png(name: Option<&str>) -> UploadedFile {
        UploadedFile {
            file_name: name.map(str::to_string),
            content_type: Some("image/png".to_string()),
            data: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(&png(Some("photo.JPEG"))), "jpeg");
        assert_eq!(extension_for(&png(Some("no-extension"))), "png");
        assert_eq!(extension_for(&png(None)), "png");
        assert_eq!(extension_for(&png(Some("evil./../x"))), "png");
    }

    #[tokio::test]
    async fn test_store_and_remove() {
        let dir = TempDir::new().unwrap();
        let storage = LocalImageStorage::new(dir.path().join("images"));

        let url = storage.store(&png(Some("photo.png"))).await.unwrap();
        assert!(url.starts_with("/images/"));
        assert!(url.ends_with(".png"));

        let file_name = url.trim_start_matches("/images/");
        let stored = storage.root().join(file_name);
        assert_eq!(std::fs::read(&stored).unwrap(), vec![0x89, b'P', b'N', b'G']);

        storage.remove(&url).await.unwrap();
        assert!(!stored.exists());
    }

    #[tokio::test]
    async fn test_remove_rejects_foreign_urls() {
        let dir = TempDir::new().unwrap();
        let storage = LocalImageStorage::new(dir.path());

        assert!(storage.remove("/images/../config.yml").await.is_err());
        assert!(storage.remove("/etc/passwd").await.is_err());
    }
}
