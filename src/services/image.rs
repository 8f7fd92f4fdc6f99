//! Image service
//!
//! Uploads are validated first. Only a valid upload reaches storage, and a
//! stored file whose record cannot be persisted is removed again.

use anyhow::Context;
use std::sync::Arc;

use crate::config::UploadConfig;
use crate::db::repositories::ImageRepository;
use crate::db::UnitOfWork;
use crate::models::{Image, ImageUpload, Page};
use crate::services::storage::ImageStorage;
use crate::services::validation::Violations;

#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    #[error("Image not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<Violations> for ImageServiceError {
    fn from(violations: Violations) -> Self {
        Self::ValidationFailed(violations)
    }
}

pub struct ImageService {
    repo: Arc<dyn ImageRepository>,
    storage: Arc<dyn ImageStorage>,
    config: UploadConfig,
}

impl ImageService {
    pub fn new(
        repo: Arc<dyn ImageRepository>,
        storage: Arc<dyn ImageStorage>,
        config: UploadConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            config,
        }
    }

    fn validate(&self, upload: &ImageUpload) -> Result<(), Violations> {
        let mut violations = Violations::new();

        match &upload.file {
            None => violations.add("file", "Please upload a file."),
            Some(file) if file.data.is_empty() => {
                violations.add("file", "An empty file is not allowed.")
            }
            Some(file) => {
                let content_type = file.content_type.as_deref().unwrap_or_default();
                if !self.config.is_type_allowed(content_type) {
                    violations.add(
                        "file",
                        format!(
                            "The mime type of the file is invalid (\"{}\"). Allowed mime types are {}.",
                            content_type,
                            self.config.allowed_types.join(", ")
                        ),
                    );
                }
                if file.size() as u64 > self.config.max_file_size {
                    violations.add(
                        "file",
                        format!(
                            "The file is too large. Allowed maximum size is {} bytes.",
                            self.config.max_file_size
                        ),
                    );
                }
            }
        }

        violations.into_result()
    }

    /// Validate, store and persist an upload.
    ///
    /// On success `upload.url` holds the stored file's URL and the transient
    /// `upload.file` has been cleared.
    pub async fn upload(
        &self,
        uow: &mut UnitOfWork,
        upload: &mut ImageUpload,
    ) -> Result<Image, ImageServiceError> {
        self.validate(upload)?;

        let file = upload
            .file
            .as_ref()
            .context("Validated upload lost its file")?;
        let url = self.storage.store(file).await?;

        let image = match self.repo.create(uow, &url).await {
            Ok(image) => image,
            Err(e) => {
                self.discard(&url).await;
                return Err(e.context("Failed to persist image").into());
            }
        };

        upload.url = Some(image.url.clone());
        upload.file = None;

        tracing::info!("Uploaded image {} at {}", image.id, image.url);
        Ok(image)
    }

    /// [`upload`](Self::upload) and commit `uow`.
    ///
    /// The unit of work is rolled back on any failure, and the stored file
    /// is removed again when the commit itself fails.
    pub async fn upload_and_commit(
        &self,
        mut uow: UnitOfWork,
        upload: &mut ImageUpload,
    ) -> Result<Image, ImageServiceError> {
        let image = match self.upload(&mut uow, upload).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::error!("Rollback failed: {:#}", rollback_err);
                }
                return Err(e);
            }
        };

        if let Err(e) = uow.commit().await {
            self.discard(&image.url).await;
            upload.url = None;
            return Err(e.into());
        }

        Ok(image)
    }

    async fn discard(&self, url: &str) {
        if let Err(e) = self.storage.remove(url).await {
            tracing::warn!("Failed to remove orphaned upload {}: {}", url, e);
        }
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: i64) -> Result<Image, ImageServiceError> {
        self.repo
            .find_by_id(uow, id)
            .await?
            .ok_or(ImageServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        uow: &mut UnitOfWork,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Image>, ImageServiceError> {
        Ok(self.repo.list(uow, page, per_page).await?)
    }

    pub async fn list_by_blog_post(
        &self,
        uow: &mut UnitOfWork,
        blog_post_id: i64,
    ) -> Result<Vec<Image>, ImageServiceError> {
        Ok(self.repo.list_by_blog_post(uow, blog_post_id).await?)
    }
}
