//! Image model

use serde::{Deserialize, Serialize};

/// Stored image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    /// Public URL of the stored file
    pub url: String,
}

/// Raw file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An image record bound to a transient upload handle.
///
/// `file` is cleared once the record has been persisted; only `url` is
/// durable.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub file: Option<UploadedFile>,
    pub url: Option<String>,
}

impl ImageUpload {
    pub fn new(file: Option<UploadedFile>) -> Self {
        Self { file, url: None }
    }
}
