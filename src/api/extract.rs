//! Request body extraction

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use super::middleware::ApiError;

/// JSON body that rejects an empty (or whitespace only) payload with
/// `EMPTY_BODY` before attempting to parse it.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation_error(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::empty_body());
        }

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| ApiError::validation_error(format!("Invalid JSON body: {}", e)))
    }
}
