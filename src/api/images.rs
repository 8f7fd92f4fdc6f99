//! Image API endpoints

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{Method, StatusCode},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};

use super::common::PaginationQuery;
use super::middleware::{self, finish, ApiError, AppState, AuthenticatedUser};
use crate::db::UnitOfWork;
use crate::models::{Image, ImageUpload, Page, PendingWrite, UploadedFile};
use crate::services::pre_write;

// Room for multipart framing around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/images", get(list_images))
        .route("/api/images/{id}", get(get_image))
}

/// Upload route for writers; needs authentication layered on top
pub fn writer_router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/images", post(upload_image))
        .route_layer(axum_middleware::from_fn(middleware::require_writer))
        .layer(DefaultBodyLimit::max(limit))
}

/// GET /api/images
async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<Image>>, ApiError> {
    let (page, per_page) = query.clamped();

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.image_service.list(&mut uow, page, per_page).await;
    Ok(Json(finish(uow, result).await?))
}

/// GET /api/images/{id}
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Image>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.image_service.get(&mut uow, id).await;
    Ok(Json(finish(uow, result).await?))
}

/// Read the `file` field of a multipart body; other fields are skipped.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

/// POST /api/images - Upload an image (multipart field `file`)
///
/// A missing or invalid file fails validation; nothing is stored then.
async fn upload_image(
    State(state): State<AppState>,
    method: Method,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Image>), ApiError> {
    let mut upload = ImageUpload::new(read_file_field(&mut multipart).await?);
    pre_write(&method, PendingWrite::Image(&mut upload), &user)?;

    let uow = UnitOfWork::begin(&state.pool).await?;
    let image = state
        .image_service
        .upload_and_commit(uow, &mut upload)
        .await?;

    Ok((StatusCode::CREATED, Json(image)))
}
