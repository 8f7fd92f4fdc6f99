//! Comment API endpoints

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::common::PaginationQuery;
use super::extract::JsonBody;
use super::middleware::{self, finish, ApiError, AppState, AuthenticatedUser};
use super::responses::CommentView;
use crate::db::UnitOfWork;
use crate::models::{NewComment, Page, PendingWrite};
use crate::services::pre_write;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", get(list_comments))
        .route("/api/comments/{id}", get(get_comment))
}

/// Routes for commentators; needs authentication layered on top
pub fn commentator_router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", post(create_comment))
        .route("/api/comments/{id}", put(update_comment))
        .route_layer(axum_middleware::from_fn(middleware::require_commentator))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
    pub blog_post: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: String,
}

/// GET /api/comments
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<CommentView>>, ApiError> {
    let (page, per_page) = query.clamped();

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.comment_service.list(&mut uow, page, per_page).await;
    let comments = finish(uow, result).await?;

    Ok(Json(comments.map(CommentView::from)))
}

/// GET /api/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CommentView>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.comment_service.get(&mut uow, id).await;
    let comment = finish(uow, result).await?;

    Ok(Json(comment.into()))
}

/// POST /api/comments - Comment on a blog post as the caller
async fn create_comment(
    State(state): State<AppState>,
    method: Method,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let mut draft = NewComment {
        content: body.content,
        blog_post_id: body.blog_post,
        ..NewComment::default()
    };
    pre_write(&method, PendingWrite::Comment(&mut draft), &user)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.comment_service.create(&mut uow, &draft).await;
    let comment = finish(uow, result).await?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// PUT /api/comments/{id} - Only the content can change
async fn update_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateCommentRequest>,
) -> Result<Json<CommentView>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state
        .comment_service
        .update(&mut uow, id, body.content, &user.0)
        .await;
    let comment = finish(uow, result).await?;

    Ok(Json(comment.into()))
}
