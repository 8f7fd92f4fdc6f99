//! Blog post API endpoints

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::common::parse_blog_post_filter;
use super::extract::JsonBody;
use super::middleware::{self, finish, ApiError, AppState, AuthenticatedUser};
use super::responses::{BlogPostDetailsView, BlogPostView, CommentView};
use crate::db::UnitOfWork;
use crate::models::{BlogPostChanges, Image, NewBlogPost, Page, PendingWrite};
use crate::services::pre_write;

/// Routes open to anyone
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/blog_posts", get(list_blog_posts))
        .route("/api/blog_posts/{id}", get(get_blog_post))
        .route("/api/blog_posts/{id}/comments", get(list_blog_post_comments))
        .route("/api/blog_posts/{id}/images", get(list_blog_post_images))
}

/// Routes for writers; needs authentication layered on top
pub fn writer_router() -> Router<AppState> {
    Router::new()
        .route("/api/blog_posts", post(create_blog_post))
        .route("/api/blog_posts/{id}", put(update_blog_post))
        .route_layer(axum_middleware::from_fn(middleware::require_writer))
}

#[derive(Debug, Deserialize)]
pub struct CreateBlogPostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub images: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlogPostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub images: Option<Vec<i64>>,
}

/// GET /api/blog_posts - Filtered listing
///
/// Query: `title`, `content`, `author.name`, `author`, `published[after]`,
/// `published[before]`, `id[gte]`, `id[lte]`, `_order[id|title|published]`,
/// `page`, `itemsPerPage`.
async fn list_blog_posts(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<BlogPostView>>, ApiError> {
    let filter = parse_blog_post_filter(&pairs)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.blog_post_service.list(&mut uow, &filter).await;
    let page = finish(uow, result).await?;

    Ok(Json(page.map(BlogPostView::from)))
}

/// GET /api/blog_posts/{id} - Post with author, comments and images
async fn get_blog_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BlogPostDetailsView>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.blog_post_service.details(&mut uow, id).await;
    let details = finish(uow, result).await?;

    Ok(Json(BlogPostDetailsView::new(details, None)))
}

/// GET /api/blog_posts/{id}/comments
async fn list_blog_post_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.comment_service.list_by_blog_post(&mut uow, id).await;
    let comments = finish(uow, result).await?;

    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

/// GET /api/blog_posts/{id}/images
async fn list_blog_post_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = async {
        state.blog_post_service.get(&mut uow, id).await?;
        Ok::<_, ApiError>(state.image_service.list_by_blog_post(&mut uow, id).await?)
    }
    .await;
    let images = finish(uow, result).await?;

    Ok(Json(images))
}

/// POST /api/blog_posts - Create a post authored by the caller
async fn create_blog_post(
    State(state): State<AppState>,
    method: Method,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<CreateBlogPostRequest>,
) -> Result<(StatusCode, Json<BlogPostView>), ApiError> {
    let mut draft = NewBlogPost {
        title: body.title,
        content: body.content,
        slug: body.slug,
        images: body.images,
        ..NewBlogPost::default()
    };
    pre_write(&method, PendingWrite::BlogPost(&mut draft), &user)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.blog_post_service.create(&mut uow, &draft).await;
    let post = finish(uow, result).await?;

    Ok((StatusCode::CREATED, Json(post.into())))
}

/// PUT /api/blog_posts/{id} - Editors may update any post, writers their own
async fn update_blog_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateBlogPostRequest>,
) -> Result<Json<BlogPostView>, ApiError> {
    let changes = BlogPostChanges {
        title: body.title,
        content: body.content,
        slug: body.slug,
        images: body.images,
    };

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state
        .blog_post_service
        .update(&mut uow, id, changes, &user.0)
        .await;
    let post = finish(uow, result).await?;

    Ok(Json(post.into()))
}
