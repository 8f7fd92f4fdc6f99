//! User API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use super::common::PaginationQuery;
use super::extract::JsonBody;
use super::middleware::{finish, ApiError, AppState, AuthenticatedUser};
use super::responses::{TokenResponse, UserView};
use crate::db::UnitOfWork;
use crate::models::Page;
use crate::services::{RegisterInput, ResetPasswordInput, UpdateProfileInput};

/// Routes open to anyone
pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/users", post(register))
}

/// Routes for authenticated users
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/{id}", get(get_user).put(update_user))
        .route("/api/users/{id}/reset-password", put(reset_password))
}

fn ensure_self(user: &AuthenticatedUser, id: i64) -> Result<(), ApiError> {
    if user.0.id != id {
        tracing::warn!("User {} tried to modify user {}", user.0.id, id);
        return Err(ApiError::forbidden("You can only modify your own account"));
    }
    Ok(())
}

/// POST /api/users - Register a new account
///
/// The account stays disabled until the mailed confirmation link is opened.
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.register(&mut uow, body).await;
    let user = finish(uow, result).await?;

    let view = UserView::for_viewer(user.clone(), Some(&user));
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    viewer: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<UserView>>, ApiError> {
    let (page, per_page) = query.clamped();

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.list(&mut uow, page, per_page).await;
    let users = finish(uow, result).await?;

    Ok(Json(users.map(|u| UserView::for_viewer(u, Some(&viewer.0)))))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    viewer: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.get(&mut uow, id).await;
    let user = finish(uow, result).await?;

    Ok(Json(UserView::for_viewer(user, Some(&viewer.0))))
}

/// PUT /api/users/{id} - Update name and e-mail of one's own account
async fn update_user(
    State(state): State<AppState>,
    viewer: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateProfileInput>,
) -> Result<Json<UserView>, ApiError> {
    ensure_self(&viewer, id)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.update_profile(&mut uow, id, body).await;
    let user = finish(uow, result).await?;

    Ok(Json(UserView::for_viewer(user, Some(&viewer.0))))
}

/// PUT /api/users/{id}/reset-password - Change one's own password
///
/// Returns a fresh token bound to the updated account.
async fn reset_password(
    State(state): State<AppState>,
    viewer: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ResetPasswordInput>,
) -> Result<Json<TokenResponse>, ApiError> {
    ensure_self(&viewer, id)?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.reset_password(&mut uow, id, body).await;
    let token = finish(uow, result).await?;

    Ok(Json(TokenResponse { token }))
}
