//! Authentication API endpoints

use axum::{extract::State, routing::post, Json, Router};

use super::extract::JsonBody;
use super::middleware::{finish, ApiError, AppState};
use super::responses::TokenResponse;
use crate::db::UnitOfWork;
use crate::services::LoginInput;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/login_check", post(login_check))
}

/// POST /api/login_check - Exchange credentials for a JWT
async fn login_check(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginInput>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.user_service.login(&mut uow, body).await;
    let token = finish(uow, result).await?;

    Ok(Json(TokenResponse { token }))
}
