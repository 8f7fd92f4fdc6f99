//! Front page and account confirmation links

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Router,
};

use super::middleware::{finish, ApiError, AppState};
use crate::db::UnitOfWork;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/confirm-user/{token}", get(confirm_user))
}

/// GET / - Front page
async fn index() -> &'static str {
    "Blogroll API"
}

/// GET /confirm-user/{token} - Consume a confirmation token
///
/// Redirects to the front page once the account is enabled.
async fn confirm_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Redirect, ApiError> {
    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let result = state.confirmation_service.confirm_user(&mut uow, &token).await;
    finish(uow, result).await?;

    Ok(Redirect::to("/"))
}
