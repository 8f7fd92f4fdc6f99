//! API middleware
//!
//! Contains:
//! - Application state
//! - The JSON error type every handler returns
//! - Authentication (Bearer JWT validation)
//! - Role gates that run before any handler

use anyhow::Context;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogPostRepository, SqlxCommentRepository, SqlxImageRepository, SqlxUserRepository,
    UserRepository,
};
use crate::db::{DynDatabasePool, UnitOfWork};
use crate::models::{Role, User};
use crate::services::{
    build_mailer, AuthContext, BlogPostService, BlogPostServiceError, CommentService,
    CommentServiceError, ConfirmationError, ImageService, ImageServiceError, JwtTokenIssuer,
    LifecycleError, LocalImageStorage, Mailer, TokenError, TokenIssuer, UserConfirmationService,
    UserService, UserServiceError, Violations,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub user_repo: Arc<dyn UserRepository>,
    pub user_service: Arc<UserService>,
    pub confirmation_service: Arc<UserConfirmationService>,
    pub blog_post_service: Arc<BlogPostService>,
    pub comment_service: Arc<CommentService>,
    pub image_service: Arc<ImageService>,
}

impl AppState {
    /// Wire every service for `config`, picking the mailer from the mail
    /// settings.
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let mailer = build_mailer(&config)?;
        Ok(Self::with_mailer(pool, config, mailer))
    }

    pub fn with_mailer(pool: DynDatabasePool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let tokens: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::from_config(&config.auth));

        let user_repo = SqlxUserRepository::boxed();
        let post_repo = SqlxBlogPostRepository::boxed();
        let comment_repo = SqlxCommentRepository::boxed();
        let image_repo = SqlxImageRepository::boxed();

        let storage = Arc::new(LocalImageStorage::from_config(&config.upload));

        Self {
            pool,
            tokens: tokens.clone(),
            user_repo: user_repo.clone(),
            user_service: Arc::new(UserService::new(user_repo.clone(), tokens, mailer)),
            confirmation_service: Arc::new(UserConfirmationService::new(user_repo.clone())),
            blog_post_service: Arc::new(BlogPostService::new(
                post_repo.clone(),
                user_repo,
                comment_repo.clone(),
                image_repo.clone(),
            )),
            comment_service: Arc::new(CommentService::new(comment_repo, post_repo)),
            image_service: Arc::new(ImageService::new(
                image_repo,
                storage,
                config.upload.clone(),
            )),
            config: Arc::new(config),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthContext for AuthenticatedUser {
    fn authenticated_principal(&self) -> Option<&User> {
        Some(&self.0)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn violations(violations: &Violations) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Validation failed",
            serde_json::to_value(violations).unwrap_or_default(),
        )
    }

    pub fn empty_body() -> Self {
        Self::new("EMPTY_BODY", "The request body must not be empty")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "INVALID_CREDENTIALS" | "ACCOUNT_DISABLED" | "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" | "INVALID_CONFIRMATION_TOKEN" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "WEAK_PASSWORD" | "PASSWORD_MISMATCH" | "EMPTY_BODY" => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        ApiError::internal_error("Internal server error")
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        tracing::error!("Token generation failed: {}", err);
        match err {
            TokenError::RandomSourceUnavailable(_) => {
                ApiError::new("RANDOM_SOURCE_UNAVAILABLE", "Secure random source unavailable")
            }
            TokenError::InvalidLength => ApiError::internal_error("Internal server error"),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        tracing::error!("Pre-write rule failed: {}", err);
        ApiError::internal_error("Internal server error")
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidCredentials => {
                ApiError::new("INVALID_CREDENTIALS", "Invalid credentials")
            }
            UserServiceError::AccountDisabled => {
                ApiError::new("ACCOUNT_DISABLED", "Account has not been confirmed")
            }
            UserServiceError::WeakPassword => ApiError::new(
                "WEAK_PASSWORD",
                crate::services::password::PASSWORD_POLICY_MESSAGE,
            ),
            UserServiceError::PasswordMismatch => {
                ApiError::new("PASSWORD_MISMATCH", "New password and its repetition do not match")
            }
            UserServiceError::ValidationFailed(v) => ApiError::violations(&v),
            UserServiceError::NotFound(id) => ApiError::not_found(format!("User {} not found", id)),
            UserServiceError::Token(e) => e.into(),
            UserServiceError::Lifecycle(e) => e.into(),
            UserServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<ConfirmationError> for ApiError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::InvalidTokenConfirmation => {
                ApiError::new("INVALID_CONFIRMATION_TOKEN", "Confirmation token is invalid")
            }
            ConfirmationError::InternalError(e) => e.into(),
        }
    }
}

impl From<BlogPostServiceError> for ApiError {
    fn from(err: BlogPostServiceError) -> Self {
        match err {
            BlogPostServiceError::ValidationFailed(v) => ApiError::violations(&v),
            BlogPostServiceError::NotFound(id) => {
                ApiError::not_found(format!("Blog post {} not found", id))
            }
            BlogPostServiceError::Forbidden(id) => {
                ApiError::forbidden(format!("Not allowed to edit blog post {}", id))
            }
            BlogPostServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::ValidationFailed(v) => ApiError::violations(&v),
            CommentServiceError::NotFound(id) => {
                ApiError::not_found(format!("Comment {} not found", id))
            }
            CommentServiceError::BlogPostNotFound(id) => {
                ApiError::not_found(format!("Blog post {} not found", id))
            }
            CommentServiceError::Forbidden(id) => {
                ApiError::forbidden(format!("Not allowed to edit comment {}", id))
            }
            CommentServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<ImageServiceError> for ApiError {
    fn from(err: ImageServiceError) -> Self {
        match err {
            ImageServiceError::ValidationFailed(v) => ApiError::violations(&v),
            ImageServiceError::NotFound(id) => ApiError::not_found(format!("Image {} not found", id)),
            ImageServiceError::InternalError(e) => e.into(),
        }
    }
}

/// Finish a request's unit of work: commit when `result` is a success, roll
/// back otherwise.
pub async fn finish<T, E>(uow: UnitOfWork, result: Result<T, E>) -> Result<T, ApiError>
where
    ApiError: From<E>,
{
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!("Rollback failed: {:#}", rollback_err);
            }
            Err(err.into())
        }
    }
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Verifies the JWT and loads the current user; disabled or deleted accounts
/// are rejected even with a valid token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!("Rejected token: {:#}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let mut uow = UnitOfWork::begin(&state.pool).await?;
    let found = state
        .user_repo
        .find_by_id(&mut uow, user_id)
        .await
        .context("Failed to load authenticated user");
    let user = finish(uow, found)
        .await?
        .filter(|user| user.enabled)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

fn check_role(request: &Request, role: Role) -> Result<(), ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_granted(role) {
        tracing::warn!(
            "User {} lacks {} for {} {}",
            user.0.id,
            role,
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::forbidden(format!("{} required", role)));
    }
    Ok(())
}

/// Writer authorization middleware
pub async fn require_writer(request: Request, next: Next) -> Result<Response, ApiError> {
    check_role(&request, Role::Writer)?;
    Ok(next.run(request).await)
}

/// Commentator authorization middleware
pub async fn require_commentator(request: Request, next: Next) -> Result<Response, ApiError> {
    check_role(&request, Role::Commentator)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            ("INVALID_CREDENTIALS", StatusCode::UNAUTHORIZED),
            ("ACCOUNT_DISABLED", StatusCode::UNAUTHORIZED),
            ("UNAUTHORIZED", StatusCode::UNAUTHORIZED),
            ("FORBIDDEN", StatusCode::FORBIDDEN),
            ("NOT_FOUND", StatusCode::NOT_FOUND),
            ("INVALID_CONFIRMATION_TOKEN", StatusCode::NOT_FOUND),
            ("WEAK_PASSWORD", StatusCode::BAD_REQUEST),
            ("PASSWORD_MISMATCH", StatusCode::BAD_REQUEST),
            ("VALIDATION_ERROR", StatusCode::BAD_REQUEST),
            ("EMPTY_BODY", StatusCode::BAD_REQUEST),
            ("RANDOM_SOURCE_UNAVAILABLE", StatusCode::INTERNAL_SERVER_ERROR),
            ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(ApiError::new(code, "x").status(), status, "{}", code);
        }
    }

    #[test]
    fn test_violations_become_details() {
        let mut violations = Violations::new();
        violations.add("title", "This value should not be blank.");

        let err: ApiError = BlogPostServiceError::ValidationFailed(violations).into();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert_eq!(
            err.error.details,
            Some(serde_json::json!([
                { "propertyPath": "title", "message": "This value should not be blank." }
            ]))
        );
    }

    #[test]
    fn test_missing_principal_is_internal() {
        let err: ApiError = LifecycleError::MissingPrincipal { kind: "comment" }.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error.code, "INTERNAL_ERROR");
    }

    #[test]
    fn test_random_source_failure() {
        let err: ApiError =
            UserServiceError::Token(TokenError::RandomSourceUnavailable("closed".into())).into();
        assert_eq!(err.error.code, "RANDOM_SOURCE_UNAVAILABLE");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
