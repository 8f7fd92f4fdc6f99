//! User service
//!
//! Registration, login, profile updates and password resets. Every operation
//! runs inside the caller's [`UnitOfWork`]; the caller commits on success.

use anyhow::Context;
use axum::http::Method;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::db::UnitOfWork;
use crate::models::{NewUser, Page, PendingWrite, User};
use crate::services::jwt::TokenIssuer;
use crate::services::lifecycle::{pre_write, Anonymous, LifecycleError};
use crate::services::mailer::Mailer;
use crate::services::password::{
    hash_password, meets_password_policy, verify_password, PASSWORD_POLICY_MESSAGE,
};
use crate::services::token::{TokenError, TokenGenerator};
use crate::services::validation::{Violations, ALREADY_USED};

/// Minimum length of a username
pub const MIN_USERNAME_LENGTH: usize = 5;

const PASSWORDS_DIFFER: &str = "Passwords does not match";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account exists but has not been confirmed
    #[error("Account is not enabled")]
    AccountDisabled,

    #[error("Password does not meet the complexity policy")]
    WeakPassword,

    #[error("New password and its repetition do not match")]
    PasswordMismatch,

    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<Violations> for UserServiceError {
    fn from(violations: Violations) -> Self {
        Self::ValidationFailed(violations)
    }
}

/// Input for registering a new user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub retyped_password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl RegisterInput {
    pub fn new(username: &str, password: &str, name: &str, email: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            retyped_password: password.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

/// Input for logging in
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Input for updating one's own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Input for a password reset. Never persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_retyped_password: String,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenIssuer>,
    mailer: Arc<dyn Mailer>,
    token_generator: TokenGenerator,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenIssuer>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            mailer,
            token_generator: TokenGenerator::new(),
        }
    }

    /// Register a new user.
    ///
    /// The account is created disabled with a fresh confirmation token and
    /// the confirmation mail is sent before returning. If sending fails the
    /// error propagates and the caller's unit of work is never committed.
    pub async fn register(
        &self,
        uow: &mut UnitOfWork,
        input: RegisterInput,
    ) -> Result<User, UserServiceError> {
        let mut violations = Violations::new();

        if violations.not_blank("username", &input.username) {
            violations.min_length("username", &input.username, MIN_USERNAME_LENGTH);
        }
        if !meets_password_policy(&input.password) {
            violations.add("password", PASSWORD_POLICY_MESSAGE);
        }
        if input.password != input.retyped_password {
            violations.add("retypedPassword", PASSWORDS_DIFFER);
        }
        violations.not_blank("name", &input.name);
        if violations.not_blank("email", &input.email) {
            violations.email("email", &input.email);
        }

        if !violations.has("username")
            && self
                .user_repo
                .find_by_username(uow, &input.username)
                .await
                .context("Failed to check username")?
                .is_some()
        {
            violations.add("username", ALREADY_USED);
        }
        if !violations.has("email")
            && self
                .user_repo
                .find_by_email(uow, &input.email)
                .await
                .context("Failed to check email")?
                .is_some()
        {
            violations.add("email", ALREADY_USED);
        }

        violations.into_result()?;

        let password_hash = hash_password(&input.password)?;
        let token = self.token_generator.generate_default()?;

        let mut new_user = NewUser::pending(
            input.username,
            input.name,
            input.email,
            password_hash,
            token.clone(),
        );
        pre_write(&Method::POST, PendingWrite::User(&mut new_user), &Anonymous)?;

        let user = self
            .user_repo
            .create(uow, &new_user)
            .await
            .context("Failed to create user")?;

        self.mailer
            .send_confirmation(&user, &token)
            .await
            .context("Failed to send confirmation e-mail")?;

        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check credentials and issue an authentication token.
    pub async fn login(
        &self,
        uow: &mut UnitOfWork,
        input: LoginInput,
    ) -> Result<String, UserServiceError> {
        let user = self
            .user_repo
            .find_by_username(uow, &input.username)
            .await
            .context("Failed to look up user")?
            .ok_or(UserServiceError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::warn!("Failed login for {}", input.username);
            return Err(UserServiceError::InvalidCredentials);
        }

        if !user.enabled {
            return Err(UserServiceError::AccountDisabled);
        }

        Ok(self.tokens.issue(&user)?)
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .find_by_id(uow, id)
            .await
            .context("Failed to load user")?
            .ok_or(UserServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        uow: &mut UnitOfWork,
        page: i64,
        per_page: i64,
    ) -> Result<Page<User>, UserServiceError> {
        Ok(self.user_repo.list(uow, page, per_page).await?)
    }

    /// Change name and/or e-mail of an existing user.
    pub async fn update_profile(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get(uow, id).await?;
        let mut violations = Violations::new();

        if let Some(name) = &input.name {
            violations.not_blank("name", name);
        }
        if let Some(email) = &input.email {
            if violations.not_blank("email", email) {
                violations.email("email", email);
            }
            if !violations.has("email") {
                let taken = self
                    .user_repo
                    .find_by_email(uow, email)
                    .await
                    .context("Failed to check email")?
                    .is_some_and(|other| other.id != id);
                if taken {
                    violations.add("email", ALREADY_USED);
                }
            }
        }

        violations.into_result()?;

        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(email) = input.email {
            user.email = email;
        }

        Ok(self.user_repo.update(uow, &user).await?)
    }

    /// Replace the password of `id` and issue a fresh token.
    ///
    /// Every check runs before the user is touched, so a failed reset leaves
    /// the stored hash and change date as they were. Tokens issued before the
    /// reset stay valid until they expire. Two concurrent resets of the same
    /// user are not serialized; the last commit wins.
    pub async fn reset_password(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        input: ResetPasswordInput,
    ) -> Result<String, UserServiceError> {
        let mut user = self.get(uow, id).await?;

        if !verify_password(&input.old_password, &user.password_hash)? {
            tracing::warn!("Password reset for user {} rejected: wrong old password", id);
            return Err(UserServiceError::InvalidCredentials);
        }
        if !meets_password_policy(&input.new_password) {
            return Err(UserServiceError::WeakPassword);
        }
        if input.new_password != input.new_retyped_password {
            return Err(UserServiceError::PasswordMismatch);
        }

        user.password_hash = hash_password(&input.new_password)?;
        user.password_change_date = Some(Utc::now().timestamp());

        let user = self
            .user_repo
            .update(uow, &user)
            .await
            .context("Failed to store new password")?;

        tracing::info!("Password reset for user {}", user.id);
        Ok(self.tokens.issue(&user)?)
    }
}
