//! Account confirmation

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::db::UnitOfWork;
use crate::models::User;

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    /// No pending account carries the token (unknown or already used)
    #[error("Confirmation token is invalid")]
    InvalidTokenConfirmation,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Consumes confirmation tokens.
pub struct UserConfirmationService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserConfirmationService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Enable the account holding `token` and clear the token, so it works
    /// only once.
    pub async fn confirm_user(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
    ) -> Result<User, ConfirmationError> {
        let mut user = self
            .user_repo
            .find_by_confirmation_token(uow, token)
            .await
            .context("Failed to look up confirmation token")?
            .ok_or(ConfirmationError::InvalidTokenConfirmation)?;

        user.enabled = true;
        user.confirmation_token = None;

        let user = self
            .user_repo
            .update(uow, &user)
            .await
            .context("Failed to enable user")?;

        tracing::info!("Confirmed user {} ({})", user.username, user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::NewUser;

    #[tokio::test]
    async fn test_confirm_enables_user_and_token_is_single_use() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::boxed();
        let service = UserConfirmationService::new(repo.clone());

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let pending = repo
            .create(
                &mut uow,
                &NewUser::pending(
                    "newuser".to_string(),
                    "New User".to_string(),
                    "new@example.com".to_string(),
                    "hash".to_string(),
                    "AbCdEfGhIjKlMnOpQrStUvWxYz0123".to_string(),
                ),
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();
        assert!(!pending.enabled);

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let confirmed = service
            .confirm_user(&mut uow, "AbCdEfGhIjKlMnOpQrStUvWxYz0123")
            .await
            .unwrap();
        uow.commit().await.unwrap();
        assert_eq!(confirmed.id, pending.id);
        assert!(confirmed.enabled);
        assert!(confirmed.confirmation_token.is_none());

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let replay = service
            .confirm_user(&mut uow, "AbCdEfGhIjKlMnOpQrStUvWxYz0123")
            .await;
        assert!(matches!(replay, Err(ConfirmationError::InvalidTokenConfirmation)));

        let stored = repo.find_by_id(&mut uow, pending.id).await.unwrap().unwrap();
        assert!(stored.enabled);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = UserConfirmationService::new(SqlxUserRepository::boxed());

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        assert!(matches!(
            service.confirm_user(&mut uow, "nope").await,
            Err(ConfirmationError::InvalidTokenConfirmation)
        ));
    }
}
