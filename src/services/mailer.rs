//! Confirmation e-mail delivery

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::Config;
use crate::models::User;

/// Delivers account confirmation messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `user` a message containing the link that consumes `token`.
    async fn send_confirmation(&self, user: &User, token: &str) -> Result<()>;
}

/// Absolute link a user follows to confirm their account.
pub fn confirmation_link(base_url: &str, token: &str) -> String {
    format!("{}/confirm-user/{}", base_url.trim_end_matches('/'), token)
}

/// SMTP mailer
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    base_url: String,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mail = &config.mail;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&mail.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(mail.smtp_port);

        if !mail.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                mail.smtp_username.clone(),
                mail.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: format!("{} <{}>", mail.from_name, mail.from),
            base_url: config.server.base_url.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(&self, user: &User, token: &str) -> Result<()> {
        let body = format!(
            "Hello {},\n\nplease confirm your account by opening this link:\n\n{}\n",
            user.name,
            confirmation_link(&self.base_url, token)
        );

        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(user.email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject("Please confirm your account!")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!("Sent confirmation e-mail to user {}", user.id);
        Ok(())
    }
}

/// Mailer used when outgoing mail is disabled: the link goes to the log.
pub struct LogMailer {
    base_url: String,
}

impl LogMailer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, user: &User, token: &str) -> Result<()> {
        tracing::info!(
            "Mail disabled; confirmation link for {}: {}",
            user.username,
            confirmation_link(&self.base_url, token)
        );
        Ok(())
    }
}

/// Pick the mailer for the configuration.
pub fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    if config.mail.enabled {
        Ok(Arc::new(SmtpMailer::from_config(config)?))
    } else {
        Ok(Arc::new(LogMailer::new(config.server.base_url.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_link() {
        assert_eq!(
            confirmation_link("http://localhost:8080/", "abc"),
            "http://localhost:8080/confirm-user/abc"
        );
        assert_eq!(
            confirmation_link("https://blog.example.com", "XYZ"),
            "https://blog.example.com/confirm-user/XYZ"
        );
    }

    #[tokio::test]
    async fn test_disabled_mail_uses_log_mailer() {
        let config = Config::default();
        let mailer = build_mailer(&config).unwrap();

        let user = User {
            id: 1,
            username: "newuser".to_string(),
            name: "New User".to_string(),
            email: "new@example.com".to_string(),
            password_hash: "hash".to_string(),
            roles: Default::default(),
            enabled: false,
            confirmation_token: Some("token".to_string()),
            password_change_date: None,
        };
        mailer.send_confirmation(&user, "token").await.unwrap();
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds_from_config() {
        let mut config = Config::default();
        config.mail.enabled = true;
        config.mail.smtp_host = "smtp.example.com".to_string();
        config.mail.smtp_username = "mailer".to_string();

        assert!(build_mailer(&config).is_ok());
    }
}
