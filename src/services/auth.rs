use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::Store;
use crate::db::repositories::user::{hash_password, verify_password};
use crate::entities::{sessions, users};
use crate::services::captcha::CaptchaVerifier;
use crate::services::mailer::Mailer;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email is already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is temporarily locked")]
    Locked,
    #[error("{0}")]
    Validation(String),
    #[error("Reset token is invalid")]
    TokenInvalid,
    #[error("Reset token has expired")]
    TokenExpired,
    #[error("Captcha verification failed")]
    CaptchaFailed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct RegisterInput {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub captcha_token: Option<String>,
    pub device: Option<String>,
}

pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub device: Option<String>,
}

/// Account lifecycle: registration, credential login with lockout, bearer
/// sessions, and the password reset loop.
pub struct AuthService {
    store: Store,
    mailer: Arc<Mailer>,
    captcha: CaptchaVerifier,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        mailer: Arc<Mailer>,
        captcha: CaptchaVerifier,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            captcha,
            config,
        }
    }

    /// Create an account and open its first session, so the returned bearer
    /// token is usable without a separate login round-trip.
    pub async fn register(
        &self,
        input: RegisterInput,
    ) -> Result<(sessions::Model, users::Model), AuthError> {
        let email = input.email.trim().to_lowercase();
        let display_name = input.display_name.trim().to_string();

        if !email.contains('@') || email.len() < 5 {
            return Err(AuthError::Validation("A valid email is required".into()));
        }
        if display_name.is_empty() {
            return Err(AuthError::Validation("A display name is required".into()));
        }
        if input.password.len() < self.config.min_password_len {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_len
            )));
        }

        if !self
            .captcha
            .verify(input.captcha_token.as_deref())
            .await
            .map_err(AuthError::Internal)?
        {
            return Err(AuthError::CaptchaFailed);
        }

        if self
            .store
            .users()
            .get_by_email(&email)
            .await
            .map_err(AuthError::Internal)?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let hash = spawn_hash(input.password).await.map_err(AuthError::Internal)?;
        let user = self
            .store
            .users()
            .create(&email, &display_name, Some(hash))
            .await
            .map_err(AuthError::Internal)?;

        let session = self
            .store
            .sessions()
            .create(user.id, &generate_token(), input.device.as_deref())
            .await
            .map_err(AuthError::Internal)?;

        info!(user_id = user.id, "Registered new user");
        Ok((session, user))
    }

    /// Verify credentials and open a session. Failed attempts count toward a
    /// temporary lockout; a successful login clears the counter.
    pub async fn login(
        &self,
        input: LoginInput,
    ) -> Result<(sessions::Model, users::Model), AuthError> {
        let email = input.email.trim().to_lowercase();

        let Some(user) = self
            .store
            .users()
            .get_by_email(&email)
            .await
            .map_err(AuthError::Internal)?
        else {
            return Err(AuthError::InvalidCredentials);
        };

        if user
            .locked_until
            .as_deref()
            .is_some_and(timestamp_in_future)
        {
            return Err(AuthError::Locked);
        }

        let Some(hash) = user.password_hash.clone() else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = input.password;
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("Password verification task panicked")
            .and_then(|r| r)
            .map_err(AuthError::Internal)?;

        if !verified {
            let locked_until = (user.failed_logins + 1 >= self.config.max_failed_logins)
                .then(|| (Utc::now() + Duration::minutes(self.config.lockout_minutes)).to_rfc3339());
            if locked_until.is_some() {
                warn!(user_id = user.id, "Account locked after repeated login failures");
            }
            self.store
                .users()
                .record_failed_login(user, locked_until)
                .await
                .map_err(AuthError::Internal)?;
            return Err(AuthError::InvalidCredentials);
        }

        self.store
            .users()
            .clear_login_failures(user.clone())
            .await
            .map_err(AuthError::Internal)?;

        let session = self
            .store
            .sessions()
            .create(user.id, &generate_token(), input.device.as_deref())
            .await
            .map_err(AuthError::Internal)?;

        Ok((session, user))
    }

    /// Issue a reset token and mail it out. Always succeeds from the caller's
    /// point of view so the endpoint cannot be used to probe for accounts.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.users().get_by_email(&email).await? else {
            return Ok(());
        };

        let token = generate_token();
        let expires = (Utc::now() + Duration::minutes(self.config.reset_token_ttl_minutes))
            .to_rfc3339();
        let address = user.email.clone();
        self.store
            .users()
            .set_reset_token(user, &token, &expires)
            .await?;

        self.mailer.send_detached(
            address,
            "Password reset".to_string(),
            format!("Use this code to reset your password: {token}"),
        );

        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        if password.len() < self.config.min_password_len {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_len
            )));
        }

        let Some(user) = self
            .store
            .users()
            .get_by_reset_token(token)
            .await
            .map_err(AuthError::Internal)?
        else {
            return Err(AuthError::TokenInvalid);
        };

        let expired = !user
            .reset_token_expires
            .as_deref()
            .is_some_and(timestamp_in_future);
        if expired {
            return Err(AuthError::TokenExpired);
        }

        let hash = spawn_hash(password.to_string())
            .await
            .map_err(AuthError::Internal)?;
        let user_id = user.id;
        self.store
            .users()
            .update_password(user, hash)
            .await
            .map_err(AuthError::Internal)?;

        info!(user_id, "Password reset completed");
        Ok(())
    }
}

async fn spawn_hash(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task panicked")?
}

/// 64-hex-char opaque token for sessions and reset codes.
#[must_use]
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..64)
        .map(|_| format!("{:x}", rng.random_range(0..16)))
        .collect()
}

/// Lockout and reset-token expiries are stored as RFC3339 strings whose
/// fractional-second width varies, so ordering has to go through a parsed
/// `DateTime`. An unparseable value counts as expired.
fn timestamp_in_future(ts: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(ts).is_ok_and(|t| t > Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SecondsFormat;

    #[test]
    fn timestamp_ordering_ignores_fractional_width_and_offset_style() {
        let future = Utc::now() + Duration::minutes(5);
        let past = Utc::now() - Duration::minutes(5);

        assert!(timestamp_in_future(&future.to_rfc3339()));
        assert!(timestamp_in_future(
            &future.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        assert!(!timestamp_in_future(&past.to_rfc3339()));
        assert!(!timestamp_in_future(
            &past.to_rfc3339_opts(SecondsFormat::Nanos, false)
        ));
    }

    #[test]
    fn garbage_timestamps_never_lock() {
        assert!(!timestamp_in_future("not a timestamp"));
        assert!(!timestamp_in_future(""));
    }

    #[test]
    fn generated_tokens_are_opaque_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
