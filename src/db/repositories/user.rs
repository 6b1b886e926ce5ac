use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;

use crate::entities::users;

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: Option<String>,
    ) -> Result<users::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let user = users::ActiveModel {
            email: Set(email.to_lowercase()),
            display_name: Set(display_name.to_string()),
            password_hash: Set(password_hash),
            avatar_url: Set(None),
            failed_logins: Set(0),
            locked_until: Set(None),
            reset_token: Set(None),
            reset_token_expires: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert user")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    /// Display names keyed by user id, for enriching notification payloads.
    pub async fn display_names(&self, ids: &[i32]) -> Result<HashMap<i32, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .all(&self.conn)
            .await
            .context("Failed to query users by ids")?;

        Ok(rows.into_iter().map(|u| (u.id, u.display_name)).collect())
    }

    pub async fn record_failed_login(
        &self,
        user: users::Model,
        locked_until: Option<String>,
    ) -> Result<()> {
        let failed = user.failed_logins + 1;
        let mut active: users::ActiveModel = user.into();
        active.failed_logins = Set(failed);
        active.locked_until = Set(locked_until);
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn clear_login_failures(&self, user: users::Model) -> Result<()> {
        if user.failed_logins == 0 && user.locked_until.is_none() {
            return Ok(());
        }
        let mut active: users::ActiveModel = user.into();
        active.failed_logins = Set(0);
        active.locked_until = Set(None);
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_reset_token(
        &self,
        user: users::Model,
        token: &str,
        expires_at: &str,
    ) -> Result<()> {
        let mut active: users::ActiveModel = user.into();
        active.reset_token = Set(Some(token.to_string()));
        active.reset_token_expires = Set(Some(expires_at.to_string()));
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn get_by_reset_token(&self, token: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::ResetToken.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query user by reset token")
    }

    /// Set a new password hash and consume any pending reset token / lockout.
    pub async fn update_password(&self, user: users::Model, new_hash: String) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(Some(new_hash));
        active.reset_token = Set(None);
        active.reset_token_expires = Set(None);
        active.failed_logins = Set(0);
        active.locked_until = Set(None);
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }
}

/// Hash a password using Argon2id with the library defaults.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC-format hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
