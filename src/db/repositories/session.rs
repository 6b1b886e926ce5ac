use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{sessions, users};

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: i32,
        token: &str,
        device: Option<&str>,
    ) -> Result<sessions::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        sessions::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(user_id),
            device: Set(device.map(ToString::to_string)),
            active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert session")
    }

    /// Resolve a bearer token to its session and owning user. Inactive
    /// sessions never resolve.
    pub async fn resolve_token(
        &self,
        token: &str,
    ) -> Result<Option<(sessions::Model, users::Model)>> {
        let found = sessions::Entity::find()
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::Active.eq(true))
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to resolve session token")?;

        Ok(found.and_then(|(session, user)| user.map(|u| (session, u))))
    }

    pub async fn list_active_for_user(&self, user_id: i32) -> Result<Vec<sessions::Model>> {
        sessions::Entity::find()
            .filter(sessions::Column::UserId.eq(user_id))
            .filter(sessions::Column::Active.eq(true))
            .order_by_desc(sessions::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list sessions")
    }

    /// Flag one of the user's sessions inactive. Returns false when the
    /// session does not exist, belongs to someone else, or is already
    /// inactive; callers treat that as an idempotent no-op.
    pub async fn deactivate(&self, session_id: i32, user_id: i32) -> Result<bool> {
        let Some(session) = sessions::Entity::find_by_id(session_id)
            .filter(sessions::Column::UserId.eq(user_id))
            .filter(sessions::Column::Active.eq(true))
            .one(&self.conn)
            .await?
        else {
            return Ok(false);
        };

        let mut active: sessions::ActiveModel = session.into();
        active.active = Set(false);
        active.update(&self.conn).await?;
        Ok(true)
    }
}
