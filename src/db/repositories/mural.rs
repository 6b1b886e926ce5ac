use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;

use crate::entities::{mural_members, murals, notifications};

pub struct MuralInput {
    pub title: String,
    pub description: Option<String>,
    pub creator_id: i32,
    pub privacy: String,
    pub access_code: String,
    pub theme_id: i32,
    pub custom_color: Option<String>,
    pub comments_enabled: bool,
    pub likes_enabled: bool,
}

pub struct MuralUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub privacy: Option<String>,
    pub theme_id: Option<i32>,
    pub custom_color: Option<Option<String>>,
    pub comments_enabled: Option<bool>,
    pub likes_enabled: Option<bool>,
}

pub struct MuralRepository {
    conn: DatabaseConnection,
}

impl MuralRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, input: MuralInput) -> Result<murals::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        murals::ActiveModel {
            title: Set(input.title),
            description: Set(input.description),
            creator_id: Set(input.creator_id),
            privacy: Set(input.privacy),
            access_code: Set(input.access_code),
            theme_id: Set(input.theme_id),
            custom_color: Set(input.custom_color),
            comments_enabled: Set(input.comments_enabled),
            likes_enabled: Set(input.likes_enabled),
            active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert mural")
    }

    pub async fn get(&self, id: i32) -> Result<Option<murals::Model>> {
        Ok(murals::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query mural")?
            .filter(|m| m.active))
    }

    pub async fn get_by_access_code(&self, code: &str) -> Result<Option<murals::Model>> {
        Ok(murals::Entity::find()
            .filter(murals::Column::AccessCode.eq(code))
            .one(&self.conn)
            .await
            .context("Failed to query mural by access code")?
            .filter(|m| m.active))
    }

    /// Uniqueness check for code generation. Looks at every mural, active or
    /// not, so a soft-deleted board never frees its code.
    pub async fn access_code_exists(&self, code: &str) -> Result<bool> {
        let found = murals::Entity::find()
            .filter(murals::Column::AccessCode.eq(code))
            .one(&self.conn)
            .await?;
        Ok(found.is_some())
    }

    /// Every active mural where the user is creator or holds a membership
    /// row, newest first, paired with the explicit role (if any).
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<(murals::Model, Option<String>)>> {
        let memberships = mural_members::Entity::find()
            .filter(mural_members::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await?;

        let roles: HashMap<i32, String> = memberships
            .into_iter()
            .map(|m| (m.mural_id, m.role))
            .collect();

        let member_ids: Vec<i32> = roles.keys().copied().collect();

        let murals = murals::Entity::find()
            .filter(murals::Column::Active.eq(true))
            .filter(
                murals::Column::CreatorId
                    .eq(user_id)
                    .or(murals::Column::Id.is_in(member_ids)),
            )
            .order_by_desc(murals::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list murals for user")?;

        Ok(murals
            .into_iter()
            .map(|m| {
                let role = roles.get(&m.id).cloned();
                (m, role)
            })
            .collect())
    }

    pub async fn update(&self, mural: murals::Model, update: MuralUpdate) -> Result<murals::Model> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut active: murals::ActiveModel = mural.into();

        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(privacy) = update.privacy {
            active.privacy = Set(privacy);
        }
        if let Some(theme_id) = update.theme_id {
            active.theme_id = Set(theme_id);
        }
        if let Some(custom_color) = update.custom_color {
            active.custom_color = Set(custom_color);
        }
        if let Some(comments_enabled) = update.comments_enabled {
            active.comments_enabled = Set(comments_enabled);
        }
        if let Some(likes_enabled) = update.likes_enabled {
            active.likes_enabled = Set(likes_enabled);
        }
        active.updated_at = Set(now);

        active.update(&self.conn).await.context("Failed to update mural")
    }

    pub async fn soft_delete(&self, mural: murals::Model) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut active: murals::ActiveModel = mural.into();
        active.active = Set(false);
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Reassign the creator, drop the outgoing creator's explicit role row,
    /// and persist the hand-over notification, all in one transaction. Any
    /// failure rolls the whole sequence back.
    pub async fn transfer_ownership(
        &self,
        mural: murals::Model,
        new_creator_id: i32,
        notification: notifications::ActiveModel,
    ) -> Result<notifications::Model> {
        let txn = self.conn.begin().await?;

        let mural_id = mural.id;
        let old_creator_id = mural.creator_id;
        let now = chrono::Utc::now().to_rfc3339();

        let mut active: murals::ActiveModel = mural.into();
        active.creator_id = Set(new_creator_id);
        active.updated_at = Set(now);
        active.update(&txn).await.context("Failed to reassign creator")?;

        mural_members::Entity::delete_many()
            .filter(mural_members::Column::MuralId.eq(mural_id))
            .filter(mural_members::Column::UserId.eq(old_creator_id))
            .exec(&txn)
            .await
            .context("Failed to remove outgoing creator role")?;

        let inserted = notification
            .insert(&txn)
            .await
            .context("Failed to insert transfer notification")?;

        txn.commit().await?;
        Ok(inserted)
    }
}
