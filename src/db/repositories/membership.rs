use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::access::Role;
use crate::entities::{mural_members, users};

pub struct MembershipRepository {
    conn: DatabaseConnection,
}

impl MembershipRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, mural_id: i32, user_id: i32) -> Result<Option<mural_members::Model>> {
        mural_members::Entity::find()
            .filter(mural_members::Column::MuralId.eq(mural_id))
            .filter(mural_members::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query membership")
    }

    /// Explicit role of a user on a mural, parsed. The creator special case
    /// lives in `access::effective_role`, not here.
    pub async fn explicit_role(&self, mural_id: i32, user_id: i32) -> Result<Option<Role>> {
        let row = self.get(mural_id, user_id).await?;
        row.map(|m| m.role.parse::<Role>().map_err(anyhow::Error::from))
            .transpose()
    }

    /// Idempotent insert: an existing row is left untouched.
    pub async fn insert_if_absent(
        &self,
        mural_id: i32,
        user_id: i32,
        role: Role,
    ) -> Result<mural_members::Model> {
        if let Some(existing) = self.get(mural_id, user_id).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now().to_rfc3339();
        mural_members::ActiveModel {
            mural_id: Set(mural_id),
            user_id: Set(user_id),
            role: Set(role.as_str().to_string()),
            joined_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert membership")
    }

    pub async fn update_role(&self, mural_id: i32, user_id: i32, role: Role) -> Result<bool> {
        let Some(row) = self.get(mural_id, user_id).await? else {
            return Ok(false);
        };

        let mut active: mural_members::ActiveModel = row.into();
        active.role = Set(role.as_str().to_string());
        active.update(&self.conn).await?;
        Ok(true)
    }

    pub async fn remove(&self, mural_id: i32, user_id: i32) -> Result<bool> {
        let res = mural_members::Entity::delete_many()
            .filter(mural_members::Column::MuralId.eq(mural_id))
            .filter(mural_members::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// User ids holding an explicit administrator row on the mural. The
    /// creator is not necessarily among them.
    pub async fn admin_ids(&self, mural_id: i32) -> Result<Vec<i32>> {
        let rows = mural_members::Entity::find()
            .filter(mural_members::Column::MuralId.eq(mural_id))
            .filter(mural_members::Column::Role.eq(Role::Admin.as_str()))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }

    pub async fn list_with_users(
        &self,
        mural_id: i32,
    ) -> Result<Vec<(mural_members::Model, Option<users::Model>)>> {
        mural_members::Entity::find()
            .filter(mural_members::Column::MuralId.eq(mural_id))
            .find_also_related(users::Entity)
            .order_by_asc(mural_members::Column::JoinedAt)
            .all(&self.conn)
            .await
            .context("Failed to list members")
    }
}
