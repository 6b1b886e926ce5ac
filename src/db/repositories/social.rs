use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{comments, likes, users};

pub struct SocialRepository {
    conn: DatabaseConnection,
}

impl SocialRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add_comment(
        &self,
        post_id: i32,
        user_id: i32,
        body: &str,
    ) -> Result<comments::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        comments::ActiveModel {
            post_id: Set(post_id),
            user_id: Set(user_id),
            body: Set(body.to_string()),
            active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert comment")
    }

    pub async fn get_comment(&self, id: i32) -> Result<Option<comments::Model>> {
        Ok(comments::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query comment")?
            .filter(|c| c.active))
    }

    pub async fn list_comments(
        &self,
        post_id: i32,
    ) -> Result<Vec<(comments::Model, Option<users::Model>)>> {
        comments::Entity::find()
            .filter(comments::Column::PostId.eq(post_id))
            .filter(comments::Column::Active.eq(true))
            .find_also_related(users::Entity)
            .order_by_asc(comments::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list comments")
    }

    pub async fn soft_delete_comment(&self, comment: comments::Model) -> Result<()> {
        let mut active: comments::ActiveModel = comment.into();
        active.active = Set(false);
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Like a post. Returns false when the (user, post) pair already exists.
    pub async fn like(&self, post_id: i32, user_id: i32) -> Result<bool> {
        let existing = likes::Entity::find()
            .filter(likes::Column::PostId.eq(post_id))
            .filter(likes::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let now = chrono::Utc::now().to_rfc3339();
        likes::ActiveModel {
            post_id: Set(post_id),
            user_id: Set(user_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert like")?;
        Ok(true)
    }

    pub async fn unlike(&self, post_id: i32, user_id: i32) -> Result<bool> {
        let res = likes::Entity::delete_many()
            .filter(likes::Column::PostId.eq(post_id))
            .filter(likes::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn like_count(&self, post_id: i32) -> Result<u64> {
        likes::Entity::find()
            .filter(likes::Column::PostId.eq(post_id))
            .count(&self.conn)
            .await
            .context("Failed to count likes")
    }

    pub async fn user_liked(&self, post_id: i32, user_id: i32) -> Result<bool> {
        let found = likes::Entity::find()
            .filter(likes::Column::PostId.eq(post_id))
            .filter(likes::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await?;
        Ok(found.is_some())
    }
}
