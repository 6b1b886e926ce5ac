use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

use crate::entities::{post_contents, posts, users};

pub struct PostInput {
    pub mural_id: i32,
    pub author_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub pos_x: Option<i32>,
    pub pos_y: Option<i32>,
}

/// A post with its content rows (newest first) and author display name.
pub struct PostWithContent {
    pub post: posts::Model,
    pub author_name: String,
    pub contents: Vec<post_contents::Model>,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, input: PostInput) -> Result<posts::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        posts::ActiveModel {
            mural_id: Set(input.mural_id),
            author_id: Set(input.author_id),
            title: Set(input.title),
            description: Set(input.description),
            pos_x: Set(input.pos_x),
            pos_y: Set(input.pos_y),
            active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert post")
    }

    pub async fn get(&self, id: i32) -> Result<Option<posts::Model>> {
        Ok(posts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post")?
            .filter(|p| p.active))
    }

    pub async fn update(
        &self,
        post: posts::Model,
        title: Option<String>,
        description: Option<Option<String>>,
        pos_x: Option<Option<i32>>,
        pos_y: Option<Option<i32>>,
    ) -> Result<posts::Model> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut active: posts::ActiveModel = post.into();

        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(pos_x) = pos_x {
            active.pos_x = Set(pos_x);
        }
        if let Some(pos_y) = pos_y {
            active.pos_y = Set(pos_y);
        }
        active.updated_at = Set(now);

        active.update(&self.conn).await.context("Failed to update post")
    }

    pub async fn soft_delete(&self, post: posts::Model) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut active: posts::ActiveModel = post.into();
        active.active = Set(false);
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Posts of a mural, newest first, each with nested content (newest
    /// first) and the author's display name.
    pub async fn list_for_mural(&self, mural_id: i32) -> Result<Vec<PostWithContent>> {
        let posts = posts::Entity::find()
            .filter(posts::Column::MuralId.eq(mural_id))
            .filter(posts::Column::Active.eq(true))
            .order_by_desc(posts::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list posts")?;

        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
        let author_ids: Vec<i32> = posts.iter().map(|p| p.author_id).collect();

        let contents = post_contents::Entity::find()
            .filter(post_contents::Column::PostId.is_in(post_ids))
            .order_by_desc(post_contents::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to load post contents")?;

        let mut by_post: HashMap<i32, Vec<post_contents::Model>> = HashMap::new();
        for content in contents {
            by_post.entry(content.post_id).or_default().push(content);
        }

        let authors = users::Entity::find()
            .filter(users::Column::Id.is_in(author_ids))
            .all(&self.conn)
            .await?;
        let names: HashMap<i32, String> =
            authors.into_iter().map(|u| (u.id, u.display_name)).collect();

        Ok(posts
            .into_iter()
            .map(|post| PostWithContent {
                author_name: names.get(&post.author_id).cloned().unwrap_or_default(),
                contents: by_post.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }

    pub async fn list_content(&self, post_id: i32) -> Result<Vec<post_contents::Model>> {
        post_contents::Entity::find()
            .filter(post_contents::Column::PostId.eq(post_id))
            .order_by_desc(post_contents::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list content")
    }
}
