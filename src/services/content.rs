use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::entities::post_contents;
use crate::services::storage::ObjectStorage;

pub const KIND_IMAGE: &str = "image";
pub const KIND_VIDEO: &str = "video";
pub const KIND_LINK: &str = "link";
pub const KIND_FILE: &str = "file";
pub const KIND_TEXT: &str = "text";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Post not found")]
    PostNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("Content replacement left the post in an unexpected state")]
    Inconsistent,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct InlineContent {
    pub kind: String,
    pub url: Option<String>,
    pub text: Option<String>,
}

/// Post content management. A post carries at most one content row; every
/// write is a full replacement executed under a transaction so a failure
/// can never leave the post with zero rows committed or two rows live.
pub struct ContentService {
    store: Store,
    storage: Arc<dyn ObjectStorage>,
}

impl ContentService {
    #[must_use]
    pub fn new(store: Store, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    /// Replace a post's content with an uploaded file. Old remote objects
    /// are deleted only after the database rows are gone, and the new row is
    /// inserted only after the upload succeeded.
    pub async fn replace_with_file(
        &self,
        post_id: i32,
        upload: FileUpload,
    ) -> Result<post_contents::Model, ContentError> {
        if upload.bytes.is_empty() {
            return Err(ContentError::Validation("Uploaded file is empty".into()));
        }
        if self.store.posts().get(post_id).await?.is_none() {
            return Err(ContentError::PostNotFound);
        }

        let old_urls = self.owned_urls(post_id).await?;

        let txn = self.store.conn.begin().await.map_err(anyhow::Error::from)?;

        post_contents::Entity::delete_many()
            .filter(post_contents::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .context("Failed to clear previous content")?;

        let remaining = post_contents::Entity::find()
            .filter(post_contents::Column::PostId.eq(post_id))
            .count(&txn)
            .await
            .map_err(anyhow::Error::from)?;
        if remaining != 0 {
            return Err(ContentError::Inconsistent);
        }

        for url in &old_urls {
            self.storage
                .delete(url)
                .await
                .context("Failed to delete previous object")?;
        }

        let key = format!(
            "posts/{post_id}/{}_{}",
            Uuid::new_v4(),
            sanitize_file_name(&upload.file_name)
        );
        let file_size = i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX);
        let url = self
            .storage
            .put(&key, &upload.content_type, upload.bytes)
            .await
            .context("Failed to upload content")?;

        let inserted = post_contents::ActiveModel {
            post_id: Set(post_id),
            kind: Set(kind_for_content_type(&upload.content_type).to_string()),
            url: Set(Some(url)),
            text: Set(None),
            file_name: Set(Some(upload.file_name)),
            file_size: Set(Some(file_size)),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert content row")?;

        let total = post_contents::Entity::find()
            .filter(post_contents::Column::PostId.eq(post_id))
            .count(&txn)
            .await
            .map_err(anyhow::Error::from)?;
        if total != 1 {
            return Err(ContentError::Inconsistent);
        }

        txn.commit().await.map_err(anyhow::Error::from)?;
        info!(post_id, content_id = inserted.id, "Post content replaced");
        Ok(inserted)
    }

    /// Replace a post's content with an inline payload (a link or a text
    /// block). Same replacement discipline as file uploads.
    pub async fn set_inline(
        &self,
        post_id: i32,
        inline: InlineContent,
    ) -> Result<post_contents::Model, ContentError> {
        match inline.kind.as_str() {
            KIND_LINK => {
                let Some(url) = inline.url.as_deref() else {
                    return Err(ContentError::Validation("A link needs a url".into()));
                };
                url::Url::parse(url)
                    .map_err(|_| ContentError::Validation("Invalid url".into()))?;
            }
            KIND_TEXT => {
                if inline.text.as_deref().is_none_or(str::is_empty) {
                    return Err(ContentError::Validation("Text content is empty".into()));
                }
            }
            other => {
                return Err(ContentError::Validation(format!(
                    "Unsupported inline content kind: {other}"
                )));
            }
        }

        if self.store.posts().get(post_id).await?.is_none() {
            return Err(ContentError::PostNotFound);
        }

        let old_urls = self.owned_urls(post_id).await?;

        let txn = self.store.conn.begin().await.map_err(anyhow::Error::from)?;

        post_contents::Entity::delete_many()
            .filter(post_contents::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .context("Failed to clear previous content")?;

        for old in &old_urls {
            self.storage
                .delete(old)
                .await
                .context("Failed to delete previous object")?;
        }

        let inserted = post_contents::ActiveModel {
            post_id: Set(post_id),
            kind: Set(inline.kind),
            url: Set(inline.url),
            text: Set(inline.text),
            file_name: Set(None),
            file_size: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert content row")?;

        let total = post_contents::Entity::find()
            .filter(post_contents::Column::PostId.eq(post_id))
            .count(&txn)
            .await
            .map_err(anyhow::Error::from)?;
        if total != 1 {
            return Err(ContentError::Inconsistent);
        }

        txn.commit().await.map_err(anyhow::Error::from)?;
        info!(post_id, content_id = inserted.id, "Post content replaced");
        Ok(inserted)
    }

    /// Remove a post's content rows and their remote objects. Used when the
    /// post itself is deleted.
    pub async fn clear(&self, post_id: i32) -> Result<()> {
        let old_urls = self.owned_urls(post_id).await?;

        post_contents::Entity::delete_many()
            .filter(post_contents::Column::PostId.eq(post_id))
            .exec(&self.store.conn)
            .await?;

        for url in &old_urls {
            self.storage.delete(url).await?;
        }
        Ok(())
    }

    /// URLs of remote objects this crate uploaded for a post. Link rows point
    /// at external resources we do not own and must never delete.
    async fn owned_urls(&self, post_id: i32) -> Result<Vec<String>> {
        Ok(self
            .store
            .posts()
            .list_content(post_id)
            .await?
            .into_iter()
            .filter(|c| c.kind != KIND_LINK && c.kind != KIND_TEXT)
            .filter_map(|c| c.url)
            .collect())
    }
}

/// Map an uploaded MIME type onto the stored content kind.
#[must_use]
pub fn kind_for_content_type(content_type: &str) -> &'static str {
    if content_type.starts_with("image/") {
        KIND_IMAGE
    } else if content_type.starts_with("video/") {
        KIND_VIDEO
    } else {
        KIND_FILE
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
