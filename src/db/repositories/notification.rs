use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::notifications;

pub const KIND_ACCESS_REQUEST: &str = "access_request";
pub const KIND_INVITATION: &str = "invitation";
pub const KIND_UPDATE: &str = "update";
pub const KIND_COMMENT: &str = "comment";
pub const KIND_OTHER: &str = "other";

pub const REQUEST_PENDING: &str = "pending";

pub struct NotificationInput {
    pub sender_id: i32,
    pub receiver_id: i32,
    pub mural_id: i32,
    pub kind: &'static str,
    pub message: String,
    pub request_status: Option<&'static str>,
}

impl NotificationInput {
    #[must_use]
    pub fn into_active_model(self) -> notifications::ActiveModel {
        let now = chrono::Utc::now().to_rfc3339();
        notifications::ActiveModel {
            sender_id: Set(self.sender_id),
            receiver_id: Set(self.receiver_id),
            mural_id: Set(self.mural_id),
            kind: Set(self.kind.to_string()),
            message: Set(self.message),
            read: Set(false),
            request_status: Set(self.request_status.map(ToString::to_string)),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

pub struct NotificationRepository {
    conn: DatabaseConnection,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, input: NotificationInput) -> Result<notifications::Model> {
        input
            .into_active_model()
            .insert(&self.conn)
            .await
            .context("Failed to insert notification")
    }

    pub async fn get(&self, id: i32) -> Result<Option<notifications::Model>> {
        notifications::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query notification")
    }

    pub async fn list_for_user(&self, receiver_id: i32) -> Result<Vec<notifications::Model>> {
        notifications::Entity::find()
            .filter(notifications::Column::ReceiverId.eq(receiver_id))
            .order_by_desc(notifications::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list notifications")
    }

    /// A pending access request from `sender_id` for `mural_id` already
    /// exists, addressed to anyone.
    pub async fn pending_request_exists(&self, mural_id: i32, sender_id: i32) -> Result<bool> {
        let found = notifications::Entity::find()
            .filter(notifications::Column::MuralId.eq(mural_id))
            .filter(notifications::Column::SenderId.eq(sender_id))
            .filter(notifications::Column::Kind.eq(KIND_ACCESS_REQUEST))
            .filter(notifications::Column::RequestStatus.eq(REQUEST_PENDING))
            .one(&self.conn)
            .await?;
        Ok(found.is_some())
    }

    /// Delete one notification. Returns false when it was already gone,
    /// which callers surface as idempotent success.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let res = notifications::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn delete_for_user(&self, id: i32, receiver_id: i32) -> Result<bool> {
        let res = notifications::Entity::delete_many()
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::ReceiverId.eq(receiver_id))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// Consume everything addressed to the user. Reading and deleting are
    /// the same transition in this design.
    pub async fn consume_all_for_user(&self, receiver_id: i32) -> Result<u64> {
        let res = notifications::Entity::delete_many()
            .filter(notifications::Column::ReceiverId.eq(receiver_id))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// Delete all sibling copies of one access request: same mural, same
    /// requester, still pending. Fans sent to several administrators are
    /// resolved together when one of them acts.
    pub async fn delete_request_siblings(&self, mural_id: i32, sender_id: i32) -> Result<u64> {
        let res = notifications::Entity::delete_many()
            .filter(notifications::Column::MuralId.eq(mural_id))
            .filter(notifications::Column::SenderId.eq(sender_id))
            .filter(notifications::Column::Kind.eq(KIND_ACCESS_REQUEST))
            .filter(notifications::Column::RequestStatus.eq(REQUEST_PENDING))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected)
    }
}
