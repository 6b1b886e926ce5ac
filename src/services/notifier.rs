use anyhow::{Context, Result};
use sea_orm::EntityTrait;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::api::types::NotificationDto;
use crate::db::{NotificationInput, Store};
use crate::domain::events::UserEvent;
use crate::entities::{murals, notifications, users};

const CHANNEL_CAPACITY: usize = 64;

/// Per-user live delivery registry plus notification persistence.
///
/// Fan-out is best effort: a recipient without a connected client is the
/// normal offline case and never fails the triggering operation.
pub struct Notifier {
    store: Store,
    channels: RwLock<HashMap<i32, broadcast::Sender<UserEvent>>>,
}

impl Notifier {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a client connection to one user's event stream.
    pub async fn subscribe(&self, user_id: i32) -> broadcast::Receiver<UserEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push an event to a user's connected clients, if any.
    pub async fn push(&self, user_id: i32, event: UserEvent) {
        let delivered = {
            let channels = self.channels.read().await;
            channels
                .get(&user_id)
                .is_some_and(|tx| tx.send(event).is_ok())
        };

        if !delivered {
            debug!(user_id, "No connected clients for event");
            // Drop dead senders so the registry does not grow unbounded.
            let mut channels = self.channels.write().await;
            if channels
                .get(&user_id)
                .is_some_and(|tx| tx.receiver_count() == 0)
            {
                channels.remove(&user_id);
            }
        }
    }

    /// Persist a notification row and fan the enriched payload out to the
    /// receiver in one step.
    pub async fn notify(&self, input: NotificationInput) -> Result<NotificationDto> {
        let row = self.store.notifications().insert(input).await?;
        self.fan_out(row).await
    }

    /// Enrich an already-persisted row with sender name and mural title and
    /// push it, so clients never re-fetch after an event.
    pub async fn fan_out(&self, row: notifications::Model) -> Result<NotificationDto> {
        let dto = self.enrich(row).await?;
        self.push(dto.receiver_id, UserEvent::Notification(dto.clone()))
            .await;
        Ok(dto)
    }

    async fn enrich(&self, row: notifications::Model) -> Result<NotificationDto> {
        let sender = users::Entity::find_by_id(row.sender_id)
            .one(&self.store.conn)
            .await
            .context("Failed to load notification sender")?;
        let mural = murals::Entity::find_by_id(row.mural_id)
            .one(&self.store.conn)
            .await
            .context("Failed to load notification mural")?;

        Ok(NotificationDto::from_parts(
            row,
            sender.map(|u| u.display_name).unwrap_or_default(),
            mural.map(|m| m.title).unwrap_or_default(),
        ))
    }

    /// Enrich a batch of rows for the list endpoint.
    pub async fn enrich_all(&self, rows: Vec<notifications::Model>) -> Result<Vec<NotificationDto>> {
        let sender_ids: Vec<i32> = rows.iter().map(|n| n.sender_id).collect();
        let mural_ids: Vec<i32> = rows.iter().map(|n| n.mural_id).collect();

        let names = self.store.users().display_names(&sender_ids).await?;

        let murals = if mural_ids.is_empty() {
            Vec::new()
        } else {
            use sea_orm::{ColumnTrait, QueryFilter};
            murals::Entity::find()
                .filter(murals::Column::Id.is_in(mural_ids))
                .all(&self.store.conn)
                .await?
        };
        let titles: HashMap<i32, String> = murals.into_iter().map(|m| (m.id, m.title)).collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let sender_name = names.get(&row.sender_id).cloned().unwrap_or_default();
                let mural_title = titles.get(&row.mural_id).cloned().unwrap_or_default();
                NotificationDto::from_parts(row, sender_name, mural_title)
            })
            .collect())
    }
}
