//! Events pushed to a single user's live channel.
//!
//! Every variant carries the full payload the client needs so it never has
//! to re-fetch after receiving an event.

use serde::Serialize;

use crate::api::types::NotificationDto;

/// Events sent to connected clients via SSE (Server-Sent Events).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum UserEvent {
    /// A freshly persisted notification, already enriched with sender name
    /// and mural title.
    Notification(NotificationDto),

    RoleChanged {
        mural_id: i32,
        mural_title: String,
        role: String,
    },

    Expelled {
        mural_id: i32,
        mural_title: String,
    },

    MuralUpdated {
        mural_id: i32,
    },

    MuralDeleted {
        mural_id: i32,
    },
}
