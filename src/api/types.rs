use serde::Serialize;

use crate::entities::{murals, notifications, post_contents, posts, sessions, users};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error discriminator for outcomes clients branch on,
    /// such as a creator trying to abandon their own mural.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl From<users::Model> for UserDto {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub id: i32,
    pub device: Option<String>,
    pub created_at: String,
}

impl From<sessions::Model> for SessionDto {
    fn from(session: sessions::Model) -> Self {
        Self {
            id: session.id,
            device: session.device,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MuralDto {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: i32,
    pub privacy: String,
    /// Only exposed to administrators; everyone else gets None.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    pub theme_id: i32,
    pub custom_color: Option<String>,
    pub comments_enabled: bool,
    pub likes_enabled: bool,
    /// The requesting user's effective role, if any.
    pub my_role: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MuralDto {
    #[must_use]
    pub fn from_model(mural: murals::Model, my_role: Option<crate::access::Role>) -> Self {
        let is_admin = crate::access::can_administer(my_role);
        Self {
            id: mural.id,
            title: mural.title,
            description: mural.description,
            creator_id: mural.creator_id,
            privacy: mural.privacy,
            access_code: is_admin.then_some(mural.access_code),
            theme_id: mural.theme_id,
            custom_color: mural.custom_color,
            comments_enabled: mural.comments_enabled,
            likes_enabled: mural.likes_enabled,
            my_role: my_role.map(|r| r.to_string()),
            created_at: mural.created_at,
            updated_at: mural.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemberDto {
    pub user_id: i32,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
pub struct ContentDto {
    pub id: i32,
    pub kind: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: String,
}

impl From<post_contents::Model> for ContentDto {
    fn from(content: post_contents::Model) -> Self {
        Self {
            id: content.id,
            kind: content.kind,
            url: content.url,
            text: content.text,
            file_name: content.file_name,
            file_size: content.file_size,
            created_at: content.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub mural_id: i32,
    pub author_id: i32,
    pub author_name: String,
    pub title: String,
    pub description: Option<String>,
    pub contents: Vec<ContentDto>,
    pub likes: u64,
    pub liked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PostDto {
    #[must_use]
    pub fn from_parts(
        post: posts::Model,
        author_name: String,
        contents: Vec<post_contents::Model>,
        likes: u64,
        liked: bool,
    ) -> Self {
        Self {
            id: post.id,
            mural_id: post.mural_id,
            author_id: post.author_id,
            author_name,
            title: post.title,
            description: post.description,
            contents: contents.into_iter().map(ContentDto::from).collect(),
            likes,
            liked,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i32,
    pub post_id: i32,
    pub user_id: i32,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationDto {
    pub id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub receiver_id: i32,
    pub mural_id: i32,
    pub mural_title: String,
    pub kind: String,
    pub message: String,
    pub request_status: Option<String>,
    pub created_at: String,
}

impl NotificationDto {
    #[must_use]
    pub fn from_parts(row: notifications::Model, sender_name: String, mural_title: String) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            sender_name,
            receiver_id: row.receiver_id,
            mural_id: row.mural_id,
            mural_title,
            kind: row.kind,
            message: row.message,
            request_status: row.request_status,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
