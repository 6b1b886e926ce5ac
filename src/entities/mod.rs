pub mod prelude;

pub mod comments;
pub mod likes;
pub mod mural_members;
pub mod murals;
pub mod notifications;
pub mod post_contents;
pub mod posts;
pub mod sessions;
pub mod users;
