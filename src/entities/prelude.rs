pub use super::comments::Entity as Comments;
pub use super::likes::Entity as Likes;
pub use super::mural_members::Entity as MuralMembers;
pub use super::murals::Entity as Murals;
pub use super::notifications::Entity as Notifications;
pub use super::post_contents::Entity as PostContents;
pub use super::posts::Entity as Posts;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
