pub mod membership;
pub mod mural;
pub mod notification;
pub mod post;
pub mod session;
pub mod social;
pub mod user;
