pub mod auth;
pub mod captcha;
pub mod content;
pub mod mailer;
pub mod membership;
pub mod notifier;
pub mod storage;

pub use auth::{AuthError, AuthService};
pub use captcha::CaptchaVerifier;
pub use content::{ContentError, ContentService};
pub use mailer::Mailer;
pub use membership::{JoinOutcome, MembershipError, MembershipService, ProcessOutcome};
pub use notifier::Notifier;
pub use storage::{HttpObjectStorage, MemoryObjectStorage, ObjectStorage};
