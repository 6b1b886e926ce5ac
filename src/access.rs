//! Membership and access-control resolution.
//!
//! Effective role is computed in exactly one place: the creator is always an
//! administrator, an explicit membership row wins otherwise, and public
//! murals grant an implicit reader tier for read-style operations only.
//! Everything else in the crate asks this module instead of re-deriving the
//! rules from rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::murals;

pub const PRIVACY_PUBLIC: &str = "public";
pub const PRIVACY_PRIVATE: &str = "private";

/// Permission tiers, least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Editor,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(Self::Reader),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Compute the effective role of `user_id` on a mural, given the explicit
/// membership row (if any). Creator identity takes precedence over any
/// stored row, so a creator without a row is still an administrator and a
/// stale row can never demote them.
#[must_use]
pub fn effective_role(mural: &murals::Model, user_id: i32, explicit: Option<Role>) -> Option<Role> {
    if mural.creator_id == user_id {
        return Some(Role::Admin);
    }
    explicit
}

/// Read-style access: a member of any tier, or anyone on a public mural.
#[must_use]
pub fn can_view(mural: &murals::Model, role: Option<Role>) -> bool {
    role.is_some() || mural.privacy == PRIVACY_PUBLIC
}

/// Post create, edit and delete all use the same threshold:
/// editor or above.
#[must_use]
pub fn can_edit_posts(role: Option<Role>) -> bool {
    role.is_some_and(|r| r >= Role::Editor)
}

/// Content replacement is allowed for editors and above, or for the post's
/// original author regardless of their current tier.
#[must_use]
pub fn can_replace_content(role: Option<Role>, author_id: i32, user_id: i32) -> bool {
    can_edit_posts(role) || author_id == user_id
}

/// Mural settings, theme, role changes, expulsion and deletion.
#[must_use]
pub fn can_administer(role: Option<Role>) -> bool {
    role == Some(Role::Admin)
}

/// Outcome of an abandon attempt, decided before any row is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonRuling {
    Allowed,
    /// Creators must transfer ownership or delete the mural instead. Clients
    /// rely on this being distinguishable from a plain forbidden.
    CreatorMustTransfer,
    NotAMember,
}

#[must_use]
pub fn rule_on_abandon(mural: &murals::Model, user_id: i32, explicit: Option<Role>) -> AbandonRuling {
    if mural.creator_id == user_id {
        return AbandonRuling::CreatorMustTransfer;
    }
    if explicit.is_some() {
        AbandonRuling::Allowed
    } else {
        AbandonRuling::NotAMember
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mural(creator_id: i32, privacy: &str) -> murals::Model {
        murals::Model {
            id: 1,
            title: "Board".to_string(),
            description: None,
            creator_id,
            privacy: privacy.to_string(),
            access_code: "4821".to_string(),
            theme_id: 1,
            custom_color: None,
            comments_enabled: true,
            likes_enabled: true,
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn creator_is_always_admin() {
        let m = mural(7, PRIVACY_PRIVATE);
        assert_eq!(effective_role(&m, 7, None), Some(Role::Admin));
        // An explicit lesser row never demotes the creator.
        assert_eq!(effective_role(&m, 7, Some(Role::Reader)), Some(Role::Admin));
    }

    #[test]
    fn non_member_has_no_role() {
        let m = mural(7, PRIVACY_PRIVATE);
        assert_eq!(effective_role(&m, 8, None), None);
        assert!(!can_view(&m, None));
    }

    #[test]
    fn public_mural_grants_implicit_read_only() {
        let m = mural(7, PRIVACY_PUBLIC);
        assert!(can_view(&m, None));
        assert!(!can_edit_posts(None));
        assert!(!can_administer(None));
    }

    #[test]
    fn role_ordering() {
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::Reader);
    }

    #[test]
    fn editors_and_admins_edit_posts() {
        assert!(can_edit_posts(Some(Role::Editor)));
        assert!(can_edit_posts(Some(Role::Admin)));
        assert!(!can_edit_posts(Some(Role::Reader)));
    }

    #[test]
    fn author_may_replace_content_without_editor_tier() {
        assert!(can_replace_content(Some(Role::Reader), 3, 3));
        assert!(!can_replace_content(Some(Role::Reader), 3, 4));
        assert!(can_replace_content(Some(Role::Editor), 3, 4));
    }

    #[test]
    fn creator_cannot_abandon() {
        let m = mural(7, PRIVACY_PRIVATE);
        assert_eq!(rule_on_abandon(&m, 7, None), AbandonRuling::CreatorMustTransfer);
        assert_eq!(
            rule_on_abandon(&m, 8, Some(Role::Reader)),
            AbandonRuling::Allowed
        );
        assert_eq!(rule_on_abandon(&m, 9, None), AbandonRuling::NotAMember);
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Reader, Role::Editor, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }
}
