use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::access::{self, AbandonRuling, Role};
use crate::db::repositories::notification::{
    KIND_ACCESS_REQUEST, KIND_INVITATION, KIND_OTHER, KIND_UPDATE, REQUEST_PENDING,
};
use crate::db::{NotificationInput, Store};
use crate::domain::events::UserEvent;
use crate::entities::{murals, users};
use crate::services::notifier::Notifier;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Mural not found")]
    MuralNotFound,
    #[error("You do not have permission to do that")]
    Forbidden,
    #[error("The creator must transfer ownership before leaving")]
    CreatorMustTransfer,
    #[error("An access request for this mural is already pending")]
    DuplicateRequest,
    #[error("That user is not a member of this mural")]
    TargetNotMember,
    #[error("You are not a member of this mural")]
    NotAMember,
    #[error("The creator's role cannot be changed")]
    CreatorImmune,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Outcome of joining by access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(Role),
    AlreadyMember,
    RequestPending,
}

/// Outcome of acting on an access request notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Approved,
    Rejected,
    /// The request was already handled (or never existed). Acting on it
    /// again is a no-op success, so two administrators racing on the same
    /// request both see a clean response.
    AlreadyProcessed,
}

/// Membership lifecycle: joining, access-request approval, role changes,
/// expulsion, abandonment and ownership transfer.
pub struct MembershipService {
    store: Store,
    notifier: Arc<Notifier>,
}

impl MembershipService {
    #[must_use]
    pub const fn new(store: Store, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn effective_role(
        &self,
        mural: &murals::Model,
        user_id: i32,
    ) -> Result<Option<Role>, MembershipError> {
        let explicit = self
            .store
            .memberships()
            .explicit_role(mural.id, user_id)
            .await?;
        Ok(access::effective_role(mural, user_id, explicit))
    }

    /// Creator plus every explicit administrator, deduplicated. This is the
    /// audience for membership traffic on a mural.
    async fn admin_audience(&self, mural: &murals::Model) -> Result<Vec<i32>> {
        let mut ids = vec![mural.creator_id];
        for id in self.store.memberships().admin_ids(mural.id).await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Join a mural through its 4-digit access code. Public murals admit the
    /// user immediately as a reader; private murals open a pending access
    /// request addressed to every administrator.
    pub async fn join_by_code(
        &self,
        user: &users::Model,
        code: &str,
    ) -> Result<(murals::Model, JoinOutcome), MembershipError> {
        let Some(mural) = self.store.murals().get_by_access_code(code).await? else {
            return Err(MembershipError::MuralNotFound);
        };

        if self.effective_role(&mural, user.id).await?.is_some() {
            return Ok((mural, JoinOutcome::AlreadyMember));
        }

        if mural.privacy == access::PRIVACY_PUBLIC {
            self.admit(&mural, user).await?;
            return Ok((mural, JoinOutcome::Joined(Role::Reader)));
        }

        if self
            .store
            .notifications()
            .pending_request_exists(mural.id, user.id)
            .await?
        {
            return Err(MembershipError::DuplicateRequest);
        }

        for admin_id in self.admin_audience(&mural).await? {
            self.notifier
                .notify(NotificationInput {
                    sender_id: user.id,
                    receiver_id: admin_id,
                    mural_id: mural.id,
                    kind: KIND_ACCESS_REQUEST,
                    message: format!("{} asks to join \"{}\"", user.display_name, mural.title),
                    request_status: Some(REQUEST_PENDING),
                })
                .await?;
        }

        info!(mural_id = mural.id, user_id = user.id, "Access request opened");
        Ok((mural, JoinOutcome::RequestPending))
    }

    /// Join a public mural directly by id, without the access code.
    pub async fn join_public(
        &self,
        user: &users::Model,
        mural_id: i32,
    ) -> Result<(murals::Model, JoinOutcome), MembershipError> {
        let Some(mural) = self.store.murals().get(mural_id).await? else {
            return Err(MembershipError::MuralNotFound);
        };

        if self.effective_role(&mural, user.id).await?.is_some() {
            return Ok((mural, JoinOutcome::AlreadyMember));
        }
        if mural.privacy != access::PRIVACY_PUBLIC {
            return Err(MembershipError::Forbidden);
        }

        self.admit(&mural, user).await?;
        Ok((mural, JoinOutcome::Joined(Role::Reader)))
    }

    async fn admit(&self, mural: &murals::Model, user: &users::Model) -> Result<()> {
        self.store
            .memberships()
            .insert_if_absent(mural.id, user.id, Role::Reader)
            .await?;

        for admin_id in self.admin_audience(mural).await? {
            if admin_id == user.id {
                continue;
            }
            self.notifier
                .notify(NotificationInput {
                    sender_id: user.id,
                    receiver_id: admin_id,
                    mural_id: mural.id,
                    kind: KIND_UPDATE,
                    message: format!("{} joined \"{}\"", user.display_name, mural.title),
                    request_status: None,
                })
                .await?;
        }

        info!(mural_id = mural.id, user_id = user.id, "User joined mural");
        Ok(())
    }

    /// Approve or reject an access request notification. Only an
    /// administrator of the mural may act; every pending sibling copy of the
    /// request is consumed whichever way the decision goes.
    pub async fn process_request(
        &self,
        actor: &users::Model,
        notification_id: i32,
        approved: bool,
    ) -> Result<ProcessOutcome, MembershipError> {
        let Some(request) = self.store.notifications().get(notification_id).await? else {
            return Ok(ProcessOutcome::AlreadyProcessed);
        };
        if request.kind != KIND_ACCESS_REQUEST
            || request.request_status.as_deref() != Some(REQUEST_PENDING)
        {
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        let Some(mural) = self.store.murals().get(request.mural_id).await? else {
            // The mural was deleted underneath the request; just consume it.
            self.store
                .notifications()
                .delete(notification_id)
                .await?;
            return Ok(ProcessOutcome::AlreadyProcessed);
        };

        let role = self.effective_role(&mural, actor.id).await?;
        if !access::can_administer(role) {
            return Err(MembershipError::Forbidden);
        }

        let requester_id = request.sender_id;

        if approved {
            self.store
                .memberships()
                .insert_if_absent(mural.id, requester_id, Role::Reader)
                .await?;
        }

        self.store
            .notifications()
            .delete_request_siblings(mural.id, requester_id)
            .await?;

        let (kind, message) = if approved {
            (
                KIND_INVITATION,
                format!("Your request to join \"{}\" was approved", mural.title),
            )
        } else {
            (
                KIND_OTHER,
                format!("Your request to join \"{}\" was declined", mural.title),
            )
        };
        self.notifier
            .notify(NotificationInput {
                sender_id: actor.id,
                receiver_id: requester_id,
                mural_id: mural.id,
                kind,
                message,
                request_status: None,
            })
            .await?;

        info!(
            mural_id = mural.id,
            requester_id, approved, "Access request processed"
        );
        Ok(if approved {
            ProcessOutcome::Approved
        } else {
            ProcessOutcome::Rejected
        })
    }

    /// Hand the mural over to another member. Creator-only; the reassignment,
    /// the outgoing creator's role cleanup and the hand-over notification
    /// land in a single transaction.
    pub async fn transfer(
        &self,
        actor: &users::Model,
        mural_id: i32,
        new_creator_id: i32,
    ) -> Result<murals::Model, MembershipError> {
        let Some(mural) = self.store.murals().get(mural_id).await? else {
            return Err(MembershipError::MuralNotFound);
        };
        if mural.creator_id != actor.id {
            return Err(MembershipError::Forbidden);
        }
        if new_creator_id == actor.id {
            return Err(MembershipError::TargetNotMember);
        }
        if self
            .store
            .memberships()
            .get(mural_id, new_creator_id)
            .await?
            .is_none()
        {
            return Err(MembershipError::TargetNotMember);
        }

        let title = mural.title.clone();
        let notification = NotificationInput {
            sender_id: actor.id,
            receiver_id: new_creator_id,
            mural_id,
            kind: KIND_UPDATE,
            message: format!("{} made you the owner of \"{title}\"", actor.display_name),
            request_status: None,
        }
        .into_active_model();

        let inserted = self
            .store
            .murals()
            .transfer_ownership(mural, new_creator_id, notification)
            .await?;
        self.notifier.fan_out(inserted).await?;
        self.notifier
            .push(
                new_creator_id,
                UserEvent::RoleChanged {
                    mural_id,
                    mural_title: title,
                    role: Role::Admin.to_string(),
                },
            )
            .await;

        info!(mural_id, new_creator_id, "Ownership transferred");

        self.store
            .murals()
            .get(mural_id)
            .await?
            .ok_or(MembershipError::MuralNotFound)
    }

    /// Change a member's explicit role. Administrator-only; the creator's
    /// tier is derived from identity and cannot be edited.
    pub async fn update_role(
        &self,
        actor: &users::Model,
        mural_id: i32,
        target_user_id: i32,
        new_role: Role,
    ) -> Result<(), MembershipError> {
        let Some(mural) = self.store.murals().get(mural_id).await? else {
            return Err(MembershipError::MuralNotFound);
        };
        let role = self.effective_role(&mural, actor.id).await?;
        if !access::can_administer(role) {
            return Err(MembershipError::Forbidden);
        }
        if target_user_id == mural.creator_id {
            return Err(MembershipError::CreatorImmune);
        }

        let changed = self
            .store
            .memberships()
            .update_role(mural_id, target_user_id, new_role)
            .await?;
        if !changed {
            return Err(MembershipError::TargetNotMember);
        }

        self.notifier
            .notify(NotificationInput {
                sender_id: actor.id,
                receiver_id: target_user_id,
                mural_id,
                kind: KIND_UPDATE,
                message: format!("Your role on \"{}\" is now {new_role}", mural.title),
                request_status: None,
            })
            .await?;
        self.notifier
            .push(
                target_user_id,
                UserEvent::RoleChanged {
                    mural_id,
                    mural_title: mural.title,
                    role: new_role.to_string(),
                },
            )
            .await;

        Ok(())
    }

    /// Remove a member. Administrator-only; the creator cannot be expelled.
    pub async fn expel(
        &self,
        actor: &users::Model,
        mural_id: i32,
        target_user_id: i32,
    ) -> Result<(), MembershipError> {
        let Some(mural) = self.store.murals().get(mural_id).await? else {
            return Err(MembershipError::MuralNotFound);
        };
        let role = self.effective_role(&mural, actor.id).await?;
        if !access::can_administer(role) {
            return Err(MembershipError::Forbidden);
        }
        if target_user_id == mural.creator_id {
            return Err(MembershipError::CreatorImmune);
        }

        let removed = self
            .store
            .memberships()
            .remove(mural_id, target_user_id)
            .await?;
        if !removed {
            return Err(MembershipError::TargetNotMember);
        }

        self.notifier
            .notify(NotificationInput {
                sender_id: actor.id,
                receiver_id: target_user_id,
                mural_id,
                kind: KIND_OTHER,
                message: format!("You were removed from \"{}\"", mural.title),
                request_status: None,
            })
            .await?;
        self.notifier
            .push(
                target_user_id,
                UserEvent::Expelled {
                    mural_id,
                    mural_title: mural.title,
                },
            )
            .await;

        info!(mural_id, target_user_id, "Member expelled");
        Ok(())
    }

    /// Leave a mural voluntarily. The creator is refused with a distinct
    /// outcome so clients can steer them to transfer or delete instead.
    pub async fn abandon(
        &self,
        actor: &users::Model,
        mural_id: i32,
    ) -> Result<(), MembershipError> {
        let Some(mural) = self.store.murals().get(mural_id).await? else {
            return Err(MembershipError::MuralNotFound);
        };
        let explicit = self
            .store
            .memberships()
            .explicit_role(mural_id, actor.id)
            .await?;

        match access::rule_on_abandon(&mural, actor.id, explicit) {
            AbandonRuling::CreatorMustTransfer => Err(MembershipError::CreatorMustTransfer),
            AbandonRuling::NotAMember => Err(MembershipError::NotAMember),
            AbandonRuling::Allowed => {
                self.store.memberships().remove(mural_id, actor.id).await?;

                for admin_id in self.admin_audience(&mural).await? {
                    if admin_id == actor.id {
                        continue;
                    }
                    self.notifier
                        .notify(NotificationInput {
                            sender_id: actor.id,
                            receiver_id: admin_id,
                            mural_id,
                            kind: KIND_UPDATE,
                            message: format!(
                                "{} left \"{}\"",
                                actor.display_name, mural.title
                            ),
                            request_status: None,
                        })
                        .await?;
                }

                info!(mural_id, user_id = actor.id, "Member left mural");
                Ok(())
            }
        }
    }
}
