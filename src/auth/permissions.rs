//! Role-based permissions.

use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::{ModerationAction, User, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateTopic,
    CreateReply,
    EditOwnContent,
    DeleteOwnContent,
    EditAnyContent,
    DeleteAnyContent,
    MoveTopics,
    LockTopics,
    PinTopics,
    ModerateUsers,
    ViewReports,
    ManageUsers,
    ManageRoles,
    ManageCategories,
    ManageSettings,
    ViewAnalytics,
}

const ALL: &[Permission] = &[
    Permission::CreateTopic,
    Permission::CreateReply,
    Permission::EditOwnContent,
    Permission::DeleteOwnContent,
    Permission::EditAnyContent,
    Permission::DeleteAnyContent,
    Permission::MoveTopics,
    Permission::LockTopics,
    Permission::PinTopics,
    Permission::ModerateUsers,
    Permission::ViewReports,
    Permission::ManageUsers,
    Permission::ManageRoles,
    Permission::ManageCategories,
    Permission::ManageSettings,
    Permission::ViewAnalytics,
];

const MEMBER: &[Permission] = &[
    Permission::CreateTopic,
    Permission::CreateReply,
    Permission::EditOwnContent,
    Permission::DeleteOwnContent,
];

const MODERATOR: &[Permission] = &[
    Permission::CreateTopic,
    Permission::CreateReply,
    Permission::EditOwnContent,
    Permission::DeleteOwnContent,
    Permission::EditAnyContent,
    Permission::DeleteAnyContent,
    Permission::MoveTopics,
    Permission::LockTopics,
    Permission::PinTopics,
    Permission::ModerateUsers,
    Permission::ViewReports,
];

impl Permission {
    /// Permission a moderator action is gated on.
    pub fn for_action(action: &ModerationAction) -> Self {
        match action {
            ModerationAction::Lock | ModerationAction::Unlock => Permission::LockTopics,
            ModerationAction::Pin | ModerationAction::Unpin => Permission::PinTopics,
            ModerationAction::Move { .. } => Permission::MoveTopics,
            ModerationAction::Hide | ModerationAction::Show => Permission::EditAnyContent,
            ModerationAction::Delete { .. } => Permission::DeleteAnyContent,
        }
    }
}

pub fn role_grants(role: UserRole, permission: Permission) -> bool {
    match role {
        UserRole::User => MEMBER.contains(&permission),
        UserRole::Moderator => MODERATOR.contains(&permission),
        UserRole::Administrator => true,
    }
}

/// Banned or deactivated accounts hold no permissions.
pub fn has_permission(user: &User, permission: Permission) -> bool {
    user.active && !user.banned && role_grants(user.role, permission)
}

/// Every permission the account currently holds.
pub fn permissions_of(user: &User) -> Vec<Permission> {
    ALL.iter()
        .copied()
        .filter(|p| has_permission(user, *p))
        .collect()
}

pub fn require(user: &User, permission: Permission) -> Result<()> {
    if has_permission(user, permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} is not allowed to do this",
            user.username
        )))
    }
}

/// Signed-in, active and not banned.
pub fn require_member(user: &User) -> Result<()> {
    if user.active && !user.banned {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Account {} is suspended",
            user.username
        )))
    }
}

pub fn can_edit(user: &User, author_id: &str) -> bool {
    has_permission(user, Permission::EditAnyContent)
        || (user.id == author_id && has_permission(user, Permission::EditOwnContent))
}

pub fn can_delete(user: &User, author_id: &str) -> bool {
    has_permission(user, Permission::DeleteAnyContent)
        || (user.id == author_id && has_permission(user, Permission::DeleteOwnContent))
}
