//! Permission middleware layered over the store boundary.
//!
//! A [`PermissionChecker`] answers single questions; the thread-local
//! [`PermissionController`] owns who is asking, records every answer in an
//! audit trail and may defer record-level checks to [`PermissionController::final_check`].
//! [`GuardedStore`] consults the controller before delegating to any store.

mod controller;
mod guard;


pub use controller::{
    ActAs, PermissionController, SYSTEM_ROLE, SYSTEM_USER, act_as_system, act_as_user,
};
pub use guard::GuardedStore;

use derive_more::Display;
use std::str::FromStr;

///
/// Permission
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Permission {
    #[display("can_create")]
    CanCreate,
    #[display("can_delete")]
    CanDelete,
    #[display("can_read")]
    CanRead,
    #[display("can_update")]
    CanUpdate,
}

impl Permission {
    pub const ALL: [Self; 4] = [Self::CanCreate, Self::CanDelete, Self::CanRead, Self::CanUpdate];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CanCreate => "can_create",
            Self::CanDelete => "can_delete",
            Self::CanRead => "can_read",
            Self::CanUpdate => "can_update",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{s}'"))
    }
}

///
/// PermissionChecker
///
/// Answers whether `user_id`, acting as `role_id`, holds `permission` on
/// `resource_id` (`None` for a type-level question). Closures with the
/// same signature are checkers.
///

pub trait PermissionChecker: Send + Sync {
    fn check_permission(
        &self,
        user_id: &str,
        role_id: &str,
        permission: Permission,
        resource_id: Option<&str>,
    ) -> bool;
}

impl<F> PermissionChecker for F
where
    F: Fn(&str, &str, Permission, Option<&str>) -> bool + Send + Sync,
{
    fn check_permission(
        &self,
        user_id: &str,
        role_id: &str,
        permission: Permission,
        resource_id: Option<&str>,
    ) -> bool {
        self(user_id, role_id, permission, resource_id)
    }
}

///
/// AllowAll
/// Checker used when permission checks are disabled.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn check_permission(&self, _: &str, _: &str, _: Permission, _: Option<&str>) -> bool {
        true
    }
}

///
/// AuditEntry
///
/// One line of a session's audit trail. Session lifecycle lines carry no
/// permission.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditEntry {
    pub message: String,
    pub permission: Option<Permission>,
    pub resource_id: String,
    pub result: bool,
}

impl AuditEntry {
    pub(crate) fn note(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permission: None,
            resource_id: String::new(),
            result: false,
        }
    }
}
