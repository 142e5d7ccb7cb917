use crate::{
    access::{AllowAll, AuditEntry, Permission, PermissionChecker},
    error::{Error, ErrorClass, ErrorOrigin},
    obs::sink::{self, MetricsEvent},
    types::uuid,
};
use parking_lot::{RwLock, const_rwlock};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

pub const SYSTEM_USER: &str = "System";
pub const SYSTEM_ROLE: &str = "SystemRole";

static GLOBAL_CHECKER: RwLock<Option<Arc<dyn PermissionChecker>>> = const_rwlock(None);

thread_local! {
    static STACK: RefCell<SessionStack> = RefCell::new(SessionStack::default());
}

///
/// SessionStack
///
/// Per-thread sessions: the active one plus those suspended by
/// `push_session`. `checker` overrides the global checker for this thread.
///

#[derive(Default)]
struct SessionStack {
    checker: Option<Arc<dyn PermissionChecker>>,
    current: Option<Session>,
    stored: Vec<Session>,
}

impl SessionStack {
    fn checker(&self) -> Result<Arc<dyn PermissionChecker>, Error> {
        self.checker
            .clone()
            .or_else(|| GLOBAL_CHECKER.read().clone())
            .ok_or_else(|| Error::config("no permission checker registered"))
    }

    fn current(&mut self) -> Result<&mut Session, Error> {
        if self.current.is_none() {
            self.current = Some(Session::new(self.checker()?));
        }

        self.current
            .as_mut()
            .ok_or_else(|| Error::config("permission session unavailable"))
    }
}

///
/// Session
///

struct Session {
    id: String,
    user_id: String,
    role_id: String,
    checker: Arc<dyn PermissionChecker>,
    audit: Vec<AuditEntry>,
    requested: BTreeMap<String, BTreeSet<Permission>>,
    delayed_checking: bool,
    skip_final_checks: bool,
    in_final_check: bool,
}

impl Session {
    fn new(checker: Arc<dyn PermissionChecker>) -> Self {
        let id = uuid::generate();
        let mut session = Self {
            id,
            user_id: String::new(),
            role_id: String::new(),
            checker,
            audit: Vec::new(),
            requested: BTreeMap::new(),
            delayed_checking: true,
            skip_final_checks: false,
            in_final_check: false,
        };
        session.note(format!("Creating session: {}", session.id));

        session
    }

    fn note(&mut self, message: impl Into<String>) {
        self.audit.push(AuditEntry::note(message));
    }

    fn set_user(&mut self, user_id: &str) {
        self.note(format!("Acting as user: {user_id}"));
        self.user_id = user_id.to_string();
    }

    fn set_role(&mut self, role_id: &str) {
        self.note(format!("Acting as user role: {role_id}"));
        self.role_id = role_id.to_string();
    }
}

// What the session decided before the checker is consulted.
enum Pending {
    Deny,
    Deferred,
    Ask(Ask),
}

struct Ask {
    checker: Arc<dyn PermissionChecker>,
    user_id: String,
    role_id: String,
}

impl Ask {
    fn run(self, permission: Permission, resource_id: &str) -> Result<bool, Error> {
        let resource = (!resource_id.is_empty()).then_some(resource_id);
        let result =
            self.checker
                .check_permission(&self.user_id, &self.role_id, permission, resource);

        PermissionController::with_session(|s| {
            s.audit.push(AuditEntry {
                message: format!(
                    "Check Access '{permission}' for user_id={} to resource={resource_id}",
                    self.user_id
                ),
                permission: Some(permission),
                resource_id: resource_id.to_string(),
                result,
            });
        })?;
        tracing::trace!(user = %self.user_id, %permission, resource = resource_id, result, "permission check");

        Ok(result)
    }
}

///
/// PermissionController
///
/// Entry point for the calling thread's permission session. A session is
/// created on first use with the thread's checker, falling back to the
/// globally registered one.
///
/// Checks against a non-empty resource are deferred while delayed checking
/// is on (the default) and evaluated by [`Self::final_check`]; type-level
/// checks (empty resource) always run immediately.
///

pub struct PermissionController;

impl PermissionController {
    /// Register the process-wide checker.
    pub fn register_checker(checker: Arc<dyn PermissionChecker>) {
        *GLOBAL_CHECKER.write() = Some(checker);
    }

    /// Register a checker that allows everything.
    pub fn disable_permission_checks() {
        Self::register_checker(Arc::new(AllowAll));
    }

    /// Use `checker` on this thread only, starting from a fresh session.
    pub fn use_checker(checker: Arc<dyn PermissionChecker>) {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.checker = Some(checker);
            stack.current = None;
            stack.stored.clear();
        });
    }

    fn with_session<T>(f: impl FnOnce(&mut Session) -> T) -> Result<T, Error> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            Ok(f(stack.current()?))
        })
    }

    ///
    /// SESSION STATE
    ///

    pub fn session_id() -> Result<String, Error> {
        Self::with_session(|s| s.id.clone())
    }

    pub fn user_id() -> Result<String, Error> {
        Self::with_session(|s| s.user_id.clone())
    }

    pub fn role_id() -> Result<String, Error> {
        Self::with_session(|s| s.role_id.clone())
    }

    /// Identify the caller for subsequent checks.
    pub fn setup_user(user_id: &str, role_id: Option<&str>) -> Result<(), Error> {
        Self::with_session(|s| {
            s.set_user(user_id);
            s.set_role(role_id.unwrap_or_default());
        })
    }

    pub fn set_delayed_checking(enabled: bool) -> Result<(), Error> {
        Self::with_session(|s| s.delayed_checking = enabled)
    }

    pub fn set_skip_final_checks(skip: bool) -> Result<(), Error> {
        Self::with_session(|s| s.skip_final_checks = skip)
    }

    /// Resources whose checks are waiting for the final check.
    pub fn requested_resources() -> Result<BTreeMap<String, BTreeSet<Permission>>, Error> {
        Self::with_session(|s| s.requested.clone())
    }

    pub fn audit_trail() -> Result<Vec<AuditEntry>, Error> {
        Self::with_session(|s| s.audit.clone())
    }

    pub fn add_audit_event(message: impl Into<String>) -> Result<(), Error> {
        let message = message.into();

        Self::with_session(|s| s.note(message))
    }

    ///
    /// CHECKS
    ///

    /// Whether the current user holds `permission` on `resource_id`.
    /// Deferred checks answer `true` now; during the final check every
    /// new question answers `false`.
    pub fn does_user_have_permission(
        resource_id: &str,
        permission: Permission,
    ) -> Result<bool, Error> {
        let pending = Self::with_session(|s| {
            if s.in_final_check {
                Pending::Deny
            } else if !resource_id.is_empty() && s.delayed_checking {
                s.requested
                    .entry(resource_id.to_string())
                    .or_default()
                    .insert(permission);
                Pending::Deferred
            } else {
                Pending::Ask(Ask {
                    checker: Arc::clone(&s.checker),
                    user_id: s.user_id.clone(),
                    role_id: s.role_id.clone(),
                })
            }
        })?;

        match pending {
            Pending::Deny => Ok(false),
            Pending::Deferred => Ok(true),
            Pending::Ask(ask) => ask.run(permission, resource_id),
        }
    }

    pub fn must_have_permission(permission: Permission, resource_id: &str) -> Result<(), Error> {
        if Self::does_user_have_permission(resource_id, permission)? {
            return Ok(());
        }

        Err(denied(permission, resource_id))
    }

    /// Evaluate every deferred check. The first refusal is an
    /// `AccessDenied`; the deferred set is consumed either way.
    pub fn final_check() -> Result<(), Error> {
        let (requested, skip, ask) = Self::with_session(|s| {
            s.note("Final check");
            s.in_final_check = true;
            (
                std::mem::take(&mut s.requested),
                s.skip_final_checks,
                (Arc::clone(&s.checker), s.user_id.clone(), s.role_id.clone()),
            )
        })?;

        let outcome = if skip {
            Ok(())
        } else {
            check_all(&requested, &ask)
        };

        Self::with_session(|s| s.in_final_check = false)?;

        outcome
    }

    ///
    /// STACK
    ///

    /// Suspend the current session and start a fresh one.
    pub fn push_session() -> Result<(), Error> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let fresh = Session::new(stack.checker()?);
            stack.current()?;
            if let Some(current) = stack.current.replace(fresh) {
                stack.stored.push(current);
            }

            Ok(())
        })
    }

    /// Resume the most recently suspended session.
    pub fn pop_session() -> Result<(), Error> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let previous = stack.stored.pop().ok_or_else(|| {
                Error::new(
                    ErrorClass::MalformedInput,
                    ErrorOrigin::Access,
                    "no stored permission session to pop",
                )
            })?;
            stack.current = Some(previous);

            Ok(())
        })
    }

    /// Drop suspended sessions and start over.
    pub fn clear_session_stack() -> Result<(), Error> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.stored.clear();
            stack.current = Some(Session::new(stack.checker()?));

            Ok(())
        })
    }
}

fn check_all(
    requested: &BTreeMap<String, BTreeSet<Permission>>,
    (checker, user_id, role_id): &(Arc<dyn PermissionChecker>, String, String),
) -> Result<(), Error> {
    for (resource_id, permissions) in requested {
        for &permission in permissions {
            let ask = Ask {
                checker: Arc::clone(checker),
                user_id: user_id.clone(),
                role_id: role_id.clone(),
            };
            if !ask.run(permission, resource_id)? {
                return Err(denied(permission, resource_id));
            }
        }
    }

    Ok(())
}

fn denied(permission: Permission, resource_id: &str) -> Error {
    sink::record(MetricsEvent::AccessDenied {
        permission: permission.as_str(),
    });
    tracing::warn!(%permission, resource = resource_id, "access denied");

    Error::access_denied(format!("Permission: {permission}, Resource: {resource_id}"))
}

///
/// ActAs
///
/// Runs the enclosing scope as another user in a fresh session; the
/// previous session is restored on drop.
///

#[derive(Debug)]
pub struct ActAs {
    id: String,
    reason: String,
    initial_user_id: String,
}

impl ActAs {
    pub fn user(reason: &str, user_id: &str, role_id: &str) -> Result<Self, Error> {
        let initial_user_id = PermissionController::user_id()?;
        PermissionController::push_session()?;
        PermissionController::with_session(|s| {
            s.set_user(user_id);
            s.set_role(role_id);
        })?;

        Ok(Self {
            id: uuid::generate(),
            reason: reason.to_string(),
            initial_user_id,
        })
    }

    pub fn system(reason: &str) -> Result<Self, Error> {
        Self::user(reason, SYSTEM_USER, SYSTEM_ROLE)
    }

    /// The user that was active before this scope.
    #[must_use]
    pub fn initial_user_id(&self) -> &str {
        &self.initial_user_id
    }
}

impl Drop for ActAs {
    fn drop(&mut self) {
        if let Err(err) = PermissionController::pop_session() {
            tracing::warn!(id = %self.id, error = %err, "act-as scope lost its session");
            return;
        }

        let _ = PermissionController::add_audit_event(format!(
            "ActingAsUser({}): exiting ({})",
            self.id, self.reason
        ));
    }
}

pub fn act_as_user(reason: &str, user_id: &str, role_id: &str) -> Result<ActAs, Error> {
    ActAs::user(reason, user_id, role_id)
}

pub fn act_as_system(reason: &str) -> Result<ActAs, Error> {
    ActAs::system(reason)
}
