/*!
Which roles may see which views, and which roles may perform which
mutations. The gate is consulted by every mutating [`Portal`] operation,
whatever a client chooses to display.

[`Portal`]: crate::store::Portal
*/
use serde::Serialize;

use crate::err::AuthError;
use crate::models::{Identity, Role};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum Capability {
    Dashboard,
    UserManagement,
    ProjectAssignment,
    ExaminerAssignment,
    ProgressReportSubmission,
    LogbookReportSubmission,
    SupervisorPanel,
    Settings,
}

#[derive(Debug, Clone, Copy)]
enum Allowed {
    All,
    Only(&'static [Role]),
}

/// Ordered as a client should list them; the first visible entry is where
/// a user lands after login.
const CAPABILITIES: &[(Capability, Allowed)] = &[
    (Capability::Dashboard, Allowed::All),
    (Capability::UserManagement, Allowed::Only(&[Role::Admin])),
    (Capability::ProjectAssignment, Allowed::Only(&[Role::Admin])),
    (Capability::ExaminerAssignment, Allowed::Only(&[Role::Admin])),
    (
        Capability::ProgressReportSubmission,
        Allowed::Only(&[Role::Student, Role::Supervisor]),
    ),
    (
        Capability::LogbookReportSubmission,
        Allowed::Only(&[Role::Student, Role::Supervisor]),
    ),
    (Capability::SupervisorPanel, Allowed::Only(&[Role::Supervisor])),
    (Capability::Settings, Allowed::Only(&[Role::Admin])),
];

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Capability::Dashboard => "Dashboard",
            Capability::UserManagement => "User Management",
            Capability::ProjectAssignment => "Project Assignment",
            Capability::ExaminerAssignment => "Examiner Assignment",
            Capability::ProgressReportSubmission => "Progress Report Submission",
            Capability::LogbookReportSubmission => "Logbook Report Submission",
            Capability::SupervisorPanel => "Supervisor Panel",
            Capability::Settings => "Settings",
        };

        write!(f, "{}", token)
    }
}

impl Allowed {
    fn admits(self, role: Role) -> bool {
        match self {
            Allowed::All => true,
            Allowed::Only(roles) => roles.contains(&role),
        }
    }
}

pub fn visible_capabilities(role: Role) -> Vec<Capability> {
    CAPABILITIES
        .iter()
        .filter(|(_, allowed)| allowed.admits(role))
        .map(|(cap, _)| *cap)
        .collect()
}

pub fn is_visible(role: Role, capability: Capability) -> bool {
    CAPABILITIES
        .iter()
        .any(|(cap, allowed)| *cap == capability && allowed.admits(role))
}

/// Read-side counterpart of [`authorize`].
pub fn require(identity: &Identity, capability: Capability) -> Result<(), AuthError> {
    if is_visible(identity.role, capability) {
        Ok(())
    } else {
        log::warn!(
            "{} ({}) refused: no access to {}",
            &identity.username,
            identity.role,
            capability
        );
        Err(AuthError::NotVisible {
            role: identity.role,
            capability,
        })
    }
}

pub fn landing_capability(role: Role) -> Capability {
    visible_capabilities(role)
        .first()
        .copied()
        .unwrap_or(Capability::Dashboard)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum Action {
    CreateUser,
    DeleteUser,
    CreateProject,
    DeleteProject,
    AssignExaminer,
    UnassignExaminer,
    ChangeAdminPassword,
}

impl Action {
    /// The view an action is performed from.
    pub fn capability(self) -> Capability {
        match self {
            Action::CreateUser | Action::DeleteUser => Capability::UserManagement,
            Action::CreateProject | Action::DeleteProject => Capability::ProjectAssignment,
            Action::AssignExaminer | Action::UnassignExaminer => Capability::ExaminerAssignment,
            Action::ChangeAdminPassword => Capability::Settings,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Action::CreateUser => "create users",
            Action::DeleteUser => "delete users",
            Action::CreateProject => "assign projects",
            Action::DeleteProject => "delete projects",
            Action::AssignExaminer => "assign examiners",
            Action::UnassignExaminer => "unassign examiners",
            Action::ChangeAdminPassword => "change the admin password",
        };

        write!(f, "{}", token)
    }
}

pub fn can_mutate(role: Role, action: Action) -> bool {
    is_visible(role, action.capability())
}

pub fn authorize(identity: &Identity, action: Action) -> Result<(), AuthError> {
    if can_mutate(identity.role, action) {
        Ok(())
    } else {
        log::warn!(
            "{} ({}) refused: may not {}",
            &identity.username,
            identity.role,
            action
        );
        Err(AuthError::Forbidden {
            role: identity.role,
            action,
        })
    }
}
