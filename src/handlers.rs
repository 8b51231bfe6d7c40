/*!
HTTP handlers for everything past login. Each one resolves the caller from
their session, holds the portal lock for the rest of the request, and
snapshots the portal after a successful change.
*/
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{ensure_authenticated, session_user, BearerHeader};
use crate::err::{Error, PortalError};
use crate::models::{NewUser, ProjectId, ProjectView, Role, UserId, UserSummary};
use crate::registry::Cascade;
use crate::store::{Dashboard, Portal, ReportContext, ReportKind, SupervisorPanel};
use crate::{breaks, io, proceeds, AppState, Payload, SharedState};

/// Runs `change` against a copy of the portal and swaps the copy in only
/// once it is on disk. If the snapshot cannot be written the live portal
/// stays as it was.
async fn commit<T, F>(state: &AppState, portal: &mut Portal, change: F) -> Result<T, Error>
where
    F: FnOnce(&mut Portal) -> Result<T, PortalError>,
{
    let path = match &state.snapshot_path {
        Some(path) => path,
        None => return Ok(change(portal)?),
    };

    let mut next = portal.clone();
    let out = change(&mut next)?;
    io::save_snapshot(path, &next).await.map_err(|e| {
        log::error!("Unable to write snapshot to {}: {:#}", path.display(), &e);
        Error::InternalError {
            kind: "PersistenceError",
            message: format!("{:#}", e),
        }
    })?;
    *portal = next;
    Ok(out)
}

pub async fn dashboard(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
) -> Payload<Dashboard> {
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let actor = ensure_authenticated(&portal, user)?;
    proceeds(portal.dashboard(&actor)?)
}

pub async fn supervisor_panel(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
) -> Payload<SupervisorPanel> {
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let actor = ensure_authenticated(&portal, user)?;
    proceeds(portal.supervisor_panel(&actor)?)
}

pub async fn report_context(
    Extension(state): Extension<SharedState>,
    Path(kind): Path<String>,
    bearer: BearerHeader,
) -> Payload<ReportContext> {
    let kind: ReportKind = match kind.parse() {
        Ok(kind) => kind,
        Err(message) => return breaks(Error::NotFound { message }),
    };
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let actor = ensure_authenticated(&portal, user)?;
    proceeds(portal.report_context(&actor, kind)?)
}

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct Users {
    users: Vec<UserSummary>,
}

pub async fn list_users(
    Extension(state): Extension<SharedState>,
    filter: Result<Query<UserFilter>, QueryRejection>,
    bearer: BearerHeader,
) -> Payload<Users> {
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Query(filter) = filter?;

    let mut users = portal.users(&actor)?;
    if let Some(role) = filter.role {
        users.retain(|u| u.role == role);
    }
    proceeds(Users { users })
}

pub async fn create_user(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
    fields: Result<Json<NewUser>, JsonRejection>,
) -> Payload<UserSummary> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Json(fields) = fields?;

    let created = commit(&state, &mut portal, |p| p.create_user(&actor, fields)).await?;
    proceeds(created)
}

#[derive(Debug, Serialize)]
pub struct UserDeleted {
    deleted: bool,
    removed_projects: Vec<ProjectId>,
    examiner_cleared: Vec<ProjectId>,
}

impl From<Option<Cascade>> for UserDeleted {
    fn from(c: Option<Cascade>) -> Self {
        let deleted = c.is_some();
        let c = c.unwrap_or_default();
        UserDeleted {
            deleted,
            removed_projects: c.removed,
            examiner_cleared: c.examiner_cleared,
        }
    }
}

pub async fn delete_user(
    Extension(state): Extension<SharedState>,
    id: Result<Path<u64>, PathRejection>,
    bearer: BearerHeader,
) -> Payload<UserDeleted> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Path(id) = id?;

    let cascade = commit(&state, &mut portal, |p| p.delete_user(&actor, UserId(id))).await?;
    if cascade.is_some() {
        let logged_out = state.sessions.write().await.drop_user(UserId(id));
        if logged_out > 0 {
            log::info!("Dropped {} sessions of deleted user {}.", logged_out, id);
        }
    }
    proceeds(UserDeleted::from(cascade))
}

#[derive(Debug, Serialize)]
pub struct Projects {
    projects: Vec<ProjectView>,
}

pub async fn list_projects(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
) -> Payload<Projects> {
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let actor = ensure_authenticated(&portal, user)?;
    proceeds(Projects {
        projects: portal.projects(&actor)?,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    #[serde(default)]
    title: String,
    student_id: Option<UserId>,
    supervisor_id: Option<UserId>,
}

pub async fn create_project(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
    body: Result<Json<CreateProject>, JsonRejection>,
) -> Payload<ProjectView> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Json(body) = body?;

    let project = commit(&state, &mut portal, |p| {
        p.create_project(&actor, &body.title, body.student_id, body.supervisor_id)
    })
    .await?;
    proceeds(project)
}

#[derive(Debug, Serialize)]
pub struct ProjectDeleted {
    project_id: ProjectId,
}

pub async fn delete_project(
    Extension(state): Extension<SharedState>,
    id: Result<Path<u64>, PathRejection>,
    bearer: BearerHeader,
) -> Payload<ProjectDeleted> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Path(id) = id?;

    commit(&state, &mut portal, |p| p.delete_project(&actor, ProjectId(id))).await?;
    proceeds(ProjectDeleted {
        project_id: ProjectId(id),
    })
}

#[derive(Debug, Deserialize)]
pub struct AssignExaminer {
    examiner_id: UserId,
}

pub async fn assign_examiner(
    Extension(state): Extension<SharedState>,
    id: Result<Path<u64>, PathRejection>,
    bearer: BearerHeader,
    body: Result<Json<AssignExaminer>, JsonRejection>,
) -> Payload<ProjectView> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Path(id) = id?;
    let Json(body) = body?;

    let project = commit(&state, &mut portal, |p| {
        p.assign_examiner(&actor, ProjectId(id), body.examiner_id)
    })
    .await?;
    proceeds(project)
}

pub async fn unassign_examiner(
    Extension(state): Extension<SharedState>,
    id: Result<Path<u64>, PathRejection>,
    bearer: BearerHeader,
) -> Payload<ProjectView> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Path(id) = id?;

    let project = commit(&state, &mut portal, |p| {
        p.unassign_examiner(&actor, ProjectId(id))
    })
    .await?;
    proceeds(project)
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    #[serde(default)]
    old: String,
    #[serde(default)]
    new: String,
    #[serde(default)]
    confirm: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    changed: bool,
}

pub async fn change_admin_password(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
    body: Result<Json<ChangePassword>, JsonRejection>,
) -> Payload<PasswordChanged> {
    let user = session_user(&state, &bearer).await?;
    let mut portal = state.portal.write().await;
    let actor = ensure_authenticated(&portal, user)?;
    let Json(body) = body?;

    commit(&state, &mut portal, |p| {
        p.change_admin_password(&actor, &body.old, &body.new, &body.confirm)
    })
    .await?;
    proceeds(PasswordChanged { changed: true })
}
