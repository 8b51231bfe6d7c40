pub mod auth;
pub mod config;
pub mod err;
pub mod gate;
pub mod handlers;
pub mod identity;
pub mod io;
pub mod models;
pub mod registry;
pub mod session;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Router};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::err::{Error, Fine, Maybe, Nothing};
use crate::session::Sessions;
use crate::store::Portal;

pub type Payload<T> = axum::response::Result<Maybe<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Fine(value))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Ok(Nothing(err))
}

/**
Everything the handlers share. Each request takes the portal lock once and
keeps it until it is done, so requests behave as if run one at a time.
*/
#[derive(Debug)]
pub struct AppState {
    pub portal: RwLock<Portal>,
    pub sessions: RwLock<Sessions>,
    /// Where to write the portal after each change; `None` keeps it in memory.
    pub snapshot_path: Option<PathBuf>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(portal: Portal, sessions: Sessions, snapshot_path: Option<PathBuf>) -> SharedState {
        Arc::new(AppState {
            portal: RwLock::new(portal),
            sessions: RwLock::new(sessions),
            snapshot_path,
        })
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/dashboard", get(handlers::dashboard))
        .route("/panel", get(handlers::supervisor_panel))
        .route("/reports/:kind", get(handlers::report_context))
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/:id", delete(handlers::delete_user))
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/projects/:id", delete(handlers::delete_project))
        .route(
            "/projects/:id/examiner",
            put(handlers::assign_examiner).delete(handlers::unassign_examiner),
        )
        .route("/admin/password", post(handlers::change_admin_password))
        .fallback(err::handler404.into_service())
        .layer(Extension(state))
}
