use axum::extract::rejection::JsonRejection;
use axum::headers::authorization::{Authorization, Bearer};
use axum::{Extension, Json, TypedHeader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::err::AuthError;
use crate::gate::{self, Capability};
use crate::models::{Identity, Role, UserId};
use crate::store::Portal;
use crate::{proceeds, AppState, Payload, SharedState};

pub type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// Whose session the request carries.
pub async fn session_user(state: &AppState, bearer: &BearerHeader) -> Result<UserId, AuthError> {
    let ssid = match bearer {
        Some(TypedHeader(Authorization(bearer))) => bearer.token(),
        None => return Err(AuthError::InvalidSession),
    };
    state.sessions.write().await.ensure_authenticated(ssid)
}

/// The session's owner as the portal currently knows them. Sessions of
/// deleted users are dead.
pub fn ensure_authenticated(portal: &Portal, user: UserId) -> Result<Identity, AuthError> {
    portal.identity_of(user).ok_or(AuthError::InvalidSession)
}

pub async fn login(
    Extension(state): Extension<SharedState>,
    login: Result<Json<LoginRequest>, JsonRejection>,
) -> Payload<LoggedIn> {
    let Json(login) = login?;
    let identity = {
        let portal = state.portal.read().await;
        portal.authenticate(login.role, &login.username, &login.password)?
    };

    let session = {
        let mut sessions = state.sessions.write().await;
        let expired = sessions.purge_expired(Utc::now());
        if expired > 0 {
            log::debug!("Purged {} expired sessions.", expired);
        }
        sessions.issue(identity.id)
    };
    log::info!("{} {} logged in.", identity.role, &identity.username);

    proceeds(LoggedIn {
        session_id: session.ssid,
        expires_at: session.expires_at,
        landing: gate::landing_capability(identity.role),
        identity,
    })
}

pub async fn logout(
    Extension(state): Extension<SharedState>,
    bearer: BearerHeader,
) -> Payload<LoggedOut> {
    let user = session_user(&state, &bearer).await?;
    let dropped = match &bearer {
        Some(TypedHeader(Authorization(bearer))) => {
            state.sessions.write().await.drop_session(bearer.token())
        }
        None => false,
    };
    log::debug!("User {} logged out.", user);

    proceeds(LoggedOut { dropped })
}

pub async fn me(Extension(state): Extension<SharedState>, bearer: BearerHeader) -> Payload<Me> {
    let user = session_user(&state, &bearer).await?;
    let portal = state.portal.read().await;
    let identity = ensure_authenticated(&portal, user)?;

    proceeds(Me {
        capabilities: gate::visible_capabilities(identity.role),
        identity,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub role: Role,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    session_id: String,
    expires_at: DateTime<Utc>,
    identity: Identity,
    landing: Capability,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    dropped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Me {
    identity: Identity,
    capabilities: Vec<Capability>,
}
