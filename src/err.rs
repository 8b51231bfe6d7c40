#![allow(non_snake_case)]

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

use crate::gate::{Action, Capability};
use crate::models::{ProjectId, Role, UserId};

/// Failures of login, session lookup and the authorization gate.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password for a {role} login.")]
    InvalidCredentials { role: Role },
    #[error("Session has expired, please log in again.")]
    SessionExpired,
    #[error("Session is missing or invalid.")]
    InvalidSession,
    #[error("{role} is not allowed to {action}.")]
    Forbidden { role: Role, action: Action },
    #[error("{role} has no access to {capability}.")]
    NotVisible { role: Role, capability: Capability },
}

/// What a reference in a request was supposed to point at.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum Referent {
    Student(UserId),
    Supervisor(UserId),
    Project(ProjectId),
}

impl std::fmt::Display for Referent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Referent::Student(id) => write!(f, "student {}", id),
            Referent::Supervisor(id) => write!(f, "supervisor {}", id),
            Referent::Project(id) => write!(f, "project {}", id),
        }
    }
}

/// Rejections of a mutation. The store is untouched whenever one is returned.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("`{field}` must be filled out.")]
    MissingField { field: &'static str },
    #[error("Username `{username}` already exists. Please choose a different one.")]
    DuplicateUsername { username: String },
    #[error("Users can only be created as Student or Supervisor, not {role}.")]
    InvalidRole { role: Role },
    #[error("Student {student_id} already has an assigned project.")]
    AlreadyAssigned { student_id: UserId },
    #[error("No such {0}.")]
    UnknownReference(Referent),
    #[error("Supervisor {examiner_id} supervises this project and cannot examine it.")]
    ExaminerIsSupervisor { examiner_id: UserId },
    #[error("Current password is incorrect.")]
    IncorrectPassword,
    #[error("New password and confirmation do not match.")]
    PasswordMismatch,
    #[error("New password must be at least {min} characters long.")]
    PasswordTooShort { min: usize },
}

/// Anything a [`Portal`](crate::store::Portal) operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("password hashing failed: {0}")]
    Hashing(pbkdf2::password_hash::Error),
}

impl From<pbkdf2::password_hash::Error> for PortalError {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        PortalError::Hashing(err)
    }
}

pub async fn handler404(path: Uri) -> (StatusCode, Json<Error>) {
    (
        StatusCode::NOT_FOUND,
        Json(Error::NotFound {
            message: format!("Invalid path: {}", path),
        }),
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Maybe<T> {
    Nothing(Error),
    Fine(Success<T>),
}

pub fn Fine<V>(v: V) -> Maybe<V>
where
    V: Serialize,
{
    Maybe::Fine(Success::of(v))
}

pub fn Nothing<V>(err: Error) -> Maybe<V> {
    Maybe::Nothing(err)
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<T> IntoResponse for Maybe<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        match self {
            Maybe::Nothing(err) => err.into_response(),
            Maybe::Fine(success) => Json::into_response(Json(success)),
        }
    }
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    NotFound { message: String },
    AuthenticationFailure { message: String },
    Forbidden { message: String },
    InvalidPayload { message: String },
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::InvalidPayload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden { .. } | AuthError::NotVisible { .. } => Self::Forbidden {
                message: err.to_string(),
            },
            _ => Self::AuthenticationFailure {
                message: err.to_string(),
            },
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::InvalidPayload {
            message: err.to_string(),
        }
    }
}

impl From<PortalError> for Error {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Auth(e) => e.into(),
            PortalError::Validation(e) => e.into(),
            PortalError::Hashing(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
        }
    }
}

/// A malformed id names nothing.
impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Self::NotFound {
            message: rejection.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashingError",
            message: err.to_string(),
        }
    }
}
