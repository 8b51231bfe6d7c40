use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Student,
    Supervisor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Student, Role::Supervisor];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Admin => "Admin",
            Role::Student => "Student",
            Role::Supervisor => "Supervisor",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Student" => Ok(Role::Student),
            "Supervisor" => Ok(Role::Supervisor),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier carried by the admin's [`Identity`]. Never issued to a [`User`].
pub const ADMIN_ID: UserId = UserId(0);
pub const ADMIN_NAME: &str = "System Admin";
pub const ADMIN_EMAIL: &str = "admin@uni.edu";

/// A Student or Supervisor account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    /// PHC string produced by PBKDF2.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The single admin login. Lives outside the user list and is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub student_id: UserId,
    pub supervisor_id: UserId,
    pub examiner_id: Option<UserId>,
}

/// The principal produced by a successful login.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    pub name: String,
    pub username: String,
    pub email: String,
}

impl Identity {
    pub fn admin(username: &str) -> Identity {
        Identity {
            id: ADMIN_ID,
            role: Role::Admin,
            name: ADMIN_NAME.to_string(),
            username: username.to_string(),
            email: ADMIN_EMAIL.to_string(),
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id,
            role: user.role,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Role,
}

/// What a [`User`] looks like to anybody but the store.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Contact {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Contact {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// A [`Project`] with the people it references looked up at read time.
#[skip_serializing_none]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ProjectView {
    pub id: ProjectId,
    pub title: String,
    pub student: Option<Contact>,
    pub supervisor: Option<Contact>,
    pub examiner: Option<Contact>,
}
