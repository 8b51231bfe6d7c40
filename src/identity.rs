/*!
Credentials: the admin login and the list of Student and Supervisor users.
*/
use std::collections::BTreeMap;

use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::err::{AuthError, PortalError, ValidationError};
use crate::models::{AdminCredentials, Identity, NewUser, Role, User, UserId, ADMIN_ID};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Checked when no account matches, so that an unknown username costs the
/// same PBKDF2 run as a wrong password. Matches no password anyone will type.
const DECOY_HASH: &str =
    "$pbkdf2-sha256$i=10000,l=32$txN4I1cHwFNUV7fjR9K2AA$v8DmqFMgUqIvLowW4+Wn0TSWaEaL8+r5QI8BUVRpg1Y";

pub fn hash_password(password: &str) -> Result<String, pbkdf2::password_hash::Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok(),
        Err(e) => {
            log::error!("Stored password hash is unreadable: {}", &e);
            false
        }
    }
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityStore {
    admin: AdminCredentials,
    users: BTreeMap<UserId, User>,
    next_user_id: u64,
}

impl IdentityStore {
    pub fn new(admin_username: &str, admin_password: &str) -> Result<Self, PortalError> {
        Ok(IdentityStore {
            admin: AdminCredentials {
                username: admin_username.to_string(),
                password_hash: hash_password(admin_password)?,
            },
            users: BTreeMap::new(),
            next_user_id: 1,
        })
    }

    pub fn admin_username(&self) -> &str {
        &self.admin.username
    }

    pub fn authenticate(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        log::trace!("IdentityStore::authenticate( {}, {:?}, [ password ] ) called.", role, username);

        let failure = AuthError::InvalidCredentials { role };
        if username.is_empty() || password.is_empty() {
            return Err(failure);
        }

        match role {
            Role::Admin => {
                let verified = verify_password(password, &self.admin.password_hash);
                if verified && username == self.admin.username {
                    Ok(Identity::admin(&self.admin.username))
                } else {
                    Err(failure)
                }
            }
            Role::Student | Role::Supervisor => {
                let candidate = self
                    .users
                    .values()
                    .find(|u| u.username == username && u.role == role);
                let hash = candidate.map_or(DECOY_HASH, |u| u.password_hash.as_str());
                let verified = verify_password(password, hash);
                match candidate {
                    Some(u) if verified => Ok(Identity::from(u)),
                    _ => Err(failure),
                }
            }
        }
    }

    pub fn create_user(&mut self, fields: NewUser) -> Result<User, PortalError> {
        log::trace!(
            "IdentityStore::create_user( {:?}, {:?}, {} ) called.",
            &fields.name,
            &fields.username,
            fields.role
        );

        required("name", &fields.name)?;
        required("username", &fields.username)?;
        required("email", &fields.email)?;
        if fields.password.is_empty() {
            return Err(ValidationError::MissingField { field: "password" }.into());
        }
        if fields.role == Role::Admin {
            return Err(ValidationError::InvalidRole { role: fields.role }.into());
        }

        let username = fields.username.trim();
        if self.users.values().any(|u| u.username == username) {
            return Err(ValidationError::DuplicateUsername {
                username: username.to_string(),
            }
            .into());
        }

        let user = User {
            id: UserId(self.next_user_id),
            name: fields.name.trim().to_string(),
            username: username.to_string(),
            email: fields.email.trim().to_string(),
            password_hash: hash_password(&fields.password)?,
            role: fields.role,
            created_at: Utc::now(),
        };
        self.next_user_id += 1;
        self.users.insert(user.id, user.clone());

        log::info!("Created {} {} ({}).", user.role, &user.username, user.id);
        Ok(user)
    }

    /// Removes a user. Projects referring to them are the caller's business.
    pub fn remove_user(&mut self, id: UserId) -> Option<User> {
        let removed = self.users.remove(&id);
        match &removed {
            Some(u) => log::info!("Deleted {} {} ({}).", u.role, &u.username, u.id),
            None => log::debug!("No user {} to delete.", id),
        }
        removed
    }

    pub fn change_admin_password(
        &mut self,
        old: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), PortalError> {
        log::trace!("IdentityStore::change_admin_password( [ redacted ] ) called.");

        if old.is_empty() {
            return Err(ValidationError::MissingField { field: "old" }.into());
        }
        if new.is_empty() {
            return Err(ValidationError::MissingField { field: "new" }.into());
        }
        if confirm.is_empty() {
            return Err(ValidationError::MissingField { field: "confirm" }.into());
        }
        if !verify_password(old, &self.admin.password_hash) {
            return Err(ValidationError::IncorrectPassword.into());
        }
        if new != confirm {
            return Err(ValidationError::PasswordMismatch.into());
        }
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            }
            .into());
        }

        self.admin.password_hash = hash_password(new)?;
        log::info!("Admin password changed.");
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// A user who exists and holds `role`.
    pub fn resolve(&self, id: UserId, role: Role) -> Option<&User> {
        self.users.get(&id).filter(|u| u.role == role)
    }

    /// Ascending by id.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn users_with_role(&self, role: Role) -> impl Iterator<Item = &User> {
        self.users.values().filter(move |u| u.role == role)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Rebuilds the principal behind a live session, if it still exists.
    pub fn identity_of(&self, id: UserId) -> Option<Identity> {
        if id == ADMIN_ID {
            Some(Identity::admin(&self.admin.username))
        } else {
            self.users.get(&id).map(Identity::from)
        }
    }
}
