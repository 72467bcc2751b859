use crate::model::{Id, user::UserMarker};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const SESSION_SECRET_LEN: usize = 24;
pub const PASSWORD_SALT_LEN: usize = 16;
pub const PASSWORD_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
/// Argon2 memory cost in KiB.
pub const PASSWORD_HASH_M_COST: u32 = 4096;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(argon2::Error);

/// Input for creating an account.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Handle for a signed-in account.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Session {
    pub user_id: Id<UserMarker>,
    pub secret: [u8; SESSION_SECRET_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash {
    salt: [u8; PASSWORD_SALT_LEN],
    hash: Box<[u8; PASSWORD_HASH_LEN]>,
}

impl Session {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
        }
    }
}

impl PasswordHash {
    pub fn compute(password: &str) -> Result<Self, PasswordHashError> {
        Self::with_salt(password, rand::random())
    }

    fn with_salt(password: &str, salt: [u8; PASSWORD_SALT_LEN]) -> Result<Self, PasswordHashError> {
        let params = Params::new(PASSWORD_HASH_M_COST, 1, 1, Some(PASSWORD_HASH_LEN))
            .map_err(PasswordHashError)?;

        let mut hash = Box::new([0; PASSWORD_HASH_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), &salt, &mut *hash)
            .map_err(PasswordHashError)?;

        Ok(Self { salt, hash })
    }

    pub fn verify(&self, password: &str) -> Result<bool, PasswordHashError> {
        Ok(Self::with_salt(password, self.salt)?.hash == self.hash)
    }
}

impl Debug for NewUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}
