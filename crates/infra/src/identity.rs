//! Identity directory: users, their roles and their claims.
//!
//! The order core only reads from here (to resolve a [`Principal`]). The demo
//! seeder is the only writer.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use orderdesk_auth::{Claim, Principal, Role};
use orderdesk_core::UserId;

/// A user as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub user_name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub claims: Vec<Claim>,
}

impl UserRecord {
    pub fn new(user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            id: UserId::new(),
            email: user_name.clone(),
            user_name,
            roles: Vec::new(),
            claims: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn with_claim(mut self, claim: Claim) -> Self {
        if !self.claims.contains(&claim) {
            self.claims.push(claim);
        }
        self
    }

    /// Principal snapshot for authorization.
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            user_name: Some(self.user_name.clone()),
            roles: self.roles.clone(),
            claims: self.claims.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("role '{0}' does not exist")]
    UnknownRole(String),

    #[error("identity backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, IdentityError>;

    /// Case-insensitive lookup by user name.
    async fn find_by_name(&self, user_name: &str) -> Result<Option<UserRecord>, IdentityError>;

    /// Create the role if missing. Returns `true` when it was created.
    async fn ensure_role(&self, role: &Role) -> Result<bool, IdentityError>;

    /// Create the user if no user with that name exists. An existing account is
    /// returned as stored; its roles and claims are left alone.
    ///
    /// Every role must already exist.
    async fn ensure_user(&self, user: UserRecord) -> Result<UserRecord, IdentityError>;
}

#[derive(Debug, Default)]
struct Directory {
    roles: HashSet<Role>,
    users: HashMap<UserId, UserRecord>,
}

/// In-memory identity directory (dev/tests).
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    inner: RwLock<Directory>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.read().map(|d| d.users.len()).unwrap_or(0)
    }
}

fn poisoned() -> IdentityError {
    IdentityError::Backend("lock poisoned".to_string())
}

fn by_name<'a>(dir: &'a Directory, user_name: &str) -> Option<&'a UserRecord> {
    dir.users
        .values()
        .find(|u| u.user_name.eq_ignore_ascii_case(user_name))
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, IdentityError> {
        let dir = self.inner.read().map_err(|_| poisoned())?;
        Ok(dir.users.get(&id).cloned())
    }

    async fn find_by_name(&self, user_name: &str) -> Result<Option<UserRecord>, IdentityError> {
        let dir = self.inner.read().map_err(|_| poisoned())?;
        Ok(by_name(&dir, user_name).cloned())
    }

    async fn ensure_role(&self, role: &Role) -> Result<bool, IdentityError> {
        let mut dir = self.inner.write().map_err(|_| poisoned())?;
        Ok(dir.roles.insert(role.clone()))
    }

    async fn ensure_user(&self, user: UserRecord) -> Result<UserRecord, IdentityError> {
        let mut dir = self.inner.write().map_err(|_| poisoned())?;

        if let Some(missing) = user.roles.iter().find(|r| !dir.roles.contains(*r)) {
            return Err(IdentityError::UnknownRole(missing.to_string()));
        }

        if let Some(existing) = by_name(&dir, &user.user_name) {
            return Ok(existing.clone());
        }

        dir.users.insert(user.id, user.clone());
        Ok(user)
    }
}
