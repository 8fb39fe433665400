use serde::Serialize;

use orderdesk_core::UserId;

use crate::{Claim, JwtClaims, Role};

/// A fully resolved principal snapshot for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives it from
/// a validated token and the identity directory, tests build it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub roles: Vec<Role>,
    pub claims: Vec<Claim>,
}

impl Principal {
    pub fn new(user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: Some(user_name.into()),
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

    pub fn is_in_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims.iter().any(|c| c.is(claim_type, value))
    }
}

impl From<&JwtClaims> for Principal {
    fn from(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            user_name: Some(claims.name.clone()),
            roles: claims.roles.clone(),
            claims: claims.claims.clone(),
        }
    }
}
