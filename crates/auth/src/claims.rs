use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderdesk_core::UserId;

use crate::Role;

/// A `type=value` assertion about a principal (e.g. `perm=approve`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: Cow<'static, str>,
    pub value: Cow<'static, str>,
}

impl Claim {
    pub const PERM_APPROVE: Claim = Claim::from_static("perm", "approve");
    pub const PERM_EXPORT: Claim = Claim::from_static("perm", "export");

    pub const fn from_static(claim_type: &'static str, value: &'static str) -> Self {
        Self {
            claim_type: Cow::Borrowed(claim_type),
            value: Cow::Borrowed(value),
        }
    }

    pub fn new(claim_type: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, claim_type: &str, value: &str) -> bool {
        self.claim_type == claim_type && self.value == value
    }
}

impl core::fmt::Display for Claim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}={}", self.claim_type, self.value)
    }
}

impl core::str::FromStr for Claim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((t, v)) if !t.is_empty() && !v.is_empty() => {
                Ok(Claim::new(t.to_string(), v.to_string()))
            }
            _ => Err(format!("claim must look like 'type=value', got '{s}'")),
        }
    }
}

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims OrderDesk expects once a token has been
/// decoded/verified. Roles and claims carried here are a fallback; the identity
/// directory is authoritative for subjects it knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Display/user name of the subject.
    pub name: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub claims: Vec<Claim>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
