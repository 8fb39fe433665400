//! Audit trail vocabulary.
//!
//! Audit entries are append-only: this module defines how an entry is described
//! before it is stored ([`NewAuditEntry`]) and what a stored one looks like
//! ([`AuditLog`]). Nothing here can modify a stored entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{AuditLogId, DomainError, DomainResult, Entity, OrderId, UserId};

pub const DETAILS_MAX_CHARS: usize = 2000;
pub const USER_NAME_MAX_CHARS: usize = 256;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    Created,
    Updated,
    Submitted,
    Approved,
    Rejected,
    Deleted,
    Exported,
}

impl AuditAction {
    pub const ALL: [AuditAction; 7] = [
        AuditAction::Created,
        AuditAction::Updated,
        AuditAction::Submitted,
        AuditAction::Approved,
        AuditAction::Rejected,
        AuditAction::Deleted,
        AuditAction::Exported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "Created",
            AuditAction::Updated => "Updated",
            AuditAction::Submitted => "Submitted",
            AuditAction::Approved => "Approved",
            AuditAction::Rejected => "Rejected",
            AuditAction::Deleted => "Deleted",
            AuditAction::Exported => "Exported",
        }
    }

    /// Stable storage code (1-based).
    pub fn code(&self) -> i16 {
        match self {
            AuditAction::Created => 1,
            AuditAction::Updated => 2,
            AuditAction::Submitted => 3,
            AuditAction::Approved => 4,
            AuditAction::Rejected => 5,
            AuditAction::Deleted => 6,
            AuditAction::Exported => 7,
        }
    }

    pub fn from_code(code: i16) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.code() == code)
            .ok_or_else(|| DomainError::validation(format!("unknown audit action code {code}")))
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown audit action '{s}'")))
    }
}

/// Who did it. Both fields are `None` for system-originated events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<UserId>,
    pub user_name: Option<String>,
}

impl Actor {
    pub fn user(user_id: UserId, user_name: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            user_name,
        }
    }

    pub fn system() -> Self {
        Self::default()
    }
}

/// An audit entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub order_id: Option<OrderId>,
    pub details: Option<String>,
    pub actor: Actor,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, order_id: Option<OrderId>, details: Option<String>, actor: Actor) -> Self {
        Self {
            action,
            order_id,
            details,
            actor,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(details) = &self.details {
            if details.chars().count() > DETAILS_MAX_CHARS {
                return Err(DomainError::validation(format!(
                    "audit details must be at most {DETAILS_MAX_CHARS} characters"
                )));
            }
        }
        if let Some(name) = &self.actor.user_name {
            if name.chars().count() > USER_NAME_MAX_CHARS {
                return Err(DomainError::validation(format!(
                    "audit user name must be at most {USER_NAME_MAX_CHARS} characters"
                )));
            }
        }
        Ok(())
    }

    /// Stamp the entry with its id and append time.
    pub fn into_log(self, id: AuditLogId, occurred_at_utc: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id,
            action: self.action,
            occurred_at_utc,
            performed_by_user_id: self.actor.user_id,
            performed_by_user_name: self.actor.user_name,
            order_id: self.order_id,
            details: self.details,
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub action: AuditAction,
    pub occurred_at_utc: DateTime<Utc>,
    pub performed_by_user_id: Option<UserId>,
    pub performed_by_user_name: Option<String>,
    pub order_id: Option<OrderId>,
    pub details: Option<String>,
}

impl Entity for AuditLog {
    type Id = AuditLogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
