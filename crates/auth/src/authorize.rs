use serde::Serialize;

use orderdesk_core::UserId;

use crate::{Policy, Principal};

/// Authorize a principal against a named policy.
///
/// - No IO
/// - No panics
/// - Never errors: callers translate `false` into their own "forbidden" error
pub fn authorize(principal: &Principal, policy: &Policy) -> bool {
    policy.evaluate(principal)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Used for structured denial logs and the `/whoami` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub policy: &'static str,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
}

/// Snapshot of the principal at decision time.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub roles: Vec<String>,
    pub claims: Vec<String>,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain_authorization(principal: &Principal, policy: &Policy) -> AuthorizationExplanation {
    let granted = authorize(principal, policy);

    let reason = if granted {
        format!("{} satisfied ({})", policy.name(), policy.description())
    } else {
        format!(
            "{} not satisfied: {}; principal roles {:?}, claims {:?}",
            policy.name(),
            policy.description(),
            role_names(principal),
            claim_strings(principal),
        )
    };

    AuthorizationExplanation {
        policy: policy.name(),
        granted,
        reason,
        principal: PrincipalState {
            user_id: principal.user_id,
            user_name: principal.user_name.clone(),
            roles: role_names(principal),
            claims: claim_strings(principal),
        },
    }
}

fn role_names(principal: &Principal) -> Vec<String> {
    let mut roles: Vec<String> = principal.roles.iter().map(|r| r.as_str().to_string()).collect();
    roles.sort();
    roles
}

fn claim_strings(principal: &Principal) -> Vec<String> {
    let mut claims: Vec<String> = principal.claims.iter().map(|c| c.to_string()).collect();
    claims.sort();
    claims
}
