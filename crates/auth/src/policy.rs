//! Named authorization policies.
//!
//! Every permission check in OrderDesk goes through one of these predicates.
//! Call sites name a policy; they never match on role or claim strings.

use serde::Serialize;

use orderdesk_core::UserId;

use crate::{Claim, Principal, Role};

/// Closed set of authorization policies.
///
/// Ownership-aware policies carry the target's creator so evaluation stays a
/// pure function of `(principal, policy)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy")]
pub enum Policy {
    /// Holds the `perm=approve` claim.
    CanApprove,
    /// In role `Admin`, or holds the `perm=export` claim.
    CanExport,
    /// In role `Admin` or `Manager`, or created the order.
    CanSubmit { created_by: UserId },
    /// Created the order. Draft edits are creator-only.
    CanEdit { created_by: UserId },
    /// In role `Admin` or `Manager`.
    CanViewAudit,
}

impl Policy {
    /// Policies that depend on the principal alone.
    pub const STATIC: [Policy; 3] = [Policy::CanApprove, Policy::CanExport, Policy::CanViewAudit];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::CanApprove => "CanApprove",
            Policy::CanExport => "CanExport",
            Policy::CanSubmit { .. } => "CanSubmit",
            Policy::CanEdit { .. } => "CanEdit",
            Policy::CanViewAudit => "CanViewAudit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Policy::CanApprove => "requires claim perm=approve",
            Policy::CanExport => "requires role Admin or claim perm=export",
            Policy::CanSubmit { .. } => "requires role Admin or Manager, or order ownership",
            Policy::CanEdit { .. } => "requires order ownership",
            Policy::CanViewAudit => "requires role Admin or Manager",
        }
    }

    pub(crate) fn evaluate(&self, principal: &Principal) -> bool {
        match self {
            Policy::CanApprove => has(principal, &Claim::PERM_APPROVE),
            Policy::CanExport => {
                principal.is_in_role(Role::ADMIN.as_str()) || has(principal, &Claim::PERM_EXPORT)
            }
            Policy::CanSubmit { created_by } => {
                is_admin_or_manager(principal) || principal.user_id == *created_by
            }
            Policy::CanEdit { created_by } => principal.user_id == *created_by,
            Policy::CanViewAudit => is_admin_or_manager(principal),
        }
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

fn has(principal: &Principal, claim: &Claim) -> bool {
    principal.has_claim(&claim.claim_type, &claim.value)
}

fn is_admin_or_manager(principal: &Principal) -> bool {
    principal.is_in_role(Role::ADMIN.as_str()) || principal.is_in_role(Role::MANAGER.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Principal {
        Principal::new(UserId::new(), "user@demo.local").with_role(Role::USER)
    }

    #[test]
    fn approve_requires_the_claim_not_a_role() {
        let admin_without_claim = user().with_role(Role::ADMIN);
        assert!(!Policy::CanApprove.evaluate(&admin_without_claim));

        let approver = user().with_claim(Claim::PERM_APPROVE);
        assert!(Policy::CanApprove.evaluate(&approver));
    }

    #[test]
    fn export_accepts_admin_role_or_export_claim() {
        assert!(!Policy::CanExport.evaluate(&user()));
        assert!(Policy::CanExport.evaluate(&user().with_role(Role::ADMIN)));
        assert!(Policy::CanExport.evaluate(&user().with_claim(Claim::PERM_EXPORT)));
        assert!(!Policy::CanExport.evaluate(&user().with_role(Role::MANAGER)));
    }

    #[test]
    fn submit_accepts_owner_or_privileged_roles() {
        let owner = user();
        let stranger = user();
        let policy = Policy::CanSubmit { created_by: owner.user_id };

        assert!(policy.evaluate(&owner));
        assert!(!policy.evaluate(&stranger));
        assert!(policy.evaluate(&stranger.clone().with_role(Role::MANAGER)));
        assert!(policy.evaluate(&stranger.with_role(Role::ADMIN)));
    }

    #[test]
    fn edit_is_creator_only() {
        let owner = user();
        let admin = user().with_role(Role::ADMIN);
        let policy = Policy::CanEdit { created_by: owner.user_id };

        assert!(policy.evaluate(&owner));
        assert!(!policy.evaluate(&admin));
    }

    #[test]
    fn role_names_are_case_sensitive() {
        let p = user().with_role(Role::new("admin"));
        assert!(!Policy::CanExport.evaluate(&p));
    }
}
