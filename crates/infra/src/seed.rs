//! Demo accounts provisioned at startup.
//!
//! Only roles and claims are provisioned; issuing credentials for these
//! accounts is left to whatever mints the bearer tokens.

use tracing::info;

use orderdesk_auth::{Claim, Role};

use crate::identity::{IdentityDirectory, IdentityError, UserRecord};

/// A seeded account: user name, roles, claims.
pub struct DemoAccount {
    pub user_name: &'static str,
    pub roles: &'static [Role],
    pub claims: &'static [Claim],
}

pub const SEED_ROLES: [Role; 3] = [Role::ADMIN, Role::MANAGER, Role::USER];

pub const DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        user_name: "admin@demo.local",
        roles: &[Role::ADMIN],
        claims: &[Claim::PERM_APPROVE, Claim::PERM_EXPORT],
    },
    DemoAccount {
        user_name: "manager@demo.local",
        roles: &[Role::MANAGER],
        claims: &[Claim::PERM_APPROVE],
    },
    DemoAccount {
        user_name: "user@demo.local",
        roles: &[Role::USER],
        claims: &[],
    },
];

/// Create the demo roles and accounts. Safe to run on every startup: accounts
/// that already exist are not modified.
pub async fn seed_demo_accounts<D>(directory: &D) -> Result<Vec<UserRecord>, IdentityError>
where
    D: IdentityDirectory + ?Sized,
{
    for role in &SEED_ROLES {
        if directory.ensure_role(role).await? {
            info!(role = %role, "seeded role");
        }
    }

    let mut seeded = Vec::with_capacity(DEMO_ACCOUNTS.len());
    for account in &DEMO_ACCOUNTS {
        let existed = directory.find_by_name(account.user_name).await?.is_some();

        let mut record = UserRecord::new(account.user_name);
        for role in account.roles {
            record = record.with_role(role.clone());
        }
        for claim in account.claims {
            record = record.with_claim(claim.clone());
        }

        let stored = directory.ensure_user(record).await?;
        if !existed {
            info!(user = %stored.user_name, user_id = %stored.id, "seeded demo account");
        }
        seeded.push(stored);
    }

    Ok(seeded)
}
