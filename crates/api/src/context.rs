use serde::Serialize;

use orderdesk_auth::Principal;

/// Where the principal's roles and claims came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalSource {
    /// The subject is known to the identity directory.
    Directory,
    /// Unknown subject; roles and claims were taken from the token.
    Token,
}

/// Principal context for a request (authenticated identity + roles + claims).
///
/// Inserted by the auth middleware; handlers never see an unauthenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    source: PrincipalSource,
}

impl PrincipalContext {
    pub fn new(principal: Principal, source: PrincipalSource) -> Self {
        Self { principal, source }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn source(&self) -> PrincipalSource {
        self.source
    }
}
