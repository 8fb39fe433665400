//! `orderdesk-auth`: pure authentication/authorization boundary.
//!
//! No HTTP and no storage here: bearer token validation, the principal model and
//! the named policies. Policy evaluation is a pure function of a principal snapshot.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, explain_authorization, AuthorizationExplanation};
pub use claims::{validate_claims, Claim, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use policy::Policy;
pub use principal::Principal;
pub use roles::Role;
