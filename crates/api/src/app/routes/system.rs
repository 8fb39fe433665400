use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use orderdesk_auth::{explain_authorization, Policy};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Resolved principal plus the outcome of every principal-only policy.
pub async fn whoami(Extension(ctx): Extension<PrincipalContext>) -> impl IntoResponse {
    let principal = ctx.principal();
    let policies: Vec<_> = Policy::STATIC
        .iter()
        .map(|policy| explain_authorization(principal, policy))
        .map(|e| {
            serde_json::json!({
                "policy": e.policy,
                "granted": e.granted,
                "reason": e.reason,
            })
        })
        .collect();

    Json(serde_json::json!({
        "user_id": principal.user_id.to_string(),
        "user_name": principal.user_name,
        "roles": principal.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "claims": principal.claims.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        "source": ctx.source(),
        "policies": policies,
    }))
}
