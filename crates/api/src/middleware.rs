use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, error, info_span, Instrument};

use orderdesk_auth::{JwtClaims, JwtValidator, Principal};
use orderdesk_infra::IdentityDirectory;

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, PrincipalSource};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub identity: Arc<dyn IdentityDirectory>,
}

/// Validate the bearer token and attach a [`PrincipalContext`].
///
/// Known subjects (by id, then by user name) get their roles and claims from
/// the identity directory; unknown subjects keep the ones carried by the token.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return unauthorized("missing or malformed bearer token");
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "rejected bearer token");
            return unauthorized(e.to_string());
        }
    };

    let context = match resolve_principal(state.identity.as_ref(), &claims).await {
        Ok(context) => context,
        Err(e) => {
            error!(error = %e, "identity lookup failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "identity_error",
                "identity lookup failed",
            );
        }
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

async fn resolve_principal(
    identity: &dyn IdentityDirectory,
    claims: &JwtClaims,
) -> Result<PrincipalContext, orderdesk_infra::IdentityError> {
    let record = match identity.find_user(claims.sub).await? {
        Some(record) => Some(record),
        None => identity.find_by_name(&claims.name).await?,
    };

    Ok(match record {
        Some(record) => PrincipalContext::new(record.principal(), PrincipalSource::Directory),
        None => PrincipalContext::new(Principal::from(claims), PrincipalSource::Token),
    })
}

/// One span per request with method, path and final status.
pub async fn request_logging(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let span = info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let started = std::time::Instant::now();
        let response = next.run(req).await;
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
    .instrument(span)
    .await
}

fn unauthorized(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        return None;
    }

    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  abc.def.ghi "),
        );
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_schemes_are_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer    "),
        );
        assert_eq!(extract_bearer(&headers), None);
    }
}
