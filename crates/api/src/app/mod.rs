//! HTTP API application wiring (Axum router + service wiring).
//!
//! This folder is structured like:
//! - `services.rs`: infrastructure wiring (order store, identity directory, lifecycle)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and header/query parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use orderdesk_auth::{Hs256JwtValidator, JwtValidator};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub async fn build_app(config: ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(&config).await?;
    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    Ok(router(services, jwt))
}

/// Router over already-built services.
pub fn router(services: services::AppServices, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState {
        jwt,
        identity: services.identity.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::request_logging)))
}
