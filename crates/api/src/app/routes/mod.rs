use axum::{routing::get, Router};

pub mod audit;
pub mod orders;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/audit", get(audit::list_audit))
        .nest("/orders", orders::router())
}
