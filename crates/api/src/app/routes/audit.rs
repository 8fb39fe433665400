use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    Json,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// `GET /audit?order_id=&action=&limit=` (newest first).
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(params): Query<dto::AuditQueryParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(res) => return res,
    };

    match services.lifecycle.list_audit(ctx.principal(), &query).await {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
