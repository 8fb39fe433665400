use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use orderdesk_core::AggregateRoot;
use orderdesk_orders::Order;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/export.csv", get(export_orders))
        .route("/:id", get(get_order).put(update_order))
        .route("/:id/submit", post(submit_order))
        .route("/:id/approve", post(approve_order))
        .route("/:id/reject", post(reject_order))
}

/// JSON body plus an `ETag` carrying the version to send back as `If-Match`.
fn order_response(status: StatusCode, order: &Order) -> axum::response::Response {
    let mut res = (status, Json(dto::OrderResponse::from(order))).into_response();
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", order.version())) {
        res.headers_mut().insert(header::ETAG, etag);
    }
    res
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    match services
        .lifecycle
        .create(ctx.principal(), &body.title, body.amount)
        .await
    {
        Ok(order) => order_response(StatusCode::CREATED, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_orders(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.lifecycle.list().await {
        Ok(orders) => {
            let body: Vec<dto::OrderResponse> = orders.iter().map(dto::OrderResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match dto::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.lifecycle.get(order_id).await {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::UpdateOrderRequest>,
) -> axum::response::Response {
    let order_id = match dto::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let expected = match dto::expected_version(&headers, body.expected_version) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .lifecycle
        .update(order_id, ctx.principal(), &body.title, body.amount, expected)
        .await
    {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn submit_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let order_id = match dto::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body: dto::TransitionRequest = match dto::optional_json_body(&body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let expected = match dto::expected_version(&headers, body.expected_version) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.lifecycle.submit(order_id, ctx.principal(), expected).await {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn approve_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let order_id = match dto::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body: dto::TransitionRequest = match dto::optional_json_body(&body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let expected = match dto::expected_version(&headers, body.expected_version) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.lifecycle.approve(order_id, ctx.principal(), expected).await {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn reject_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let order_id = match dto::parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body: dto::RejectRequest = match dto::optional_json_body(&body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let expected = match dto::expected_version(&headers, body.expected_version) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .lifecycle
        .reject(order_id, ctx.principal(), expected, body.reason.as_deref())
        .await
    {
        Ok(order) => order_response(StatusCode::OK, &order),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn export_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.lifecycle.export_orders(ctx.principal()).await {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"Orders.csv\""),
            ],
            export.csv,
        )
            .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
