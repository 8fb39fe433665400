use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use orderdesk_core::{AggregateRoot, ExpectedVersion, OrderId, UserId};
use orderdesk_infra::AuditQuery;
use orderdesk_orders::{AuditAction, Order, OrderStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub title: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub title: String,
    pub amount: Decimal,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransitionRequest {
    pub expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    pub order_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

impl AuditQueryParams {
    pub fn into_query(self) -> Result<AuditQuery, axum::response::Response> {
        let order_id = self
            .order_id
            .map(|raw| parse_order_id(&raw))
            .transpose()?;
        let action = self
            .action
            .map(|raw| {
                raw.parse::<AuditAction>().map_err(|e| {
                    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
                })
            })
            .transpose()?;

        Ok(AuditQuery {
            order_id,
            action,
            limit: self.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT),
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub title: String,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_by_user_id: UserId,
    pub created_at_utc: DateTime<Utc>,
    pub approved_at_utc: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: *order.id(),
            title: order.title().as_str().to_string(),
            amount: order.amount().value(),
            status: order.status(),
            created_by_user_id: order.created_by(),
            created_at_utc: order.created_at(),
            approved_at_utc: order.approved_at(),
            version: order.version(),
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_order_id(raw: &str) -> Result<OrderId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

/// Decode an optional JSON body. Only an empty (or whitespace) body falls back to
/// `T::default()`; anything else must deserialize or the request is a 400.
pub fn optional_json_body<T>(bytes: &[u8]) -> Result<T, axum::response::Response>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid request body: {e}"),
        )
    })
}

/// Resolve the concurrency token from `If-Match` and/or the request body.
///
/// `If-Match` accepts `3`, `"3"` or `W/"3"`. When both are present they must agree.
pub fn expected_version(
    headers: &HeaderMap,
    body: Option<u64>,
) -> Result<ExpectedVersion, axum::response::Response> {
    let header = match headers.get(axum::http::header::IF_MATCH) {
        None => None,
        Some(value) => Some(parse_if_match(value.to_str().unwrap_or_default())?),
    };

    match (header, body) {
        (Some(h), Some(b)) if h != b => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("If-Match version {h} does not match expected_version {b}"),
        )),
        (h, b) => Ok(ExpectedVersion::from(h.or(b))),
    }
}

fn parse_if_match(raw: &str) -> Result<u64, axum::response::Response> {
    let trimmed = raw.trim();
    let unweak = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    unweak.trim_matches('"').parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("If-Match must be an order version, got '{trimmed}'"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(if_match: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::IF_MATCH, HeaderValue::from_static(if_match));
        h
    }

    #[test]
    fn if_match_accepts_bare_quoted_and_weak_versions() {
        for raw in ["3", "\"3\"", "W/\"3\""] {
            assert_eq!(
                expected_version(&headers(raw), None).unwrap(),
                ExpectedVersion::Exact(3)
            );
        }
    }

    #[test]
    fn missing_token_means_any() {
        assert_eq!(
            expected_version(&HeaderMap::new(), None).unwrap(),
            ExpectedVersion::Any
        );
        assert_eq!(
            expected_version(&HeaderMap::new(), Some(2)).unwrap(),
            ExpectedVersion::Exact(2)
        );
    }

    #[test]
    fn empty_transition_body_uses_defaults() {
        let body: TransitionRequest = optional_json_body(b"").unwrap();
        assert_eq!(body.expected_version, None);

        let body: RejectRequest = optional_json_body(b"  \n").unwrap();
        assert!(body.reason.is_none());

        let body: TransitionRequest = optional_json_body(br#"{"expected_version":4}"#).unwrap();
        assert_eq!(body.expected_version, Some(4));
    }

    #[test]
    fn malformed_transition_body_is_a_bad_request() {
        let bodies: [&[u8]; 3] = [br#"{"expected_version":"7"}"#, b"{", br#"{"reason":42}"#];
        for raw in bodies {
            let res = optional_json_body::<RejectRequest>(raw).unwrap_err();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn disagreeing_tokens_are_rejected() {
        let res = expected_version(&headers("3"), Some(4)).unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = expected_version(&headers("*"), None).unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
