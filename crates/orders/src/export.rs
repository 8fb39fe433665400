//! CSV rendering for the order export.
//!
//! Every field is quoted and embedded quotes are doubled, so titles with commas,
//! quotes or newlines survive a round trip through any spreadsheet.

use chrono::{DateTime, Utc};

use orderdesk_core::AggregateRoot;

use crate::Order;

pub const CSV_HEADER: &str = "Id,Title,Amount,Status,CreatedBy,CreatedAtUtc,ApprovedAtUtc";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render orders as CSV, oldest first.
pub fn render_orders_csv(orders: &[Order]) -> String {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by_key(|o| (o.created_at(), *o.id()));

    let mut out = String::with_capacity(64 * (sorted.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for order in sorted {
        let fields = [
            order.id().to_string(),
            order.title().as_str().to_string(),
            order.amount().to_string(),
            order.status().as_str().to_string(),
            order.created_by().to_string(),
            timestamp(order.created_at()),
            order.approved_at().map(timestamp).unwrap_or_default(),
        ];

        let line: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
