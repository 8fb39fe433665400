//! Orders domain module (purchase orders and their audit vocabulary).
//!
//! This crate contains business rules for orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage, no authorization).

pub mod audit;
pub mod export;
pub mod order;

pub use audit::{Actor, AuditAction, AuditLog, NewAuditEntry};
pub use export::{render_orders_csv, CSV_HEADER};
pub use order::{Amount, Order, OrderSnapshot, OrderStatus, OrderTitle, OrderTransition};
