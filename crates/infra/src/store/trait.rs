use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use orderdesk_core::{AggregateRoot, OrderId};
use orderdesk_orders::{AuditAction, AuditLog, NewAuditEntry, Order};

/// The order side of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    /// Persist a brand new order (version 1).
    Insert(Order),
    /// Replace a stored order, compare-and-swapping on its version.
    Update { order: Order, expected_version: u64 },
}

impl OrderChange {
    pub fn order(&self) -> &Order {
        match self {
            OrderChange::Insert(order) => order,
            OrderChange::Update { order, .. } => order,
        }
    }
}

/// One atomic write: an optional order change and the audit entry describing it.
///
/// Every constructor requires the audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub order: Option<OrderChange>,
    pub audit: NewAuditEntry,
}

impl UnitOfWork {
    pub fn insert(order: Order, audit: NewAuditEntry) -> Self {
        Self {
            order: Some(OrderChange::Insert(order)),
            audit,
        }
    }

    pub fn update(order: Order, expected_version: u64, audit: NewAuditEntry) -> Self {
        Self {
            order: Some(OrderChange::Update {
                order,
                expected_version,
            }),
            audit,
        }
    }

    /// A non-order event (e.g. an export).
    pub fn audit_only(audit: NewAuditEntry) -> Self {
        Self { order: None, audit }
    }

    /// Structural checks every backend runs before touching storage.
    pub fn check(&self) -> Result<(), StoreError> {
        self.audit
            .validate()
            .map_err(|e| StoreError::Integrity(e.to_string()))?;

        if let Some(change) = &self.order {
            let id = *change.order().id();
            if self.audit.order_id != Some(id) {
                return Err(StoreError::Integrity(format!(
                    "audit entry for order {id} references {:?}",
                    self.audit.order_id
                )));
            }
        }

        match &self.order {
            Some(OrderChange::Insert(order)) if order.version() != 1 => Err(StoreError::Integrity(
                format!("new order {} must start at version 1", order.id()),
            )),
            Some(OrderChange::Update {
                order,
                expected_version,
            }) if order.version() != expected_version + 1 => Err(StoreError::Integrity(format!(
                "order {} version {} does not follow expected version {}",
                order.id(),
                order.version(),
                expected_version
            ))),
            _ => Ok(()),
        }
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub order: Option<Order>,
    pub audit: AuditLog,
}

/// Audit trail query (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub order_id: Option<OrderId>,
    pub action: Option<AuditAction>,
    pub limit: usize,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn matches(&self, log: &AuditLog) -> bool {
        self.order_id.is_none_or(|id| log.order_id == Some(id))
            && self.action.is_none_or(|a| log.action == a)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            order_id: None,
            action: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stored version no longer matches the expected one.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// An update targeted an order that does not exist.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The unit of work or a stored row violates a storage invariant.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The backend itself failed (connection, lock poisoning, etc.).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence collaborator for orders and the audit trail.
///
/// Implementations must:
/// - apply the order change and append the audit entry atomically
/// - reject an `Update` whose `expected_version` is stale with `Concurrency`
/// - assign audit ids and `occurred_at_utc` at append time
/// - never expose a way to modify or delete an audit entry
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn commit(&self, work: UnitOfWork) -> Result<Committed, StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>, StoreError>;
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn commit(&self, work: UnitOfWork) -> Result<Committed, StoreError> {
        (**self).commit(work).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get_order(id).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        (**self).list_orders().await
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>, StoreError> {
        (**self).list_audit(query).await
    }
}
