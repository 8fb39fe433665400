use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use orderdesk_core::{AggregateRoot, AuditLogId, OrderId};
use orderdesk_orders::{AuditLog, Order};

use super::r#trait::{AuditQuery, Committed, OrderChange, OrderStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    audit: Vec<AuditLog>,
}

/// In-memory order store.
///
/// Intended for tests/dev. A single write lock covers the version check, the
/// order write and the audit append, so a commit is all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    state: RwLock<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored audit entries.
    pub fn audit_len(&self) -> usize {
        self.state.read().map(|s| s.audit.len()).unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn commit(&self, work: UnitOfWork) -> Result<Committed, StoreError> {
        work.check()?;

        let mut state = self.state.write().map_err(|_| poisoned())?;

        // Validate everything before the first write.
        match &work.order {
            Some(OrderChange::Insert(order)) => {
                if state.orders.contains_key(order.id()) {
                    return Err(StoreError::Integrity(format!(
                        "order {} already exists",
                        order.id()
                    )));
                }
            }
            Some(OrderChange::Update {
                order,
                expected_version,
            }) => {
                let stored = state
                    .orders
                    .get(order.id())
                    .ok_or(StoreError::NotFound(*order.id()))?;
                if stored.version() != *expected_version {
                    return Err(StoreError::Concurrency(format!(
                        "order {}: expected version {}, found {}",
                        order.id(),
                        expected_version,
                        stored.version()
                    )));
                }
            }
            None => {}
        }

        let order = work.order.map(|change| {
            let order = match change {
                OrderChange::Insert(order) => order,
                OrderChange::Update { order, .. } => order,
            };
            state.orders.insert(*order.id(), order.clone());
            order
        });

        let audit = work.audit.into_log(AuditLogId::new(), Utc::now());
        state.audit.push(audit.clone());

        Ok(Committed { order, audit })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| (o.created_at(), *o.id()));
        Ok(orders)
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|log| query.matches(log))
            .take(query.limit)
            .cloned()
            .collect())
    }
}
