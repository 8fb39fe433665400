//! Audit recorder: builds audit entries from the acting principal and appends
//! non-order events directly.
//!
//! Order mutations do not call [`AuditRecorder::append`]; the lifecycle bundles
//! the entry from [`AuditRecorder::entry`] into the same unit of work as the
//! order write.

use tracing::debug;

use orderdesk_auth::Principal;
use orderdesk_core::OrderId;
use orderdesk_orders::{Actor, AuditAction, AuditLog, NewAuditEntry};

use crate::lifecycle::LifecycleError;
use crate::store::{AuditQuery, OrderStore, UnitOfWork};

#[derive(Debug, Clone)]
pub struct AuditRecorder<S> {
    store: S,
}

impl<S> AuditRecorder<S>
where
    S: OrderStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Describe an event. Without a principal the entry is system-originated.
    pub fn entry(
        &self,
        action: AuditAction,
        order_id: Option<OrderId>,
        details: Option<String>,
        principal: Option<&Principal>,
    ) -> NewAuditEntry {
        let actor = principal
            .map(|p| Actor::user(p.user_id, p.user_name.clone()))
            .unwrap_or_else(Actor::system);
        NewAuditEntry::new(action, order_id, details, actor)
    }

    /// Append a stand-alone audit entry. No retries.
    pub async fn append(
        &self,
        action: AuditAction,
        order_id: Option<OrderId>,
        details: Option<String>,
        principal: Option<&Principal>,
    ) -> Result<AuditLog, LifecycleError> {
        let entry = self.entry(action, order_id, details, principal);
        entry.validate()?;

        let committed = self.store.commit(UnitOfWork::audit_only(entry)).await?;
        debug!(audit_id = %committed.audit.id, action = %committed.audit.action, "audit appended");
        Ok(committed.audit)
    }

    /// Newest first. The limit is clamped to `1..=AuditQuery::MAX_LIMIT`.
    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditLog>, LifecycleError> {
        let query = AuditQuery {
            limit: query.limit.clamp(1, AuditQuery::MAX_LIMIT),
            ..query.clone()
        };
        Ok(self.store.list_audit(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::InMemoryOrderStore;
    use orderdesk_core::UserId;

    #[tokio::test]
    async fn append_captures_the_principal() {
        let store = Arc::new(InMemoryOrderStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let principal = Principal::new(UserId::new(), "admin@demo.local");

        let log = recorder
            .append(AuditAction::Exported, None, Some("3 orders exported".into()), Some(&principal))
            .await
            .unwrap();

        assert_eq!(log.performed_by_user_id, Some(principal.user_id));
        assert_eq!(log.performed_by_user_name.as_deref(), Some("admin@demo.local"));
        assert_eq!(log.order_id, None);
        assert_eq!(store.audit_len(), 1);
    }

    #[tokio::test]
    async fn system_events_have_no_actor() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryOrderStore::new()));
        let log = recorder.append(AuditAction::Exported, None, None, None).await.unwrap();

        assert_eq!(log.performed_by_user_id, None);
        assert_eq!(log.performed_by_user_name, None);
    }

    #[tokio::test]
    async fn oversized_details_are_a_validation_error() {
        let store = Arc::new(InMemoryOrderStore::new());
        let recorder = AuditRecorder::new(store.clone());

        let err = recorder
            .append(AuditAction::Exported, None, Some("x".repeat(2001)), None)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(store.audit_len(), 0);
    }

    #[tokio::test]
    async fn list_clamps_zero_limit() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryOrderStore::new()));
        recorder.append(AuditAction::Exported, None, None, None).await.unwrap();
        recorder.append(AuditAction::Exported, None, None, None).await.unwrap();

        let logs = recorder
            .list(&AuditQuery {
                limit: 0,
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
    }
}
