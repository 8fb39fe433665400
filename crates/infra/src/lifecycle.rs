//! Order lifecycle controller (application-level orchestration).
//!
//! Every mutating operation follows the same pipeline:
//!
//! ```text
//! Principal + request
//!   ↓
//! 1. Authorize (named policy; approve/reject check this first)
//!   ↓
//! 2. Load the order (NotFound)
//!   ↓
//! 3. Decide the transition (pure, produces the next order state)
//!   ↓
//! 4. Authorize ownership-aware policies (submit/edit)
//!   ↓
//! 5. Check the presented concurrency token against the loaded version
//!   ↓
//! 6. Commit order write + audit entry as one unit of work
//! ```
//!
//! A transition that the current status forbids is `InvalidTransition` whatever
//! token was presented. The store compare-and-swaps on the version at commit, so
//! two callers that read the same version cannot both win: the loser gets
//! `ConcurrencyConflict`.
//!
//! This module contains no IO itself; it composes the [`OrderStore`] trait.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};

use orderdesk_auth::{authorize, explain_authorization, Policy, Principal};
use orderdesk_core::{AggregateRoot, DomainError, ExpectedVersion, OrderId};
use orderdesk_orders::{
    render_orders_csv, Amount, AuditAction, AuditLog, Order, OrderStatus, OrderTitle,
    OrderTransition,
};

use crate::audit_recorder::AuditRecorder;
use crate::store::{AuditQuery, OrderStore, StoreError, UnitOfWork};

/// Error returned by lifecycle operations.
///
/// Merges deterministic domain failures and storage failures so the API can map
/// them to HTTP in one place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LifecycleError::Validation(msg),
            DomainError::InvalidId(msg) => LifecycleError::Validation(msg),
            DomainError::InvalidTransition(msg) => LifecycleError::InvalidTransition(msg),
            DomainError::Conflict(msg) => LifecycleError::ConcurrencyConflict(msg),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => LifecycleError::ConcurrencyConflict(msg),
            StoreError::NotFound(id) => LifecycleError::NotFound(format!("order {id}")),
            StoreError::Integrity(msg) | StoreError::Backend(msg) => LifecycleError::Storage(msg),
        }
    }
}

/// CSV export result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExport {
    pub csv: Vec<u8>,
    pub order_count: usize,
    pub audit: AuditLog,
}

/// Orchestrates Draft -> Submitted -> Approved/Rejected.
///
/// `S` is usually `Arc<dyn OrderStore>` (API) or `Arc<InMemoryOrderStore>` (tests).
#[derive(Debug, Clone)]
pub struct OrderLifecycle<S> {
    store: S,
    recorder: AuditRecorder<S>,
}

impl<S> OrderLifecycle<S>
where
    S: OrderStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            recorder: AuditRecorder::new(store.clone()),
            store,
        }
    }

    #[instrument(skip(self, principal, title), fields(user_id = %principal.user_id), err)]
    pub async fn create(
        &self,
        principal: &Principal,
        title: &str,
        amount: Decimal,
    ) -> Result<Order, LifecycleError> {
        let title = OrderTitle::parse(title)?;
        let amount = Amount::new(amount)?;

        let order = Order::create(OrderId::new(), title, amount, principal.user_id, Utc::now());
        let details = format!("title={}; amount={}", order.title().as_str(), order.amount());
        let audit = self.recorder.entry(
            AuditAction::Created,
            Some(*order.id()),
            Some(details),
            Some(principal),
        );
        audit.validate()?;

        let committed = self.store.commit(UnitOfWork::insert(order, audit)).await?;
        let order = committed_order(committed.order)?;
        info!(order_id = %order.id(), "order created");
        Ok(order)
    }

    /// Replace title and amount of a Draft order. Creator only.
    #[instrument(skip(self, principal, title), fields(user_id = %principal.user_id), err)]
    pub async fn update(
        &self,
        order_id: OrderId,
        principal: &Principal,
        title: &str,
        amount: Decimal,
        expected: ExpectedVersion,
    ) -> Result<Order, LifecycleError> {
        let current = self.load(order_id).await?;

        if current.status() != OrderStatus::Draft {
            return Err(LifecycleError::InvalidTransition(format!(
                "cannot edit an order in status {}",
                current.status()
            )));
        }

        require(
            principal,
            Policy::CanEdit {
                created_by: current.created_by(),
            },
        )?;

        let edit = OrderTransition::Edit {
            title: OrderTitle::parse(title)?,
            amount: Amount::new(amount)?,
        };
        let next = current.apply_transition(&edit, Utc::now())?;
        expected.check(current.version())?;

        let details = describe_changes(&current, &next);
        self.commit_transition(current, next, AuditAction::Updated, Some(details), principal, expected)
            .await
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn submit(
        &self,
        order_id: OrderId,
        principal: &Principal,
        expected: ExpectedVersion,
    ) -> Result<Order, LifecycleError> {
        let current = self.load(order_id).await?;
        let next = current.apply_transition(&OrderTransition::Submit, Utc::now())?;
        require(
            principal,
            Policy::CanSubmit {
                created_by: current.created_by(),
            },
        )?;
        expected.check(current.version())?;

        self.commit_transition(current, next, AuditAction::Submitted, None, principal, expected)
            .await
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn approve(
        &self,
        order_id: OrderId,
        principal: &Principal,
        expected: ExpectedVersion,
    ) -> Result<Order, LifecycleError> {
        require(principal, Policy::CanApprove)?;

        let current = self.load(order_id).await?;
        let next = current.apply_transition(&OrderTransition::Approve, Utc::now())?;
        expected.check(current.version())?;

        self.commit_transition(current, next, AuditAction::Approved, None, principal, expected)
            .await
    }

    /// Reject a submitted order. A blank reason is recorded as no reason.
    #[instrument(skip(self, principal, reason), fields(user_id = %principal.user_id), err)]
    pub async fn reject(
        &self,
        order_id: OrderId,
        principal: &Principal,
        expected: ExpectedVersion,
        reason: Option<&str>,
    ) -> Result<Order, LifecycleError> {
        require(principal, Policy::CanApprove)?;

        let current = self.load(order_id).await?;
        let next = current.apply_transition(&OrderTransition::Reject, Utc::now())?;
        expected.check(current.version())?;

        let details = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("reason: {r}"));
        self.commit_transition(current, next, AuditAction::Rejected, details, principal, expected)
            .await
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, LifecycleError> {
        self.load(order_id).await
    }

    /// All orders, oldest first.
    pub async fn list(&self) -> Result<Vec<Order>, LifecycleError> {
        Ok(self.store.list_orders().await?)
    }

    /// Render every order as CSV and record the export.
    ///
    /// A denied export appends nothing.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn export_orders(&self, principal: &Principal) -> Result<OrderExport, LifecycleError> {
        require(principal, Policy::CanExport)?;

        let orders = self.store.list_orders().await?;
        let csv = render_orders_csv(&orders).into_bytes();

        let audit = self
            .recorder
            .append(
                AuditAction::Exported,
                None,
                Some(format!("{} orders exported", orders.len())),
                Some(principal),
            )
            .await?;

        info!(order_count = orders.len(), "orders exported");
        Ok(OrderExport {
            csv,
            order_count: orders.len(),
            audit,
        })
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn list_audit(
        &self,
        principal: &Principal,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLog>, LifecycleError> {
        require(principal, Policy::CanViewAudit)?;
        self.recorder.list(query).await
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, LifecycleError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {order_id}")))
    }

    async fn commit_transition(
        &self,
        current: Order,
        next: Order,
        action: AuditAction,
        details: Option<String>,
        principal: &Principal,
        expected: ExpectedVersion,
    ) -> Result<Order, LifecycleError> {
        let audit = self
            .recorder
            .entry(action, Some(*current.id()), details, Some(principal));
        audit.validate()?;

        let expected_version = expected.pin(current.version());
        let committed = self
            .store
            .commit(UnitOfWork::update(next, expected_version, audit))
            .await?;

        let order = committed_order(committed.order)?;
        info!(
            order_id = %order.id(),
            action = %action,
            status = %order.status(),
            version = order.version(),
            "order transition committed"
        );
        Ok(order)
    }
}

/// Evaluate a policy, logging denials with the full explanation.
fn require(principal: &Principal, policy: Policy) -> Result<(), LifecycleError> {
    if authorize(principal, &policy) {
        return Ok(());
    }

    let explanation = explain_authorization(principal, &policy);
    warn!(
        policy = explanation.policy,
        granted = explanation.granted,
        user_id = %explanation.principal.user_id,
        roles = ?explanation.principal.roles,
        claims = ?explanation.principal.claims,
        reason = %explanation.reason,
        "authorization denied"
    );
    Err(LifecycleError::Forbidden(format!(
        "{} ({})",
        policy.name(),
        policy.description()
    )))
}

fn committed_order(order: Option<Order>) -> Result<Order, LifecycleError> {
    order.ok_or_else(|| LifecycleError::Storage("store did not return the committed order".to_string()))
}

fn describe_changes(before: &Order, after: &Order) -> String {
    let mut changes = Vec::new();
    if before.title() != after.title() {
        changes.push(format!(
            "title: '{}' -> '{}'",
            before.title().as_str(),
            after.title().as_str()
        ));
    }
    if before.amount() != after.amount() {
        changes.push(format!("amount: {} -> {}", before.amount(), after.amount()));
    }

    if changes.is_empty() {
        "no changes".to_string()
    } else {
        changes.join("; ")
    }
}
