use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderdesk_core::{AggregateRoot, DomainError, DomainResult, OrderId, UserId, ValueObject};

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 120;

/// Maximum order amount (inclusive).
pub const AMOUNT_MAX: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Order status lifecycle.
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Approved => "Approved",
            OrderStatus::Rejected => "Rejected",
        }
    }

    /// Stable storage code.
    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::Draft => 0,
            OrderStatus::Submitted => 1,
            OrderStatus::Approved => 2,
            OrderStatus::Rejected => 3,
        }
    }

    pub fn from_code(code: i16) -> DomainResult<Self> {
        match code {
            0 => Ok(OrderStatus::Draft),
            1 => Ok(OrderStatus::Submitted),
            2 => Ok(OrderStatus::Approved),
            3 => Ok(OrderStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown order status code {other}"))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::Rejected)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated order title: non-blank, at most 120 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderTitle(String);

impl ValueObject for OrderTitle {}

impl OrderTitle {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("title is required"));
        }
        if trimmed.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "title must be at most {TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderTitle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<OrderTitle> for String {
    fn from(value: OrderTitle) -> Self {
        value.0
    }
}

/// Validated order amount: 0..=1,000,000 with at most two fractional digits.
///
/// Always held at scale 2, matching `decimal(18,2)` storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl ValueObject for Amount {}

impl Amount {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        if value > AMOUNT_MAX {
            return Err(DomainError::validation("amount must be at most 1000000"));
        }
        let normalized = if value.is_zero() { Decimal::ZERO } else { value.normalize() };
        if normalized.scale() > 2 {
            return Err(DomainError::validation(
                "amount must have at most two fractional digits",
            ));
        }
        let mut scaled = normalized;
        scaled.rescale(2);
        Ok(Self(scaled))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A requested state change on an existing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTransition {
    /// Replace title and amount (Draft only).
    Edit { title: OrderTitle, amount: Amount },
    Submit,
    Approve,
    Reject,
}

impl OrderTransition {
    pub fn name(&self) -> &'static str {
        match self {
            OrderTransition::Edit { .. } => "edit",
            OrderTransition::Submit => "submit",
            OrderTransition::Approve => "approve",
            OrderTransition::Reject => "reject",
        }
    }
}

/// Flat, storage-friendly view of an order.
///
/// Persistence adapters read and write this; [`Order::restore`] re-checks the
/// invariants before handing an `Order` back to the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub title: String,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_by_user_id: UserId,
    pub created_at_utc: DateTime<Utc>,
    pub approved_at_utc: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Aggregate root: Order.
///
/// # Invariants
/// - `approved_at_utc` is set iff `status == Approved`.
/// - `created_by_user_id` and `created_at_utc` never change after creation.
/// - Every state change bumps `version` by exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    title: OrderTitle,
    amount: Amount,
    status: OrderStatus,
    created_by_user_id: UserId,
    created_at_utc: DateTime<Utc>,
    approved_at_utc: Option<DateTime<Utc>>,
    version: u64,
}

impl Order {
    /// Create a new Draft order at version 1.
    pub fn create(
        id: OrderId,
        title: OrderTitle,
        amount: Amount,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            amount,
            status: OrderStatus::Draft,
            created_by_user_id: created_by,
            created_at_utc: now,
            approved_at_utc: None,
            version: 1,
        }
    }

    /// Rebuild an order from storage.
    pub fn restore(snapshot: OrderSnapshot) -> DomainResult<Self> {
        let approved = snapshot.status == OrderStatus::Approved;
        if approved != snapshot.approved_at_utc.is_some() {
            return Err(DomainError::validation(format!(
                "order {} has status {} but approved_at_utc {:?}",
                snapshot.id, snapshot.status, snapshot.approved_at_utc
            )));
        }

        Ok(Self {
            id: snapshot.id,
            title: OrderTitle::parse(snapshot.title)?,
            amount: Amount::new(snapshot.amount)?,
            status: snapshot.status,
            created_by_user_id: snapshot.created_by_user_id,
            created_at_utc: snapshot.created_at_utc,
            approved_at_utc: snapshot.approved_at_utc,
            version: snapshot.version,
        })
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            title: self.title.as_str().to_string(),
            amount: self.amount.value(),
            status: self.status,
            created_by_user_id: self.created_by_user_id,
            created_at_utc: self.created_at_utc,
            approved_at_utc: self.approved_at_utc,
            version: self.version,
        }
    }

    pub fn title(&self) -> &OrderTitle {
        &self.title
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_by(&self) -> UserId {
        self.created_by_user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at_utc
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at_utc
    }

    /// Decide the next state for a transition.
    ///
    /// Pure: `self` is untouched and the returned order carries `version + 1`.
    pub fn apply_transition(
        &self,
        transition: &OrderTransition,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        let mut next = self.clone();

        match transition {
            OrderTransition::Edit { title, amount } => {
                self.require_status(OrderStatus::Draft, transition)?;
                next.title = title.clone();
                next.amount = *amount;
            }
            OrderTransition::Submit => {
                self.require_status(OrderStatus::Draft, transition)?;
                next.status = OrderStatus::Submitted;
            }
            OrderTransition::Approve => {
                self.require_status(OrderStatus::Submitted, transition)?;
                next.status = OrderStatus::Approved;
                next.approved_at_utc = Some(now);
            }
            OrderTransition::Reject => {
                self.require_status(OrderStatus::Submitted, transition)?;
                next.status = OrderStatus::Rejected;
            }
        }

        next.version = self.version + 1;
        Ok(next)
    }

    fn require_status(&self, expected: OrderStatus, transition: &OrderTransition) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(format!(
                "cannot {} an order in status {} (requires {})",
                transition.name(),
                self.status,
                expected
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn draft() -> Order {
        Order::create(
            OrderId::new(),
            OrderTitle::parse("Laptop").unwrap(),
            Amount::new(dec("1200.00")).unwrap(),
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn title_validation() {
        assert!(OrderTitle::parse("   ").is_err());
        assert!(OrderTitle::parse("x".repeat(120)).is_ok());
        assert!(OrderTitle::parse("x".repeat(121)).is_err());
        assert_eq!(OrderTitle::parse("  Desk  ").unwrap().as_str(), "Desk");
    }

    #[test]
    fn amount_validation() {
        assert!(Amount::new(dec("-0.01")).is_err());
        assert!(Amount::new(dec("1000000.01")).is_err());
        assert!(Amount::new(dec("1.005")).is_err());
        assert_eq!(Amount::new(dec("0")).unwrap().to_string(), "0.00");
        assert_eq!(Amount::new(dec("1000000")).unwrap().to_string(), "1000000.00");
        assert_eq!(Amount::new(dec("12.5000")).unwrap().to_string(), "12.50");
    }

    #[test]
    fn happy_path_draft_submit_approve() {
        let order = draft();
        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.version(), 1);

        let submitted = order.apply_transition(&OrderTransition::Submit, Utc::now()).unwrap();
        assert_eq!(submitted.status(), OrderStatus::Submitted);
        assert_eq!(submitted.version(), 2);
        assert!(submitted.approved_at().is_none());

        let now = Utc::now();
        let approved = submitted.apply_transition(&OrderTransition::Approve, now).unwrap();
        assert_eq!(approved.status(), OrderStatus::Approved);
        assert_eq!(approved.approved_at(), Some(now));
        assert_eq!(approved.version(), 3);
        assert_eq!(approved.created_by(), order.created_by());
        assert_eq!(approved.created_at(), order.created_at());
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let submitted = draft().apply_transition(&OrderTransition::Submit, Utc::now()).unwrap();
        let rejected = submitted.apply_transition(&OrderTransition::Reject, Utc::now()).unwrap();
        assert!(rejected.status().is_terminal());

        for t in [OrderTransition::Submit, OrderTransition::Approve, OrderTransition::Reject] {
            let err = rejected.apply_transition(&t, Utc::now()).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition(_)));
        }
    }

    #[test]
    fn edit_is_draft_only() {
        let edit = OrderTransition::Edit {
            title: OrderTitle::parse("Monitor").unwrap(),
            amount: Amount::new(dec("300")).unwrap(),
        };
        let edited = draft().apply_transition(&edit, Utc::now()).unwrap();
        assert_eq!(edited.title().as_str(), "Monitor");

        let submitted = edited.apply_transition(&OrderTransition::Submit, Utc::now()).unwrap();
        let err = submitted.apply_transition(&edit, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn restore_rejects_broken_approval_invariant() {
        let mut snap = draft().snapshot();
        snap.status = OrderStatus::Approved;
        assert!(Order::restore(snap.clone()).is_err());

        snap.approved_at_utc = Some(Utc::now());
        let restored = Order::restore(snap.clone()).unwrap();
        assert_eq!(restored.snapshot(), snap);
    }

    #[test]
    fn status_codes_are_stable() {
        for s in [
            OrderStatus::Draft,
            OrderStatus::Submitted,
            OrderStatus::Approved,
            OrderStatus::Rejected,
        ] {
            assert_eq!(OrderStatus::from_code(s.code()).unwrap(), s);
        }
        assert!(OrderStatus::from_code(9).is_err());
    }

    fn arb_transition() -> impl Strategy<Value = OrderTransition> {
        prop_oneof![
            Just(OrderTransition::Submit),
            Just(OrderTransition::Approve),
            Just(OrderTransition::Reject),
            Just(OrderTransition::Edit {
                title: OrderTitle::parse("Chair").unwrap(),
                amount: Amount::new(Decimal::new(4999, 2)).unwrap(),
            }),
        ]
    }

    proptest! {
        #[test]
        fn approved_at_is_set_iff_approved(transitions in prop::collection::vec(arb_transition(), 0..12)) {
            let mut order = draft();
            for t in transitions {
                if let Ok(next) = order.apply_transition(&t, Utc::now()) {
                    prop_assert_eq!(next.version(), order.version() + 1);
                    order = next;
                }
                prop_assert_eq!(order.approved_at().is_some(), order.status() == OrderStatus::Approved);
            }
        }

        #[test]
        fn submit_outside_draft_is_always_invalid(transitions in prop::collection::vec(arb_transition(), 1..8)) {
            let mut order = draft();
            for t in transitions {
                if let Ok(next) = order.apply_transition(&t, Utc::now()) {
                    order = next;
                }
            }
            if order.status() != OrderStatus::Draft {
                let err = order.apply_transition(&OrderTransition::Submit, Utc::now()).unwrap_err();
                prop_assert!(matches!(err, DomainError::InvalidTransition(_)));
            }
        }
    }
}
