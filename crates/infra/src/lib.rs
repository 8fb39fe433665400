//! Infrastructure layer: order/audit stores, identity directory, lifecycle orchestration.

pub mod audit_recorder;
pub mod identity;
pub mod lifecycle;
pub mod seed;
pub mod store;


pub use audit_recorder::AuditRecorder;
pub use identity::{IdentityDirectory, IdentityError, InMemoryIdentityDirectory, UserRecord};
pub use lifecycle::{LifecycleError, OrderExport, OrderLifecycle};
pub use seed::{seed_demo_accounts, DemoAccount, DEMO_ACCOUNTS};
pub use store::{
    AuditQuery, Committed, InMemoryOrderStore, OrderChange, OrderStore, PostgresOrderStore,
    StoreError, UnitOfWork,
};
