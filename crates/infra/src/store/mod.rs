//! Transactional order + audit storage boundary.
//!
//! Every write goes through [`OrderStore::commit`] with a [`UnitOfWork`]: at most
//! one order change plus exactly one audit entry, persisted together or not at
//! all.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use r#trait::{AuditQuery, Committed, OrderChange, OrderStore, StoreError, UnitOfWork};
