//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Unlike [`crate::AggregateRoot`], an entity carries no version: append-only
/// records (such as audit entries) are written once and never change.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
