//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Domain
/// modules use them for validated inputs (an order title, a money amount) so that
/// an invalid value can never be constructed.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Title(String);
///
/// impl ValueObject for Title {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
