//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances holding the same values
/// are the same value. They are immutable once constructed; a validating
/// constructor is the only way in.
///
/// - **Value Object**: `Isbn("0679723404")`, compared by its characters
/// - **Entity**: `Book { id: BookId(..), .. }`, compared by identity
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
