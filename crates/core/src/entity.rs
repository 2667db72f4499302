//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Publishers, books, stores and inventory rows are entities: two records with
/// identical fields but different ids are different records.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
