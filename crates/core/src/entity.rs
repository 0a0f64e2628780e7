//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A price interval keeps its identity while the reconciler narrows its
/// boundaries; that continuity is what distinguishes an update from a
/// delete-and-insert.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
