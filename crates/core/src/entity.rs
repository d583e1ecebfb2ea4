//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Human-facing unique key (account code, entry number, SKU), if any.
    ///
    /// Stores index entities by this key and refuse two live rows sharing it.
    fn natural_key(&self) -> Option<String> {
        None
    }
}
