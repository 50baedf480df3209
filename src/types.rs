//! Common types shared by the index implementations.

/// Index/label type: 64-bit signed, so a reserved negative value can mark
/// empty result slots.
pub type Idx = i64;

/// Sentinel label written into result slots that no candidate filled.
pub const NO_LABEL: Idx = -1;

/// Caller-supplied predicate restricting a search to a subset of stored ids.
///
/// The engine treats the selection as opaque: an id is scanned if and only
/// if `is_member` returns true for it.
pub trait IdSelector: Send + Sync {
    /// Whether the stored vector with this id participates in the search.
    fn is_member(&self, id: Idx) -> bool;
}

impl<F> IdSelector for F
where
    F: Fn(Idx) -> bool + Send + Sync,
{
    fn is_member(&self, id: Idx) -> bool {
        self(id)
    }
}

/// Optional per-call search parameters.
///
/// Consumed, not defined, by this engine: the selector (if any) is honored
/// by `search` and `range_search` to restrict the scan.
#[derive(Default, Clone, Copy)]
pub struct SearchParameters<'a> {
    /// Restricts the scan to ids accepted by this selector.
    pub selector: Option<&'a dyn IdSelector>,
}

impl std::fmt::Debug for SearchParameters<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameters")
            .field("selector", &self.selector.map(|_| "<predicate>"))
            .finish()
    }
}
