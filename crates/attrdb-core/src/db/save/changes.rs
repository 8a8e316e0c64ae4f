use std::collections::BTreeSet;

///
/// ChangeSet
///
/// Explicit change tracker for managed entities. Records which fields were
/// set to null since the last successful write; `persist_tracked` turns them
/// into a single delete call and resets the set afterwards.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeSet {
    nulled: BTreeSet<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field` was set to null.
    pub fn mark_nulled(&mut self, field: impl Into<String>) {
        self.nulled.insert(field.into());
    }

    /// Record that `field` holds a value again.
    pub fn mark_set(&mut self, field: &str) {
        self.nulled.remove(field);
    }

    pub fn nulled(&self) -> impl Iterator<Item = &str> {
        self.nulled.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nulled.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nulled.len()
    }

    pub fn reset(&mut self) {
        self.nulled.clear();
    }
}
