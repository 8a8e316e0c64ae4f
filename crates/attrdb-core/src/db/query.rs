//! Module: query
//! Responsibility: immutable select specification and its text rendering.
//! Does not own: predicate construction (filters arrive as finished clauses).

///
/// QuerySpec
///
/// Immutable description of one select: domain, filter, ordering, window.
/// Limits and offsets are applied by the cursor, never rendered directly.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuerySpec {
    domain: String,
    filter: Option<String>,
    ordering: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    consistent_read: bool,
}

impl QuerySpec {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            filter: None,
            ordering: None,
            limit: None,
            offset: None,
            consistent_read: true,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, ordering: impl Into<String>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` matches. Zero is treated as no offset.
    #[must_use]
    pub const fn offset(mut self, offset: u32) -> Self {
        self.offset = if offset == 0 { None } else { Some(offset) };
        self
    }

    #[must_use]
    pub const fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub const fn get_limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub const fn get_offset(&self) -> Option<u32> {
        self.offset
    }

    #[must_use]
    pub const fn is_consistent_read(&self) -> bool {
        self.consistent_read
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Item-returning select text, without a limit clause.
    #[must_use]
    pub fn select_text(&self) -> String {
        self.render("*")
    }

    /// Count-only select text, without a limit clause.
    #[must_use]
    pub fn count_text(&self) -> String {
        self.render("count(*)")
    }

    fn render(&self, projection: &str) -> String {
        let mut text = format!("select {projection} from `{}`", self.domain);
        if let Some(filter) = &self.filter {
            text.push_str(" where ");
            text.push_str(filter);
        }
        if let Some(ordering) = &self.ordering {
            text.push_str(" order by ");
            text.push_str(ordering);
        }

        text
    }
}

/// Append a window clause to rendered select text.
#[must_use]
pub fn with_limit(text: &str, limit: u32) -> String {
    format!("{text} limit {limit}")
}

///
/// TESTS
///
