//! Store collaborator boundary: the select/put/delete client and the blob
//! store used for lob offload. Implementations own transport, retries and
//! timeouts; the runtime never retries.

use thiserror::Error as ThisError;

/// Name of the synthetic projection returned by count queries.
pub const COUNT_ATTRIBUTE: &str = "count";

///
/// Attribute
/// One name/value pair; an item may carry several pairs with the same name.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

///
/// Item
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Item {
    /// Item key (the entity id).
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Item {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// All values stored under `name`, in store order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.name == name)
            .map(|a| a.value.as_str())
    }

    #[must_use]
    pub fn first<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.values(name).next()
    }
}

///
/// SelectPage
///

#[derive(Clone, Debug, Default)]
pub struct SelectPage {
    pub items: Vec<Item>,
    /// Continuation token; `None` means the result set is exhausted.
    pub next_token: Option<String>,
}

impl SelectPage {
    /// Sum of the synthetic count projection across the page.
    /// Unparseable count values are ignored.
    #[must_use]
    pub fn reported_count(&self) -> u64 {
        self.items
            .iter()
            .flat_map(|item| item.attributes.iter())
            .filter(|a| a.name.eq_ignore_ascii_case(COUNT_ATTRIBUTE))
            .filter_map(|a| a.value.trim().parse::<u64>().ok())
            .fold(0u64, u64::saturating_add)
    }
}

///
/// PutAttribute
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PutAttribute {
    pub name: String,
    pub value: String,
    /// Replace every prior value stored under `name`.
    pub replace: bool,
}

impl PutAttribute {
    pub fn replacing(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: true,
        }
    }

    pub fn appending(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: false,
        }
    }
}

///
/// Precondition
/// Conditional-write guard evaluated by the store.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Precondition {
    /// The attribute must currently hold exactly `value`.
    Equals { name: String, value: String },
    /// The attribute must not exist.
    NotExists { name: String },
}

///
/// ExecutorError
///

#[derive(Debug, ThisError)]
pub enum ExecutorError {
    /// A write precondition did not hold.
    #[error("conditional check failed: {message}")]
    ConditionFailed { message: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The store refused the request (malformed query, unknown domain, ...).
    #[error("request rejected: {message}")]
    Rejected { message: String },
}

///
/// QueryExecutor
///
/// Raw select/put/delete client. Calls are synchronous and blocking.
///

pub trait QueryExecutor: Send + Sync {
    fn select(
        &self,
        query: &str,
        token: Option<&str>,
        consistent_read: bool,
    ) -> Result<SelectPage, ExecutorError>;

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        puts: &[PutAttribute],
        precondition: Option<&Precondition>,
    ) -> Result<(), ExecutorError>;

    fn delete_attributes(
        &self,
        domain: &str,
        item: &str,
        names: &[String],
    ) -> Result<(), ExecutorError>;
}

///
/// BlobError
///

#[derive(Debug, ThisError)]
pub enum BlobError {
    #[error("blob store unavailable: {message}")]
    Unavailable { message: String },
}

///
/// BlobStore
///

pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;
}

///
/// TESTS
///
