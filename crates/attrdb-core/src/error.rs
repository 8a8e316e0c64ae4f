use crate::db::store::{BlobError, ExecutorError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// The facade converts this into its public error; callers inside the
/// workspace branch on `class`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach query context (domain + query text) to this error.
    #[must_use]
    pub fn with_query(mut self, domain: impl Into<String>, query: impl Into<String>) -> Self {
        self.detail = Some(ErrorDetail::Query {
            domain: domain.into(),
            query: query.into(),
        });
        self
    }

    /// Wrap a failed select call. Selects never fail with a version conflict,
    /// so every executor failure here is a persistence failure.
    pub(crate) fn select_failed(
        origin: ErrorOrigin,
        domain: &str,
        query: &str,
        err: &ExecutorError,
    ) -> Self {
        Self::new(
            ErrorClass::PersistenceFailure,
            origin,
            format!("query failed: domain={domain} -> {query}: {err}"),
        )
        .with_query(domain, query)
    }

    /// Wrap a failed put/delete call, separating version-precondition
    /// rejections from transport failures.
    pub(crate) fn write_failed(domain: &str, item: &str, op: &str, err: &ExecutorError) -> Self {
        let class = match err {
            ExecutorError::ConditionFailed { .. } => ErrorClass::ConcurrentModification,
            _ => ErrorClass::PersistenceFailure,
        };

        Self::new(
            class,
            ErrorOrigin::Save,
            format!("{op} failed: domain={domain} item={item}: {err}"),
        )
        .with_query(domain, format!("{op} {item}"))
    }

    pub(crate) fn blob_failed(key: &str, err: &BlobError) -> Self {
        Self::new(
            ErrorClass::PersistenceFailure,
            ErrorOrigin::Blob,
            format!("lob offload failed for key '{key}': {err}"),
        )
    }

    pub(crate) fn query_inconsistency(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::QueryInconsistency,
            ErrorOrigin::Cursor,
            message,
        )
    }

    pub(crate) fn over_fetch(requested: u32, received: usize) -> Self {
        Self::new(
            ErrorClass::OverFetch,
            ErrorOrigin::Cursor,
            format!("got more results than the limit: requested {requested}, received {received}"),
        )
    }

    pub(crate) fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            ErrorClass::IndexOutOfRange,
            ErrorOrigin::Cursor,
            format!("index {index} out of range for result set of length {len}"),
        )
    }

    pub(crate) fn encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Encoding, ErrorOrigin::Codec, message)
    }

    #[must_use]
    pub const fn is_concurrent_modification(&self) -> bool {
        matches!(self.class, ErrorClass::ConcurrentModification)
    }

    /// Query text recorded for store-call failures, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match &self.detail {
            Some(ErrorDetail::Query { query, .. }) => Some(query),
            None => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("domain={domain} query={query}")]
    Query { domain: String, query: String },
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Transport or query failure reported by the store.
    PersistenceFailure,
    /// Version precondition rejected by the store.
    ConcurrentModification,
    /// Offset or limit overshoot reported by the store.
    QueryInconsistency,
    /// A field value could not be encoded.
    Encoding,
    /// Index beyond the final result set.
    IndexOutOfRange,
    /// The store returned more items than the requested window.
    OverFetch,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PersistenceFailure => "persistence_failure",
            Self::ConcurrentModification => "concurrent_modification",
            Self::QueryInconsistency => "query_inconsistency",
            Self::Encoding => "encoding",
            Self::IndexOutOfRange => "index_out_of_range",
            Self::OverFetch => "over_fetch",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Cursor,
    Save,
    Codec,
    Blob,
    Listener,
    Identity,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cursor => "cursor",
            Self::Save => "save",
            Self::Codec => "codec",
            Self::Blob => "blob",
            Self::Listener => "listener",
            Self::Identity => "identity",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
