use attrdb_core::{
    config::ConfigError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// True when a versioned write lost a race and should be reloaded.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::Update(UpdateErrorKind::Conflict))
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match err.class {
            ErrorClass::PersistenceFailure => ErrorKind::Store(StoreErrorKind::Unavailable),
            ErrorClass::ConcurrentModification => ErrorKind::Update(UpdateErrorKind::Conflict),
            ErrorClass::QueryInconsistency => ErrorKind::Query(QueryErrorKind::Inconsistent),
            ErrorClass::Encoding => ErrorKind::Update(UpdateErrorKind::Encoding),
            ErrorClass::IndexOutOfRange => ErrorKind::Query(QueryErrorKind::IndexOutOfRange),
            ErrorClass::OverFetch => ErrorKind::Query(QueryErrorKind::OverFetch),
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Query(QueryErrorKind),
    Update(UpdateErrorKind),
    Store(StoreErrorKind),

    /// Configuration could not be parsed or failed validation.
    Config,
}

///
/// QueryErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryErrorKind {
    /// The store counted past the requested offset.
    Inconsistent,

    /// The store returned more items than the requested window.
    OverFetch,

    /// Index beyond the final result set.
    IndexOutOfRange,
}

///
/// UpdateErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UpdateErrorKind {
    /// Version precondition rejected; another writer got there first.
    Conflict,

    /// A field value could not be encoded.
    Encoding,
}

///
/// StoreErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StoreErrorKind {
    Unavailable,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Cursor,
    Save,
    Codec,
    Blob,
    Listener,
    Identity,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Cursor => Self::Cursor,
            CoreErrorOrigin::Save => Self::Save,
            CoreErrorOrigin::Codec => Self::Codec,
            CoreErrorOrigin::Blob => Self::Blob,
            CoreErrorOrigin::Listener => Self::Listener,
            CoreErrorOrigin::Identity => Self::Identity,
        }
    }
}

///
/// TESTS
///
