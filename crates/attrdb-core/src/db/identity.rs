use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use std::sync::{Mutex, PoisonError};

///
/// IdentityGenerator
///

pub trait IdentityGenerator: Send + Sync {
    /// Return a globally unique item key.
    fn new_id(&self) -> Result<String, InternalError>;
}

///
/// UlidGenerator
///
/// Monotonic ULID source: ids generated within the same millisecond
/// increment the previous one, so keys sort in creation order.
///

pub struct UlidGenerator {
    inner: Mutex<ulid::Generator>,
}

impl UlidGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ulid::Generator::new()),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGenerator for UlidGenerator {
    fn new_id(&self) -> Result<String, InternalError> {
        let mut generator = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        generator.generate().map(|id| id.to_string()).map_err(|err| {
            InternalError::new(
                ErrorClass::PersistenceFailure,
                ErrorOrigin::Identity,
                format!("identity generator overflow: {err}"),
            )
        })
    }
}

///
/// TESTS
///
