use crate::{error::InternalError, traits::Entity};
use derive_more::Display;

///
/// LifecycleEvent
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum LifecycleEvent {
    #[display("pre_persist")]
    PrePersist,
    #[display("pre_update")]
    PreUpdate,
    #[display("post_persist")]
    PostPersist,
    #[display("post_update")]
    PostUpdate,
}

impl LifecycleEvent {
    /// Event fired before building operations.
    #[must_use]
    pub const fn before(is_new: bool) -> Self {
        if is_new {
            Self::PrePersist
        } else {
            Self::PreUpdate
        }
    }

    /// Event fired after every store call succeeded.
    #[must_use]
    pub const fn after(is_new: bool) -> Self {
        if is_new {
            Self::PostPersist
        } else {
            Self::PostUpdate
        }
    }
}

///
/// EntityListener
///
/// Lifecycle hook dispatch. Errors abort the save.
///

pub trait EntityListener: Send + Sync {
    fn invoke(&self, entity: &mut dyn Entity, event: LifecycleEvent) -> Result<(), InternalError>;
}

///
/// TESTS
///
