//! Store-facing runtime: the collaborator boundary, query cursors and the
//! save executor.

pub mod cursor;
pub mod identity;
pub mod listener;
pub mod query;
pub mod save;
pub mod store;

pub use cursor::{Cursor, CursorIter};
pub use identity::{IdentityGenerator, UlidGenerator};
pub use listener::{EntityListener, LifecycleEvent};
pub use query::QuerySpec;
pub use save::{ChangeSet, SaveExecutor};
pub use store::{
    Attribute, BlobError, BlobStore, ExecutorError, Item, Precondition, PutAttribute,
    QueryExecutor, SelectPage,
};
