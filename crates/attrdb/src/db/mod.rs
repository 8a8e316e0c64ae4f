mod cursor;
mod session;

pub use cursor::{Cursor, CursorIter};
pub use session::DbSession;

// store boundary and query vocabulary callers implement or build against
pub use attrdb_core::db::{
    Attribute, BlobError, BlobStore, ChangeSet, EntityListener, ExecutorError, IdentityGenerator,
    Item, LifecycleEvent, Precondition, PutAttribute, QueryExecutor, QuerySpec, SelectPage,
    UlidGenerator,
};
