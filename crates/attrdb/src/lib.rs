//! ## Crate layout
//! - `core`: runtime model, values, codec, cursors, save executor and
//!   observability.
//! - `db`: session facade, public cursors and the store boundary traits.
//! - `error`: stable public error taxonomy.
//!
//! The `prelude` module carries the vocabulary needed to declare entities
//! and run queries against a session.

pub use attrdb_core as core;

pub mod db;
pub mod error;

pub use error::Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// Everything needed to declare entities and query through a session.
///

pub mod prelude {
    pub use crate::{
        core::{
            model::{CascadePolicy, EntityModel, EnumMode, FieldModel},
            traits::{Entity, Hydrate, Relation},
            value::Value,
        },
        db::{ChangeSet, Cursor, DbSession, QuerySpec},
        error::Error,
    };
}
