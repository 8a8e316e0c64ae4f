//! Core runtime for AttrDB: mapping typed entities onto a paginated,
//! eventually-consistent attribute store.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod model;
pub mod obs;
pub mod traits;
pub mod value;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, executors or stores are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{ChangeSet, QuerySpec},
        model::{CascadePolicy, EntityModel, EnumMode, FieldModel},
        traits::{Entity, Hydrate, Relation},
        value::Value,
    };
}
