//! Schema model: per-type field classification built once and consulted by
//! the save executor on every write.

pub mod entity;
pub mod field;

pub use entity::{DISCRIMINATOR_ATTRIBUTE, EntityModel};
pub use field::{CascadePolicy, EnumMode, FieldKind, FieldModel};
