use crate::model::field::{FieldKind, FieldModel};

/// Attribute name carrying the discriminator value for inheritance hierarchies.
pub const DISCRIMINATOR_ATTRIBUTE: &str = "DTYPE";

///
/// EntityModel
/// Static runtime model for one entity type.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified Rust type path (for diagnostics).
    pub path: &'static str,
    /// Store domain the entity's items live in.
    pub domain: &'static str,
    /// Discriminator value written as `DTYPE` for subclassed entities.
    pub discriminator: Option<&'static str>,
    /// Ordered field list; writes follow this order.
    pub fields: &'static [FieldModel],
}

impl EntityModel {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn id_field(&self) -> Option<&FieldModel> {
        self.fields.iter().find(|f| matches!(f.kind, FieldKind::Id))
    }

    #[must_use]
    pub fn version_field(&self) -> Option<&FieldModel> {
        self.fields
            .iter()
            .find(|f| matches!(f.kind, FieldKind::Version))
    }
}

///
/// TESTS
///
