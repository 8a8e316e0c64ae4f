use crate::{db::store::Item, error::InternalError, model::EntityModel, value::Value};

// ============================================================================
// ENTITY INSTANCES
// ============================================================================
//
// Field access goes through the static model plus these accessors; nothing
// is resolved dynamically per call beyond a match on the field name.
//

///
/// Entity
///
/// Object-safe view of one persistable entity instance.
///

pub trait Entity {
    fn model(&self) -> &'static EntityModel;

    /// Current identity; `None` (or empty) marks a new entity.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// Value of a non-relation field. Unknown names return `Value::Null`.
    fn value(&self, field: &str) -> Value;

    /// Store the version written by a successful save.
    fn set_version(&mut self, version: u64);

    /// Mutable access to the entities behind a relation field.
    fn relation(&mut self, _field: &str) -> Relation<'_> {
        Relation::Null
    }
}

///
/// Relation
///

pub enum Relation<'a> {
    Null,
    One(&'a mut dyn Entity),
    Many(Vec<&'a mut dyn Entity>),
}

///
/// Hydrate
///
/// Builds a typed result from one raw store item.
///

pub trait Hydrate<T>: Send + Sync {
    fn hydrate(&self, item: Item) -> Result<T, InternalError>;
}

impl<T, F> Hydrate<T> for F
where
    F: Fn(Item) -> Result<T, InternalError> + Send + Sync,
{
    fn hydrate(&self, item: Item) -> Result<T, InternalError> {
        self(item)
    }
}
