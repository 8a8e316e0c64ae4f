//! Module: save
//! Responsibility: turning one entity's current state into attribute
//! put/delete calls, with version preconditions, lob offload and cascades.
//! Does not own: transport, retries or hydration.

mod changes;
mod plan;
#[cfg(test)]
mod tests;

pub use changes::ChangeSet;

use crate::{
    config::{Config, SaveConfig},
    db::{
        identity::{IdentityGenerator, UlidGenerator},
        listener::{EntityListener, LifecycleEvent},
        store::{BlobStore, QueryExecutor},
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{DISCRIMINATOR_ATTRIBUTE, EntityModel, FieldKind, FieldModel},
    obs::sink::{self, ExecKind, MetricsEvent, Span},
    traits::{Entity, Relation},
    value::Value,
};
use plan::WritePlan;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info, warn};

/// Identities already persisted during one top-level call.
type Visited = BTreeSet<(&'static str, String)>;

///
/// SaveExecutor
///
/// Writes entities through the query executor's put/delete side.
/// Each call is a put (carrying the version precondition) followed by a
/// delete; the two are not atomic, so a failed delete leaves the put
/// committed.
///

pub struct SaveExecutor {
    executor: Arc<dyn QueryExecutor>,
    blob_store: Option<Arc<dyn BlobStore>>,
    identity: Arc<dyn IdentityGenerator>,
    listener: Option<Arc<dyn EntityListener>>,
    config: SaveConfig,
    debug: bool,
}

impl SaveExecutor {
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>, config: &Config) -> Self {
        Self {
            executor,
            blob_store: None,
            identity: Arc::new(UlidGenerator::new()),
            listener: None,
            config: config.save.clone(),
            debug: config.debug,
        }
    }

    #[must_use]
    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    #[must_use]
    pub fn with_identity_generator(mut self, identity: Arc<dyn IdentityGenerator>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EntityListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Persist an unmanaged entity. Null fields of an existing entity become
    /// attribute deletes; a new entity has nothing to delete.
    pub fn persist(&self, entity: &mut dyn Entity) -> Result<(), InternalError> {
        let mut visited = Visited::new();

        self.persist_entity(entity, None, &mut visited)
    }

    /// Persist a managed entity. Deletes come from `changes` only, and the
    /// change set is reset once both store calls succeed.
    pub fn persist_tracked(
        &self,
        entity: &mut dyn Entity,
        changes: &mut ChangeSet,
    ) -> Result<(), InternalError> {
        let mut visited = Visited::new();

        self.persist_entity(entity, Some(changes), &mut visited)
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    fn persist_entity(
        &self,
        entity: &mut dyn Entity,
        changes: Option<&mut ChangeSet>,
        visited: &mut Visited,
    ) -> Result<(), InternalError> {
        let model = entity.model();
        let mut span = Span::new(ExecKind::Save, model.domain);

        let (id, is_new) = match entity.id().filter(|id| !id.is_empty()) {
            Some(id) => (id.to_string(), false),
            None => {
                let id = self.identity.new_id()?;
                entity.set_id(id.clone());
                (id, true)
            }
        };
        visited.insert((model.domain, id.clone()));

        self.notify(entity, LifecycleEvent::before(is_new))?;

        let mut plan = self.build_plan(entity, model, &id, visited)?;
        match &changes {
            Some(changes) => {
                plan.deletes.clear();
                for field in changes.nulled() {
                    let column = model.field(field).map(|f| f.column).ok_or_else(|| {
                        InternalError::encoding(format!(
                            "change set names unknown field '{field}' on {}",
                            model.path
                        ))
                    })?;
                    plan.delete(column);
                }
            }
            None if is_new => plan.deletes.clear(),
            None => {}
        }

        self.write(model, &id, &plan)?;
        if let Some(version) = plan.next_version {
            entity.set_version(version);
        }
        if let Some(changes) = changes {
            changes.reset();
        }
        span.set_rows(plan.puts.len() as u64);

        self.notify(entity, LifecycleEvent::after(is_new))?;
        debug!(
            domain = model.domain,
            id,
            is_new,
            puts = plan.puts.len(),
            deletes = plan.deletes.len(),
            "persisted entity"
        );

        Ok(())
    }

    fn build_plan(
        &self,
        entity: &mut dyn Entity,
        model: &'static EntityModel,
        id: &str,
        visited: &mut Visited,
    ) -> Result<WritePlan, InternalError> {
        let mut plan = WritePlan::default();
        if let Some(discriminator) = model.discriminator {
            plan.put(DISCRIMINATOR_ATTRIBUTE, discriminator);
        }

        for field in model.fields {
            match field.kind {
                FieldKind::Id => {}
                FieldKind::ForeignKey { many } => {
                    let ids =
                        self.reference_ids(field, many, entity.relation(field.name), visited)?;
                    if ids.is_empty() {
                        plan.delete(field.column);
                    }
                    for reference in ids {
                        plan.put(field.column, reference);
                    }
                }
                FieldKind::Inverse => {
                    if field.cascade.cascades_persist() {
                        self.cascade(entity.relation(field.name), visited)?;
                    }
                }
                FieldKind::Version => {
                    plan.put_version(field.column, &entity.value(field.name))?;
                }
                FieldKind::Lob => {
                    let value = entity.value(field.name);
                    if value.is_null() {
                        plan.delete(field.column);
                    } else {
                        let key = self.store_lob(model, id, field, &value)?;
                        plan.put(field.column, key);
                    }
                }
                FieldKind::Enum { mode, variants } => {
                    plan.put_enum(field.column, mode, variants, &entity.value(field.name))?;
                }
                FieldKind::Plain => {
                    plan.put_value(field.column, &entity.value(field.name), &self.config)?;
                }
            }
        }

        Ok(plan)
    }

    fn write(
        &self,
        model: &EntityModel,
        id: &str,
        plan: &WritePlan,
    ) -> Result<(), InternalError> {
        let domain = model.domain;

        if !plan.puts.is_empty() {
            if self.debug {
                info!(domain, id, puts = ?plan.puts, precondition = ?plan.precondition, "put attributes");
            }
            self.executor
                .put_attributes(domain, id, &plan.puts, plan.precondition.as_ref())
                .map_err(|err| {
                    let err = InternalError::write_failed(domain, id, "put", &err);
                    if err.class == ErrorClass::ConcurrentModification {
                        sink::record(MetricsEvent::VersionConflict { domain });
                    }
                    err
                })?;
            sink::record(MetricsEvent::AttributesPut {
                domain,
                count: plan.puts.len() as u64,
            });
        }

        if !plan.deletes.is_empty() {
            if self.debug {
                info!(domain, id, deletes = ?plan.deletes, "delete attributes");
            }
            self.executor
                .delete_attributes(domain, id, &plan.deletes)
                .map_err(|err| {
                    if !plan.puts.is_empty() {
                        warn!(domain, id, "put committed but delete failed; entity is partially written");
                    }
                    InternalError::write_failed(domain, id, "delete", &err)
                })?;
            sink::record(MetricsEvent::AttributesDeleted {
                domain,
                count: plan.deletes.len() as u64,
            });
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Ids to write for a foreign key, persisting targets first when the
    /// field cascades.
    fn reference_ids(
        &self,
        field: &FieldModel,
        many: bool,
        relation: Relation<'_>,
        visited: &mut Visited,
    ) -> Result<Vec<String>, InternalError> {
        let targets = match relation {
            Relation::Null => Vec::new(),
            Relation::One(target) => vec![target],
            Relation::Many(targets) if many => targets,
            Relation::Many(_) => {
                return Err(InternalError::encoding(format!(
                    "single-valued foreign key '{}' was given a collection",
                    field.name
                )));
            }
        };

        let mut ids = Vec::with_capacity(targets.len());
        for target in targets {
            if field.cascade.cascades_persist() {
                self.cascade_one(target, visited)?;
            }
            let id = target
                .id()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    InternalError::encoding(format!(
                        "foreign key '{}' references an unsaved {}",
                        field.name,
                        target.model().path
                    ))
                })?;
            ids.push(id.to_string());
        }

        Ok(ids)
    }

    fn cascade(&self, relation: Relation<'_>, visited: &mut Visited) -> Result<(), InternalError> {
        match relation {
            Relation::Null => Ok(()),
            Relation::One(target) => self.cascade_one(target, visited),
            Relation::Many(targets) => targets
                .into_iter()
                .try_for_each(|target| self.cascade_one(target, visited)),
        }
    }

    /// Persist `target` unless it was already persisted in this call.
    fn cascade_one(&self, target: &mut dyn Entity, visited: &mut Visited) -> Result<(), InternalError> {
        let domain = target.model().domain;
        if let Some(id) = target.id().filter(|id| !id.is_empty()) {
            if visited.contains(&(domain, id.to_string())) {
                return Ok(());
            }
        }

        self.persist_entity(target, None, visited)
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    fn store_lob(
        &self,
        model: &EntityModel,
        id: &str,
        field: &FieldModel,
        value: &Value,
    ) -> Result<String, InternalError> {
        let key = format!("{id}-{}", field.name);
        let blob_store = self.blob_store.as_ref().ok_or_else(|| {
            InternalError::new(
                ErrorClass::PersistenceFailure,
                ErrorOrigin::Blob,
                format!("lob field '{}' needs a blob store", field.name),
            )
        })?;

        let bytes = serde_cbor::to_vec(value).map_err(|err| {
            InternalError::encoding(format!("lob field '{}' failed to serialize: {err}", field.name))
        })?;
        let len = bytes.len() as u64;

        blob_store
            .put(&key, bytes)
            .map_err(|err| InternalError::blob_failed(&key, &err))?;
        sink::record(MetricsEvent::LobStored {
            domain: model.domain,
            bytes: len,
        });
        debug!(domain = model.domain, key, bytes = len, "stored lob");

        Ok(key)
    }

    fn notify(&self, entity: &mut dyn Entity, event: LifecycleEvent) -> Result<(), InternalError> {
        match &self.listener {
            Some(listener) => listener.invoke(entity, event),
            None => Ok(()),
        }
    }
}
