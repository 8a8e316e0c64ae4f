use crate::{db::Cursor, error::Error};
use attrdb_core::{
    config::Config,
    db::{
        BlobStore, ChangeSet, Cursor as CoreCursor, EntityListener, IdentityGenerator, QueryExecutor,
        QuerySpec, SaveExecutor, UlidGenerator,
    },
    traits::{Entity, Hydrate},
};
use std::sync::Arc;
use tracing::debug;

///
/// DbSession
/// Public facade session: bundles the store collaborators and config, hands
/// out cursors and persistence, and converts core errors into `attrdb::Error`.
///

pub struct DbSession {
    executor: Arc<dyn QueryExecutor>,
    config: Config,
    blob_store: Option<Arc<dyn BlobStore>>,
    identity: Arc<dyn IdentityGenerator>,
    listener: Option<Arc<dyn EntityListener>>,
}

impl DbSession {
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>, config: Config) -> Self {
        Self {
            executor,
            config,
            blob_store: None,
            identity: Arc::new(UlidGenerator::new()),
            listener: None,
        }
    }

    /// Build a session from a TOML configuration document.
    pub fn from_toml(executor: Arc<dyn QueryExecutor>, source: &str) -> Result<Self, Error> {
        let config = Config::from_toml_str(source)?;

        Ok(Self::new(executor, config))
    }

    /// Blob store used to offload lob fields.
    #[must_use]
    pub fn blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    #[must_use]
    pub fn identity_generator(mut self, identity: Arc<dyn IdentityGenerator>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn EntityListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Enable debug logging for subsequent operations in this session.
    ///
    /// Every issued select, put and delete is logged at info level.
    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.config.debug = true;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    //
    // Queries
    //

    /// Bind a lazy cursor to `spec`. Nothing is fetched until data is read.
    pub fn query<T, H>(&self, spec: QuerySpec, hydrator: H) -> Cursor<T>
    where
        H: Hydrate<T> + 'static,
    {
        debug!(domain = spec.domain(), "opening cursor");

        Cursor::new(CoreCursor::new(
            spec,
            self.executor.clone(),
            Arc::new(hydrator),
            &self.config,
        ))
    }

    //
    // Persistence
    //

    /// Persist an unmanaged entity, assigning its id and version.
    pub fn persist(&self, entity: &mut dyn Entity) -> Result<(), Error> {
        self.save_executor().persist(entity).map_err(Error::from)
    }

    /// Persist a managed entity whose nulled fields are tracked in `changes`.
    pub fn persist_tracked(
        &self,
        entity: &mut dyn Entity,
        changes: &mut ChangeSet,
    ) -> Result<(), Error> {
        self.save_executor()
            .persist_tracked(entity, changes)
            .map_err(Error::from)
    }

    fn save_executor(&self) -> SaveExecutor {
        let mut save = SaveExecutor::new(self.executor.clone(), &self.config)
            .with_identity_generator(self.identity.clone());
        if let Some(blob_store) = &self.blob_store {
            save = save.with_blob_store(blob_store.clone());
        }
        if let Some(listener) = &self.listener {
            save = save.with_listener(listener.clone());
        }

        save
    }
}
