#![allow(dead_code)]

use attrdb::{
    core::{
        codec::reassemble_chunks,
        db::{EntityListener, Item, LifecycleEvent},
        error::{ErrorClass, ErrorOrigin, InternalError},
        memory::{MemoryBlobStore, MemoryStore},
    },
    prelude::*,
};
use std::sync::{Arc, Mutex};

pub const ARTICLE_STATES: &[&str] = &["Draft", "Published"];

static ARTICLE_FIELDS: [FieldModel; 8] = [
    FieldModel::id("id"),
    FieldModel::plain("title"),
    FieldModel::plain("body"),
    FieldModel::plain("tags"),
    FieldModel::plain("featured"),
    FieldModel::enumeration("state", EnumMode::String, ARTICLE_STATES),
    FieldModel::version("version"),
    FieldModel::lob("cover").with_column("coverKey"),
];

pub static ARTICLE: EntityModel = EntityModel {
    path: "tests::Article",
    domain: "articles",
    discriminator: None,
    fields: &ARTICLE_FIELDS,
};

///
/// Article
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Article {
    pub id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub state: Option<String>,
    pub version: Option<u64>,
    pub cover: Option<Vec<u8>>,
    pub cover_key: Option<String>,
}

impl Article {
    pub fn published(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            state: Some("Published".to_string()),
            ..Self::default()
        }
    }

    pub fn draft(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            state: Some("Draft".to_string()),
            ..Self::default()
        }
    }
}

impl Entity for Article {
    fn model(&self) -> &'static EntityModel {
        &ARTICLE
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, field: &str) -> Value {
        match field {
            "title" => self.title.clone().into(),
            "body" => self.body.clone().into(),
            "tags" => self.tags.iter().map(String::as_str).collect(),
            "featured" => self.featured.into(),
            "state" => self.state.clone().map_or(Value::Null, Value::Enum),
            "version" => self.version.into(),
            "cover" => self.cover.clone().into(),
            _ => Value::Null,
        }
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}

/// Rebuild an article from its stored attributes.
pub fn hydrate_article(item: Item) -> Result<Article, InternalError> {
    let body_parts: Vec<&str> = item.values("body").collect();
    let body = match body_parts.len() {
        0 => None,
        1 => Some(body_parts[0].to_string()),
        _ => Some(reassemble_chunks(&body_parts)?),
    };

    let version = item
        .first("version")
        .map(|v| {
            v.parse::<u64>().map_err(|err| {
                InternalError::new(
                    ErrorClass::Encoding,
                    ErrorOrigin::Codec,
                    format!("bad version '{v}': {err}"),
                )
            })
        })
        .transpose()?;

    Ok(Article {
        id: Some(item.name.clone()),
        title: item.first("title").map(ToString::to_string),
        body,
        tags: item.values("tags").map(ToString::to_string).collect(),
        featured: item.first("featured") == Some("true"),
        state: item.first("state").map(ToString::to_string),
        version,
        cover: None,
        cover_key: item.first("coverKey").map(ToString::to_string),
    })
}

///
/// RecordingListener
/// Captures every lifecycle event with the entity id seen at that moment.
///

#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<(LifecycleEvent, Option<String>)>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<(LifecycleEvent, Option<String>)> {
        self.events.lock().unwrap().clone()
    }
}

impl EntityListener for RecordingListener {
    fn invoke(&self, entity: &mut dyn Entity, event: LifecycleEvent) -> Result<(), InternalError> {
        self.events
            .lock()
            .unwrap()
            .push((event, entity.id().map(ToString::to_string)));

        Ok(())
    }
}

///
/// Fixture
///

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub listener: Arc<RecordingListener>,
    pub session: DbSession,
}

impl Fixture {
    pub fn new(page_cap: usize) -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::with_page_cap(page_cap));
        let blobs = Arc::new(MemoryBlobStore::new());
        let listener = Arc::new(RecordingListener::default());
        let session = DbSession::new(store.clone(), attrdb::core::config::Config::default())
            .blob_store(blobs.clone())
            .listener(listener.clone());

        Self {
            store,
            blobs,
            listener,
            session,
        }
    }
}

/// Route `tracing` output through the test harness; `RUST_LOG` filters it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
