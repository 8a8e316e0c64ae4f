use super::*;
use crate::{
    codec::{encode_uint, reassemble_chunks},
    db::store::{ExecutorError, Precondition, PutAttribute, SelectPage},
    memory::{MemoryBlobStore, MemoryStore, WriteCall},
    model::{CascadePolicy, EnumMode},
};
use std::{
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

// ============================================================================
// Entities
// ============================================================================

static AUTHOR_FIELDS: [FieldModel; 7] = [
    FieldModel::id("id"),
    FieldModel::plain("name"),
    FieldModel::plain("bio"),
    FieldModel::plain("tags"),
    FieldModel::enumeration("status", EnumMode::Ordinal, &["Draft", "Live", "Retired"]),
    FieldModel::version("version"),
    FieldModel::lob("avatar").with_column("avatarKey"),
];

static AUTHOR: EntityModel = EntityModel {
    path: "save_tests::Author",
    domain: "authors",
    discriminator: None,
    fields: &AUTHOR_FIELDS,
};

#[derive(Clone, Debug, Default)]
struct Author {
    id: Option<String>,
    name: Option<String>,
    bio: Option<String>,
    tags: Vec<String>,
    status: Option<&'static str>,
    version: Option<u64>,
    avatar: Option<Vec<u8>>,
}

impl Author {
    fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

impl Entity for Author {
    fn model(&self) -> &'static EntityModel {
        &AUTHOR
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, field: &str) -> Value {
        match field {
            "name" => self.name.clone().into(),
            "bio" => self.bio.clone().into(),
            "tags" => self.tags.iter().map(String::as_str).collect(),
            "status" => self
                .status
                .map_or(Value::Null, |s| Value::Enum(s.to_string())),
            "version" => self.version.into(),
            "avatar" => self.avatar.clone().into(),
            _ => Value::Null,
        }
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}

static BOOK_FIELDS: [FieldModel; 4] = [
    FieldModel::id("id"),
    FieldModel::plain("title"),
    FieldModel::many_to_one("author", CascadePolicy::ALL).with_column("authorId"),
    FieldModel::many_to_one("editor", CascadePolicy::MERGE),
];

static BOOK: EntityModel = EntityModel {
    path: "save_tests::Book",
    domain: "books",
    discriminator: Some("Book"),
    fields: &BOOK_FIELDS,
};

#[derive(Clone, Debug, Default)]
struct Book {
    id: Option<String>,
    title: Option<String>,
    author: Option<Author>,
    editor: Option<Author>,
}

impl Entity for Book {
    fn model(&self) -> &'static EntityModel {
        &BOOK
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
            _ => Value::Null,
        }
    }

    fn set_version(&mut self, _version: u64) {}

    fn relation(&mut self, field: &str) -> Relation<'_> {
        let target = match field {
            "author" => self.author.as_mut(),
            "editor" => self.editor.as_mut(),
            _ => None,
        };

        match target {
            Some(author) => Relation::One(author),
            None => Relation::Null,
        }
    }
}

static SHELF_FIELDS: [FieldModel; 3] = [
    FieldModel::id("id"),
    FieldModel::plain("label"),
    FieldModel::one_to_many("books", "shelf", CascadePolicy::PERSIST),
];

static SHELF: EntityModel = EntityModel {
    path: "save_tests::Shelf",
    domain: "shelves",
    discriminator: None,
    fields: &SHELF_FIELDS,
};

#[derive(Debug, Default)]
struct Shelf {
    id: Option<String>,
    label: Option<String>,
    books: Vec<Book>,
}

impl Entity for Shelf {
    fn model(&self) -> &'static EntityModel {
        &SHELF
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, field: &str) -> Value {
        match field {
            "label" => self.label.clone().into(),
            _ => Value::Null,
        }
    }

    fn set_version(&mut self, _version: u64) {}

    fn relation(&mut self, field: &str) -> Relation<'_> {
        match field {
            "books" => Relation::Many(
                self.books
                    .iter_mut()
                    .map(|b| b as &mut dyn Entity)
                    .collect(),
            ),
            _ => Relation::Null,
        }
    }
}

static NODE_FIELDS: [FieldModel; 2] = [
    FieldModel::id("id"),
    FieldModel::many_to_one("peer", CascadePolicy::PERSIST),
];

static NODE: EntityModel = EntityModel {
    path: "save_tests::Node",
    domain: "nodes",
    discriminator: None,
    fields: &NODE_FIELDS,
};

#[derive(Clone, Debug, Default)]
struct Node {
    id: Option<String>,
    peer: Option<Box<Node>>,
}

impl Entity for Node {
    fn model(&self) -> &'static EntityModel {
        &NODE
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, _field: &str) -> Value {
        Value::Null
    }

    fn set_version(&mut self, _version: u64) {}

    fn relation(&mut self, field: &str) -> Relation<'_> {
        match (field, self.peer.as_mut()) {
            ("peer", Some(peer)) => Relation::One(peer.as_mut()),
            _ => Relation::Null,
        }
    }
}

static TEAM_FIELDS: [FieldModel; 3] = [
    FieldModel::id("id"),
    FieldModel::many_to_one("lead", CascadePolicy::NONE),
    FieldModel::many_to_many("members", CascadePolicy::NONE),
];

static TEAM: EntityModel = EntityModel {
    path: "save_tests::Team",
    domain: "teams",
    discriminator: None,
    fields: &TEAM_FIELDS,
};

/// Exposes every author through both relations as a collection.
#[derive(Debug, Default)]
struct Team {
    id: Option<String>,
    lead_as_list: bool,
    authors: Vec<Author>,
}

impl Entity for Team {
    fn model(&self) -> &'static EntityModel {
        &TEAM
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, _field: &str) -> Value {
        Value::Null
    }

    fn set_version(&mut self, _version: u64) {}

    fn relation(&mut self, field: &str) -> Relation<'_> {
        match field {
            "lead" if self.lead_as_list => Relation::Many(
                self.authors
                    .iter_mut()
                    .map(|a| a as &mut dyn Entity)
                    .collect(),
            ),
            "lead" => match self.authors.first_mut() {
                Some(author) => Relation::One(author),
                None => Relation::Null,
            },
            "members" => Relation::Many(
                self.authors
                    .iter_mut()
                    .map(|a| a as &mut dyn Entity)
                    .collect(),
            ),
            _ => Relation::Null,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Default)]
struct SequenceGenerator {
    next: AtomicU64,
}

impl IdentityGenerator for SequenceGenerator {
    fn new_id(&self) -> Result<String, InternalError> {
        Ok(format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
    reject: Option<LifecycleEvent>,
}

impl EntityListener for EventLog {
    fn invoke(&self, entity: &mut dyn Entity, event: LifecycleEvent) -> Result<(), InternalError> {
        if self.reject == Some(event) {
            return Err(InternalError::new(
                ErrorClass::PersistenceFailure,
                ErrorOrigin::Listener,
                format!("{event} vetoed"),
            ));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("{event}:{}", entity.model().domain));

        Ok(())
    }
}

/// Memory store whose delete side always fails.
struct FailingDeletes(MemoryStore);

impl QueryExecutor for FailingDeletes {
    fn select(
        &self,
        query: &str,
        token: Option<&str>,
        consistent_read: bool,
    ) -> Result<SelectPage, ExecutorError> {
        self.0.select(query, token, consistent_read)
    }

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        puts: &[PutAttribute],
        precondition: Option<&Precondition>,
    ) -> Result<(), ExecutorError> {
        self.0.put_attributes(domain, item, puts, precondition)
    }

    fn delete_attributes(
        &self,
        _domain: &str,
        _item: &str,
        _names: &[String],
    ) -> Result<(), ExecutorError> {
        Err(ExecutorError::Unavailable {
            message: "delete endpoint down".to_string(),
        })
    }
}

fn executor(store: &Arc<MemoryStore>) -> SaveExecutor {
    SaveExecutor::new(store.clone(), &Config::default())
        .with_identity_generator(Arc::new(SequenceGenerator::default()))
}

fn puts_for(log: &[WriteCall], domain_name: &str) -> Vec<Vec<PutAttribute>> {
    log.iter()
        .filter_map(|call| match call {
            WriteCall::Put { domain, puts, .. } if domain == domain_name => Some(puts.clone()),
            _ => None,
        })
        .collect()
}

fn deletes(log: &[WriteCall]) -> Vec<Vec<String>> {
    log.iter()
        .filter_map(|call| match call {
            WriteCall::Delete { names, .. } => Some(names.clone()),
            WriteCall::Put { .. } => None,
        })
        .collect()
}

// ============================================================================
// Identity and versioning
// ============================================================================

#[test]
fn new_entity_gets_id_and_initial_version() {
    let store = Arc::new(MemoryStore::new());
    let mut author = Author::named("Ada");

    executor(&store).persist(&mut author).unwrap();

    assert_eq!(author.id.as_deref(), Some("id-1"));
    assert_eq!(author.version, Some(1));

    let log = store.write_log();
    assert_eq!(log.len(), 1, "a new entity issues no delete call");
    match &log[0] {
        WriteCall::Put { precondition, .. } => assert_eq!(
            precondition,
            &Some(Precondition::NotExists {
                name: "version".to_string()
            })
        ),
        WriteCall::Delete { .. } => panic!("unexpected delete"),
    }

    let item = store.item("authors", "id-1").unwrap();
    assert_eq!(item.first("name"), Some("Ada"));
    assert_eq!(item.first("version"), Some(encode_uint(1).as_str()));
}

#[test]
fn update_expects_current_version() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut author = Author::named("Ada");
    save.persist(&mut author).unwrap();

    author.name = Some("Ada L.".to_string());
    save.persist(&mut author).unwrap();

    assert_eq!(author.version, Some(2));
    assert_eq!(author.id.as_deref(), Some("id-1"));
    let item = store.item("authors", "id-1").unwrap();
    assert_eq!(item.values("name").collect::<Vec<_>>(), vec!["Ada L."]);
}

#[test]
fn stale_writers_race_on_version() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut original = Author::named("Ada");
    save.persist(&mut original).unwrap();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let mut copy = original.clone();
                let save = &save;
                scope.spawn(move || {
                    copy.name = Some(format!("writer {i}"));
                    save.persist(&mut copy)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(err.is_concurrent_modification());
    assert_eq!(err.origin, ErrorOrigin::Save);
}

#[test]
fn put_failure_leaves_version_untouched() {
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let mut author = Author::named("Ada");

    let err = executor(&store).persist(&mut author).unwrap_err();

    assert_eq!(err.class, ErrorClass::PersistenceFailure);
    assert_eq!(err.query(), Some("put id-1"));
    assert_eq!(author.version, None);
}

// ============================================================================
// Field encoding
// ============================================================================

#[test]
fn nulled_field_on_update_is_one_delete() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut author = Author {
        bio: Some("short".to_string()),
        ..Author::named("Ada")
    };
    save.persist(&mut author).unwrap();
    store.clear_logs();

    author.bio = None;
    save.persist(&mut author).unwrap();

    let log = store.write_log();
    let bio_puts = puts_for(&log, "authors")
        .concat()
        .into_iter()
        .filter(|p| p.name == "bio")
        .count();
    assert_eq!(bio_puts, 0);

    let deletes = deletes(&log);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].iter().filter(|n| *n == "bio").count(), 1);
    assert!(store.item("authors", "id-1").unwrap().first("bio").is_none());
}

#[test]
fn oversized_value_round_trips_through_chunks() {
    let store = Arc::new(MemoryStore::new());
    let bio: String = "ab€".repeat(400);
    let mut author = Author {
        bio: Some(bio.clone()),
        ..Author::named("Ada")
    };

    executor(&store).persist(&mut author).unwrap();

    let item = store.item("authors", "id-1").unwrap();
    let chunks: Vec<_> = item.values("bio").collect();
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.len() <= 1024));
    assert_eq!(reassemble_chunks(&chunks).unwrap(), bio);
}

#[test]
fn collection_and_enum_fields() {
    let store = Arc::new(MemoryStore::new());
    let mut author = Author {
        tags: vec!["math".to_string(), "poetry".to_string()],
        status: Some("Live"),
        ..Author::named("Ada")
    };

    executor(&store).persist(&mut author).unwrap();

    let item = store.item("authors", "id-1").unwrap();
    assert_eq!(item.values("tags").collect::<Vec<_>>(), vec!["math", "poetry"]);
    assert_eq!(item.first("status"), Some("1"));
}

#[test]
fn unknown_enum_variant_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut author = Author {
        status: Some("Banned"),
        ..Author::named("Ada")
    };

    let err = executor(&store).persist(&mut author).unwrap_err();

    assert_eq!(err.class, ErrorClass::Encoding);
    assert!(store.write_log().is_empty());
}

#[test]
fn lob_is_offloaded_under_entity_key() {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let mut author = Author {
        avatar: Some(vec![0xde, 0xad]),
        ..Author::named("Ada")
    };

    executor(&store)
        .with_blob_store(blobs.clone())
        .persist(&mut author)
        .unwrap();

    let item = store.item("authors", "id-1").unwrap();
    assert_eq!(item.first("avatarKey"), Some("id-1-avatar"));

    let bytes = blobs.get("id-1-avatar").unwrap();
    let restored: Value = serde_cbor::from_slice(&bytes).unwrap();
    assert_eq!(restored, Value::Blob(vec![0xde, 0xad]));
}

#[test]
fn lob_without_blob_store_fails() {
    let store = Arc::new(MemoryStore::new());
    let mut author = Author {
        avatar: Some(vec![1]),
        ..Author::named("Ada")
    };

    let err = executor(&store).persist(&mut author).unwrap_err();

    assert_eq!(err.origin, ErrorOrigin::Blob);
    assert!(store.write_log().is_empty());
}

#[test]
fn discriminator_is_written_first() {
    let store = Arc::new(MemoryStore::new());
    let mut book = Book {
        title: Some("Notes".to_string()),
        ..Book::default()
    };

    executor(&store).persist(&mut book).unwrap();

    let puts = puts_for(&store.write_log(), "books");
    assert_eq!(puts[0][0], PutAttribute::replacing("DTYPE", "Book"));
}

// ============================================================================
// Cascades
// ============================================================================

#[test]
fn many_to_one_cascade_persists_target_first() {
    let store = Arc::new(MemoryStore::new());
    let mut book = Book {
        title: Some("Notes".to_string()),
        author: Some(Author::named("Ada")),
        ..Book::default()
    };

    executor(&store).persist(&mut book).unwrap();

    // book takes id-1 before cascading; author gets id-2
    let log = store.write_log();
    assert!(matches!(&log[0], WriteCall::Put { domain, .. } if domain == "authors"));
    assert!(matches!(&log[1], WriteCall::Put { domain, .. } if domain == "books"));

    let author_id = book.author.as_ref().and_then(|a| a.id.clone()).unwrap();
    let item = store.item("books", book.id.as_deref().unwrap()).unwrap();
    assert_eq!(item.first("authorId"), Some(author_id.as_str()));
    assert_eq!(book.author.as_ref().unwrap().version, Some(1));
}

#[test]
fn non_cascading_reference_must_be_saved() {
    let store = Arc::new(MemoryStore::new());
    let mut book = Book {
        editor: Some(Author::named("Unsaved")),
        ..Book::default()
    };

    let err = executor(&store).persist(&mut book).unwrap_err();

    assert_eq!(err.class, ErrorClass::Encoding);
    assert!(store.write_log().is_empty());
}

#[test]
fn inverse_side_only_cascades() {
    let store = Arc::new(MemoryStore::new());
    let mut shelf = Shelf {
        label: Some("top".to_string()),
        books: vec![
            Book {
                title: Some("A".to_string()),
                ..Book::default()
            },
            Book {
                title: Some("B".to_string()),
                ..Book::default()
            },
        ],
        ..Shelf::default()
    };

    executor(&store).persist(&mut shelf).unwrap();

    assert_eq!(store.item_count("books"), 2);
    let item = store.item("shelves", shelf.id.as_deref().unwrap()).unwrap();
    assert!(item.first("books").is_none());
    assert!(shelf.books.iter().all(|b| b.id.is_some()));
}

#[test]
fn cascade_cycle_persists_each_identity_once() {
    let store = Arc::new(MemoryStore::new());
    let mut a = Node {
        id: Some("a".to_string()),
        peer: None,
    };
    a.peer = Some(Box::new(Node {
        id: None,
        peer: Some(Box::new(a.clone())),
    }));

    executor(&store).persist(&mut a).unwrap();

    let log = store.write_log();
    assert_eq!(puts_for(&log, "nodes").len(), 2);

    let b_id = a.peer.as_ref().and_then(|b| b.id.clone()).unwrap();
    assert_eq!(store.item("nodes", &b_id).unwrap().first("peer"), Some("a"));
    assert_eq!(store.item("nodes", "a").unwrap().first("peer"), Some(b_id.as_str()));
}

#[test]
fn many_to_many_writes_one_value_per_target() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut team = Team::default();
    for name in ["Ada", "Grace"] {
        let mut author = Author::named(name);
        save.persist(&mut author).unwrap();
        team.authors.push(author);
    }

    save.persist(&mut team).unwrap();

    let item = store.item("teams", team.id.as_deref().unwrap()).unwrap();
    assert_eq!(item.values("members").collect::<Vec<_>>(), vec!["id-1", "id-2"]);
    assert_eq!(item.first("lead"), Some("id-1"));
}

#[test]
fn single_reference_rejects_collection() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut author = Author::named("Ada");
    save.persist(&mut author).unwrap();
    let mut team = Team {
        lead_as_list: true,
        authors: vec![author],
        ..Team::default()
    };

    let err = save.persist(&mut team).unwrap_err();

    assert_eq!(err.class, ErrorClass::Encoding);
    assert!(err.message.contains("'lead'"));
    assert_eq!(store.item_count("teams"), 0);
}

// ============================================================================
// Tracked entities and listeners
// ============================================================================

#[test]
fn tracked_deletes_come_from_change_set() {
    let store = Arc::new(MemoryStore::new());
    let save = executor(&store);
    let mut author = Author {
        bio: Some("short".to_string()),
        ..Author::named("Ada")
    };
    save.persist(&mut author).unwrap();
    store.clear_logs();

    // bio is null but untracked, tags is tracked
    author.bio = None;
    let mut changes = ChangeSet::new();
    changes.mark_nulled("tags");
    save.persist_tracked(&mut author, &mut changes).unwrap();

    assert_eq!(deletes(&store.write_log()), vec![vec!["tags".to_string()]]);
    assert!(changes.is_empty());
}

#[test]
fn tracked_unknown_field_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut author = Author::named("Ada");
    let mut changes = ChangeSet::new();
    changes.mark_nulled("nickname");

    let err = executor(&store)
        .persist_tracked(&mut author, &mut changes)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Encoding);
    assert_eq!(changes.len(), 1);
}

#[test]
fn failed_delete_keeps_change_set_and_put() {
    let store = Arc::new(FailingDeletes(MemoryStore::new()));
    let save = SaveExecutor::new(store.clone(), &Config::default())
        .with_identity_generator(Arc::new(SequenceGenerator::default()));
    let mut author = Author::named("Ada");
    let mut changes = ChangeSet::new();
    changes.mark_nulled("bio");

    let err = save.persist_tracked(&mut author, &mut changes).unwrap_err();

    assert_eq!(err.class, ErrorClass::PersistenceFailure);
    assert_eq!(err.query(), Some("delete id-1"));
    assert!(store.0.item("authors", "id-1").is_some());
    assert!(!changes.is_empty());
}

#[test]
fn listener_sees_pre_and_post_events() {
    let store = Arc::new(MemoryStore::new());
    let listener = Arc::new(EventLog::default());
    let save = executor(&store).with_listener(listener.clone());
    let mut author = Author::named("Ada");

    save.persist(&mut author).unwrap();
    save.persist(&mut author).unwrap();

    assert_eq!(
        *listener.events.lock().unwrap(),
        vec![
            "pre_persist:authors",
            "post_persist:authors",
            "pre_update:authors",
            "post_update:authors",
        ]
    );
}

#[test]
fn listener_veto_aborts_before_writes() {
    let store = Arc::new(MemoryStore::new());
    let listener = Arc::new(EventLog {
        reject: Some(LifecycleEvent::PrePersist),
        ..EventLog::default()
    });
    let mut author = Author::named("Ada");

    let err = executor(&store)
        .with_listener(listener)
        .persist(&mut author)
        .unwrap_err();

    assert_eq!(err.origin, ErrorOrigin::Listener);
    assert!(store.write_log().is_empty());
}
