use super::*;
use crate::db::store::{
    Attribute, BlobStore, ExecutorError, Item, Precondition, PutAttribute, QueryExecutor,
};

fn seeded(n: usize, page_cap: usize) -> MemoryStore {
    let store = MemoryStore::with_page_cap(page_cap);
    for i in 1..=n {
        store.insert_item(
            "users",
            Item::new(
                format!("u{i}"),
                vec![
                    Attribute::new("rank", format!("{i:02}")),
                    Attribute::new("team", if i % 2 == 0 { "even" } else { "odd" }),
                ],
            ),
        );
    }

    store
}

#[test]
fn select_pages_through_tokens() {
    let store = seeded(5, 2);

    let first = store
        .select("select * from `users` order by rank limit 10", None, true)
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].name, "u1");

    let second = store
        .select(
            "select * from `users` order by rank limit 10",
            first.next_token.as_deref(),
            true,
        )
        .unwrap();
    assert_eq!(second.items[0].name, "u3");

    let third = store
        .select(
            "select * from `users` order by rank limit 10",
            second.next_token.as_deref(),
            true,
        )
        .unwrap();
    assert_eq!(third.items.len(), 1);
    assert!(third.next_token.is_none());
}

#[test]
fn count_projection_reports_window_and_continues() {
    let store = seeded(7, 3);

    let page = store
        .select("select count(*) from `users` limit 2500", None, true)
        .unwrap();
    assert_eq!(page.reported_count(), 3);
    assert!(page.next_token.is_some());

    let filtered = store
        .select(
            "select count(*) from `users` where team = 'even'",
            None,
            true,
        )
        .unwrap();
    assert_eq!(filtered.reported_count(), 3);
    assert!(filtered.next_token.is_none());
}

#[test]
fn descending_order_and_filters_combine() {
    let store = seeded(6, 100);

    let page = store
        .select(
            "select * from `users` where team = 'odd' order by rank desc",
            None,
            false,
        )
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|i| i.name.as_str()).collect();

    assert_eq!(names, vec!["u5", "u3", "u1"]);
    assert!(!store.select_log()[0].consistent_read);
}

#[test]
fn unknown_domain_is_empty_and_bad_token_is_rejected() {
    let store = MemoryStore::new();

    let page = store.select("select * from `nothing`", None, true).unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_token.is_none());

    let err = store
        .select("select * from `nothing`", Some("garbage"), true)
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Rejected { .. }));
}

#[test]
fn replacing_put_drops_prior_values() {
    let store = MemoryStore::new();
    store
        .put_attributes(
            "users",
            "u1",
            &[
                PutAttribute::appending("tag", "a"),
                PutAttribute::appending("tag", "b"),
            ],
            None,
        )
        .unwrap();
    store
        .put_attributes("users", "u1", &[PutAttribute::replacing("tag", "c")], None)
        .unwrap();

    let item = store.item("users", "u1").unwrap();
    assert_eq!(item.values("tag").collect::<Vec<_>>(), vec!["c"]);
}

#[test]
fn precondition_guards_versioned_writes() {
    let store = MemoryStore::new();
    let not_exists = Precondition::NotExists {
        name: "version".to_string(),
    };

    store
        .put_attributes(
            "users",
            "u1",
            &[PutAttribute::replacing("version", "1")],
            Some(&not_exists),
        )
        .unwrap();

    let err = store
        .put_attributes(
            "users",
            "u1",
            &[PutAttribute::replacing("version", "1")],
            Some(&not_exists),
        )
        .unwrap_err();
    assert!(matches!(err, ExecutorError::ConditionFailed { .. }));

    store
        .put_attributes(
            "users",
            "u1",
            &[PutAttribute::replacing("version", "2")],
            Some(&Precondition::Equals {
                name: "version".to_string(),
                value: "1".to_string(),
            }),
        )
        .unwrap();
    assert_eq!(
        store.item("users", "u1").unwrap().first("version"),
        Some("2")
    );
}

#[test]
fn failed_precondition_leaves_no_empty_item() {
    let store = MemoryStore::new();

    let err = store
        .put_attributes(
            "users",
            "ghost",
            &[PutAttribute::replacing("version", "2")],
            Some(&Precondition::Equals {
                name: "version".to_string(),
                value: "1".to_string(),
            }),
        )
        .unwrap_err();

    assert!(matches!(err, ExecutorError::ConditionFailed { .. }));
    assert_eq!(store.item_count("users"), 0);
}

#[test]
fn deleting_last_attribute_removes_item() {
    let store = seeded(1, 10);

    store
        .delete_attributes("users", "u1", &["team".to_string()])
        .unwrap();
    assert!(store.item("users", "u1").is_some());

    store
        .delete_attributes("users", "u1", &["rank".to_string()])
        .unwrap();
    assert!(store.item("users", "u1").is_none());
    assert_eq!(store.write_log().len(), 2);
}

#[test]
fn unavailable_store_fails_every_call_but_logs_it() {
    let store = seeded(2, 10);
    store.set_unavailable(true);

    let err = store.select("select * from `users`", None, true).unwrap_err();
    assert!(matches!(err, ExecutorError::Unavailable { .. }));
    assert_eq!(store.select_log().len(), 1);

    store.set_unavailable(false);
    store.clear_logs();
    assert!(store.select("select * from `users`", None, true).is_ok());
    assert_eq!(store.select_log().len(), 1);
}

#[test]
fn blob_store_keeps_last_write() {
    let blobs = MemoryBlobStore::new();
    assert!(blobs.is_empty());

    blobs.put("u1-photo", vec![1, 2]).unwrap();
    blobs.put("u1-photo", vec![3]).unwrap();

    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs.get("u1-photo"), Some(vec![3]));
}
