use mnemo::error::MnemoError;
use mnemo::store::{ListFilter, MemoryStore, TagFilter};
use mnemo::util;

fn test_store() -> MemoryStore {
    MemoryStore::open(":memory:").expect("in-memory store")
}

fn tags(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn create_then_fetch_roundtrip() {
    let store = test_store();
    let mem = store
        .create("fact", "prefers vim keybindings", &tags(&["user", "editor"]), "demo")
        .unwrap();

    assert_eq!(mem.id.len(), 8);
    assert_eq!(mem.access_count, 0);
    assert_eq!(mem.tags, vec!["project:demo", "user", "editor"]);
    util::parse_ts(&mem.created).expect("created must use the canonical format");

    let got = store.fetch(&mem.id).unwrap();
    assert_eq!(got.kind, "fact");
    assert_eq!(got.content, "prefers vim keybindings");
    assert_eq!(got.tags, mem.tags);
    assert_eq!(got.project(), Some("demo"));
}

#[test]
fn create_without_project_is_global() {
    let store = test_store();
    let mem = store.create("fact", "global note", &tags(&["a"]), "").unwrap();
    assert_eq!(mem.tags, vec!["a"]);
    assert_eq!(mem.project(), None);
}

#[test]
fn create_rejects_empty_content() {
    let store = test_store();
    let err = store.create("fact", "   ", &[], "demo").unwrap_err();
    assert!(matches!(err, MnemoError::EmptyContent));
}

#[test]
fn fetch_returns_pre_increment_count() {
    let store = test_store();
    let mem = store.create("fact", "counted", &[], "demo").unwrap();

    // Each fetch shows the count as it was before that fetch.
    assert_eq!(store.fetch(&mem.id).unwrap().access_count, 0);
    assert_eq!(store.fetch(&mem.id).unwrap().access_count, 1);
    assert_eq!(store.fetch_raw(&mem.id).unwrap().access_count, 2);
}

#[test]
fn fetch_refreshes_accessed_but_not_created() {
    let store = test_store();
    let mem = store.create("fact", "timestamps", &[], "demo").unwrap();
    store.fetch(&mem.id).unwrap();
    let after = store.fetch_raw(&mem.id).unwrap();
    assert_eq!(after.created, mem.created);
    util::parse_ts(&after.accessed).unwrap();
}

#[test]
fn fetch_raw_never_bumps() {
    let store = test_store();
    let mem = store.create("fact", "raw read", &[], "demo").unwrap();
    store.fetch_raw(&mem.id).unwrap();
    store.fetch_raw(&mem.id).unwrap();
    assert_eq!(store.fetch_raw(&mem.id).unwrap().access_count, 0);
}

#[test]
fn fetch_missing_is_not_found() {
    let store = test_store();
    assert!(matches!(store.fetch("deadbeef"), Err(MnemoError::NotFound(_))));
}

#[test]
fn update_replaces_content_only() {
    let store = test_store();
    let mem = store.create("fact", "before", &tags(&["keep"]), "demo").unwrap();
    store.update_content(&mem.id, "after").unwrap();

    let got = store.fetch_raw(&mem.id).unwrap();
    assert_eq!(got.content, "after");
    assert_eq!(got.created, mem.created);
    assert_eq!(got.tags, mem.tags);
    // The existence check runs through the primary fetch path.
    assert_eq!(got.access_count, 1);
}

#[test]
fn update_missing_is_not_found() {
    let store = test_store();
    assert!(matches!(
        store.update_content("deadbeef", "x"),
        Err(MnemoError::NotFound(_))
    ));
}

#[test]
fn add_tag_twice_conflicts() {
    let store = test_store();
    let mem = store.create("fact", "taggable", &[], "demo").unwrap();

    store.add_tag(&mem.id, "vim").unwrap();
    let err = store.add_tag(&mem.id, "vim").unwrap_err();
    assert!(matches!(err, MnemoError::TagExists(_)));

    // Tag set unchanged by the failed add.
    let got = store.fetch_raw(&mem.id).unwrap();
    assert_eq!(got.tags, vec!["project:demo", "vim"]);
}

#[test]
fn tag_membership_is_case_sensitive() {
    let store = test_store();
    let mem = store.create("fact", "cased", &[], "demo").unwrap();
    store.add_tag(&mem.id, "vim").unwrap();
    store.add_tag(&mem.id, "Vim").unwrap();
    assert_eq!(store.fetch_raw(&mem.id).unwrap().tags.len(), 3);
}

#[test]
fn delete_removes_document_and_vector() {
    let store = test_store();
    let mem = store.create("fact", "doomed", &[], "demo").unwrap();
    store.vector_upsert(&mem.id, &[1.0, 0.0]).unwrap();

    store.delete(&mem.id).unwrap();
    assert!(matches!(store.fetch_raw(&mem.id), Err(MnemoError::NotFound(_))));
    assert!(store.vector_get(&mem.id).is_none());
    assert_eq!(store.vector_count(), 0);
}

#[test]
fn delete_missing_is_not_found() {
    let store = test_store();
    assert!(matches!(store.delete("deadbeef"), Err(MnemoError::NotFound(_))));
}

#[test]
fn list_filters_combine_with_and() {
    let store = test_store();
    store.create("fact", "a", &tags(&["x"]), "demo").unwrap();
    store.create("fact", "b", &tags(&["y"]), "demo").unwrap();
    store.create("learned", "c", &tags(&["x"]), "demo").unwrap();

    let by_kind = store
        .list(&ListFilter { kind: Some("fact".into()), tag: None }, 100)
        .unwrap();
    assert_eq!(by_kind.len(), 2);

    let by_tag = store
        .list(&ListFilter { kind: None, tag: Some(TagFilter::Exact("x".into())) }, 100)
        .unwrap();
    assert_eq!(by_tag.len(), 2);

    let both = store
        .list(
            &ListFilter {
                kind: Some("fact".into()),
                tag: Some(TagFilter::Exact("x".into())),
            },
            100,
        )
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].content, "a");
}

#[test]
fn list_tag_prefix_wildcard() {
    let store = test_store();
    store.create("fact", "one", &[], "alpha").unwrap();
    store.create("fact", "two", &[], "beta").unwrap();
    store.create("fact", "three", &tags(&["unrelated"]), "").unwrap();

    let scoped = store
        .list(
            &ListFilter { kind: None, tag: Some(TagFilter::Prefix("project:".into())) },
            100,
        )
        .unwrap();
    assert_eq!(scoped.len(), 2);
}

#[test]
fn tag_filter_parse() {
    assert!(matches!(TagFilter::parse("editor*"), TagFilter::Prefix(p) if p == "editor"));
    assert!(matches!(TagFilter::parse("editor"), TagFilter::Exact(t) if t == "editor"));
}

#[test]
fn list_respects_limit() {
    let store = test_store();
    for i in 0..5 {
        store.create("fact", &format!("note {i}"), &[], "demo").unwrap();
    }
    let out = store.list(&ListFilter::default(), 3).unwrap();
    assert_eq!(out.len(), 3);
}

#[test]
fn text_search_matches_content() {
    let store = test_store();
    store.create("fact", "user prefers vim keybindings", &[], "demo").unwrap();
    store.create("fact", "deploy runs on fridays", &[], "demo").unwrap();

    let hits = store.text_search("vim", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].content.contains("vim"));

    assert!(store.text_search("emacs", 10).unwrap().is_empty());
    assert!(store.text_search("((**", 10).unwrap().is_empty());
}

#[test]
fn text_search_tracks_updates() {
    let store = test_store();
    let mem = store.create("fact", "old words here", &[], "demo").unwrap();
    store.update_content(&mem.id, "fresh phrasing now").unwrap();

    assert!(store.text_search("words", 10).unwrap().is_empty());
    assert_eq!(store.text_search("phrasing", 10).unwrap().len(), 1);
}

#[test]
fn all_ids_enumerates_everything() {
    let store = test_store();
    let a = store.create("fact", "one", &[], "demo").unwrap();
    let b = store.create("fact", "two", &[], "").unwrap();

    let mut ids = store.all_ids().unwrap();
    ids.sort();
    let mut expect = vec![a.id, b.id];
    expect.sort();
    assert_eq!(ids, expect);
}

#[test]
fn stats_counts_recognized_kinds() {
    let store = test_store();
    store.create("fact", "f1", &[], "demo").unwrap();
    store.create("fact", "f2", &[], "demo").unwrap();
    store.create("learned", "l1", &[], "demo").unwrap();
    store.create("preference", "p1", &[], "demo").unwrap();
    store.create("context", "c1", &[], "demo").unwrap();
    // Free-form kind is stored but only shows up in the total.
    store.create("note", "n1", &[], "demo").unwrap();

    let s = store.stats().unwrap();
    assert_eq!(s.fact, 2);
    assert_eq!(s.learned, 1);
    assert_eq!(s.preference, 1);
    assert_eq!(s.context, 1);
    assert_eq!(s.total, 6);
}

#[test]
fn projects_histogram() {
    let store = test_store();
    store.create("fact", "a", &[], "alpha").unwrap();
    store.create("fact", "b", &[], "alpha").unwrap();
    store.create("fact", "c", &[], "beta").unwrap();
    store.create("fact", "d", &[], "").unwrap();

    let projects = store.projects().unwrap();
    assert_eq!(projects, vec![("alpha".into(), 2), ("beta".into(), 1)]);
}

#[test]
fn context_is_project_scoped() {
    let store = test_store();
    let foo = store.create("fact", "foo note", &[], "foo").unwrap();
    store.create("fact", "bar note", &[], "bar").unwrap();
    store.create("fact", "global note", &[], "").unwrap();

    let in_foo = store.context("foo", 10).unwrap();
    assert_eq!(in_foo.len(), 1);
    assert_eq!(in_foo[0].id, foo.id);

    let in_bar = store.context("bar", 10).unwrap();
    assert_eq!(in_bar.len(), 1);
    assert!(!in_bar.iter().any(|m| m.id == foo.id));

    // Global memories belong to no project context.
    assert!(store.context("baz", 10).unwrap().is_empty());
}

#[test]
fn rebuild_index_is_idempotent() {
    let store = test_store();
    store.create("fact", "searchable words", &[], "demo").unwrap();
    store.create("fact", "more searchable text", &[], "demo").unwrap();

    assert_eq!(store.rebuild_index().unwrap(), 2);
    assert_eq!(store.rebuild_index().unwrap(), 2);
    assert_eq!(store.text_search("searchable", 10).unwrap().len(), 2);
}

#[test]
fn vector_upsert_get_drop() {
    let store = test_store();
    let mem = store.create("fact", "embedded", &[], "demo").unwrap();

    assert_eq!(store.vector_count(), 0);
    store.vector_upsert(&mem.id, &[0.1, 0.2, 0.3]).unwrap();
    assert_eq!(store.vector_count(), 1);
    assert_eq!(store.vector_get(&mem.id).unwrap(), vec![0.1, 0.2, 0.3]);

    // Upsert replaces in place.
    store.vector_upsert(&mem.id, &[0.4, 0.5, 0.6]).unwrap();
    assert_eq!(store.vector_count(), 1);
    assert_eq!(store.vector_get(&mem.id).unwrap(), vec![0.4, 0.5, 0.6]);

    store.vector_drop_all().unwrap();
    assert_eq!(store.vector_count(), 0);
    assert!(store.vector_get(&mem.id).is_none());
}

#[test]
fn knn_orders_by_similarity_and_skips_orphans() {
    let store = test_store();
    let close = store.create("fact", "close", &[], "demo").unwrap();
    let far = store.create("fact", "far", &[], "demo").unwrap();
    store.vector_upsert(&close.id, &[1.0, 0.0]).unwrap();
    store.vector_upsert(&far.id, &[0.0, 1.0]).unwrap();
    // Vector whose document no longer exists must be skipped, not fail.
    store.vector_upsert("0rphan00", &[1.0, 0.0]).unwrap();

    let hits = store.vector_knn(&[1.0, 0.0], 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].memory.id, close.id);
    assert!((hits[0].score - 1.0).abs() < 1e-9);
    assert_eq!(hits[1].memory.id, far.id);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn vectors_survive_reopen() {
    let path = std::env::temp_dir().join(format!("mnemo-reopen-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_str().unwrap().to_string();

    {
        let store = MemoryStore::open(&path_str).unwrap();
        let mem = store.create("fact", "persisted", &[], "demo").unwrap();
        store.vector_upsert(&mem.id, &[0.5, 0.5]).unwrap();
    }
    {
        let store = MemoryStore::open(&path_str).unwrap();
        assert_eq!(store.vector_count(), 1);
        let hits = store.vector_knn(&[0.5, 0.5], 1).unwrap();
        assert_eq!(hits[0].memory.content, "persisted");
    }

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}
