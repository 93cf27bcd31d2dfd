use super::*;
use crate::config::CacheConfig;
use crate::document::{NodeKind, TextNode};
use crate::gateway::{Gateway, MemoryBackend};
use crate::query::QueryCache;
use std::sync::Arc;

fn create_typeahead() -> Typeahead {
    Typeahead::new(&TypeaheadConfig::default()).unwrap()
}

/// A document with one paragraph holding `text`, caret at `caret`
fn typed(text: &str, caret: usize) -> (Document, NodeKey, NodeKey) {
    let mut doc = Document::new();
    let paragraph = doc.node(doc.root()).unwrap().children()[0];
    let node = doc
        .update(|txn| {
            let node = txn.create_node(NodeKind::Text(TextNode::new(text)));
            txn.append_child(paragraph, node)?;
            txn.set_selection(Some(Selection::collapsed(Point {
                key: node,
                offset: caret,
            })));
            Ok(node)
        })
        .unwrap();
    (doc, paragraph, node)
}

fn options(count: usize) -> Vec<LinkOption> {
    (0..count)
        .map(|i| LinkOption {
            uuid: NoteId::from(format!("n-{}", i)),
            title: format!("Project {}", i),
        })
        .collect()
}

fn text_of(doc: &Document, key: NodeKey) -> String {
    doc.node(key).unwrap().kind().as_text().unwrap().text.clone()
}

#[test]
fn test_trigger_opens_composition() {
    let (doc, _, node) = typed("See [[Proj", 10);
    let mut typeahead = create_typeahead();

    assert!(typeahead.on_caret_change(&doc));
    let composition = typeahead.composition().unwrap();
    assert_eq!(composition.text_node, node);
    assert_eq!(composition.trigger.matching_string, "[[Proj");
    assert_eq!(typeahead.query(), Some("Proj"));
}

#[test]
fn test_single_bracket_stays_idle() {
    let (doc, _, _) = typed("See [Proj", 9);
    let mut typeahead = create_typeahead();
    assert!(!typeahead.on_caret_change(&doc));
    assert_eq!(typeahead.state(), &TypeaheadState::Idle);
}

#[test]
fn test_query_follows_typing_and_closes_when_caret_leaves() {
    let (mut doc, _, node) = typed("See [[Pro", 9);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(3));

    doc.update(|txn| {
        txn.set_text(node, "See [[Proj")?;
        txn.set_selection(Some(Selection::collapsed(Point { key: node, offset: 10 })));
        Ok(())
    })
    .unwrap();
    assert!(typeahead.on_caret_change(&doc));
    assert_eq!(typeahead.query(), Some("Proj"));
    assert_eq!(typeahead.composition().unwrap().options.len(), 3, "Options stay until replaced");

    doc.update(|txn| {
        txn.set_selection(Some(Selection::collapsed(Point { key: node, offset: 2 })));
        Ok(())
    })
    .unwrap();
    assert!(!typeahead.on_caret_change(&doc));
    assert_eq!(typeahead.state(), &TypeaheadState::Idle);
}

#[test]
fn test_options_are_capped_and_pointer_reset() {
    let (doc, _, _) = typed("[[", 2);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);

    typeahead.set_options(options(8));
    let composition = typeahead.composition().unwrap();
    assert_eq!(composition.options.len(), 5);
    assert_eq!(composition.selected_index, 0);

    typeahead.set_options(vec![]);
    assert_eq!(typeahead.composition().unwrap().selected_index, -1);
}

#[test]
fn test_pointer_is_clamped() {
    let (mut doc, _, _) = typed("[[Proj", 6);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(5));

    let mut press = |key| typeahead.handle_key(key, &mut doc).unwrap();
    assert_eq!(press(Key::ArrowUp), KeyOutcome::Moved { selected_index: -1 });
    assert_eq!(press(Key::ArrowUp), KeyOutcome::Moved { selected_index: -1 });
    assert_eq!(press(Key::Enter), KeyOutcome::Ignored, "Nothing highlighted");
    for _ in 0..7 {
        press(Key::ArrowDown);
    }
    assert_eq!(press(Key::ArrowDown), KeyOutcome::Moved { selected_index: 4 });
    assert_eq!(press(Key::ArrowUp), KeyOutcome::Moved { selected_index: 3 });
}

#[test]
fn test_commit_replaces_span_with_link() {
    let (mut doc, paragraph, node) = typed("See [[Proj and more", 10);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(5));

    let link = typeahead.commit(&mut doc, 2).unwrap();

    assert_eq!(typeahead.state(), &TypeaheadState::Idle);
    let inserted = doc.node(link).unwrap().kind().as_internal_link().unwrap();
    assert_eq!(inserted.uuid, NoteId::from("n-2"));
    assert_eq!(inserted.title, "Project 2");

    let children = doc.node(paragraph).unwrap().children().to_vec();
    assert_eq!(children.len(), 3);
    assert_eq!(children[0], node);
    assert_eq!(text_of(&doc, node), "See ");
    assert_eq!(children[1], link);
    assert_eq!(text_of(&doc, children[2]), " and more");
    assert_eq!(doc.raw_text(paragraph), "See Project 2 and more");

    assert_eq!(
        doc.selection(),
        Some(Selection::collapsed(Point {
            key: paragraph,
            offset: 2
        }))
    );
}

#[test]
fn test_commit_span_at_start_of_text() {
    let (mut doc, paragraph, _) = typed("[[Proj", 6);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(2));

    let outcome = typeahead.handle_key(Key::Tab, &mut doc).unwrap();
    let KeyOutcome::Committed(link) = outcome else {
        panic!("expected a commit, got {:?}", outcome);
    };
    assert_eq!(doc.node(paragraph).unwrap().children(), &[link]);
    assert_eq!(doc.internal_links()[0].1.uuid, NoteId::from("n-0"));
    assert_eq!(
        doc.selection().map(|selection| selection.anchor.offset),
        Some(1)
    );
}

#[test]
fn test_commit_errors_leave_document_alone() {
    let (mut doc, _, _) = typed("[[Proj", 6);
    let mut typeahead = create_typeahead();
    assert_eq!(typeahead.commit(&mut doc, 0), Err(TypeaheadError::NotComposing));

    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(2));
    let snapshot = doc.clone();
    assert_eq!(
        typeahead.commit(&mut doc, 4),
        Err(TypeaheadError::NoOption {
            index: 4,
            available: 2
        })
    );
    assert!(doc.ptr_eq(&snapshot));
    assert!(typeahead.composition().is_some());
}

#[test]
fn test_commit_refuses_edited_span() {
    let (mut doc, _, node) = typed("See [[Proj", 10);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    typeahead.set_options(options(2));

    doc.update(|txn| txn.set_text(node, "See ((Proj")).unwrap();
    let snapshot = doc.clone();
    assert_eq!(
        typeahead.commit(&mut doc, 0),
        Err(TypeaheadError::SpanChanged {
            expected: "[[Proj".to_string()
        })
    );
    assert!(doc.ptr_eq(&snapshot));
    assert_eq!(text_of(&doc, node), "See ((Proj");
    assert!(doc.internal_links().is_empty());
}

#[test]
fn test_escape_dismisses() {
    let (mut doc, _, _) = typed("[[Proj", 6);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);
    assert_eq!(typeahead.handle_key(Key::Escape, &mut doc), Ok(KeyOutcome::Dismissed));
    assert_eq!(typeahead.state(), &TypeaheadState::Idle);
    assert_eq!(typeahead.handle_key(Key::ArrowDown, &mut doc), Ok(KeyOutcome::Ignored));
}

#[tokio::test]
async fn test_suggest_loads_matching_titles() {
    let backend = Arc::new(MemoryBackend::new());
    let beta = backend.insert_note("Project Beta", "");
    backend.insert_note("Project Alpha", "");
    backend.insert_note("Groceries", "");
    let queries = Queries::new(
        Gateway::new(backend.clone()),
        QueryCache::default(),
        CacheConfig::default(),
    );

    let (mut doc, _, _) = typed("[[proj", 6);
    let mut typeahead = create_typeahead();
    typeahead.on_caret_change(&doc);

    let state = typeahead.suggest(&queries).await.unwrap();
    assert!(state.is_success());
    let titles: Vec<&str> = typeahead
        .composition()
        .unwrap()
        .options
        .iter()
        .map(|option| option.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Project Alpha", "Project Beta"]);

    let link = typeahead.commit(&mut doc, 1).unwrap();
    let inserted = doc.node(link).unwrap().kind().as_internal_link().unwrap();
    assert_eq!(inserted.uuid, beta.uuid);
}

#[tokio::test]
async fn test_suggest_when_idle_does_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let queries = Queries::new(
        Gateway::new(backend.clone()),
        QueryCache::default(),
        CacheConfig::default(),
    );
    let mut typeahead = create_typeahead();
    assert!(typeahead.suggest(&queries).await.is_none());
    assert_eq!(backend.call_count(), 0);
}
