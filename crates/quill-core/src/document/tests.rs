use super::*;
use crate::model::NoteId;
use crate::route::Route;
use serde_json::json;
use std::collections::HashMap;

fn text(value: &str) -> Value {
    json!({
        "detail": 0,
        "format": 0,
        "mode": "normal",
        "style": "",
        "text": value,
        "type": "text",
        "version": 1
    })
}

fn sample_state() -> Value {
    json!({
        "root": {
            "children": [{
                "children": [
                    text("See "),
                    {
                        "children": [text("Project X")],
                        "direction": "ltr",
                        "format": "",
                        "indent": 0,
                        "title": "Project X",
                        "type": "internal-link",
                        "uuid": "abc-123",
                        "version": 1
                    },
                    text(" soon")
                ],
                "direction": "ltr",
                "format": "",
                "indent": 0,
                "textFormat": 0,
                "type": "paragraph",
                "version": 1
            }],
            "direction": "ltr",
            "format": "",
            "indent": 0,
            "type": "root",
            "version": 1
        }
    })
}

/// The sample document with the keys of the link and its text child
fn sample() -> (Document, NodeKey, NodeKey) {
    let doc = Document::from_value(&sample_state()).unwrap();
    let (link, _) = doc.internal_links()[0];
    let link_text = doc.node(link).unwrap().children()[0];
    (doc, link, link_text)
}

fn first_paragraph(doc: &Document) -> NodeKey {
    doc.node(doc.root()).unwrap().children()[0]
}

fn select(doc: &mut Document, anchor: Point, focus: Point) {
    doc.update(|txn| {
        txn.set_selection(Some(Selection { anchor, focus }));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_round_trip_preserves_state() {
    let (doc, link, _) = sample();
    assert_eq!(doc.to_value(), sample_state());

    let link_data = doc.node(link).unwrap();
    let parsed = link_data.kind().as_internal_link().unwrap();
    assert_eq!(parsed.uuid, NoteId::from("abc-123"));
    assert_eq!(parsed.title, "Project X");
    assert_eq!(doc.index_in_parent(link), Some(1));

    let reparsed = Document::from_json(&doc.to_json().unwrap()).unwrap();
    assert_eq!(reparsed.to_value(), sample_state());
}

#[test]
fn test_export_single_link_node() {
    let (doc, link, _) = sample();
    let exported = doc.export_node(link).unwrap();
    assert_eq!(exported["type"], "internal-link");
    assert_eq!(exported["uuid"], "abc-123");
    assert_eq!(exported["title"], "Project X");
    assert_eq!(exported["version"], 1);
}

#[test]
fn test_legacy_link_without_title_uses_its_text() {
    let state = json!({
        "root": {
            "type": "root",
            "children": [{
                "type": "paragraph",
                "children": [{
                    "type": "internal-link",
                    "uuid": "n-1",
                    "children": [text("Old "), text("Name")]
                }]
            }]
        }
    });
    let doc = Document::from_value(&state).unwrap();
    let links = doc.internal_links();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].1.title, "Old Name");
}

#[test]
fn test_import_rejects_broken_state() {
    let no_uuid = json!({
        "root": {"type": "root", "children": [{"type": "internal-link", "children": []}]}
    });
    assert!(matches!(
        Document::from_value(&no_uuid),
        Err(DocumentError::Serialization(_))
    ));
    assert!(Document::from_value(&json!({"root": {"type": "paragraph"}})).is_err());
    assert!(Document::from_json("not json").is_err());
}

#[test]
fn test_import_rejects_numbers_out_of_range() {
    let huge = u64::from(u32::MAX) + 1;
    let mut big_format = text("x");
    big_format["format"] = json!(huge);
    let states = [
        json!({"root": {"type": "root", "children": [
            {"type": "paragraph", "children": [big_format]}
        ]}}),
        json!({"root": {"type": "root", "indent": huge, "children": []}}),
        json!({"root": {"type": "root", "children": [
            {"type": "paragraph", "version": -1, "children": []}
        ]}}),
    ];
    for state in &states {
        assert!(
            matches!(Document::from_value(state), Err(DocumentError::Serialization(_))),
            "{} should be rejected",
            state
        );
    }

    let mut max_format = text("x");
    max_format["format"] = json!(u32::MAX);
    let state = json!({"root": {"type": "root", "children": [
        {"type": "paragraph", "children": [max_format]}
    ]}});
    let doc = Document::from_value(&state).unwrap();
    assert_eq!(doc.to_value()["root"]["children"][0]["children"][0]["format"], json!(u32::MAX));
}

#[test]
fn test_unknown_nodes_survive_round_trip() {
    let state = json!({
        "root": {
            "children": [{
                "children": [text("item")],
                "checked": true,
                "type": "listitem",
                "value": 1,
                "version": 1
            }, {
                "type": "horizontalrule",
                "version": 1
            }],
            "direction": null,
            "format": "",
            "indent": 0,
            "type": "root",
            "version": 1
        }
    });
    let doc = Document::from_value(&state).unwrap();
    assert_eq!(doc.to_value(), state);
}

#[test]
fn test_new_document_has_one_empty_paragraph() {
    let doc = Document::new();
    let paragraph = first_paragraph(&doc);
    assert_eq!(doc.node_count(), 2);
    assert!(matches!(
        doc.node(paragraph).unwrap().kind(),
        NodeKind::Paragraph(_)
    ));
    assert_eq!(doc.text_content(), "");

    let reparsed = Document::from_json(&doc.to_json().unwrap()).unwrap();
    assert_eq!(reparsed.node_count(), 2);
}

#[test]
fn test_text_content_joins_trimmed_pieces() {
    let (doc, _, _) = sample();
    assert_eq!(doc.text_content(), "See Project X soon");
    assert_eq!(doc.raw_text(doc.root()), "See Project X soon");
}

#[test]
fn test_split_text_by_characters() {
    let mut doc = Document::new();
    let paragraph = first_paragraph(&doc);
    let (left, right) = doc
        .update(|txn| {
            let left = txn.create_node(NodeKind::Text(TextNode::new("héllo wörld")));
            txn.append_child(paragraph, left)?;
            let right = txn.split_text(left, 6)?;
            Ok((left, right))
        })
        .unwrap();

    let text_of = |key| doc.node(key).unwrap().kind().as_text().unwrap().text.clone();
    assert_eq!(text_of(left), "héllo ");
    assert_eq!(text_of(right), "wörld");
    assert_eq!(doc.node(paragraph).unwrap().children(), &[left, right]);
}

#[test]
fn test_split_text_out_of_bounds_fails() {
    let (mut doc, _, link_text) = sample();
    let result = doc.update(|txn| txn.split_text(link_text, 42));
    assert_eq!(
        result,
        Err(DocumentError::OffsetOutOfBounds {
            key: link_text,
            offset: 42
        })
    );
}

#[test]
fn test_removing_last_child_removes_link() {
    let (mut doc, link, link_text) = sample();
    let before = doc.node_count();
    doc.update(|txn| txn.remove(link_text)).unwrap();

    assert!(doc.node(link).is_none());
    assert!(doc.internal_links().is_empty());
    assert_eq!(doc.node_count(), before - 2);
    assert_eq!(doc.text_content(), "See soon");
}

#[test]
fn test_root_cannot_be_removed() {
    let mut doc = Document::new();
    let root = doc.root();
    assert_eq!(
        doc.update(|txn| txn.remove(root)),
        Err(DocumentError::RootOperation("removed"))
    );
}

#[test]
fn test_failed_update_leaves_document_untouched() {
    let (mut doc, link, link_text) = sample();
    let snapshot = doc.clone();

    let result: Result<(), _> = doc.update(|txn| {
        txn.set_text(link_text, "changed")?;
        txn.set_text(link, "not a text node")
    });

    assert!(matches!(result, Err(DocumentError::WrongKind { .. })));
    assert!(doc.ptr_eq(&snapshot));
    assert_eq!(doc.to_value(), sample_state());
}

#[test]
fn test_update_does_not_touch_earlier_snapshots() {
    let (mut doc, _, link_text) = sample();
    let snapshot = doc.clone();

    doc.update(|txn| txn.set_text(link_text, "Renamed")).unwrap();

    assert!(!doc.ptr_eq(&snapshot));
    assert_eq!(snapshot.to_value(), sample_state());
    assert_eq!(doc.text_content(), "See Renamed soon");
}

#[test]
fn test_unattached_nodes_are_dropped_on_commit() {
    let mut doc = Document::new();
    let before = doc.node_count();
    let orphan = doc
        .update(|txn| Ok(txn.create_node(NodeKind::Text(TextNode::new("lost")))))
        .unwrap();
    assert!(doc.node(orphan).is_none());
    assert_eq!(doc.node_count(), before);
}

#[test]
fn test_selection_on_removed_node_is_cleared() {
    let (mut doc, link, link_text) = sample();
    let caret = Point {
        key: link_text,
        offset: 3,
    };
    select(&mut doc, caret, caret);
    assert!(doc.selection().is_some());

    doc.update(|txn| txn.remove(link)).unwrap();
    assert_eq!(doc.selection(), None);
}

#[test]
fn test_text_before_caret() {
    let (mut doc, _, _) = sample();
    let paragraph = first_paragraph(&doc);
    let last = *doc.node(paragraph).unwrap().children().last().unwrap();
    let caret = Point {
        key: last,
        offset: 3,
    };
    select(&mut doc, caret, caret);
    assert_eq!(doc.text_before_caret(), Some((last, " so".to_string())));

    select(&mut doc, caret, Point { key: last, offset: 4 });
    assert_eq!(doc.text_before_caret(), None);
}

#[test]
fn test_click_with_collapsed_selection_navigates_once() {
    let (mut doc, _, link_text) = sample();
    let caret = Point {
        key: link_text,
        offset: 2,
    };
    select(&mut doc, caret, caret);

    let mut visited: Vec<Route> = Vec::new();
    let outcome = LinkClickHandler::new().handle(
        &doc,
        &ClickEvent {
            target: link_text,
            button: MouseButton::Primary,
        },
        &mut visited,
    );

    let expected = Route::Note(NoteId::from("abc-123"));
    assert_eq!(outcome, ClickOutcome::Navigated(expected.clone()));
    assert!(outcome.prevents_default());
    assert_eq!(visited, vec![expected]);
    assert_eq!(visited[0].to_string(), "/notes/abc-123");
}

#[test]
fn test_click_while_selecting_link_text_does_not_navigate() {
    let (mut doc, link, link_text) = sample();
    select(
        &mut doc,
        Point {
            key: link_text,
            offset: 0,
        },
        Point {
            key: link_text,
            offset: 7,
        },
    );

    let mut visited: Vec<Route> = Vec::new();
    let outcome = LinkClickHandler::new().handle(
        &doc,
        &ClickEvent {
            target: link,
            button: MouseButton::Primary,
        },
        &mut visited,
    );

    assert_eq!(outcome, ClickOutcome::Suppressed);
    assert!(outcome.prevents_default());
    assert!(visited.is_empty());
}

#[test]
fn test_click_outcomes_by_button_and_target() {
    let (doc, link, _) = sample();
    let paragraph = first_paragraph(&doc);
    let plain = doc.node(paragraph).unwrap().children()[0];
    let handler = LinkClickHandler::new();
    let mut visited: Vec<Route> = Vec::new();

    let click = |target, button| ClickEvent { target, button };

    let outcome = handler.handle(&doc, &click(plain, MouseButton::Primary), &mut visited);
    assert_eq!(outcome, ClickOutcome::Ignored);
    assert!(!outcome.prevents_default());

    let outcome = handler.handle(&doc, &click(link, MouseButton::Secondary), &mut visited);
    assert_eq!(outcome, ClickOutcome::Ignored);
    assert!(visited.is_empty());

    let outcome = handler.handle(&doc, &click(link, MouseButton::Auxiliary), &mut visited);
    assert!(matches!(outcome, ClickOutcome::Navigated(_)));
    assert_eq!(visited.len(), 1);

    let disabled = LinkClickHandler { disabled: true };
    let outcome = disabled.handle(&doc, &click(link, MouseButton::Primary), &mut visited);
    assert_eq!(outcome, ClickOutcome::Ignored);
    assert_eq!(visited.len(), 1);
}

#[test]
fn test_refresh_link_titles() {
    let (mut doc, link, _) = sample();
    let mut titles = HashMap::new();
    titles.insert(NoteId::from("abc-123"), "Project Y".to_string());
    titles.insert(NoteId::from("unused"), "Other".to_string());

    assert_eq!(doc.refresh_link_titles(&titles).unwrap(), 1);
    let refreshed = doc.node(link).unwrap().kind().as_internal_link().unwrap();
    assert_eq!(refreshed.uuid, NoteId::from("abc-123"));
    assert_eq!(refreshed.title, "Project Y");
    assert_eq!(doc.text_content(), "See Project Y soon");

    let snapshot = doc.clone();
    assert_eq!(doc.refresh_link_titles(&titles).unwrap(), 0);
    assert!(doc.ptr_eq(&snapshot));
}

#[test]
fn test_pasted_anchor_becomes_link() {
    let mut doc = Document::new();
    let paragraph = first_paragraph(&doc);
    let anchor = AnchorElement {
        href: Some("/notes/n-7".to_string()),
        title: Some("Reading List".to_string()),
        text_content: "Reading List".to_string(),
        child_count: 1,
    };
    let external = AnchorElement {
        href: Some("https://example.com".to_string()),
        text_content: "elsewhere".to_string(),
        child_count: 1,
        ..AnchorElement::default()
    };

    let (inserted, skipped) = doc
        .update(|txn| {
            let start = txn.create_node(NodeKind::Text(TextNode::new("Read ")));
            txn.append_child(paragraph, start)?;
            let inserted = txn.insert_anchor_after(start, &anchor)?;
            let skipped = txn.insert_anchor_after(start, &external)?;
            Ok((inserted, skipped))
        })
        .unwrap();

    let key = inserted.expect("anchor should convert");
    assert_eq!(skipped, None);
    assert_eq!(doc.index_in_parent(key), Some(1));
    let link = doc.node(key).unwrap().kind().as_internal_link().unwrap();
    assert_eq!(link.uuid, NoteId::from("n-7"));
    assert_eq!(doc.text_content(), "Read Reading List");
}
