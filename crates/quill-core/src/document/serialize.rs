//! Conversion between the arena and the editor's JSON state format.

use serde_json::{json, Map, Value};

use super::{
    Direction, DocumentState, ElementAttrs, InternalLink, NodeData, NodeKey, NodeKind, TextNode,
    INTERNAL_LINK_TYPE,
};
use crate::error::DocumentError;
use crate::model::NoteId;

const BASE_FIELDS: &[&str] = &["type", "version"];
const ELEMENT_FIELDS: &[&str] = &["type", "version", "children", "direction", "format", "indent"];
const HEADING_FIELDS: &[&str] = &[
    "type", "version", "children", "direction", "format", "indent", "tag",
];
const TEXT_FIELDS: &[&str] = &["type", "version", "text", "format"];
const LINK_FIELDS: &[&str] = &[
    "type", "version", "children", "direction", "format", "indent", "uuid", "title",
];
const UNKNOWN_FIELDS: &[&str] = &["type", "version", "children"];

pub(super) fn import_state(value: &Value) -> Result<DocumentState, DocumentError> {
    let root = value
        .get("root")
        .ok_or_else(|| invalid("missing root node"))?;
    let obj = as_object(root)?;
    if obj.get("type").and_then(Value::as_str) != Some("root") {
        return Err(invalid("top-level node must have type root"));
    }

    let mut state = DocumentState::with_root(element_attrs(obj)?);
    let root_key = state.root;
    {
        let data = state.get_mut(root_key)?;
        data.version = version(obj)?;
        data.extra = extras(obj, ELEMENT_FIELDS);
    }
    import_children(&mut state, root_key, obj)?;
    Ok(state)
}

fn import_children(
    state: &mut DocumentState,
    parent: NodeKey,
    obj: &Map<String, Value>,
) -> Result<(), DocumentError> {
    let Some(children) = obj.get("children") else {
        return Ok(());
    };
    let children = children
        .as_array()
        .ok_or_else(|| invalid("children must be an array"))?;

    for child in children {
        let key = import_node(state, child)?;
        state.get_mut(key)?.parent = Some(parent);
        state.get_mut(parent)?.children.push(key);
    }
    Ok(())
}

fn import_node(state: &mut DocumentState, value: &Value) -> Result<NodeKey, DocumentError> {
    let obj = as_object(value)?;
    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("node without type"))?;

    let mut missing_title = false;
    let (kind, known) = match node_type {
        "root" => return Err(invalid("root node nested inside the tree")),
        "paragraph" => (NodeKind::Paragraph(element_attrs(obj)?), ELEMENT_FIELDS),
        "quote" => (NodeKind::Quote(element_attrs(obj)?), ELEMENT_FIELDS),
        "heading" => {
            let tag = obj
                .get("tag")
                .and_then(Value::as_str)
                .unwrap_or("h1")
                .to_string();
            let attrs = element_attrs(obj)?;
            (NodeKind::Heading { tag, attrs }, HEADING_FIELDS)
        }
        "text" => {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("text node without text"))?
                .to_string();
            let format = number(obj, "format", 0)?;
            (NodeKind::Text(TextNode { text, format }), TEXT_FIELDS)
        }
        "linebreak" => (NodeKind::LineBreak, BASE_FIELDS),
        INTERNAL_LINK_TYPE => {
            let uuid = obj
                .get("uuid")
                .and_then(Value::as_str)
                .filter(|uuid| !uuid.is_empty())
                .ok_or_else(|| invalid("internal link without uuid"))?;
            let title = obj.get("title").and_then(Value::as_str);
            missing_title = title.is_none();
            let link = InternalLink {
                uuid: NoteId::from(uuid),
                title: title.unwrap_or_default().to_string(),
                attrs: element_attrs(obj)?,
            };
            (NodeKind::InternalLink(link), LINK_FIELDS)
        }
        other => (
            NodeKind::Unknown {
                node_type: other.to_string(),
                element: obj.contains_key("children"),
            },
            UNKNOWN_FIELDS,
        ),
    };

    let is_element = kind.is_element();
    let mut data = NodeData::new(kind);
    data.version = version(obj)?;
    data.extra = extras(obj, known);
    let key = state.alloc(data);

    if is_element {
        import_children(state, key, obj)?;
    }

    // Links saved before titles were stored show their text instead
    if missing_title {
        let title = raw_text(state, key);
        if let NodeKind::InternalLink(link) = &mut state.get_mut(key)?.kind {
            link.title = title;
        }
    }
    Ok(key)
}

pub(super) fn export_state(state: &DocumentState) -> Value {
    json!({ "root": export_node(state, state.root) })
}

pub(super) fn export_node(state: &DocumentState, key: NodeKey) -> Value {
    let Some(node) = state.nodes.get(&key) else {
        return Value::Null;
    };

    let mut obj = node.extra.clone();
    match &node.kind {
        NodeKind::Root(attrs) | NodeKind::Paragraph(attrs) | NodeKind::Quote(attrs) => {
            write_element(&mut obj, attrs);
        }
        NodeKind::Heading { tag, attrs } => {
            write_element(&mut obj, attrs);
            obj.insert("tag".into(), Value::from(tag.as_str()));
        }
        NodeKind::Text(text) => {
            obj.insert("text".into(), Value::from(text.text.as_str()));
            obj.insert("format".into(), Value::from(text.format));
        }
        NodeKind::InternalLink(link) => {
            write_element(&mut obj, &link.attrs);
            obj.insert("uuid".into(), Value::from(link.uuid.as_str()));
            obj.insert("title".into(), Value::from(link.title.as_str()));
        }
        NodeKind::LineBreak | NodeKind::Unknown { .. } => {}
    }

    obj.insert("type".into(), Value::from(node.kind.type_name()));
    obj.insert("version".into(), Value::from(node.version));

    if node.kind.is_element() {
        let children = node
            .children
            .iter()
            .map(|child| export_node(state, *child))
            .collect();
        obj.insert("children".into(), Value::Array(children));
    }

    Value::Object(obj)
}

fn write_element(obj: &mut Map<String, Value>, attrs: &ElementAttrs) {
    obj.insert("format".into(), Value::from(attrs.format.as_str()));
    obj.insert("indent".into(), Value::from(attrs.indent));
    let direction = match attrs.direction {
        Some(Direction::Ltr) => Value::from("ltr"),
        Some(Direction::Rtl) => Value::from("rtl"),
        None => Value::Null,
    };
    obj.insert("direction".into(), direction);
}

fn element_attrs(obj: &Map<String, Value>) -> Result<ElementAttrs, DocumentError> {
    let format = match obj.get("format") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(format)) => format.clone(),
        Some(other) => return Err(invalid(&format!("unsupported element format {}", other))),
    };
    let indent = number(obj, "indent", 0)?;
    let direction = match obj.get("direction").and_then(Value::as_str) {
        Some("ltr") => Some(Direction::Ltr),
        Some("rtl") => Some(Direction::Rtl),
        _ => None,
    };
    Ok(ElementAttrs {
        format,
        indent,
        direction,
    })
}

fn version(obj: &Map<String, Value>) -> Result<u32, DocumentError> {
    number(obj, "version", 1)
}

/// A `u32` field, `default` when absent
fn number(obj: &Map<String, Value>, field: &str, default: u32) -> Result<u32, DocumentError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(&format!("{} out of range: {}", field, value))),
    }
}

fn extras(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn raw_text(state: &DocumentState, key: NodeKey) -> String {
    let Some(node) = state.nodes.get(&key) else {
        return String::new();
    };
    match &node.kind {
        NodeKind::Text(text) => text.text.clone(),
        _ => node
            .children
            .iter()
            .map(|child| raw_text(state, *child))
            .collect(),
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, DocumentError> {
    value
        .as_object()
        .ok_or_else(|| invalid("node must be an object"))
}

fn invalid(message: &str) -> DocumentError {
    DocumentError::Serialization(message.to_string())
}
