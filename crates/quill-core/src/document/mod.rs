//! Arena-backed document tree.
//!
//! Nodes live in a map keyed by [`NodeKey`]. A [`Document`] holds an immutable
//! snapshot; every change goes through [`Document::update`], which edits a copy
//! and swaps it in only when the whole transaction succeeds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::DocumentError;

mod link;
mod navigation;
mod serialize;

pub use link::{AnchorElement, InternalLink, INTERNAL_LINK_TYPE};
pub use navigation::{ClickEvent, ClickOutcome, LinkClickHandler, MouseButton, Navigator};

/// Stable handle to a node inside one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u32);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// Layout metadata shared by element nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementAttrs {
    pub format: String,
    pub indent: u32,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub text: String,
    /// Bit set of inline styles (bold, italic, ...)
    pub format: u32,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root(ElementAttrs),
    Paragraph(ElementAttrs),
    Heading { tag: String, attrs: ElementAttrs },
    Quote(ElementAttrs),
    Text(TextNode),
    LineBreak,
    InternalLink(InternalLink),
    /// Any node type this crate does not model, kept for lossless round trips
    Unknown { node_type: String, element: bool },
}

impl NodeKind {
    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Root(_) => "root",
            NodeKind::Paragraph(_) => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::Quote(_) => "quote",
            NodeKind::Text(_) => "text",
            NodeKind::LineBreak => "linebreak",
            NodeKind::InternalLink(_) => INTERNAL_LINK_TYPE,
            NodeKind::Unknown { node_type, .. } => node_type,
        }
    }

    pub fn is_element(&self) -> bool {
        match self {
            NodeKind::Text(_) | NodeKind::LineBreak => false,
            NodeKind::Unknown { element, .. } => *element,
            _ => true,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::InternalLink(_)
        )
    }

    pub fn can_insert_text_before(&self) -> bool {
        !matches!(self, NodeKind::InternalLink(_))
    }

    pub fn can_insert_text_after(&self) -> bool {
        !matches!(self, NodeKind::InternalLink(_))
    }

    /// Elements that may not survive without children
    pub fn can_be_empty(&self) -> bool {
        !matches!(self, NodeKind::InternalLink(_))
    }

    pub fn as_internal_link(&self) -> Option<&InternalLink> {
        match self {
            NodeKind::InternalLink(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    version: u32,
    /// Serialized fields this crate does not interpret
    extra: Map<String, Value>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            version: 1,
            extra: Map::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// A position in the tree: a character offset inside a text node, or a child
/// index inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone)]
pub struct DocumentState {
    nodes: HashMap<NodeKey, NodeData>,
    root: NodeKey,
    next_key: u32,
    selection: Option<Selection>,
}

impl DocumentState {
    fn with_root(attrs: ElementAttrs) -> Self {
        let root = NodeKey(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeData::new(NodeKind::Root(attrs)));
        Self {
            nodes,
            root,
            next_key: 1,
            selection: None,
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(key, data);
        key
    }

    fn get(&self, key: NodeKey) -> Result<&NodeData, DocumentError> {
        self.nodes.get(&key).ok_or(DocumentError::MissingNode(key))
    }

    fn get_mut(&mut self, key: NodeKey) -> Result<&mut NodeData, DocumentError> {
        self.nodes.get_mut(&key).ok_or(DocumentError::MissingNode(key))
    }

    fn detach(&mut self, key: NodeKey) -> Result<(), DocumentError> {
        let parent = self.get(key)?.parent;
        if let Some(parent) = parent {
            self.get_mut(parent)?.children.retain(|child| *child != key);
        }
        self.get_mut(key)?.parent = None;
        Ok(())
    }

    /// Drop every node that is no longer reachable from the root.
    fn collect_garbage(&mut self) {
        let mut reachable = HashSet::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.get(&key) {
                reachable.insert(key);
                stack.extend(node.children.iter().copied());
            }
        }
        self.nodes.retain(|key, _| reachable.contains(key));

        if let Some(selection) = self.selection {
            if !self.nodes.contains_key(&selection.anchor.key)
                || !self.nodes.contains_key(&selection.focus.key)
            {
                self.selection = None;
            }
        }
    }
}

/// Immutable, cheaply clonable document snapshot
#[derive(Debug, Clone)]
pub struct Document {
    state: Arc<DocumentState>,
}

impl Document {
    /// An empty document: a root holding one empty paragraph
    pub fn new() -> Self {
        let mut state = DocumentState::with_root(ElementAttrs::default());
        let root = state.root;
        let mut paragraph = NodeData::new(NodeKind::Paragraph(ElementAttrs::default()));
        paragraph.parent = Some(root);
        let paragraph = state.alloc(paragraph);
        if let Some(root) = state.nodes.get_mut(&root) {
            root.children.push(paragraph);
        }
        Self {
            state: Arc::new(state),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        Ok(Self {
            state: Arc::new(serialize::import_state(value)?),
        })
    }

    pub fn to_value(&self) -> Value {
        serialize::export_state(&self.state)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&self.to_value())?)
    }

    /// Export a single node and its subtree
    pub fn export_node(&self, key: NodeKey) -> Result<Value, DocumentError> {
        self.state.get(key)?;
        Ok(serialize::export_node(&self.state, key))
    }

    pub fn root(&self) -> NodeKey {
        self.state.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.state.nodes.get(&key)
    }

    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.state.selection
    }

    /// True when both snapshots share the same state
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Position of `key` among its siblings
    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.node(key)?.parent?;
        self.node(parent)?.children.iter().position(|child| *child == key)
    }

    /// `key` itself followed by its ancestors up to the root
    pub fn ancestors(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        std::iter::successors(Some(key), move |current| {
            self.node(*current).and_then(|node| node.parent)
        })
        .filter(move |current| self.node(*current).is_some())
    }

    /// Nearest internal link containing `key` (or `key` itself)
    pub fn nearest_internal_link(&self, key: NodeKey) -> Option<(NodeKey, &InternalLink)> {
        self.ancestors(key).find_map(|ancestor| {
            self.node(ancestor)
                .and_then(|node| node.kind.as_internal_link())
                .map(|link| (ancestor, link))
        })
    }

    /// Depth-first, document-order walk of the tree
    pub fn descendants(&self) -> Vec<NodeKey> {
        let mut order = Vec::with_capacity(self.state.nodes.len());
        let mut stack = vec![self.state.root];
        while let Some(key) = stack.pop() {
            order.push(key);
            if let Some(node) = self.node(key) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// All internal links in document order
    pub fn internal_links(&self) -> Vec<(NodeKey, &InternalLink)> {
        self.descendants()
            .into_iter()
            .filter_map(|key| {
                self.node(key)
                    .and_then(|node| node.kind.as_internal_link())
                    .map(|link| (key, link))
            })
            .collect()
    }

    /// Plain text of the document, for indexing.
    ///
    /// Text pieces are trimmed, empty ones dropped, and the rest joined with
    /// single spaces.
    pub fn text_content(&self) -> String {
        self.text_of(self.state.root).unwrap_or_default()
    }

    fn text_of(&self, key: NodeKey) -> Option<String> {
        let node = self.node(key)?;
        match &node.kind {
            NodeKind::Text(text) => {
                let trimmed = text.text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            NodeKind::LineBreak => None,
            _ => {
                let parts: Vec<String> = node
                    .children
                    .iter()
                    .filter_map(|child| self.text_of(*child))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            }
        }
    }

    /// Raw text of a subtree, without trimming
    pub fn raw_text(&self, key: NodeKey) -> String {
        let Some(node) = self.node(key) else {
            return String::new();
        };
        match &node.kind {
            NodeKind::Text(text) => text.text.clone(),
            NodeKind::LineBreak => "\n".to_string(),
            _ => node
                .children
                .iter()
                .map(|child| self.raw_text(*child))
                .collect(),
        }
    }

    /// The text node holding a collapsed caret, and the text before the caret
    pub fn text_before_caret(&self) -> Option<(NodeKey, String)> {
        let selection = self.selection()?;
        if !selection.is_collapsed() {
            return None;
        }
        let point = selection.anchor;
        let text = self.node(point.key)?.kind.as_text()?;
        let before: String = text.text.chars().take(point.offset).collect();
        Some((point.key, before))
    }

    /// Run `f` against a private copy of the state and commit it if `f`
    /// succeeds. Nodes left unreachable from the root are dropped on commit.
    pub fn update<R>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R, DocumentError>,
    ) -> Result<R, DocumentError> {
        let mut draft = (*self.state).clone();
        let result = {
            let mut txn = Transaction { state: &mut draft };
            f(&mut txn)?
        };
        draft.collect_garbage();
        self.state = Arc::new(draft);
        Ok(result)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable view of a draft state, only reachable inside [`Document::update`]
pub struct Transaction<'a> {
    state: &'a mut DocumentState,
}

impl<'a> Transaction<'a> {
    pub fn root(&self) -> NodeKey {
        self.state.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.state.nodes.get(&key)
    }

    /// Allocate a detached node. It must be attached before the transaction
    /// ends or it is discarded.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeKey {
        self.state.alloc(NodeData::new(kind))
    }

    /// Create an internal link node with a text child showing its title
    pub fn create_internal_link(&mut self, link: InternalLink) -> NodeKey {
        let title = link.title.clone();
        let key = self.create_node(NodeKind::InternalLink(link));
        let text = self.create_node(NodeKind::Text(TextNode::new(title)));
        if let Ok(node) = self.state.get_mut(text) {
            node.parent = Some(key);
        }
        if let Ok(node) = self.state.get_mut(key) {
            node.children.push(text);
        }
        key
    }

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DocumentError> {
        self.ensure_element(parent)?;
        self.ensure_not_root(child, "attached")?;
        self.state.detach(child)?;
        self.state.get_mut(parent)?.children.push(child);
        self.state.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(&mut self, sibling: NodeKey, node: NodeKey) -> Result<(), DocumentError> {
        self.insert_beside(sibling, node, 1)
    }

    pub fn insert_before(&mut self, sibling: NodeKey, node: NodeKey) -> Result<(), DocumentError> {
        self.insert_beside(sibling, node, 0)
    }

    fn insert_beside(
        &mut self,
        sibling: NodeKey,
        node: NodeKey,
        shift: usize,
    ) -> Result<(), DocumentError> {
        self.ensure_not_root(sibling, "given siblings")?;
        self.ensure_not_root(node, "attached")?;
        let parent = self
            .state
            .get(sibling)?
            .parent
            .ok_or(DocumentError::MissingNode(sibling))?;

        self.state.detach(node)?;
        let parent_data = self.state.get_mut(parent)?;
        let index = parent_data
            .children
            .iter()
            .position(|child| *child == sibling)
            .ok_or(DocumentError::MissingNode(sibling))?;
        parent_data.children.insert(index + shift, node);
        self.state.get_mut(node)?.parent = Some(parent);
        Ok(())
    }

    /// Remove a node and its subtree.
    ///
    /// A parent that cannot be empty (an internal link) is removed with its
    /// last child.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), DocumentError> {
        self.ensure_not_root(key, "removed")?;
        let parent = self.state.get(key)?.parent;
        self.state.detach(key)?;
        self.state.nodes.remove(&key);

        if let Some(parent) = parent {
            let parent_data = self.state.get(parent)?;
            if parent_data.children.is_empty() && !parent_data.kind.can_be_empty() {
                self.remove(parent)?;
            }
        }
        Ok(())
    }

    pub fn set_text(&mut self, key: NodeKey, text: &str) -> Result<(), DocumentError> {
        match &mut self.state.get_mut(key)?.kind {
            NodeKind::Text(node) => {
                node.text = text.to_string();
                Ok(())
            }
            other => Err(DocumentError::WrongKind {
                key,
                expected: "text",
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Split a text node at a character offset. The right half becomes a new
    /// sibling inserted after `key`, which keeps the left half.
    pub fn split_text(&mut self, key: NodeKey, offset: usize) -> Result<NodeKey, DocumentError> {
        let (left, right, format, extra) = {
            let node = self.state.get(key)?;
            let text = match &node.kind {
                NodeKind::Text(text) => text,
                other => {
                    return Err(DocumentError::WrongKind {
                        key,
                        expected: "text",
                        found: other.type_name().to_string(),
                    })
                }
            };
            let byte = byte_offset(&text.text, offset)
                .ok_or(DocumentError::OffsetOutOfBounds { key, offset })?;
            let (left, right) = text.text.split_at(byte);
            (
                left.to_string(),
                right.to_string(),
                text.format,
                node.extra.clone(),
            )
        };

        self.set_text(key, &left)?;
        let right_key = self.create_node(NodeKind::Text(TextNode {
            text: right,
            format,
        }));
        self.state.get_mut(right_key)?.extra = extra;
        self.insert_after(key, right_key)?;
        Ok(right_key)
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
    }

    /// Update the cosmetic title of an internal link and its single text child.
    pub fn set_internal_link_title(&mut self, key: NodeKey, title: &str) -> Result<(), DocumentError> {
        let children = {
            let node = self.state.get_mut(key)?;
            match &mut node.kind {
                NodeKind::InternalLink(link) => link.title = title.to_string(),
                other => {
                    return Err(DocumentError::WrongKind {
                        key,
                        expected: INTERNAL_LINK_TYPE,
                        found: other.type_name().to_string(),
                    })
                }
            }
            node.children.clone()
        };

        if let [only] = children.as_slice() {
            if self.state.get(*only)?.kind.as_text().is_some() {
                self.set_text(*only, title)?;
            }
        }
        Ok(())
    }

    fn ensure_element(&self, key: NodeKey) -> Result<(), DocumentError> {
        let node = self.state.get(key)?;
        if node.kind.is_element() {
            Ok(())
        } else {
            Err(DocumentError::WrongKind {
                key,
                expected: "element",
                found: node.kind.type_name().to_string(),
            })
        }
    }

    fn ensure_not_root(&self, key: NodeKey, action: &'static str) -> Result<(), DocumentError> {
        if key == self.state.root {
            Err(DocumentError::RootOperation(action))
        } else {
            Ok(())
        }
    }
}

/// Byte index of the `offset`-th character, allowing the end position
fn byte_offset(text: &str, offset: usize) -> Option<usize> {
    if offset == text.chars().count() {
        return Some(text.len());
    }
    text.char_indices().nth(offset).map(|(byte, _)| byte)
}

#[cfg(test)]
mod tests;
