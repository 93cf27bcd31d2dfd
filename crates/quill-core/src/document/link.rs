use log::debug;
use std::collections::HashMap;
use url::Url;

use super::{Document, ElementAttrs, NodeKey, Transaction};
use crate::error::DocumentError;
use crate::model::NoteId;
use crate::route::Route;

pub const INTERNAL_LINK_TYPE: &str = "internal-link";

/// Base used to resolve relative hrefs; never leaves this module
const LOCAL_BASE: &str = "quill://local/";

/// Inline reference to another note.
///
/// `uuid` identifies the target and is never reassigned. `title` is only a
/// display hint and may lag behind the target's real title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalLink {
    pub uuid: NoteId,
    pub title: String,
    pub attrs: ElementAttrs,
}

impl InternalLink {
    pub fn new(uuid: NoteId, title: impl Into<String>) -> Self {
        Self {
            uuid,
            title: title.into(),
            attrs: ElementAttrs::default(),
        }
    }

    pub fn route(&self) -> Route {
        Route::Note(self.uuid.clone())
    }

    pub fn url(&self) -> String {
        self.route().to_string()
    }

    /// Anchor markup used when the link is copied out of the editor
    pub fn to_anchor(&self) -> AnchorElement {
        AnchorElement {
            href: Some(self.url()),
            title: Some(self.title.clone()),
            text_content: self.title.clone(),
            child_count: 1,
        }
    }

    /// Convert pasted anchor markup into a link.
    ///
    /// Returns `None` when the anchor is empty or its href is not a relative
    /// `/notes/<uuid>` reference; such markup stays ordinary content.
    pub fn from_anchor(anchor: &AnchorElement) -> Option<Self> {
        if anchor.text_content.is_empty() && anchor.child_count == 0 {
            return None;
        }

        let uuid = note_id_from_href(anchor.href.as_deref()?)?;
        let title = anchor
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| anchor.text_content.trim())
            .to_string();

        Some(Self::new(uuid, title))
    }
}

/// The parts of an `<a>` element that matter for conversion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnchorElement {
    pub href: Option<String>,
    pub title: Option<String>,
    pub text_content: String,
    pub child_count: usize,
}

fn note_id_from_href(href: &str) -> Option<NoteId> {
    // Absolute URLs point outside the app
    if Url::parse(href).is_ok() {
        return None;
    }

    let url = Url::parse(LOCAL_BASE).ok()?.join(href).ok()?;
    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next(), segments.next()) {
        (Some("notes"), Some(uuid), None | Some("")) if !uuid.is_empty() => {
            Some(NoteId::from(uuid))
        }
        _ => None,
    }
}

impl<'a> Transaction<'a> {
    /// Insert pasted anchor markup after `sibling` as an internal link.
    ///
    /// Returns `None`, leaving the tree untouched, when the anchor does not
    /// convert.
    pub fn insert_anchor_after(
        &mut self,
        sibling: NodeKey,
        anchor: &AnchorElement,
    ) -> Result<Option<NodeKey>, DocumentError> {
        let Some(link) = InternalLink::from_anchor(anchor) else {
            debug!("anchor {:?} is not an internal link", anchor.href);
            return Ok(None);
        };
        let key = self.create_internal_link(link);
        self.insert_after(sibling, key)?;
        Ok(Some(key))
    }
}

impl Document {
    /// Replace stale link titles with fresh ones. Links whose target is not in
    /// `titles` keep their current title. Returns how many links changed.
    pub fn refresh_link_titles(
        &mut self,
        titles: &HashMap<NoteId, String>,
    ) -> Result<usize, DocumentError> {
        let stale: Vec<(NodeKey, String)> = self
            .internal_links()
            .into_iter()
            .filter_map(|(key, link)| {
                let fresh = titles.get(&link.uuid)?;
                (fresh != &link.title).then(|| (key, fresh.clone()))
            })
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        self.update(|txn| {
            for (key, title) in &stale {
                txn.set_internal_link_title(*key, title)?;
            }
            Ok(stale.len())
        })
    }
}
