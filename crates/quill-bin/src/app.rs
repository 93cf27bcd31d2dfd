use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use quill_core::document::{
    ClickEvent, ClickOutcome, MouseButton, NodeKind, Point, Selection, TextNode,
};
use quill_core::model::{validate_title, Note, NoteId};
use quill_core::typeahead::LinkOption;
use quill_core::{
    ChangePersister, Document, Gateway, LinkClickHandler, MemoryBackend, Queries, QueryCache,
    QuillConfig, Route, Typeahead,
};

/// One internal link found in a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub uuid: NoteId,
    /// Title stored in the link
    pub title: String,
    /// Title of the target note now, if it exists
    pub current_title: Option<String>,
}

/// Result of typing text followed by a caret
#[derive(Debug, Clone, Default)]
pub struct Suggestions {
    pub options: Vec<LinkOption>,
    /// Editor state after committing the picked option
    pub committed: Option<Document>,
}

/// Library operations wired to one backend
pub struct App {
    queries: Queries,
    config: QuillConfig,
}

impl App {
    pub fn new(backend: Arc<MemoryBackend>, config: QuillConfig) -> Self {
        let queries = Queries::new(
            Gateway::new(backend),
            QueryCache::default(),
            config.cache.clone(),
        );
        Self { queries, config }
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub async fn create_note(&self, title: &str) -> Result<Note> {
        let title = validate_title(title)?;
        Ok(self.queries.create_note(title).await?)
    }

    /// Type `text` into an empty paragraph and run link suggestions on it.
    /// With `pick`, the option at that index is committed.
    pub async fn suggest(&self, text: &str, pick: Option<usize>) -> Result<Suggestions> {
        let mut document = typed_document(text)?;
        let mut typeahead = Typeahead::new(&self.config.typeahead)?;

        if !typeahead.on_caret_change(&document) {
            debug!("no link trigger in {:?}", text);
            return Ok(Suggestions::default());
        }
        if let Some(state) = typeahead.suggest(&self.queries).await {
            state.into_result()?;
        }

        let options = typeahead
            .composition()
            .map(|composition| composition.options.clone())
            .unwrap_or_default();

        let committed = match pick {
            Some(index) => {
                typeahead.commit(&mut document, index)?;
                Some(document)
            }
            None => None,
        };
        Ok(Suggestions { options, committed })
    }

    /// Internal links of a note. With `refresh`, stale link titles are
    /// replaced and the note is saved.
    pub async fn links(&self, uuid: &NoteId, refresh: bool) -> Result<Vec<LinkReport>> {
        let note = self.queries.ensure_note(uuid).await?;
        let mut document = Document::from_json(&note.body)
            .with_context(|| format!("note {} has an invalid body", uuid))?;

        let titles: HashMap<NoteId, String> = self
            .queries
            .all_notes()
            .await
            .into_result()?
            .unwrap_or_default()
            .into_iter()
            .map(|note| (note.uuid, note.title))
            .collect();

        if refresh && document.refresh_link_titles(&titles)? > 0 {
            ChangePersister::for_note(&note)
                .on_change(&self.queries, &document)
                .await?;
        }

        Ok(document
            .internal_links()
            .into_iter()
            .map(|(_, link)| LinkReport {
                uuid: link.uuid.clone(),
                title: link.title.clone(),
                current_title: titles.get(&link.uuid).cloned(),
            })
            .collect())
    }

    /// `(title, uuid, context)` rows; context is only set for content search
    pub async fn search(&self, text: &str, content: bool) -> Result<Vec<(String, NoteId, Option<String>)>> {
        let search = &self.config.search;
        if content {
            let hits = self
                .queries
                .notes_by_content(text, search.max_results, search.snippet_size)
                .await
                .into_result()?
                .unwrap_or_default();
            Ok(hits
                .into_iter()
                .map(|hit| (hit.title.title, hit.title.uuid, Some(hit.context)))
                .collect())
        } else {
            let hits = self
                .queries
                .notes_by_title(text, search.max_results)
                .await
                .into_result()?
                .unwrap_or_default();
            Ok(hits.into_iter().map(|hit| (hit.title, hit.uuid, None)).collect())
        }
    }

    /// Click the `index`-th link of a note with a collapsed caret and return
    /// where the app navigates.
    pub async fn follow(&self, uuid: &NoteId, index: usize) -> Result<Route> {
        let note = self.queries.ensure_note(uuid).await?;
        let mut document = Document::from_json(&note.body)?;
        let (link, target) = {
            let links = document.internal_links();
            let (key, _) = links
                .get(index)
                .ok_or_else(|| anyhow!("note {} has {} links", uuid, links.len()))?;
            let target = document
                .node(*key)
                .and_then(|node| node.children().first().copied())
                .unwrap_or(*key);
            (*key, target)
        };

        document.update(|txn| {
            txn.set_selection(Some(Selection::collapsed(Point {
                key: target,
                offset: 0,
            })));
            Ok(())
        })?;

        let mut visited: Vec<Route> = Vec::new();
        let click = ClickEvent {
            target,
            button: MouseButton::Primary,
        };
        match LinkClickHandler::new().handle(&document, &click, &mut visited) {
            ClickOutcome::Navigated(route) => Ok(route),
            outcome => bail!("click on link {} did not navigate: {:?}", link, outcome),
        }
    }

    /// Describe what a route path points at
    pub async fn route(&self, path: &str) -> Result<String> {
        let route: Route = path.parse()?;
        let description = match &route {
            Route::Note(uuid) => {
                let note = self.queries.ensure_note(uuid).await?;
                format!("{} -> note {:?}", route, note.title)
            }
            Route::Schema(uuid) => {
                let schema = self
                    .queries
                    .schema(uuid)
                    .await
                    .into_result()?
                    .ok_or_else(|| anyhow!("schema {} not loaded", uuid))?;
                format!("{} -> schema {:?}", route, schema.name)
            }
            other => other.to_string(),
        };
        Ok(description)
    }
}

/// A one-paragraph document holding `text` with the caret at its end
fn typed_document(text: &str) -> Result<Document> {
    let mut document = Document::new();
    let paragraph = document
        .node(document.root())
        .and_then(|root| root.children().first().copied())
        .context("empty document has no paragraph")?;
    document.update(|txn| {
        let node = txn.create_node(NodeKind::Text(TextNode::new(text)));
        txn.append_child(paragraph, node)?;
        txn.set_selection(Some(Selection::collapsed(Point {
            key: node,
            offset: text.chars().count(),
        })));
        Ok(())
    })?;
    Ok(document)
}
