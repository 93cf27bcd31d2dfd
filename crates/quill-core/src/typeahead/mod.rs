//! `[[` link suggestions while typing.

use log::debug;

use crate::config::TypeaheadConfig;
use crate::document::{Document, InternalLink, NodeKey, Point, Selection};
use crate::error::{DocumentError, TypeaheadError};
use crate::model::{NoteId, NoteTitle};
use crate::query::{QueryState, Queries};

mod trigger;

pub use trigger::{TriggerMatch, TriggerMatcher};

/// A note offered as a link target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOption {
    pub uuid: NoteId,
    pub title: String,
}

impl From<NoteTitle> for LinkOption {
    fn from(note: NoteTitle) -> Self {
        Self {
            uuid: note.uuid,
            title: note.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub trigger: TriggerMatch,
    /// Text node holding the trigger
    pub text_node: NodeKey,
    pub options: Vec<LinkOption>,
    /// Highlighted option, `-1` when none
    pub selected_index: isize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeaheadState {
    #[default]
    Idle,
    Composing(Composition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Enter,
    Tab,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not consumed; the editor handles the key
    Ignored,
    Moved { selected_index: isize },
    Committed(NodeKey),
    Dismissed,
}

pub struct Typeahead {
    matcher: TriggerMatcher,
    limit: usize,
    state: TypeaheadState,
}

impl Typeahead {
    pub fn new(config: &TypeaheadConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: TriggerMatcher::from_config(config)?,
            limit: config.suggestion_limit,
            state: TypeaheadState::Idle,
        })
    }

    pub fn state(&self) -> &TypeaheadState {
        &self.state
    }

    pub fn composition(&self) -> Option<&Composition> {
        match &self.state {
            TypeaheadState::Composing(composition) => Some(composition),
            TypeaheadState::Idle => None,
        }
    }

    /// Current query, without the trigger
    pub fn query(&self) -> Option<&str> {
        self.composition()
            .map(|composition| composition.trigger.query.as_str())
    }

    /// Re-evaluate the trigger after the caret moved or text changed.
    /// Returns whether a suggestion is being composed.
    pub fn on_caret_change(&mut self, document: &Document) -> bool {
        let found = document
            .text_before_caret()
            .and_then(|(node, text)| Some((node, self.matcher.find(&text)?)));

        self.state = match (found, std::mem::take(&mut self.state)) {
            (None, _) => TypeaheadState::Idle,
            (Some((node, trigger)), TypeaheadState::Composing(mut composition))
                if composition.text_node == node =>
            {
                composition.trigger = trigger;
                TypeaheadState::Composing(composition)
            }
            (Some((node, trigger)), _) => {
                debug!("link suggestion opened at {}", node);
                TypeaheadState::Composing(Composition {
                    trigger,
                    text_node: node,
                    options: Vec::new(),
                    selected_index: -1,
                })
            }
        };
        self.composition().is_some()
    }

    /// Replace the suggestion list, keeping at most the configured number of
    /// options. The first option is highlighted.
    pub fn set_options(&mut self, options: Vec<LinkOption>) {
        let limit = self.limit;
        if let TypeaheadState::Composing(composition) = &mut self.state {
            composition.options = options.into_iter().take(limit).collect();
            composition.selected_index = if composition.options.is_empty() { -1 } else { 0 };
        }
    }

    /// Look up titles matching the current query and load them as options.
    pub async fn suggest(&mut self, queries: &Queries) -> Option<QueryState<Vec<NoteTitle>>> {
        let query = self.query()?.to_string();
        let state = queries.notes_by_title(&query, self.limit).await;
        if let Some(titles) = &state.data {
            self.set_options(titles.iter().cloned().map(LinkOption::from).collect());
        }
        Some(state)
    }

    pub fn handle_key(
        &mut self,
        key: Key,
        document: &mut Document,
    ) -> Result<KeyOutcome, TypeaheadError> {
        let TypeaheadState::Composing(composition) = &mut self.state else {
            return Ok(KeyOutcome::Ignored);
        };
        let last = composition.options.len() as isize - 1;

        match key {
            Key::ArrowDown => {
                composition.selected_index = (composition.selected_index + 1).min(last);
                Ok(KeyOutcome::Moved {
                    selected_index: composition.selected_index,
                })
            }
            Key::ArrowUp => {
                composition.selected_index = (composition.selected_index - 1).max(-1).min(last);
                Ok(KeyOutcome::Moved {
                    selected_index: composition.selected_index,
                })
            }
            Key::Enter | Key::Tab => match usize::try_from(composition.selected_index) {
                Ok(index) => self.commit(document, index).map(KeyOutcome::Committed),
                Err(_) => Ok(KeyOutcome::Ignored),
            },
            Key::Escape => {
                self.state = TypeaheadState::Idle;
                Ok(KeyOutcome::Dismissed)
            }
        }
    }

    /// Replace the matched span with a link to option `index`, put the caret
    /// right after it and go back to idle.
    pub fn commit(&mut self, document: &mut Document, index: usize) -> Result<NodeKey, TypeaheadError> {
        let composition = self.composition().ok_or(TypeaheadError::NotComposing)?;
        let option = composition
            .options
            .get(index)
            .ok_or(TypeaheadError::NoOption {
                index,
                available: composition.options.len(),
            })?
            .clone();
        let text_node = composition.text_node;
        let start = composition.trigger.lead_offset;
        let end = start + composition.trigger.len();

        let chars: Vec<char> = document
            .node(text_node)
            .and_then(|node| node.kind().as_text())
            .map(|text| text.text.chars().collect())
            .ok_or(DocumentError::MissingNode(text_node))?;
        let length = chars.len();
        if end > length {
            return Err(DocumentError::OffsetOutOfBounds {
                key: text_node,
                offset: end,
            }
            .into());
        }
        if chars[start..end].iter().collect::<String>() != composition.trigger.matching_string {
            return Err(TypeaheadError::SpanChanged {
                expected: composition.trigger.matching_string.clone(),
            });
        }

        let link = document.update(|txn| {
            if end < length {
                txn.split_text(text_node, end)?;
            }
            let span = if start > 0 {
                txn.split_text(text_node, start)?
            } else {
                text_node
            };

            let link = txn.create_internal_link(InternalLink::new(option.uuid.clone(), &option.title));
            txn.insert_after(span, link)?;
            txn.remove(span)?;

            let parent = txn
                .node(link)
                .and_then(|node| node.parent())
                .ok_or(DocumentError::MissingNode(link))?;
            let position = txn
                .node(parent)
                .and_then(|node| node.children().iter().position(|child| *child == link))
                .ok_or(DocumentError::MissingNode(link))?;
            txn.set_selection(Some(Selection::collapsed(Point {
                key: parent,
                offset: position + 1,
            })));
            Ok(link)
        })?;

        debug!("linked to {} ({})", option.title, option.uuid);
        self.state = TypeaheadState::Idle;
        Ok(link)
    }
}

#[cfg(test)]
mod tests;
