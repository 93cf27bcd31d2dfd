use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

use super::commands::*;
use super::Backend;
use crate::document::Document;
use crate::error::CommandError;
use crate::model::{
    Note, NoteId, NoteTitle, Schema, SchemaId, Setting, Tag, TagId, TagMatches, TitleWithContext,
};
use crate::store::Store;

/// In-process implementation of the command set.
///
/// Stands in for the desktop backend in tests and in the CLI.
pub struct MemoryBackend {
    store: RwLock<Store>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::new()),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail as if the backend were gone
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Number of commands received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Insert a note directly, bypassing the command layer
    pub fn seed_note(&self, note: Note) {
        if let Ok(mut store) = self.store.write() {
            store.upsert_note(note);
        }
    }

    /// Create a note with the given title and body
    pub fn insert_note(&self, title: &str, body: &str) -> Note {
        let now = Utc::now();
        let note = Note {
            uuid: NoteId::new(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.seed_note(note.clone());
        note
    }

    fn dispatch(&self, request: &CommandRequest) -> Result<Value, CommandError> {
        match request.name {
            CommandName::GetNote => {
                let GetNote { uuid } = request.decode()?;
                let store = self.read()?;
                let note = store
                    .get_note(&uuid)
                    .cloned()
                    .ok_or_else(|| CommandError::not_found(format!("note {}", uuid)))?;
                encode(note)
            }
            CommandName::GetAllNotes => {
                let GetAllNotes {} = request.decode()?;
                let store = self.read()?;
                let mut titles: Vec<NoteTitle> = store.all_notes().map(NoteTitle::from).collect();
                titles.sort_by(|a, b| a.title.cmp(&b.title));
                encode(titles)
            }
            CommandName::GetNotesByTitle => {
                let GetNotesByTitle { title, max_results } = request.decode()?;
                let store = self.read()?;
                encode(search_titles(&store, &title, max_results))
            }
            CommandName::GetNotesByContent => {
                let GetNotesByContent {
                    content,
                    max_results,
                    snippet_size,
                } = request.decode()?;
                let store = self.read()?;
                encode(search_content(&store, &content, max_results, snippet_size))
            }
            CommandName::CreateNote => {
                let CreateNote { title } = request.decode()?;
                let title = non_empty("title", &title)?;
                let body = Document::new()
                    .to_json()
                    .map_err(|err| CommandError::internal(err.to_string()))?;
                let mut store = self.write()?;
                let now = Utc::now();
                let note = Note {
                    uuid: NoteId::new(),
                    title,
                    body,
                    created_at: now,
                    updated_at: now,
                };
                store.upsert_note(note.clone());
                encode(note)
            }
            CommandName::RenameNote => {
                let RenameNote { uuid, title } = request.decode()?;
                let title = non_empty("title", &title)?;
                let mut store = self.write()?;
                let note = store
                    .get_note_mut(&uuid)
                    .ok_or_else(|| CommandError::not_found(format!("note {}", uuid)))?;
                note.title = title;
                note.updated_at = Utc::now();
                encode(())
            }
            CommandName::UpdateNote => {
                let UpdateNote { uuid, body } = request.decode()?;
                let mut store = self.write()?;
                let mut note = store
                    .get_note(&uuid)
                    .cloned()
                    .ok_or_else(|| CommandError::not_found(format!("note {}", uuid)))?;
                note.body = body;
                note.updated_at = Utc::now();
                store.upsert_note(note);
                encode(())
            }
            CommandName::GetDirectTags => {
                let GetDirectTags { uuid } = request.decode()?;
                let store = self.read()?;
                encode(store.tags_of(&uuid))
            }
            CommandName::GetAvailableTagsContaining => {
                let GetAvailableTagsContaining {
                    content,
                    max_results,
                    note_uuid,
                } = request.decode()?;
                let store = self.read()?;
                encode(available_tags(&store, &content, max_results, &note_uuid))
            }
            CommandName::AddTag => {
                let AddTag {
                    note_uuid,
                    tag_uuid,
                } = request.decode()?;
                let mut store = self.write()?;
                if store.get_note(&note_uuid).is_none() {
                    return Err(CommandError::not_found(format!("note {}", note_uuid)));
                }
                if !store.tags.contains_key(&tag_uuid) {
                    return Err(CommandError::not_found(format!("tag {}", tag_uuid)));
                }
                store.attach_tag(&note_uuid, &tag_uuid);
                encode(())
            }
            CommandName::AddNewTag => {
                let AddNewTag { uuid, tag_text } = request.decode()?;
                let tag_text = non_empty("tag", &tag_text)?;
                let mut store = self.write()?;
                if store.get_note(&uuid).is_none() {
                    return Err(CommandError::not_found(format!("note {}", uuid)));
                }
                let tag = match store.tag_by_title(&tag_text) {
                    Some(existing) => existing.clone(),
                    None => {
                        let tag = Tag {
                            uuid: TagId::new(),
                            title: tag_text,
                        };
                        store.insert_tag(tag.clone());
                        tag
                    }
                };
                store.attach_tag(&uuid, &tag.uuid);
                encode(tag)
            }
            CommandName::GetAllSchemas => {
                let GetAllSchemas {} = request.decode()?;
                let store = self.read()?;
                let mut schemas: Vec<Schema> = store.schemas.values().cloned().collect();
                schemas.sort_by(|a, b| a.name.cmp(&b.name));
                encode(schemas)
            }
            CommandName::GetSchema => {
                let GetSchema { uuid } = request.decode()?;
                let store = self.read()?;
                let schema = store
                    .schemas
                    .get(&uuid)
                    .cloned()
                    .ok_or_else(|| CommandError::not_found(format!("schema {}", uuid)))?;
                encode(schema)
            }
            CommandName::CreateSchema => {
                let CreateSchema { name } = request.decode()?;
                let name = non_empty("name", &name)?;
                let mut store = self.write()?;
                let schema = Schema {
                    uuid: SchemaId::new(),
                    name,
                };
                store.schemas.insert(schema.uuid.clone(), schema.clone());
                encode(schema)
            }
            CommandName::RenameSchema => {
                let RenameSchema { uuid, name } = request.decode()?;
                let name = non_empty("name", &name)?;
                let mut store = self.write()?;
                let schema = store
                    .schemas
                    .get_mut(&uuid)
                    .ok_or_else(|| CommandError::not_found(format!("schema {}", uuid)))?;
                schema.name = name;
                encode(())
            }
            CommandName::GetSetting => {
                let GetSetting { key } = request.decode()?;
                let store = self.read()?;
                let setting = store
                    .settings
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| CommandError::not_found(format!("setting {}", key)))?;
                encode(setting)
            }
            CommandName::GetSettingOrSet => {
                let GetSettingOrSet { key, value } = request.decode()?;
                let mut store = self.write()?;
                let setting = store
                    .settings
                    .entry(key.clone())
                    .or_insert_with(|| Setting { key, value })
                    .clone();
                encode(setting)
            }
            CommandName::UpdateSetting => {
                let UpdateSetting { key, value } = request.decode()?;
                let mut store = self.write()?;
                store
                    .settings
                    .insert(key.clone(), Setting { key, value });
                encode(())
            }
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Store>, CommandError> {
        self.store
            .read()
            .map_err(|_| CommandError::internal("store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Store>, CommandError> {
        self.store
            .write()
            .map_err(|_| CommandError::internal("store lock poisoned"))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn call(&self, request: CommandRequest) -> CommandReply<Value> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return CommandReply::Error {
                error: CommandError::unreachable("backend is offline"),
            };
        }
        debug!("memory backend handling {}", request.name);
        self.dispatch(&request).into()
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, CommandError> {
    serde_json::to_value(value)
        .map_err(|err| CommandError::internal(format!("failed to encode reply: {}", err)))
}

fn non_empty(field: &str, value: &str) -> Result<String, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CommandError::rejected(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Case-insensitive substring match; prefix matches rank first.
fn search_titles(store: &Store, query: &str, max_results: usize) -> Vec<NoteTitle> {
    let needle = query.to_lowercase();
    let mut hits: Vec<(bool, NoteTitle)> = store
        .all_notes()
        .filter_map(|note| {
            let title = note.title.to_lowercase();
            if !title.contains(&needle) {
                return None;
            }
            Some((title.starts_with(&needle), NoteTitle::from(note)))
        })
        .collect();

    hits.sort_by(|(a_prefix, a), (b_prefix, b)| match b_prefix.cmp(a_prefix) {
        Ordering::Equal => a.title.cmp(&b.title),
        other => other,
    });

    hits.into_iter()
        .take(max_results)
        .map(|(_, title)| title)
        .collect()
}

fn search_content(
    store: &Store,
    query: &str,
    max_results: usize,
    snippet_size: usize,
) -> Vec<TitleWithContext> {
    let needle: Vec<char> = query.chars().collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<TitleWithContext> = store
        .all_notes()
        .filter_map(|note| {
            let context = snippet(store.content_of(&note.uuid), &needle, snippet_size)?;
            Some(TitleWithContext {
                title: NoteTitle::from(note),
                context,
            })
        })
        .collect();

    hits.sort_by(|a, b| a.title.title.cmp(&b.title.title));
    hits.truncate(max_results);
    hits
}

/// Text around the first case-insensitive occurrence of `needle`,
/// `size` characters on each side.
fn snippet(text: &str, needle: &[char], size: usize) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    if needle.len() > chars.len() {
        return None;
    }

    let start = (0..=chars.len() - needle.len()).find(|&i| {
        chars[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })?;

    let from = start.saturating_sub(size);
    let to = (start + needle.len()).saturating_add(size).min(chars.len());
    Some(chars[from..to].iter().collect())
}

fn available_tags(store: &Store, query: &str, max_results: usize, note: &NoteId) -> TagMatches {
    let needle = query.to_lowercase();
    let attached: Vec<TagId> = store.tags_of(note).into_iter().map(|tag| tag.uuid).collect();

    let mut matching: Vec<Tag> = store
        .all_tags()
        .filter(|tag| !attached.contains(&tag.uuid))
        .filter(|tag| tag.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.title.cmp(&b.title));

    let has_more = matching.len() > max_results;
    matching.truncate(max_results);
    TagMatches {
        tags: matching,
        has_more,
    }
}
