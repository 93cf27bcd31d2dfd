use crate::document::Document;
use crate::model::{Note, NoteId, Schema, SchemaId, Setting, Tag, TagId};
use std::collections::HashMap;

// In memory
pub(crate) struct Store {
    pub(crate) notes: HashMap<NoteId, Note>,
    /// Plain text of each note body, refreshed on every upsert
    pub(crate) content_index: HashMap<NoteId, String>,
    pub(crate) tags: HashMap<TagId, Tag>,
    pub(crate) note_tags: HashMap<NoteId, Vec<TagId>>,
    pub(crate) schemas: HashMap<SchemaId, Schema>,
    pub(crate) settings: HashMap<String, Setting>,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self {
            notes: HashMap::new(),
            content_index: HashMap::new(),
            tags: HashMap::new(),
            note_tags: HashMap::new(),
            schemas: HashMap::new(),
            settings: HashMap::new(),
        }
    }

    pub(crate) fn upsert_note(&mut self, note: Note) {
        let id = note.uuid.clone();
        let text = Document::from_json(&note.body)
            .map(|doc| doc.text_content())
            .unwrap_or_default();

        self.content_index.insert(id.clone(), text);
        self.notes.insert(id, note);
    }

    pub(crate) fn get_note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub(crate) fn get_note_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.get_mut(id)
    }

    pub(crate) fn content_of(&self, id: &NoteId) -> &str {
        self.content_index.get(id).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn all_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub(crate) fn tag_by_title(&self, title: &str) -> Option<&Tag> {
        self.tags.values().find(|tag| tag.title == title)
    }

    pub(crate) fn insert_tag(&mut self, tag: Tag) {
        self.tags.insert(tag.uuid.clone(), tag);
    }

    /// Attach a tag to a note, ignoring duplicates
    pub(crate) fn attach_tag(&mut self, note: &NoteId, tag: &TagId) {
        let tags = self.note_tags.entry(note.clone()).or_insert_with(Vec::new);
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    pub(crate) fn tags_of(&self, note: &NoteId) -> Vec<Tag> {
        self.note_tags
            .get(note)
            .map(|ids| ids.iter().filter_map(|id| self.tags.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn all_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }
}
