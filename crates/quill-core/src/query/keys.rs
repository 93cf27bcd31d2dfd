use std::fmt;

use crate::model::{NoteId, SchemaId};

/// One element of a [`QueryKey`].
///
/// Fixed words and caller-supplied arguments are distinct variants, so a
/// search for the text `"tags"` never collides with the `tags` scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Label(&'static str),
    Arg(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Label(label) => f.write_str(label),
            KeySegment::Arg(arg) => write!(f, "{:?}", arg),
        }
    }
}

/// Ordered address of a cache entry. Segment order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.0.push(KeySegment::Label(label));
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.push(KeySegment::Arg(arg.into()));
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        f.write_str("]")
    }
}

pub fn note(uuid: &NoteId) -> QueryKey {
    QueryKey::new().label("note").arg(uuid.as_str())
}

pub fn all_notes() -> QueryKey {
    QueryKey::new().label("note_titles")
}

/// Every tag query for a note; invalidating this prefix covers `direct_tags`
pub fn note_tags(uuid: &NoteId) -> QueryKey {
    QueryKey::new().label("notes").label("tags").arg(uuid.as_str())
}

pub fn direct_tags(uuid: &NoteId) -> QueryKey {
    note_tags(uuid).label("direct")
}

pub fn notes_by_title_scope() -> QueryKey {
    QueryKey::new().label("notes").label("by_title")
}

pub fn notes_by_title(title: &str) -> QueryKey {
    notes_by_title_scope().arg(title)
}

pub fn notes_by_content_scope() -> QueryKey {
    QueryKey::new().label("notes").label("by_content")
}

pub fn notes_by_content(content: &str) -> QueryKey {
    notes_by_content_scope().arg(content)
}

pub fn tags() -> QueryKey {
    QueryKey::new().label("tags")
}

pub fn tags_containing(content: &str) -> QueryKey {
    tags().label("containing").arg(content)
}

pub fn schemas() -> QueryKey {
    QueryKey::new().label("schemas")
}

pub fn schema(uuid: &SchemaId) -> QueryKey {
    schemas().arg(uuid.as_str())
}

pub fn setting(key: &str) -> QueryKey {
    QueryKey::new().label("setting").arg(key)
}

pub fn setting_or_set(key: &str, value: &str) -> QueryKey {
    setting(key).arg(value)
}
