use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Declares a string-backed identifier for a backend entity.
///
/// Identifiers minted locally are random v4 UUIDs, but any identifier the
/// backend hands out is accepted verbatim.
macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(NoteId);
entity_id!(SchemaId);
entity_id!(TagId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub uuid: NoteId,
    pub title: String,
    /// Serialized editor state (JSON text)
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTitle {
    pub uuid: NoteId,
    pub title: String,
}

impl From<&Note> for NoteTitle {
    fn from(note: &Note) -> Self {
        Self {
            uuid: note.uuid.clone(),
            title: note.title.clone(),
        }
    }
}

/// Content search hit with a snippet around the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleWithContext {
    pub title: NoteTitle,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub uuid: SchemaId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub uuid: TagId,
    pub title: String,
}

/// Tags matching a search, and whether more matched than were returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMatches {
    pub tags: Vec<Tag>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

pub const MIN_NAME_LENGTH: usize = 2;

/// Check a note title before it is sent to the backend.
pub fn validate_title(title: &str) -> Result<&str, ValidationError> {
    validate_length("title", title)
}

/// Check a schema name before it is sent to the backend.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    validate_length("name", name)
}

fn validate_length<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort {
            field,
            min: MIN_NAME_LENGTH,
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rejects_short_names() {
        assert_eq!(validate_title("  Ok  "), Ok("Ok"));
        assert_eq!(
            validate_title(" a "),
            Err(ValidationError::TooShort {
                field: "title",
                min: 2
            })
        );
        assert!(validate_name("").is_err());
        assert_eq!(validate_name("Books"), Ok("Books"));
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = NoteId::from("abc-123");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("abc-123"));

        let back: NoteId = serde_json::from_value(serde_json::json!("abc-123")).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_new_ids_are_uuids() {
        let id = SchemaId::new();
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, SchemaId::new());
    }
}
