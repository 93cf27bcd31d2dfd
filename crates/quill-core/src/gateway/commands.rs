//! Command schema shared by the gateway and backends.
//!
//! Every backend operation is a request struct whose serde form is the
//! argument payload, paired with the type of its reply.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::model::{
    Note, NoteId, NoteTitle, Schema, SchemaId, Setting, Tag, TagId, TagMatches, TitleWithContext,
};

/// Names understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    GetNote,
    GetAllNotes,
    GetNotesByTitle,
    GetNotesByContent,
    CreateNote,
    RenameNote,
    UpdateNote,
    GetDirectTags,
    GetAvailableTagsContaining,
    AddTag,
    AddNewTag,
    GetAllSchemas,
    GetSchema,
    CreateSchema,
    RenameSchema,
    GetSetting,
    GetSettingOrSet,
    UpdateSetting,
}

impl CommandName {
    pub const ALL: [CommandName; 18] = [
        CommandName::GetNote,
        CommandName::GetAllNotes,
        CommandName::GetNotesByTitle,
        CommandName::GetNotesByContent,
        CommandName::CreateNote,
        CommandName::RenameNote,
        CommandName::UpdateNote,
        CommandName::GetDirectTags,
        CommandName::GetAvailableTagsContaining,
        CommandName::AddTag,
        CommandName::AddNewTag,
        CommandName::GetAllSchemas,
        CommandName::GetSchema,
        CommandName::CreateSchema,
        CommandName::RenameSchema,
        CommandName::GetSetting,
        CommandName::GetSettingOrSet,
        CommandName::UpdateSetting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::GetNote => "get_note",
            CommandName::GetAllNotes => "get_all_notes",
            CommandName::GetNotesByTitle => "get_notes_by_title",
            CommandName::GetNotesByContent => "get_notes_by_content",
            CommandName::CreateNote => "create_note",
            CommandName::RenameNote => "rename_note",
            CommandName::UpdateNote => "update_note",
            CommandName::GetDirectTags => "get_direct_tags",
            CommandName::GetAvailableTagsContaining => "get_available_tags_containing",
            CommandName::AddTag => "add_tag",
            CommandName::AddNewTag => "add_new_tag",
            CommandName::GetAllSchemas => "get_all_schemas",
            CommandName::GetSchema => "get_schema",
            CommandName::CreateSchema => "create_schema",
            CommandName::RenameSchema => "rename_schema",
            CommandName::GetSetting => "get_setting",
            CommandName::GetSettingOrSet => "get_setting_or_set",
            CommandName::UpdateSetting => "update_setting",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandName {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older call sites used these spellings
        match s {
            "get_notes" => return Ok(CommandName::GetAllNotes),
            "editor_change_state" => return Ok(CommandName::UpdateNote),
            _ => {}
        }
        CommandName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A named backend operation with its flat argument mapping
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub name: CommandName,
    pub args: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(name: CommandName) -> Self {
        Self {
            name,
            args: Map::new(),
        }
    }

    pub fn arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn from_command<C: Command>(command: &C) -> Result<Self, CommandError> {
        match serde_json::to_value(command) {
            Ok(Value::Object(args)) => Ok(Self {
                name: C::NAME,
                args,
            }),
            Ok(other) => Err(CommandError::internal(format!(
                "{} arguments must be a mapping, got {}",
                C::NAME,
                other
            ))),
            Err(err) => Err(CommandError::internal(format!(
                "failed to encode {} arguments: {}",
                C::NAME,
                err
            ))),
        }
    }

    /// Decode the argument mapping back into its request struct.
    pub fn decode<C: Command + DeserializeOwned>(&self) -> Result<C, CommandError> {
        serde_json::from_value(Value::Object(self.args.clone())).map_err(|err| {
            CommandError::rejected(format!("invalid arguments for {}: {}", self.name, err))
        })
    }
}

/// Wire shape of a command reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandReply<T> {
    Ok { data: T },
    Error { error: CommandError },
}

impl<T> CommandReply<T> {
    pub fn into_result(self) -> Result<T, CommandError> {
        match self {
            CommandReply::Ok { data } => Ok(data),
            CommandReply::Error { error } => Err(error),
        }
    }
}

impl<T> From<Result<T, CommandError>> for CommandReply<T> {
    fn from(result: Result<T, CommandError>) -> Self {
        match result {
            Ok(data) => CommandReply::Ok { data },
            Err(error) => CommandReply::Error { error },
        }
    }
}

/// A typed backend command
pub trait Command: Serialize + Send + Sync {
    const NAME: CommandName;
    type Output: DeserializeOwned + Serialize + Send + 'static;
}

macro_rules! command {
    ($request:ident => $name:ident, $output:ty) => {
        impl Command for $request {
            const NAME: CommandName = CommandName::$name;
            type Output = $output;
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNote {
    pub uuid: NoteId,
}
command!(GetNote => GetNote, Note);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAllNotes {}
command!(GetAllNotes => GetAllNotes, Vec<NoteTitle>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNotesByTitle {
    pub title: String,
    pub max_results: usize,
}
command!(GetNotesByTitle => GetNotesByTitle, Vec<NoteTitle>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNotesByContent {
    pub content: String,
    pub max_results: usize,
    pub snippet_size: usize,
}
command!(GetNotesByContent => GetNotesByContent, Vec<TitleWithContext>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNote {
    pub title: String,
}
command!(CreateNote => CreateNote, Note);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameNote {
    pub uuid: NoteId,
    pub title: String,
}
command!(RenameNote => RenameNote, ());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNote {
    pub uuid: NoteId,
    pub body: String,
}
command!(UpdateNote => UpdateNote, ());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDirectTags {
    pub uuid: NoteId,
}
command!(GetDirectTags => GetDirectTags, Vec<Tag>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAvailableTagsContaining {
    pub content: String,
    pub max_results: usize,
    pub note_uuid: NoteId,
}
command!(GetAvailableTagsContaining => GetAvailableTagsContaining, TagMatches);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTag {
    pub note_uuid: NoteId,
    pub tag_uuid: TagId,
}
command!(AddTag => AddTag, ());

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNewTag {
    pub uuid: NoteId,
    pub tag_text: String,
}
command!(AddNewTag => AddNewTag, Tag);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAllSchemas {}
command!(GetAllSchemas => GetAllSchemas, Vec<Schema>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSchema {
    pub uuid: SchemaId,
}
command!(GetSchema => GetSchema, Schema);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchema {
    pub name: String,
}
command!(CreateSchema => CreateSchema, Schema);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameSchema {
    pub uuid: SchemaId,
    pub name: String,
}
command!(RenameSchema => RenameSchema, ());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSetting {
    pub key: String,
}
command!(GetSetting => GetSetting, Setting);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSettingOrSet {
    pub key: String,
    pub value: String,
}
command!(GetSettingOrSet => GetSettingOrSet, Setting);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSetting {
    pub key: String,
    pub value: String,
}
command!(UpdateSetting => UpdateSetting, ());
