//! Uniform call boundary to the backend process.

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::CommandError;
use crate::model::{
    Note, NoteId, NoteTitle, Schema, SchemaId, Setting, Tag, TagId, TagMatches, TitleWithContext,
};

pub mod commands;
mod memory;

pub use commands::{Command, CommandName, CommandReply, CommandRequest};
pub use memory::MemoryBackend;

use commands::*;

/// Something that can execute named commands.
///
/// Answers in the wire shape; faults, including transport faults, go in the
/// error variant, never a panic.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn call(&self, request: CommandRequest) -> CommandReply<Value>;
}

/// Stateless handle over a backend. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Single round-trip, no retry.
    pub async fn invoke<C: Command>(&self, command: C) -> Result<C::Output, CommandError> {
        let request = CommandRequest::from_command(&command)?;
        self.invoke_raw::<C::Output>(request).await
    }

    /// Invoke with an untyped request, decoding the reply into `T`.
    pub async fn invoke_raw<T: DeserializeOwned>(
        &self,
        request: CommandRequest,
    ) -> Result<T, CommandError> {
        let name = request.name;
        debug!("invoke {} {:?}", name, request.args);

        let value = self.backend.call(request).await.into_result().map_err(|err| {
            warn!("command {} failed: {}", name, err);
            err
        })?;

        decode_reply(name, value)
    }

    pub async fn get_note(&self, uuid: &NoteId) -> Result<Note, CommandError> {
        self.invoke(GetNote { uuid: uuid.clone() }).await
    }

    pub async fn get_all_notes(&self) -> Result<Vec<NoteTitle>, CommandError> {
        self.invoke(GetAllNotes {}).await
    }

    pub async fn get_notes_by_title(
        &self,
        title: &str,
        max_results: usize,
    ) -> Result<Vec<NoteTitle>, CommandError> {
        self.invoke(GetNotesByTitle {
            title: title.to_string(),
            max_results,
        })
        .await
    }

    pub async fn get_notes_by_content(
        &self,
        content: &str,
        max_results: usize,
        snippet_size: usize,
    ) -> Result<Vec<TitleWithContext>, CommandError> {
        self.invoke(GetNotesByContent {
            content: content.to_string(),
            max_results,
            snippet_size,
        })
        .await
    }

    pub async fn create_note(&self, title: &str) -> Result<Note, CommandError> {
        self.invoke(CreateNote {
            title: title.to_string(),
        })
        .await
    }

    pub async fn rename_note(&self, uuid: &NoteId, title: &str) -> Result<(), CommandError> {
        self.invoke(RenameNote {
            uuid: uuid.clone(),
            title: title.to_string(),
        })
        .await
    }

    pub async fn update_note(&self, uuid: &NoteId, body: &str) -> Result<(), CommandError> {
        self.invoke(UpdateNote {
            uuid: uuid.clone(),
            body: body.to_string(),
        })
        .await
    }

    pub async fn get_direct_tags(&self, uuid: &NoteId) -> Result<Vec<Tag>, CommandError> {
        self.invoke(GetDirectTags { uuid: uuid.clone() }).await
    }

    pub async fn get_available_tags_containing(
        &self,
        content: &str,
        max_results: usize,
        note_uuid: &NoteId,
    ) -> Result<TagMatches, CommandError> {
        self.invoke(GetAvailableTagsContaining {
            content: content.to_string(),
            max_results,
            note_uuid: note_uuid.clone(),
        })
        .await
    }

    pub async fn add_tag(&self, note_uuid: &NoteId, tag_uuid: &TagId) -> Result<(), CommandError> {
        self.invoke(AddTag {
            note_uuid: note_uuid.clone(),
            tag_uuid: tag_uuid.clone(),
        })
        .await
    }

    pub async fn add_new_tag(&self, uuid: &NoteId, tag_text: &str) -> Result<Tag, CommandError> {
        self.invoke(AddNewTag {
            uuid: uuid.clone(),
            tag_text: tag_text.to_string(),
        })
        .await
    }

    pub async fn get_all_schemas(&self) -> Result<Vec<Schema>, CommandError> {
        self.invoke(GetAllSchemas {}).await
    }

    pub async fn get_schema(&self, uuid: &SchemaId) -> Result<Schema, CommandError> {
        self.invoke(GetSchema { uuid: uuid.clone() }).await
    }

    pub async fn create_schema(&self, name: &str) -> Result<Schema, CommandError> {
        self.invoke(CreateSchema {
            name: name.to_string(),
        })
        .await
    }

    pub async fn rename_schema(&self, uuid: &SchemaId, name: &str) -> Result<(), CommandError> {
        self.invoke(RenameSchema {
            uuid: uuid.clone(),
            name: name.to_string(),
        })
        .await
    }

    pub async fn get_setting(&self, key: &str) -> Result<Setting, CommandError> {
        self.invoke(GetSetting {
            key: key.to_string(),
        })
        .await
    }

    pub async fn get_setting_or_set(&self, key: &str, value: &str) -> Result<Setting, CommandError> {
        self.invoke(GetSettingOrSet {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), CommandError> {
        self.invoke(UpdateSetting {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await
    }
}

/// Replies are structured values. A JSON document smuggled inside a string is
/// not parsed a second time.
fn decode_reply<T: DeserializeOwned>(name: CommandName, value: Value) -> Result<T, CommandError> {
    serde_json::from_value(value).map_err(|err| {
        warn!("command {} returned an undecodable reply: {}", name, err);
        CommandError::malformed(format!("{} reply: {}", name, err))
    })
}
