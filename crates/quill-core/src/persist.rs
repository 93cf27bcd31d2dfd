use log::debug;
use sha2::{Digest, Sha256};

use crate::document::Document;
use crate::error::PersistError;
use crate::model::{Note, NoteId};
use crate::query::Queries;

/// Saves a note's editor state when it actually changed.
///
/// Every change event serializes the document, but the backend only sees an
/// `update_note` call when the serialized body differs from the last one
/// saved.
#[derive(Debug, Clone)]
pub struct ChangePersister {
    note: NoteId,
    last_digest: Option<String>,
}

impl ChangePersister {
    pub fn new(note: NoteId) -> Self {
        Self {
            note,
            last_digest: None,
        }
    }

    /// Start from a loaded note, so re-saving its body is skipped
    pub fn for_note(note: &Note) -> Self {
        Self {
            note: note.uuid.clone(),
            last_digest: Some(digest(&note.body)),
        }
    }

    pub fn note(&self) -> &NoteId {
        &self.note
    }

    /// Persist `document` if it differs from the last saved state. Returns
    /// whether a save happened. A failed save is retried on the next change.
    pub async fn on_change(&mut self, queries: &Queries, document: &Document) -> Result<bool, PersistError> {
        let body = document.to_json()?;
        let current = digest(&body);
        if self.last_digest.as_deref() == Some(current.as_str()) {
            debug!("note {} unchanged, not saving", self.note);
            return Ok(false);
        }

        queries.update_note(&self.note, &body).await?;
        self.last_digest = Some(current);
        Ok(true)
    }
}

fn digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::document::{NodeKind, TextNode};
    use crate::error::ErrorKind;
    use crate::gateway::{Gateway, MemoryBackend};
    use crate::query::QueryCache;
    use std::sync::Arc;

    fn create_queries() -> (Queries, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let queries = Queries::new(
            Gateway::new(backend.clone()),
            QueryCache::default(),
            CacheConfig::default(),
        );
        (queries, backend)
    }

    fn append_text(doc: &mut Document, text: &str) {
        let paragraph = doc.node(doc.root()).unwrap().children()[0];
        doc.update(|txn| {
            let node = txn.create_node(NodeKind::Text(TextNode::new(text)));
            txn.append_child(paragraph, node)
        })
        .unwrap();
    }

    #[tokio::test]
    async fn test_unchanged_body_is_not_saved() {
        let (queries, backend) = create_queries();
        let note = queries.create_note("Journal").await.unwrap();
        let mut doc = Document::from_json(&note.body).unwrap();
        let mut persister = ChangePersister::for_note(&note);
        let calls = backend.call_count();

        assert!(!persister.on_change(&queries, &doc).await.unwrap());
        assert_eq!(backend.call_count(), calls);

        append_text(&mut doc, "Dear diary");
        assert!(persister.on_change(&queries, &doc).await.unwrap());
        assert!(!persister.on_change(&queries, &doc).await.unwrap());
        assert_eq!(backend.call_count(), calls + 1);

        let saved = queries.ensure_note(&note.uuid).await.unwrap();
        assert_eq!(saved.body, doc.to_json().unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_is_retried() {
        let (queries, backend) = create_queries();
        let note = queries.create_note("Journal").await.unwrap();
        let mut doc = Document::from_json(&note.body).unwrap();
        let mut persister = ChangePersister::for_note(&note);
        append_text(&mut doc, "lost?");

        backend.set_offline(true);
        let err = persister.on_change(&queries, &doc).await.unwrap_err();
        assert!(matches!(err, PersistError::Command(ref e) if e.kind == ErrorKind::Unreachable));

        backend.set_offline(false);
        assert!(persister.on_change(&queries, &doc).await.unwrap());
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let value = digest("");
        assert_eq!(value.len(), 64);
        assert_eq!(
            value,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
