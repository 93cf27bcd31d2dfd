use log::debug;
use tokio::task::JoinHandle;

use super::cache::{QueryCache, QueryOptions, QueryState};
use super::keys;
use crate::config::CacheConfig;
use crate::error::CommandError;
use crate::gateway::Gateway;
use crate::model::{
    Note, NoteId, NoteTitle, Schema, SchemaId, Setting, Tag, TagId, TagMatches, TitleWithContext,
};

/// Cached reads and cache-aware mutations over one gateway.
///
/// Reads go through the [`QueryCache`] under the keys in [`keys`]. Mutations
/// call the gateway and, only when the call succeeds, invalidate the keys the
/// change affects. Title and name validation happens before these calls.
#[derive(Debug, Clone)]
pub struct Queries {
    gateway: Gateway,
    cache: QueryCache,
    config: CacheConfig,
}

impl Queries {
    pub fn new(gateway: Gateway, cache: QueryCache, config: CacheConfig) -> Self {
        Self {
            gateway,
            cache,
            config,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn options(&self) -> QueryOptions {
        QueryOptions::stale_after(self.config.stale_time())
    }

    // Reads

    pub async fn note(&self, uuid: &NoteId) -> QueryState<Note> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache
            .query(keys::note(uuid), move || async move { gateway.get_note(&id).await }, self.options())
            .await
    }

    /// The note, fetched if the cache cannot provide a fresh copy
    pub async fn ensure_note(&self, uuid: &NoteId) -> Result<Note, CommandError> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache
            .ensure_data(keys::note(uuid), move || async move { gateway.get_note(&id).await }, self.options())
            .await
    }

    pub async fn all_notes(&self) -> QueryState<Vec<NoteTitle>> {
        let gateway = self.gateway.clone();
        self.cache
            .query(keys::all_notes(), move || async move { gateway.get_all_notes().await }, self.options())
            .await
    }

    pub async fn notes_by_title(&self, title: &str, max_results: usize) -> QueryState<Vec<NoteTitle>> {
        let gateway = self.gateway.clone();
        let text = title.to_string();
        self.cache
            .query(
                keys::notes_by_title(title),
                move || async move { gateway.get_notes_by_title(&text, max_results).await },
                self.options(),
            )
            .await
    }

    pub async fn notes_by_content(
        &self,
        content: &str,
        max_results: usize,
        snippet_size: usize,
    ) -> QueryState<Vec<TitleWithContext>> {
        let gateway = self.gateway.clone();
        let text = content.to_string();
        self.cache
            .query(
                keys::notes_by_content(content),
                move || async move {
                    gateway
                        .get_notes_by_content(&text, max_results, snippet_size)
                        .await
                },
                self.options(),
            )
            .await
    }

    pub async fn direct_tags(&self, uuid: &NoteId) -> QueryState<Vec<Tag>> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache
            .query(
                keys::direct_tags(uuid),
                move || async move { gateway.get_direct_tags(&id).await },
                self.options(),
            )
            .await
    }

    pub async fn tags_containing(
        &self,
        content: &str,
        max_results: usize,
        note_uuid: &NoteId,
    ) -> QueryState<TagMatches> {
        let gateway = self.gateway.clone();
        let text = content.to_string();
        let id = note_uuid.clone();
        self.cache
            .query(
                keys::tags_containing(content),
                move || async move {
                    gateway
                        .get_available_tags_containing(&text, max_results, &id)
                        .await
                },
                self.options(),
            )
            .await
    }

    pub async fn schemas(&self) -> QueryState<Vec<Schema>> {
        let gateway = self.gateway.clone();
        self.cache
            .query(keys::schemas(), move || async move { gateway.get_all_schemas().await }, self.options())
            .await
    }

    pub async fn schema(&self, uuid: &SchemaId) -> QueryState<Schema> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache
            .query(keys::schema(uuid), move || async move { gateway.get_schema(&id).await }, self.options())
            .await
    }

    pub async fn setting(&self, key: &str) -> QueryState<Setting> {
        let gateway = self.gateway.clone();
        let name = key.to_string();
        self.cache
            .query(keys::setting(key), move || async move { gateway.get_setting(&name).await }, self.options())
            .await
    }

    pub async fn setting_or_set(&self, key: &str, value: &str) -> QueryState<Setting> {
        let gateway = self.gateway.clone();
        let (name, fallback) = (key.to_string(), value.to_string());
        self.cache
            .query(
                keys::setting_or_set(key, value),
                move || async move { gateway.get_setting_or_set(&name, &fallback).await },
                self.options(),
            )
            .await
    }

    // Prefetchers, used on hover and focus

    pub fn prefetch_note(&self, uuid: &NoteId) -> Option<JoinHandle<()>> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache.prefetch(
            keys::note(uuid),
            move || async move { gateway.get_note(&id).await },
            self.config.prefetch_stale_time(),
        )
    }

    pub fn prefetch_all_notes(&self) -> Option<JoinHandle<()>> {
        let gateway = self.gateway.clone();
        self.cache.prefetch(
            keys::all_notes(),
            move || async move { gateway.get_all_notes().await },
            self.config.prefetch_stale_time(),
        )
    }

    pub fn prefetch_schemas(&self) -> Option<JoinHandle<()>> {
        let gateway = self.gateway.clone();
        self.cache.prefetch(
            keys::schemas(),
            move || async move { gateway.get_all_schemas().await },
            self.config.prefetch_stale_time(),
        )
    }

    pub fn prefetch_schema(&self, uuid: &SchemaId) -> Option<JoinHandle<()>> {
        let gateway = self.gateway.clone();
        let id = uuid.clone();
        self.cache.prefetch(
            keys::schema(uuid),
            move || async move { gateway.get_schema(&id).await },
            self.config.prefetch_stale_time(),
        )
    }

    // Mutations

    pub async fn create_note(&self, title: &str) -> Result<Note, CommandError> {
        let note = self.gateway.create_note(title).await?;
        self.invalidate_titles();
        Ok(note)
    }

    pub async fn rename_note(&self, uuid: &NoteId, title: &str) -> Result<(), CommandError> {
        self.gateway.rename_note(uuid, title).await?;
        self.cache.invalidate(&keys::note(uuid));
        self.invalidate_titles();
        Ok(())
    }

    pub async fn update_note(&self, uuid: &NoteId, body: &str) -> Result<(), CommandError> {
        self.gateway.update_note(uuid, body).await?;
        self.cache.invalidate(&keys::note(uuid));
        self.cache.invalidate(&keys::notes_by_content_scope());
        Ok(())
    }

    pub async fn add_new_tag(&self, uuid: &NoteId, tag_text: &str) -> Result<Tag, CommandError> {
        let tag = self.gateway.add_new_tag(uuid, tag_text).await?;
        self.cache.invalidate(&keys::tags());
        self.cache.invalidate(&keys::note_tags(uuid));
        Ok(tag)
    }

    pub async fn add_tag(&self, note_uuid: &NoteId, tag_uuid: &TagId) -> Result<(), CommandError> {
        self.gateway.add_tag(note_uuid, tag_uuid).await?;
        self.cache.invalidate(&keys::note_tags(note_uuid));
        Ok(())
    }

    pub async fn create_schema(&self, name: &str) -> Result<Schema, CommandError> {
        let schema = self.gateway.create_schema(name).await?;
        self.cache.invalidate(&keys::schemas());
        Ok(schema)
    }

    pub async fn rename_schema(&self, uuid: &SchemaId, name: &str) -> Result<(), CommandError> {
        self.gateway.rename_schema(uuid, name).await?;
        self.cache.invalidate(&keys::schemas());
        Ok(())
    }

    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), CommandError> {
        self.gateway.update_setting(key, value).await?;
        self.cache.invalidate(&keys::setting(key));
        Ok(())
    }

    fn invalidate_titles(&self) {
        let marked = self.cache.invalidate(&keys::all_notes())
            + self.cache.invalidate(&keys::notes_by_title_scope());
        debug!("title change invalidated {} entries", marked);
    }
}
