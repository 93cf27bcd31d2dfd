//! Quill Core Library
//!
//! Client-side data access and note linking: a typed command gateway, a
//! query cache on top of it, and a document tree with internal links and
//! `[[` suggestions.
//!

pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod model;
pub mod persist;
pub mod query;
pub mod route;
mod store;
pub mod typeahead;

pub use config::QuillConfig;
pub use document::{Document, InternalLink, LinkClickHandler};
pub use error::{CommandError, DocumentError, ErrorKind, ValidationError};
pub use gateway::{Backend, Gateway, MemoryBackend};
pub use persist::ChangePersister;
pub use query::{Queries, QueryCache, QueryKey};
pub use route::Route;
pub use typeahead::Typeahead;
