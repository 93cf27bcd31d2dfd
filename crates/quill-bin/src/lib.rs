//! Command-line front end for Quill: note files on disk served by the
//! in-memory backend.

pub mod app;
pub mod seed;

pub use app::App;
