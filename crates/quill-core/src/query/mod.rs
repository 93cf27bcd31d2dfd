//! Caching layer over gateway reads.

mod cache;
pub mod keys;
mod queries;

pub use cache::{
    Clock, ManualClock, QueryCache, QueryOptions, QueryState, QueryStatus, SystemClock,
};
pub use keys::{KeySegment, QueryKey};
pub use queries::Queries;
