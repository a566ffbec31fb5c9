//! # Projects
//!
//! Core project-matching logic:
//! - `fields`: the fixed set of fields callers may filter on
//! - `filter`: parsing `"<field> <comparator> <value>"` strings into typed filters
//! - `sync`: staleness policy for cached GitHub data
//! - `record`: the project record lifecycle (create, rehydrate, save)

pub mod fields;
pub mod filter;
pub mod record;
pub mod sync;

pub use fields::{FieldType, QueryableField};
pub use filter::{Comparator, FILTER_USER_MESSAGE, FilterValue, QueryFilter, QueryFilterError};
pub use record::ProjectRecord;
pub use sync::{ExternalSyncFailed, GitHubSyncPolicy, MAX_GITHUB_SYNC_AGE, SyncState, is_stale};
