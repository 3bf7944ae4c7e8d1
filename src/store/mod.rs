//! Story store
//!
//! Owns the ephemeral story collection and its persistence:
//! - [`types`]: Story, MediaItem, ViewRecord, Reaction, LikeMark
//! - [`kv`]: abstract key-value persistence interface
//! - [`engine`]: the StoryStore itself plus the expiration sweep
//! - [`error`]: store error types

pub mod engine;
pub mod error;
pub mod kv;
pub mod types;

pub use engine::{StoreConfig, StoreStats, StoryStore};
pub use error::{StoreError, StoreResult};
pub use kv::{JsonFileKv, KeyValueStore, MemoryKv, KEY_STORIES, KEY_STORY_REACTIONS, KEY_STORY_VIEWS};
pub use types::{
    ContentRef, LikeKind, LikeMark, MediaItem, MediaKind, PersistedReactions, PersistedStories,
    PersistedViews, Reaction, Story, UserId, ViewRecord, MAX_MEDIA_PER_STORY, STORY_TTL_HOURS,
};
