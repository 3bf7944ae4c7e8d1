//! Core data types for the Ephemera story store
//!
//! This module defines the fundamental types used throughout the subsystem:
//! - `MediaItem`: one photo or video unit within a story
//! - `Story`: a time-boxed ordered sequence of media items
//! - `ViewRecord`: idempotent per-viewer view marker
//! - `Reaction` and `LikeMark`: viewer annotations

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Identifier of a user (provided by the host identity layer)
pub type UserId = String;

/// Opaque reference to media content, resolved by the host's rendering layer
pub type ContentRef = String;

/// Hours a story stays visible after creation
pub const STORY_TTL_HOURS: i64 = 24;

/// Maximum media items per story
pub const MAX_MEDIA_PER_STORY: usize = 10;

/// Kind of media within a story
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One normalized photo or video unit within a story
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    /// Unique identifier
    pub id: Uuid,
    /// Photo or video
    pub kind: MediaKind,
    /// Reference to the displayable content
    pub content: ContentRef,
    /// Thumbnail frame reference (video only)
    #[serde(default)]
    pub thumbnail: Option<ContentRef>,
    /// Playback duration in seconds (video only)
    #[serde(default)]
    pub duration_secs: Option<f64>,
    /// When the item was ingested
    pub uploaded_at: DateTime<Utc>,
}

impl MediaItem {
    /// Create a photo item
    pub fn photo(content: impl Into<ContentRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Photo,
            content: content.into(),
            thumbnail: None,
            duration_secs: None,
            uploaded_at: Utc::now(),
        }
    }

    /// Create a video item with its probed thumbnail and duration
    pub fn video(
        content: impl Into<ContentRef>,
        thumbnail: impl Into<ContentRef>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Video,
            content: content.into(),
            thumbnail: Some(thumbnail.into()),
            duration_secs: Some(duration_secs),
            uploaded_at: Utc::now(),
        }
    }
}

/// A time-boxed ordered collection of media items authored by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    /// Unique identifier
    pub id: Uuid,
    /// Author (owner) of the story
    pub author_id: UserId,
    /// Ordered media sequence, length 1..=10
    pub media: Vec<MediaItem>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiration time, fixed at created_at + 24h
    pub expires_at: DateTime<Utc>,
    /// Users who have viewed at least one item of this story
    #[serde(default)]
    pub viewed_by: HashSet<UserId>,
    /// Author-controlled visibility flag
    pub active: bool,
}

impl Story {
    /// Create a new story expiring 24 hours from now
    pub fn new(author_id: impl Into<UserId>, media: Vec<MediaItem>) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id: author_id.into(),
            media,
            created_at,
            expires_at: created_at + Duration::hours(STORY_TTL_HOURS),
            viewed_by: HashSet::new(),
            active: true,
        }
    }

    /// A story is live while active and not yet expired
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }

    /// Whether the given viewer has already seen this story
    pub fn viewed_by_user(&self, user_id: &str) -> bool {
        self.viewed_by.contains(user_id)
    }
}

/// Durable marker that a viewer has seen a story
///
/// Keyed by (user, story); repeated records upsert in place, so the
/// latest media index and timestamp win.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewRecord {
    pub user_id: UserId,
    pub story_id: Uuid,
    /// Index of the media item visible when the view was recorded
    pub media_index: usize,
    pub viewed_at: DateTime<Utc>,
}

/// Emoji annotation attached by a viewer (append-only, not deduplicated)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub id: Uuid,
    pub story_id: Uuid,
    pub user_id: UserId,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of a like mark
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LikeKind {
    Like,
    Dislike,
}

/// Per-viewer, per-story singleton preference marker
///
/// At most one mark exists per (story, user); toggling the same kind
/// removes it, toggling the other kind replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikeMark {
    pub story_id: Uuid,
    pub user_id: UserId,
    pub kind: LikeKind,
}

/// Current schema version for persisted story collections
pub const STORIES_SCHEMA_VERSION: u32 = 1;

/// Current schema version for persisted view records
pub const VIEWS_SCHEMA_VERSION: u32 = 1;

/// Current schema version for persisted reactions
pub const REACTIONS_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for the persisted story collection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedStories {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub stories: Vec<Story>,
}

/// Versioned envelope for persisted view records
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedViews {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub records: Vec<ViewRecord>,
}

/// Versioned envelope for persisted reactions and like marks
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedReactions {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub likes: Vec<LikeMark>,
}
