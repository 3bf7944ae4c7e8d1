//! Story store
//!
//! Owns the story collection for one application session:
//! - Create / delete / query live stories (most-recent-first)
//! - Periodic expiration sweep purging stories past their 24h window
//! - Whole-collection persistence through the key-value interface
//!
//! The store is the sole writer of the `stories` key. Playback sessions
//! read a snapshot at start time and are never disturbed by the sweep.

use crate::host::Identity;
use crate::store::error::{StoreError, StoreResult};
use crate::store::kv::{KeyValueStore, KEY_STORIES};
use crate::store::types::{
    MediaItem, PersistedStories, Story, UserId, MAX_MEDIA_PER_STORY, STORIES_SCHEMA_VERSION,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use uuid::Uuid;

/// Configuration for the story store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Period of the expiration sweep in seconds (default: 60)
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

/// The story collection owner
pub struct StoryStore {
    config: StoreConfig,
    kv: Arc<dyn KeyValueStore>,
    identity: Arc<dyn Identity>,
    /// Stories ordered most-recent-first
    stories: Arc<RwLock<Vec<Story>>>,
    /// Shutdown signal for the sweep task
    shutdown: Arc<RwLock<bool>>,
}

impl StoryStore {
    /// Open the store, loading any persisted collection
    pub async fn open(
        kv: Arc<dyn KeyValueStore>,
        identity: Arc<dyn Identity>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let stories = Self::load(kv.as_ref()).await?;
        tracing::info!(count = stories.len(), "Loaded story collection");

        Ok(Self {
            config,
            kv,
            identity,
            stories: Arc::new(RwLock::new(stories)),
            shutdown: Arc::new(RwLock::new(false)),
        })
    }

    /// Load and validate the persisted collection
    async fn load(kv: &dyn KeyValueStore) -> StoreResult<Vec<Story>> {
        let Some(bytes) = kv.get(KEY_STORIES).await? else {
            return Ok(Vec::new());
        };

        let envelope: PersistedStories = serde_json::from_slice(&bytes)?;
        if envelope.version > STORIES_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                key: KEY_STORIES.to_string(),
                found: envelope.version,
                supported: STORIES_SCHEMA_VERSION,
            });
        }

        // Version 0 envelopes predate versioning; their story shape is
        // identical, so migration is just re-tagging on next persist.
        let mut stories = envelope.stories;
        let before = stories.len();
        stories.retain(|s| !s.media.is_empty() && s.media.len() <= MAX_MEDIA_PER_STORY);
        if stories.len() < before {
            tracing::warn!(
                dropped = before - stories.len(),
                "Dropped persisted stories with invalid media sequences"
            );
        }

        Ok(stories)
    }

    /// Write the whole collection back to the key-value store
    async fn persist(&self) -> StoreResult<()> {
        let envelope = {
            let stories = self.stories.read().await;
            PersistedStories {
                version: STORIES_SCHEMA_VERSION,
                stories: stories.clone(),
            }
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.kv.set(KEY_STORIES, bytes).await
    }

    /// Require an authenticated user matching `user_id`
    fn require_user(&self, user_id: &str) -> StoreResult<()> {
        match self.identity.current_user() {
            Some(current) if current == user_id => Ok(()),
            Some(_) => Err(StoreError::Unauthorized(format!(
                "user {} is not the signed-in user",
                user_id
            ))),
            None => Err(StoreError::Unauthorized("not authenticated".to_string())),
        }
    }

    /// Create a new story from ingested media
    ///
    /// The story expires exactly 24 hours after creation and is
    /// prepended so queries return most-recent-first. The persistence
    /// write is surfaced on failure but in-memory state stays
    /// authoritative for the session.
    pub async fn create(
        &self,
        author_id: impl Into<UserId>,
        media: Vec<MediaItem>,
    ) -> StoreResult<Story> {
        let author_id = author_id.into();
        self.require_user(&author_id)?;

        if media.is_empty() || media.len() > MAX_MEDIA_PER_STORY {
            return Err(StoreError::InvalidMediaCount(media.len()));
        }

        let story = Story::new(author_id, media);
        {
            let mut stories = self.stories.write().await;
            stories.insert(0, story.clone());
        }

        tracing::info!(story_id = %story.id, author = %story.author_id, "Created story");
        self.persist().await?;
        Ok(story)
    }

    /// Delete a story; only its author may do so
    pub async fn delete(&self, story_id: Uuid, requester_id: &str) -> StoreResult<()> {
        self.require_user(requester_id)?;

        {
            let mut stories = self.stories.write().await;
            let idx = stories
                .iter()
                .position(|s| s.id == story_id)
                .ok_or(StoreError::StoryNotFound(story_id))?;

            if stories[idx].author_id != requester_id {
                return Err(StoreError::Unauthorized(format!(
                    "user {} is not the author of story {}",
                    requester_id, story_id
                )));
            }
            stories.remove(idx);
        }

        tracing::info!(story_id = %story_id, "Deleted story");
        self.persist().await
    }

    /// All live stories, most-recent-first
    pub async fn query(&self) -> Vec<Story> {
        let now = Utc::now();
        let stories = self.stories.read().await;
        stories.iter().filter(|s| s.is_live(now)).cloned().collect()
    }

    /// Live stories authored by `author_id`, most-recent-first
    pub async fn query_by_author(&self, author_id: &str) -> Vec<Story> {
        let now = Utc::now();
        let stories = self.stories.read().await;
        stories
            .iter()
            .filter(|s| s.is_live(now) && s.author_id == author_id)
            .cloned()
            .collect()
    }

    /// Look up a story regardless of liveness (author tooling, tests)
    pub async fn get(&self, story_id: Uuid) -> Option<Story> {
        let stories = self.stories.read().await;
        stories.iter().find(|s| s.id == story_id).cloned()
    }

    /// Add a viewer to a story's viewed set (set semantics)
    ///
    /// Returns whether the viewer was newly added. Used by the view
    /// tracker so this store remains the sole writer of the collection.
    pub async fn mark_viewed(&self, story_id: Uuid, user_id: &str) -> StoreResult<bool> {
        let added = {
            let mut stories = self.stories.write().await;
            let story = stories
                .iter_mut()
                .find(|s| s.id == story_id)
                .ok_or(StoreError::StoryNotFound(story_id))?;
            story.viewed_by.insert(user_id.to_string())
        };

        if added {
            self.persist().await?;
        }
        Ok(added)
    }

    /// Purge stories whose expiration time has passed
    ///
    /// Returns the number of stories removed. Open playback sessions
    /// hold their own snapshot and are unaffected.
    pub async fn expiration_sweep(&self) -> StoreResult<usize> {
        let now = Utc::now();
        let purged = {
            let mut stories = self.stories.write().await;
            let before = stories.len();
            stories.retain(|s| s.expires_at > now);
            before - stories.len()
        };

        if purged > 0 {
            tracing::info!(purged, "Expiration sweep purged stories");
            self.persist().await?;
        }
        Ok(purged)
    }

    /// Start the periodic expiration sweep task
    pub fn start_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = Duration::from_secs(store.config.sweep_interval_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;

                if *store.shutdown.read().await {
                    break;
                }

                if let Err(e) = store.expiration_sweep().await {
                    tracing::error!("Expiration sweep failed: {}", e);
                }
            }
        })
    }

    /// Shut down the store: stop the sweep and persist a final snapshot
    pub async fn shutdown(&self) -> StoreResult<()> {
        *self.shutdown.write().await = true;
        self.persist().await
    }

    /// Collection statistics
    pub async fn stats(&self) -> StoreStats {
        let now = Utc::now();
        let stories = self.stories.read().await;
        StoreStats {
            total_stories: stories.len(),
            live_stories: stories.iter().filter(|s| s.is_live(now)).count(),
        }
    }
}

/// Story collection statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_stories: usize,
    pub live_stories: usize,
}
