//! View tracking
//!
//! Idempotent per-viewer view records. A record is keyed by
//! (user, story); repeated calls upsert in place so the latest media
//! index and timestamp win, while the story's viewed set only ever
//! grows. Persisted under the `storyViews` key.

use crate::host::Identity;
use crate::store::error::{StoreError, StoreResult};
use crate::store::kv::{KeyValueStore, KEY_STORY_VIEWS};
use crate::store::types::{PersistedViews, UserId, ViewRecord, VIEWS_SCHEMA_VERSION};
use crate::store::StoryStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records which viewers have seen which stories
pub struct ViewTracker {
    kv: Arc<dyn KeyValueStore>,
    store: Arc<StoryStore>,
    identity: Arc<dyn Identity>,
    /// Records keyed by (user, story)
    records: Arc<RwLock<HashMap<(UserId, Uuid), ViewRecord>>>,
}

impl ViewTracker {
    /// Open the tracker, loading persisted records
    pub async fn open(
        kv: Arc<dyn KeyValueStore>,
        store: Arc<StoryStore>,
        identity: Arc<dyn Identity>,
    ) -> StoreResult<Self> {
        let records = Self::load(kv.as_ref()).await?;
        tracing::info!(count = records.len(), "Loaded view records");

        Ok(Self {
            kv,
            store,
            identity,
            records: Arc::new(RwLock::new(records)),
        })
    }

    async fn load(kv: &dyn KeyValueStore) -> StoreResult<HashMap<(UserId, Uuid), ViewRecord>> {
        let Some(bytes) = kv.get(KEY_STORY_VIEWS).await? else {
            return Ok(HashMap::new());
        };

        let envelope: PersistedViews = serde_json::from_slice(&bytes)?;
        if envelope.version > VIEWS_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                key: KEY_STORY_VIEWS.to_string(),
                found: envelope.version,
                supported: VIEWS_SCHEMA_VERSION,
            });
        }

        Ok(envelope
            .records
            .into_iter()
            .map(|r| ((r.user_id.clone(), r.story_id), r))
            .collect())
    }

    async fn persist(&self) -> StoreResult<()> {
        let envelope = {
            let records = self.records.read().await;
            PersistedViews {
                version: VIEWS_SCHEMA_VERSION,
                records: records.values().cloned().collect(),
            }
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.kv.set(KEY_STORY_VIEWS, bytes).await
    }

    /// Record that `user_id` has seen `story_id` at `media_index`
    ///
    /// Idempotent: the record is upserted and the story's viewed set
    /// uses set semantics. A story that disappeared mid-session (delete
    /// or sweep) is tolerated; the record is still kept.
    pub async fn record_view(
        &self,
        user_id: &str,
        story_id: Uuid,
        media_index: usize,
    ) -> StoreResult<()> {
        match self.identity.current_user() {
            Some(current) if current == user_id => {}
            _ => return Err(StoreError::Unauthorized("not authenticated".to_string())),
        }

        {
            let mut records = self.records.write().await;
            records.insert(
                (user_id.to_string(), story_id),
                ViewRecord {
                    user_id: user_id.to_string(),
                    story_id,
                    media_index,
                    viewed_at: Utc::now(),
                },
            );
        }

        match self.store.mark_viewed(story_id, user_id).await {
            Ok(_) => {}
            // Session snapshots outlive deletion and expiry
            Err(StoreError::StoryNotFound(_)) => {
                tracing::debug!(story_id = %story_id, "View recorded for vanished story");
            }
            Err(e) => return Err(e),
        }

        self.persist().await
    }

    /// Whether any live story by `subject_id` is unseen by `viewer_id`
    pub async fn has_unviewed(&self, subject_id: &str, viewer_id: &str) -> bool {
        self.store
            .query_by_author(subject_id)
            .await
            .iter()
            .any(|s| !s.viewed_by_user(viewer_id))
    }

    /// Look up the view record for (user, story)
    pub async fn get(&self, user_id: &str, story_id: Uuid) -> Option<ViewRecord> {
        let records = self.records.read().await;
        records.get(&(user_id.to_string(), story_id)).cloned()
    }

    /// Number of stored view records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticIdentity;
    use crate::store::kv::MemoryKv;
    use crate::store::types::MediaItem;
    use crate::store::StoreConfig;

    async fn setup(user: &str) -> (Arc<StoryStore>, ViewTracker, Arc<StaticIdentity>) {
        let kv: Arc<MemoryKv> = Arc::new(MemoryKv::new());
        let identity = Arc::new(StaticIdentity::signed_in(user));
        let store = Arc::new(
            StoryStore::open(kv.clone(), identity.clone(), StoreConfig::default())
                .await
                .unwrap(),
        );
        let tracker = ViewTracker::open(kv, store.clone(), identity.clone())
            .await
            .unwrap();
        (store, tracker, identity)
    }

    #[tokio::test]
    async fn test_record_view_idempotent() {
        let (store, tracker, identity) = setup("alice").await;
        let story = store
            .create("alice", vec![MediaItem::photo("a"), MediaItem::photo("b")])
            .await
            .unwrap();

        identity.set_user(Some("bob".to_string()));
        tracker.record_view("bob", story.id, 0).await.unwrap();
        let first = tracker.get("bob", story.id).await.unwrap();

        tracker.record_view("bob", story.id, 1).await.unwrap();
        let second = tracker.get("bob", story.id).await.unwrap();

        // One record, latest call wins
        assert_eq!(tracker.len().await, 1);
        assert_eq!(second.media_index, 1);
        assert!(second.viewed_at >= first.viewed_at);

        // viewed_by contains bob exactly once (set, not multiset)
        let story = store.get(story.id).await.unwrap();
        assert_eq!(story.viewed_by.len(), 1);
    }

    #[tokio::test]
    async fn test_two_viewers_independent_records() {
        let (store, tracker, identity) = setup("alice").await;
        let story = store
            .create("alice", vec![MediaItem::photo("a")])
            .await
            .unwrap();

        identity.set_user(Some("u1".to_string()));
        tracker.record_view("u1", story.id, 0).await.unwrap();
        identity.set_user(Some("u2".to_string()));
        tracker.record_view("u2", story.id, 0).await.unwrap();

        assert_eq!(tracker.len().await, 2);
        let story = store.get(story.id).await.unwrap();
        assert!(story.viewed_by.contains("u1"));
        assert!(story.viewed_by.contains("u2"));
        assert_eq!(story.viewed_by.len(), 2);
    }

    #[tokio::test]
    async fn test_has_unviewed() {
        let (store, tracker, identity) = setup("alice").await;
        let story = store
            .create("alice", vec![MediaItem::photo("a")])
            .await
            .unwrap();

        assert!(tracker.has_unviewed("alice", "bob").await);

        identity.set_user(Some("bob".to_string()));
        tracker.record_view("bob", story.id, 0).await.unwrap();
        assert!(!tracker.has_unviewed("alice", "bob").await);

        // A different viewer still sees it as unviewed
        assert!(tracker.has_unviewed("alice", "carol").await);
        // No stories at all means nothing unviewed
        assert!(!tracker.has_unviewed("nobody", "bob").await);
    }

    #[tokio::test]
    async fn test_record_view_requires_matching_identity() {
        let (store, tracker, _identity) = setup("alice").await;
        let story = store
            .create("alice", vec![MediaItem::photo("a")])
            .await
            .unwrap();

        // Signed in as alice, recording as bob
        let err = tracker.record_view("bob", story.id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_record_view_tolerates_vanished_story() {
        let (store, tracker, identity) = setup("alice").await;
        let story = store
            .create("alice", vec![MediaItem::photo("a")])
            .await
            .unwrap();
        store.delete(story.id, "alice").await.unwrap();

        identity.set_user(Some("bob".to_string()));
        tracker.record_view("bob", story.id, 0).await.unwrap();
        assert!(tracker.get("bob", story.id).await.is_some());
    }
}
