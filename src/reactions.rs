//! Reactions and like marks
//!
//! Two separate annotation shapes share one persisted envelope:
//! - Reactions: append-only emoji log, never deduplicated; consumers
//!   display only the most recent few.
//! - Like marks: at most one like/dislike per (story, user), with
//!   toggle semantics.

use crate::host::Identity;
use crate::store::error::{StoreError, StoreResult};
use crate::store::kv::{KeyValueStore, KEY_STORY_REACTIONS};
use crate::store::types::{
    LikeKind, LikeMark, PersistedReactions, Reaction, UserId, REACTIONS_SCHEMA_VERSION,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default number of reactions surfaced for display
pub const RECENT_REACTIONS_DEFAULT: usize = 3;

struct LedgerState {
    /// Append-only reaction log, oldest first
    reactions: Vec<Reaction>,
    /// Singleton like marks keyed by (story, user)
    likes: HashMap<(Uuid, UserId), LikeKind>,
}

/// Reaction log and like-mark ledger
pub struct ReactionLedger {
    kv: Arc<dyn KeyValueStore>,
    identity: Arc<dyn Identity>,
    state: Arc<RwLock<LedgerState>>,
}

impl ReactionLedger {
    /// Open the ledger, loading persisted reactions and marks
    pub async fn open(
        kv: Arc<dyn KeyValueStore>,
        identity: Arc<dyn Identity>,
    ) -> StoreResult<Self> {
        let state = Self::load(kv.as_ref()).await?;
        tracing::info!(
            reactions = state.reactions.len(),
            likes = state.likes.len(),
            "Loaded reaction ledger"
        );

        Ok(Self {
            kv,
            identity,
            state: Arc::new(RwLock::new(state)),
        })
    }

    async fn load(kv: &dyn KeyValueStore) -> StoreResult<LedgerState> {
        let Some(bytes) = kv.get(KEY_STORY_REACTIONS).await? else {
            return Ok(LedgerState {
                reactions: Vec::new(),
                likes: HashMap::new(),
            });
        };

        let envelope: PersistedReactions = serde_json::from_slice(&bytes)?;
        if envelope.version > REACTIONS_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                key: KEY_STORY_REACTIONS.to_string(),
                found: envelope.version,
                supported: REACTIONS_SCHEMA_VERSION,
            });
        }

        let likes = envelope
            .likes
            .into_iter()
            .map(|m| ((m.story_id, m.user_id), m.kind))
            .collect();

        Ok(LedgerState {
            reactions: envelope.reactions,
            likes,
        })
    }

    async fn persist(&self) -> StoreResult<()> {
        let envelope = {
            let state = self.state.read().await;
            PersistedReactions {
                version: REACTIONS_SCHEMA_VERSION,
                reactions: state.reactions.clone(),
                likes: state
                    .likes
                    .iter()
                    .map(|((story_id, user_id), kind)| LikeMark {
                        story_id: *story_id,
                        user_id: user_id.clone(),
                        kind: *kind,
                    })
                    .collect(),
            }
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.kv.set(KEY_STORY_REACTIONS, bytes).await
    }

    fn require_user(&self, user_id: &str) -> StoreResult<()> {
        match self.identity.current_user() {
            Some(current) if current == user_id => Ok(()),
            _ => Err(StoreError::Unauthorized("not authenticated".to_string())),
        }
    }

    /// Append an emoji reaction (no deduplication)
    pub async fn add_reaction(
        &self,
        story_id: Uuid,
        user_id: &str,
        emoji: impl Into<String>,
    ) -> StoreResult<Reaction> {
        self.require_user(user_id)?;

        let reaction = Reaction {
            id: Uuid::new_v4(),
            story_id,
            user_id: user_id.to_string(),
            emoji: emoji.into(),
            created_at: Utc::now(),
        };

        {
            let mut state = self.state.write().await;
            state.reactions.push(reaction.clone());
        }

        self.persist().await?;
        Ok(reaction)
    }

    /// Most recent `n` reactions for a story, newest first
    pub async fn recent_reactions(&self, story_id: Uuid, n: usize) -> Vec<Reaction> {
        let state = self.state.read().await;
        state
            .reactions
            .iter()
            .rev()
            .filter(|r| r.story_id == story_id)
            .take(n)
            .cloned()
            .collect()
    }

    /// Toggle a like/dislike mark
    ///
    /// Same kind as the existing mark removes it; a different kind
    /// replaces it; no mark inserts one. Returns the resulting mark.
    pub async fn toggle_like(
        &self,
        story_id: Uuid,
        user_id: &str,
        kind: LikeKind,
    ) -> StoreResult<Option<LikeKind>> {
        self.require_user(user_id)?;

        let result = {
            let mut state = self.state.write().await;
            let key = (story_id, user_id.to_string());
            match state.likes.get(&key) {
                Some(existing) if *existing == kind => {
                    state.likes.remove(&key);
                    None
                }
                _ => {
                    state.likes.insert(key, kind);
                    Some(kind)
                }
            }
        };

        self.persist().await?;
        Ok(result)
    }

    /// Number of like marks of `kind` on a story
    pub async fn like_count(&self, story_id: Uuid, kind: LikeKind) -> usize {
        let state = self.state.read().await;
        state
            .likes
            .iter()
            .filter(|((sid, _), k)| *sid == story_id && **k == kind)
            .count()
    }

    /// Current mark of a user on a story, if any
    pub async fn get_like(&self, story_id: Uuid, user_id: &str) -> Option<LikeKind> {
        let state = self.state.read().await;
        state.likes.get(&(story_id, user_id.to_string())).copied()
    }
}
