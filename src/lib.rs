//! # Ephemera
//!
//! An ephemeral stories subsystem: short-lived photo/video story
//! collections with views, reactions and timer-driven playback.
//!
//! ## Features
//!
//! - **24-hour stories**: authored collections of up to ten photos and
//!   videos that expire a day after creation
//! - **Media ingestion**: raw uploads normalized through a host-provided
//!   codec (photo resize, video probe + thumbnail)
//! - **View tracking**: idempotent per-viewer view records feeding the
//!   unviewed-ring indicator
//! - **Reactions**: append-only emoji log plus togglable like/dislike
//!   marks
//! - **Playback**: a pure state machine driven by a 50ms tick timer,
//!   with pause/resume, navigation and media-ready deferral
//!
//! ## Modules
//!
//! - [`store`]: story collection, expiration sweep and persistence
//! - [`media`]: ingestion pipeline turning raw uploads into media items
//! - [`views`]: per-viewer view records
//! - [`reactions`]: emoji reactions and like marks
//! - [`playback`]: playback state machine and its async session driver
//! - [`host`]: identity and navigation seams the embedding app provides
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ephemera::host::{NullNavigator, StaticIdentity};
//! use ephemera::playback::{NullMediaController, PlaybackSession, SessionConfig};
//! use ephemera::store::{MediaItem, MemoryKv, StoreConfig, StoryStore};
//! use ephemera::views::ViewTracker;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kv = Arc::new(MemoryKv::new());
//!     let identity = Arc::new(StaticIdentity::signed_in("alice"));
//!
//!     // Open the store and start the expiration sweep
//!     let store = Arc::new(
//!         StoryStore::open(kv.clone(), identity.clone(), StoreConfig::default()).await?,
//!     );
//!     let sweep = store.start_sweep();
//!
//!     // Publish a single-photo story
//!     let story = store
//!         .create("alice", vec![MediaItem::photo("photos/beach.jpg")])
//!         .await?;
//!
//!     // Play it back
//!     let views = Arc::new(ViewTracker::open(kv, store.clone(), identity).await?);
//!     let session = PlaybackSession::start(
//!         vec![story],
//!         0,
//!         0,
//!         "alice",
//!         views,
//!         Arc::new(NullNavigator),
//!         Arc::new(NullMediaController),
//!         SessionConfig::default(),
//!     )
//!     .await?;
//!
//!     session.close().await;
//!     store.shutdown().await?;
//!     sweep.abort();
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod host;
pub mod media;
pub mod playback;
pub mod reactions;
pub mod store;
pub mod views;

// Re-export top-level types for convenience
pub use store::{
    JsonFileKv, KeyValueStore, LikeKind, MediaItem, MediaKind, MemoryKv, Story, StoreConfig,
    StoreError, StoreResult, StoreStats, StoryStore,
};

pub use media::{
    CodecError, IngestError, MediaCodec, MediaIngestor, PhotoSpec, RawMedia, VideoProbe,
};

pub use playback::{
    MachineConfig, MediaController, NullMediaController, PlaybackError, PlaybackInput,
    PlaybackMachine, PlaybackSession, PlaybackState, SessionConfig,
};

pub use host::{Identity, Navigator, NullNavigator, StaticIdentity};

pub use reactions::{ReactionLedger, RECENT_REACTIONS_DEFAULT};

pub use views::ViewTracker;

pub use config::{generate_default_config, Config, ConfigError};
