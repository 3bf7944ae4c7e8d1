//! Media ingestion
//!
//! Normalizes raw photo/video uploads into storable media items:
//! photos are resized and re-encoded, videos are probed for duration
//! and a thumbnail frame. Actual pixel work lives behind the
//! [`MediaCodec`] trait supplied by the host.

pub mod codec;
pub mod ingestor;

pub use codec::{CodecError, MediaCodec, PhotoSpec, RawMedia, VideoProbe};
pub use ingestor::{IngestError, MediaIngestor, THUMBNAIL_OFFSET_SECS};
