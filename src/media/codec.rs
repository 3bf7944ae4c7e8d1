//! Media codec interface
//!
//! Pixel and frame work (photo decode/resize/re-encode, video metadata
//! probing and thumbnail capture) is delegated to the host through the
//! [`MediaCodec`] trait. The subsystem hands raw blobs in and receives
//! opaque content references back; it never decodes bytes itself.

use crate::store::types::{ContentRef, MediaKind};
use async_trait::async_trait;
use thiserror::Error;

/// A raw user-submitted media blob, tagged with its kind
#[derive(Debug, Clone)]
pub struct RawMedia {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

impl RawMedia {
    pub fn photo(bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Photo,
            bytes,
        }
    }

    pub fn video(bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Video,
            bytes,
        }
    }
}

/// Normalization parameters for photos
#[derive(Debug, Clone, Copy)]
pub struct PhotoSpec {
    /// Longest edge after resize, in pixels
    pub max_edge: u32,
    /// Re-encode quality in [0,1]
    pub quality: f32,
}

impl Default for PhotoSpec {
    fn default() -> Self {
        Self {
            max_edge: 1080,
            quality: 0.8,
        }
    }
}

/// Result of probing a video blob
#[derive(Debug, Clone)]
pub struct VideoProbe {
    /// Reference to the original video for playback
    pub content: ContentRef,
    /// Reference to the captured thumbnail frame
    pub thumbnail: ContentRef,
    /// Duration in seconds
    pub duration_secs: f64,
}

/// Errors produced by a media codec
#[derive(Error, Debug)]
pub enum CodecError {
    /// Format not handled by this codec
    #[error("Unsupported media: {0}")]
    Unsupported(String),

    /// Blob could not be decoded
    #[error("Corrupt media: {0}")]
    Corrupt(String),

    /// Underlying I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host-provided media processing
///
/// `probe_video` captures its thumbnail at `thumb_offset_secs` into the
/// stream, clamped to the start for clips shorter than the offset.
#[async_trait]
pub trait MediaCodec: Send + Sync {
    /// Decode, resize so the longer edge fits `spec.max_edge` preserving
    /// aspect ratio, re-encode at `spec.quality`; returns the stored
    /// content reference.
    async fn normalize_photo(
        &self,
        raw: &RawMedia,
        spec: PhotoSpec,
    ) -> Result<ContentRef, CodecError>;

    /// Probe metadata and capture a thumbnail frame; the original blob
    /// is retained untouched for playback.
    async fn probe_video(
        &self,
        raw: &RawMedia,
        thumb_offset_secs: f64,
    ) -> Result<VideoProbe, CodecError>;
}
