//! Media ingestor
//!
//! Normalizes a batch of raw photo/video blobs into storable
//! [`MediaItem`]s, preserving input order. Items the codec rejects are
//! skipped with a warning rather than aborting the batch; the batch
//! fails only when nothing usable remains or the input exceeds the
//! per-story limit.

use crate::media::codec::{MediaCodec, PhotoSpec, RawMedia};
use crate::store::types::{MediaItem, MediaKind, MAX_MEDIA_PER_STORY};
use std::sync::Arc;
use thiserror::Error;

/// Seconds into a video at which the thumbnail frame is captured
pub const THUMBNAIL_OFFSET_SECS: f64 = 1.0;

/// Errors that can occur during batch ingestion
#[derive(Error, Debug)]
pub enum IngestError {
    /// Input batch was empty
    #[error("Empty media batch")]
    EmptyBatch,

    /// Input batch exceeds the per-story limit
    #[error("Too many media items: {0} (max {MAX_MEDIA_PER_STORY})")]
    TooManyItems(usize),

    /// Every item in the batch failed to process
    #[error("No usable media in batch ({failed} of {failed} items failed)")]
    NoUsableMedia { failed: usize },
}

/// Turns raw upload batches into normalized media items
pub struct MediaIngestor {
    codec: Arc<dyn MediaCodec>,
    photo_spec: PhotoSpec,
}

impl MediaIngestor {
    pub fn new(codec: Arc<dyn MediaCodec>) -> Self {
        Self {
            codec,
            photo_spec: PhotoSpec::default(),
        }
    }

    /// Override the photo normalization parameters
    pub fn with_photo_spec(mut self, spec: PhotoSpec) -> Self {
        self.photo_spec = spec;
        self
    }

    /// Ingest a batch of raw media, preserving input order
    ///
    /// Per-item codec failures are skipped with a warning. Returns the
    /// normalized items ready for `StoryStore::create`.
    pub async fn ingest(&self, batch: Vec<RawMedia>) -> Result<Vec<MediaItem>, IngestError> {
        if batch.is_empty() {
            return Err(IngestError::EmptyBatch);
        }
        if batch.len() > MAX_MEDIA_PER_STORY {
            return Err(IngestError::TooManyItems(batch.len()));
        }

        let total = batch.len();
        let mut items = Vec::with_capacity(total);

        for (idx, raw) in batch.iter().enumerate() {
            match self.ingest_one(raw).await {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(index = idx, kind = %raw.kind, "Skipping media item: {}", e);
                }
            }
        }

        if items.is_empty() {
            return Err(IngestError::NoUsableMedia { failed: total });
        }

        tracing::debug!(accepted = items.len(), total, "Ingested media batch");
        Ok(items)
    }

    async fn ingest_one(
        &self,
        raw: &RawMedia,
    ) -> Result<MediaItem, crate::media::codec::CodecError> {
        match raw.kind {
            MediaKind::Photo => {
                let content = self.codec.normalize_photo(raw, self.photo_spec).await?;
                Ok(MediaItem::photo(content))
            }
            MediaKind::Video => {
                let probe = self.codec.probe_video(raw, THUMBNAIL_OFFSET_SECS).await?;
                Ok(MediaItem::video(
                    probe.content,
                    probe.thumbnail,
                    probe.duration_secs,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::codec::{CodecError, VideoProbe};
    use async_trait::async_trait;

    /// Codec that accepts anything except blobs starting with `0xFF`,
    /// which it reports as corrupt.
    struct StubCodec;

    #[async_trait]
    impl MediaCodec for StubCodec {
        async fn normalize_photo(
            &self,
            raw: &RawMedia,
            spec: PhotoSpec,
        ) -> Result<String, CodecError> {
            if raw.bytes.first() == Some(&0xFF) {
                return Err(CodecError::Corrupt("bad photo header".to_string()));
            }
            Ok(format!("photo:{}x{}", raw.bytes.len(), spec.max_edge))
        }

        async fn probe_video(
            &self,
            raw: &RawMedia,
            thumb_offset_secs: f64,
        ) -> Result<VideoProbe, CodecError> {
            if raw.bytes.first() == Some(&0xFF) {
                return Err(CodecError::Corrupt("bad video header".to_string()));
            }
            // Pretend the first byte encodes duration
            let duration = f64::from(raw.bytes.first().copied().unwrap_or(0));
            Ok(VideoProbe {
                content: format!("video:{}", raw.bytes.len()),
                thumbnail: format!("thumb@{}", thumb_offset_secs.min(duration)),
                duration_secs: duration,
            })
        }
    }

    fn ingestor() -> MediaIngestor {
        MediaIngestor::new(Arc::new(StubCodec))
    }

    #[tokio::test]
    async fn test_ingest_preserves_order_and_kinds() {
        let batch = vec![
            RawMedia::photo(vec![1, 2, 3]),
            RawMedia::video(vec![10, 0, 0]),
            RawMedia::photo(vec![4]),
        ];

        let items = ingestor().ingest(batch).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, MediaKind::Photo);
        assert_eq!(items[1].kind, MediaKind::Video);
        assert_eq!(items[1].duration_secs, Some(10.0));
        assert!(items[1].thumbnail.is_some());
        assert_eq!(items[2].kind, MediaKind::Photo);
    }

    #[tokio::test]
    async fn test_corrupt_item_skipped_order_preserved() {
        // Scenario: 3 valid photos + 1 corrupt blob in the middle
        let batch = vec![
            RawMedia::photo(vec![1]),
            RawMedia::photo(vec![2, 2]),
            RawMedia::photo(vec![0xFF]),
            RawMedia::photo(vec![3, 3, 3]),
        ];

        let items = ingestor().ingest(batch).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].content, "photo:1x1080");
        assert_eq!(items[1].content, "photo:2x1080");
        assert_eq!(items[2].content, "photo:3x1080");
    }

    #[tokio::test]
    async fn test_all_corrupt_fails_batch() {
        let batch = vec![RawMedia::photo(vec![0xFF]), RawMedia::video(vec![0xFF])];
        let err = ingestor().ingest(batch).await.unwrap_err();
        assert!(matches!(err, IngestError::NoUsableMedia { failed: 2 }));
    }

    #[tokio::test]
    async fn test_batch_size_limits() {
        let err = ingestor().ingest(Vec::new()).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyBatch));

        let batch: Vec<RawMedia> = (0..11).map(|i| RawMedia::photo(vec![i])).collect();
        let err = ingestor().ingest(batch).await.unwrap_err();
        assert!(matches!(err, IngestError::TooManyItems(11)));
    }

    #[tokio::test]
    async fn test_photo_spec_override() {
        let ingestor = ingestor().with_photo_spec(PhotoSpec {
            max_edge: 720,
            quality: 0.6,
        });
        let items = ingestor
            .ingest(vec![RawMedia::photo(vec![9])])
            .await
            .unwrap();
        assert_eq!(items[0].content, "photo:1x720");
    }
}
