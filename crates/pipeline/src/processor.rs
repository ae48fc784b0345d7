//! The opaque processing step run by the dispatcher.
//!
//! [`MediaProcessor`] is the seam between job bookkeeping and media work.
//! [`FfmpegProcessor`] re-probes clips and renders montages by cutting each
//! referenced clip into a normalized segment and concatenating the result.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clipcraftr_core::error::CoreError;
use clipcraftr_core::ffmpeg::{self, ConcatSegment, FfmpegError};
use clipcraftr_core::media::ClipMetadata;
use clipcraftr_core::naming::montage_output_name;
use clipcraftr_db::models::clip::Clip;
use clipcraftr_db::models::montage::{Montage, MontageOutput};
use clipcraftr_db::StoreError;

use crate::probe::VideoProbe;
use crate::tracker::StepTracker;

/// Why a processing step failed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] FfmpegError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing timed out after {0} seconds")]
    Timeout(u64),
}

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Inspect a stored clip and return its refreshed metadata.
    async fn process_clip(&self, clip: &Clip) -> Result<ClipMetadata, ProcessingError>;

    /// Render a montage from its source clips, reporting steps to `tracker`.
    async fn render_montage(
        &self,
        montage: &Montage,
        clips: &[Clip],
        tracker: &mut StepTracker,
    ) -> Result<MontageOutput, ProcessingError>;
}

// ---------------------------------------------------------------------------
// FfmpegProcessor
// ---------------------------------------------------------------------------

pub struct FfmpegProcessor {
    probe: Arc<dyn VideoProbe>,
    output_dir: PathBuf,
}

impl FfmpegProcessor {
    pub fn new(probe: Arc<dyn VideoProbe>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            probe,
            output_dir: output_dir.into(),
        }
    }

    /// Segment plan in montage order. Every referenced clip must be present.
    fn plan(montage: &Montage, clips: &[Clip]) -> Result<Vec<ConcatSegment>, ProcessingError> {
        montage
            .ordered_clips()
            .iter()
            .map(|entry| {
                let clip = clips
                    .iter()
                    .find(|c| c.id == entry.clip_id)
                    .ok_or(CoreError::NotFound {
                        entity: "Clip",
                        id: entry.clip_id,
                    })?;
                Ok(ConcatSegment {
                    path: PathBuf::from(&clip.file_path),
                    start: entry.start_time,
                    end: entry.end_time,
                })
            })
            .collect()
    }

    async fn render(
        &self,
        montage: &Montage,
        segments: &[ConcatSegment],
        work_dir: &std::path::Path,
        tracker: &mut StepTracker,
    ) -> Result<MontageOutput, ProcessingError> {
        let settings = &montage.settings.output;

        let mut rendered = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            tracker.begin(&format!("render segment {}", index + 1)).await;
            let out = work_dir.join(format!("segment_{index:03}.{}", settings.format));
            ffmpeg::render_segment(segment, &out, settings).await?;
            tracker.complete().await;
            rendered.push(out);
        }

        tracker.begin("concatenate").await;
        let list_file = work_dir.join("segments.txt");
        tokio::fs::write(&list_file, ffmpeg::concat_list(&rendered)).await?;
        let output_path = self
            .output_dir
            .join(montage_output_name(montage.id, &settings.format));
        ffmpeg::concat_segments(&list_file, &output_path).await?;
        tracker.complete().await;

        tracker.begin("finalize").await;
        let info = self.probe.probe(&output_path).await?;
        let file_size = tokio::fs::metadata(&output_path)
            .await
            .ok()
            .and_then(|m| i64::try_from(m.len()).ok());
        tracker.complete().await;

        Ok(MontageOutput {
            output_path: output_path.to_string_lossy().to_string(),
            duration: info.duration,
            file_size,
        })
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn process_clip(&self, clip: &Clip) -> Result<ClipMetadata, ProcessingError> {
        let info = self.probe.probe(std::path::Path::new(&clip.file_path)).await?;
        tracing::debug!(clip_id = clip.id, duration = info.duration, "Clip probed");
        Ok(info.metadata)
    }

    async fn render_montage(
        &self,
        montage: &Montage,
        clips: &[Clip],
        tracker: &mut StepTracker,
    ) -> Result<MontageOutput, ProcessingError> {
        tracker.begin("prepare").await;
        let segments = match Self::plan(montage, clips) {
            Ok(segments) => segments,
            Err(e) => {
                tracker.fail(&e.to_string()).await;
                return Err(e);
            }
        };
        let work_dir =
            WorkDir::create(self.output_dir.join(format!("montage_{}_work", montage.id))).await?;
        tracker.complete().await;

        let result = self.render(montage, &segments, work_dir.path(), tracker).await;
        if let Err(e) = &result {
            tracker.fail(&e.to_string()).await;
        }
        result
    }
}

/// Scratch directory for one render, removed when dropped. A render future
/// dropped by a timeout still cleans up.
struct WorkDir(PathBuf);

impl WorkDir {
    async fn create(path: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self(path))
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.0.display(), error = %e, "Failed to remove montage work dir");
            }
        }
    }
}

/// Steps [`FfmpegProcessor::render_montage`] reports for `clip_count` clips.
pub fn montage_step_count(clip_count: usize) -> usize {
    clip_count + 3
}
