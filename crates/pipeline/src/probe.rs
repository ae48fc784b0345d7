//! External collaborators used before a clip exists: the metadata probe and
//! the attachment downloader.

use std::path::Path;

use async_trait::async_trait;
use clipcraftr_core::ffmpeg::{self, FfmpegError, VideoInfo};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::processor::ProcessingError;

/// `probe(path)` contract for the external metadata extractor.
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, FfmpegError>;
}

/// Runs `ffprobe` as a subprocess.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeProbe;

#[async_trait]
impl VideoProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, FfmpegError> {
        let output = ffmpeg::probe_video(path).await?;
        Ok(ffmpeg::video_info(&output))
    }
}

/// Downloads a submitted attachment to local disk.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Write the body of `url` to `dest`, refusing bodies over `max_bytes`.
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path, max_bytes: i64) -> Result<u64, ProcessingError>;
}

/// Streams attachments over HTTP with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path, max_bytes: i64) -> Result<u64, ProcessingError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ProcessingError::Download(e.to_string()))?;

        let limit = u64::try_from(max_bytes).unwrap_or(0);
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(ProcessingError::Download(format!(
                "Attachment exceeds {limit} bytes"
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ProcessingError::Download(e.to_string()))?;
            written += chunk.len() as u64;
            if written > limit {
                return Err(ProcessingError::Download(format!(
                    "Attachment exceeds {limit} bytes"
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, path = %dest.display(), "Attachment downloaded");
        Ok(written)
    }
}
