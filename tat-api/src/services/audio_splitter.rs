//! Audio splitting for files over the Whisper upload limit
//!
//! Uses the `ffprobe`/`ffmpeg` command-line tools. Each chunk is re-encoded
//! to mono 16 kHz 64 kbps MP3 so every chunk lands well under the limit.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whisper API upload limit (25 MB)
pub const WHISPER_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Target bytes per chunk, leaves headroom under the limit
pub const CHUNK_TARGET_BYTES: u64 = 24 * 1024 * 1024;

/// Output bitrate of re-encoded chunks in bytes per second (64 kbps)
const CHUNK_BYTES_PER_SEC: f64 = 8000.0;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("{0} binary not found in PATH")]
    BinaryNotFound(&'static str),

    #[error("Could not read audio duration: {0}")]
    Probe(String),

    #[error("Audio chunk extraction failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One planned chunk, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub start: f64,
    pub duration: f64,
}

/// Encoded chunk on disk with the span it covers
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub path: PathBuf,
    pub span: ChunkSpan,
}

/// Plan evenly sized time spans for a file
///
/// Chunk count is the larger of the count needed by the source size and the
/// count needed by the re-encoded size, so every span fits under
/// [`CHUNK_TARGET_BYTES`] either way.
pub fn plan_chunks(file_size: u64, duration_secs: f64) -> Vec<ChunkSpan> {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return Vec::new();
    }

    let by_size = file_size.div_ceil(CHUNK_TARGET_BYTES).max(1);
    let by_encoded =
        ((duration_secs * CHUNK_BYTES_PER_SEC) / CHUNK_TARGET_BYTES as f64).ceil() as u64;
    let count = by_size.max(by_encoded).max(1);

    let span = duration_secs / count as f64;
    (0..count)
        .map(|i| {
            let start = span * i as f64;
            let duration = if i + 1 == count {
                duration_secs - start
            } else {
                span
            };
            ChunkSpan { start, duration }
        })
        .collect()
}

/// Wrapper around ffprobe and ffmpeg
#[derive(Debug, Clone)]
pub struct AudioSplitter {
    ffmpeg: String,
    ffprobe: String,
}

impl AudioSplitter {
    /// Look for ffmpeg and ffprobe in PATH
    pub async fn detect() -> Result<Self, SplitError> {
        for binary in ["ffmpeg", "ffprobe"] {
            match Command::new(binary).arg("-version").output().await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SplitError::BinaryNotFound(binary));
                }
                Err(e) => return Err(SplitError::Io(e)),
            }
        }

        Ok(Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        })
    }

    /// Duration of an audio file in seconds
    pub async fn probe_duration(&self, path: &Path) -> Result<f64, SplitError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(SplitError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|_| SplitError::Probe(format!("unexpected ffprobe output '{}'", text.trim())))
    }

    /// Split `path` into MP3 chunks next to it
    ///
    /// Returns chunks in playback order. On failure, chunks already
    /// written are removed.
    pub async fn split(&self, path: &Path, file_size: u64) -> Result<Vec<AudioChunk>, SplitError> {
        let duration = self.probe_duration(path).await?;
        let spans = plan_chunks(file_size, duration);
        if spans.is_empty() {
            return Err(SplitError::Probe(format!("invalid duration {}", duration)));
        }

        info!(
            file = %path.display(),
            duration_s = format!("{:.1}", duration),
            chunks = spans.len(),
            "Splitting audio for transcription"
        );

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let batch = Uuid::new_v4();
        let mut chunks: Vec<AudioChunk> = Vec::with_capacity(spans.len());

        for (index, span) in spans.into_iter().enumerate() {
            let chunk_path = dir.join(format!("chunk-{}-{:03}.mp3", batch, index));
            if let Err(e) = self.encode_chunk(path, &chunk_path, span).await {
                for written in &chunks {
                    super::upload::cleanup_file(&written.path).await;
                }
                super::upload::cleanup_file(&chunk_path).await;
                return Err(e);
            }
            chunks.push(AudioChunk { path: chunk_path, span });
        }

        Ok(chunks)
    }

    async fn encode_chunk(
        &self,
        source: &Path,
        target: &Path,
        span: ChunkSpan,
    ) -> Result<(), SplitError> {
        debug!(
            target = %target.display(),
            start = span.start,
            duration = span.duration,
            "Encoding chunk"
        );

        let output = Command::new(&self.ffmpeg)
            .args(["-y", "-v", "error", "-ss"])
            .arg(format!("{:.3}", span.start))
            .arg("-t")
            .arg(format!("{:.3}", span.duration))
            .arg("-i")
            .arg(source)
            .args(["-ac", "1", "-ar", "16000", "-b:a", "64k"])
            .arg(target)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(target = %target.display(), error = %stderr, "ffmpeg failed");
            Err(SplitError::Encode(stderr))
        }
    }
}
