//! Audio upload storage
//!
//! Uploads are streamed to `audio-<uuid>.<ext>` in the upload directory and
//! removed once the request finishes, whatever the outcome.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extensions accepted for upload (`.opus` is converted before transcription)
pub const SUPPORTED_EXTENSIONS: [&str; 11] = [
    ".mp3", ".wav", ".m4a", ".mp4", ".mpeg", ".mpga", ".webm", ".opus", ".ogg", ".oga", ".flac",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported audio format: {extension}. Supported formats: {}", SUPPORTED_EXTENSIONS.join(", "))]
    UnsupportedFormat { extension: String },

    #[error("Upload IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio file written to the upload directory
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub path: PathBuf,
    pub original_name: String,
    pub size: u64,
    /// Lowercase, with leading dot
    pub extension: String,
}

/// Validate the extension of a client file name
///
/// Returns the lowercase extension with its leading dot.
pub fn audio_extension(original_name: &str) -> Result<String, UploadError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(UploadError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
        })
    }
}

/// Writer for one upload in progress
pub struct UploadWriter {
    file: fs::File,
    audio: UploadedAudio,
}

impl UploadWriter {
    /// Create `audio-<uuid><ext>` in `dir`
    pub async fn create(dir: &Path, original_name: &str) -> Result<Self, UploadError> {
        let extension = audio_extension(original_name)?;
        fs::create_dir_all(dir).await?;

        let path = dir.join(format!("audio-{}{}", Uuid::new_v4(), extension));
        let file = fs::File::create(&path).await?;

        Ok(Self {
            file,
            audio: UploadedAudio {
                path,
                original_name: original_name.to_string(),
                size: 0,
                extension,
            },
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.audio.path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.file.write_all(chunk).await?;
        self.audio.size += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<UploadedAudio, UploadError> {
        self.file.flush().await?;
        debug!(
            path = %self.audio.path.display(),
            size = self.audio.size,
            "Upload stored"
        );
        Ok(self.audio)
    }
}

/// Remove a file, logging instead of failing
///
/// Returns true when a file was removed.
pub async fn cleanup_file(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Cleaned up file: {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Error cleaning up file {}: {}", path.display(), e);
            false
        }
    }
}

/// Size in megabytes with two decimals, for messages
pub fn size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}
