//! Transcription service
//!
//! Drives one uploaded file through Whisper: `.opus` conversion, splitting
//! when the file is over the Whisper limit, sequential chunk transcription
//! and merging by timestamp offset.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::audio_splitter::{AudioSplitter, SplitError, WHISPER_MAX_BYTES};
use super::upload::{cleanup_file, size_mb, UploadedAudio};
use super::whisper_client::{
    Transcription, TranscriptSegment, TranscriptWord, WhisperClient, WhisperError,
    RESPONSE_FORMAT, WHISPER_MODEL,
};

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error(transparent)]
    Whisper(#[from] WhisperError),

    #[error("Audio splitting failed: {0}")]
    Split(#[from] SplitError),

    #[error("Audio file is {size_mb}MB, over the 25MB Whisper limit, and ffmpeg is not available to split it. Please upload a smaller file.")]
    TooLarge { size_mb: String },

    #[error("Could not convert .opus file. Please convert to MP3 or WAV format.")]
    OpusConversion,
}

/// Request metadata returned alongside a transcription
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionMetadata {
    pub model: &'static str,
    pub response_format: &'static str,
    pub processing_time: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub original_name: String,
    pub file_size: u64,
    pub file_extension: String,
}

/// Result of [`TranscriptionService::process_audio_file`]
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub transcription: Transcription,
    pub metadata: TranscriptionMetadata,
    pub file_info: FileInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionStats {
    pub word_count: usize,
    pub character_count: usize,
    pub duration_seconds: f64,
    pub language: String,
    pub segments_count: usize,
    pub words_with_timestamps: usize,
}

/// Transcription as shown to the client
#[derive(Debug, Clone, Serialize)]
pub struct DisplayTranscription {
    pub text: String,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub statistics: TranscriptionStats,
    pub segments: Vec<TranscriptSegment>,
    pub words: Vec<TranscriptWord>,
}

/// Merge sequential chunk transcriptions into one
///
/// Each part comes with its planned length in seconds. Timestamps are
/// shifted by the summed duration of the chunks before, using the planned
/// length when Whisper reports none. Segment ids are renumbered from 0.
pub fn merge_transcriptions(parts: Vec<(Transcription, f64)>) -> Transcription {
    let mut merged = Transcription::default();
    let mut texts = Vec::with_capacity(parts.len());
    let mut offset = 0.0;

    for (part, planned) in parts {
        if merged.language.is_none() {
            merged.language = part.language.clone();
        }

        let trimmed = part.text.trim();
        if !trimmed.is_empty() {
            texts.push(trimmed.to_string());
        }

        for segment in part.segments {
            merged.segments.push(TranscriptSegment {
                id: merged.segments.len() as u32,
                start: segment.start + offset,
                end: segment.end + offset,
                text: segment.text,
            });
        }

        for word in part.words {
            merged.words.push(TranscriptWord {
                start: word.start + offset,
                end: word.end + offset,
                ..word
            });
        }

        offset += part.duration.unwrap_or(planned);
    }

    merged.text = texts.join(" ");
    merged.duration = Some(offset);
    merged
}

pub fn transcription_stats(transcription: &Transcription) -> TranscriptionStats {
    TranscriptionStats {
        word_count: transcription.text.split_whitespace().count(),
        character_count: transcription.text.chars().count(),
        duration_seconds: transcription.duration.unwrap_or(0.0),
        language: transcription
            .language
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        segments_count: transcription.segments.len(),
        words_with_timestamps: transcription.words.len(),
    }
}

pub fn format_for_display(transcription: Transcription) -> DisplayTranscription {
    let statistics = transcription_stats(&transcription);
    DisplayTranscription {
        text: transcription.text,
        language: transcription.language,
        duration: transcription.duration,
        statistics,
        segments: transcription.segments,
        words: transcription.words,
    }
}

/// Sibling path with the `.ogg` extension
fn ogg_sibling(path: &Path) -> PathBuf {
    path.with_extension("ogg")
}

/// Whisper transcription with optional chunking
pub struct TranscriptionService {
    whisper: WhisperClient,
    splitter: Option<AudioSplitter>,
}

impl TranscriptionService {
    pub fn new(whisper: WhisperClient, splitter: Option<AudioSplitter>) -> Self {
        Self { whisper, splitter }
    }

    pub fn can_split(&self) -> bool {
        self.splitter.is_some()
    }

    /// Transcribe an uploaded file
    ///
    /// Temporary files created here (`.ogg` copy, chunks) are removed before
    /// returning. The upload itself belongs to the caller.
    pub async fn process_audio_file(
        &self,
        audio: &UploadedAudio,
        language: Option<&str>,
    ) -> Result<TranscriptionOutcome, TranscriptionError> {
        let mut temporary: Option<PathBuf> = None;
        let mut source = audio.path.clone();

        if audio.extension == ".opus" {
            let ogg = ogg_sibling(&audio.path);
            if let Err(e) = tokio::fs::copy(&audio.path, &ogg).await {
                warn!("Failed to convert .opus file: {}", e);
                cleanup_file(&ogg).await;
                return Err(TranscriptionError::OpusConversion);
            }
            info!("Converted .opus to .ogg: {}", ogg.display());
            source = ogg.clone();
            temporary = Some(ogg);
        }

        let result = self.transcribe_path(&source, audio.size, language).await;

        if let Some(path) = temporary {
            cleanup_file(&path).await;
        }

        let (transcription, chunks) = result?;
        info!(
            chunks,
            characters = transcription.text.len(),
            "Transcription completed successfully"
        );

        Ok(TranscriptionOutcome {
            transcription,
            metadata: TranscriptionMetadata {
                model: WHISPER_MODEL,
                response_format: RESPONSE_FORMAT,
                processing_time: Utc::now().to_rfc3339(),
                chunks,
            },
            file_info: FileInfo {
                original_name: audio.original_name.clone(),
                file_size: audio.size,
                file_extension: audio.extension.clone(),
            },
        })
    }

    async fn transcribe_path(
        &self,
        path: &Path,
        size: u64,
        language: Option<&str>,
    ) -> Result<(Transcription, usize), TranscriptionError> {
        if size <= WHISPER_MAX_BYTES {
            let transcription = self.whisper.transcribe(path, language).await?;
            return Ok((transcription, 1));
        }

        let Some(splitter) = &self.splitter else {
            return Err(TranscriptionError::TooLarge {
                size_mb: size_mb(size),
            });
        };

        let chunks = splitter.split(path, size).await?;
        let count = chunks.len();
        let mut parts = Vec::with_capacity(count);
        let mut failure = None;

        for (index, chunk) in chunks.iter().enumerate() {
            info!("Transcribing chunk {}/{}", index + 1, count);
            match self.whisper.transcribe(&chunk.path, language).await {
                Ok(part) => parts.push((part, chunk.span.duration)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        for chunk in &chunks {
            cleanup_file(&chunk.path).await;
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok((merge_transcriptions(parts), count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(text: &str, duration: f64, segments: &[(f64, f64)]) -> Transcription {
        Transcription {
            text: text.to_string(),
            language: Some("spanish".to_string()),
            duration: Some(duration),
            segments: segments
                .iter()
                .enumerate()
                .map(|(i, (start, end))| TranscriptSegment {
                    id: i as u32,
                    start: *start,
                    end: *end,
                    text: format!("seg {}", i),
                })
                .collect(),
            words: vec![TranscriptWord {
                word: "vamos".to_string(),
                start: segments[0].0,
                end: segments[0].0 + 0.5,
                confidence: None,
            }],
        }
    }

    #[test]
    fn test_merge_offsets_and_duration() {
        let merged = merge_transcriptions(vec![
            (part("Primer punto.", 600.0, &[(0.0, 300.0), (300.0, 599.0)]), 600.0),
            (part(" Segundo punto. ", 600.0, &[(0.0, 200.0), (200.0, 600.0)]), 600.0),
            (part("Tercero.", 120.5, &[(0.0, 120.5)]), 120.5),
        ]);

        assert_eq!(merged.duration, Some(1320.5));
        assert_eq!(merged.text, "Primer punto. Segundo punto. Tercero.");
        assert_eq!(merged.segments.len(), 5);

        let ids: Vec<u32> = merged.segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        for pair in merged.segments.windows(2) {
            assert!(pair[1].start >= pair[0].start);
        }
        assert_eq!(merged.segments[2].start, 600.0);
        assert_eq!(merged.segments[4].start, 1200.0);
        assert_eq!(merged.words[2].start, 1200.0);
    }

    #[test]
    fn test_merge_language_from_first_reporting_chunk() {
        let mut first = part("a", 1.0, &[(0.0, 1.0)]);
        first.language = None;
        let merged = merge_transcriptions(vec![(first, 1.0), (part("b", 1.0, &[(0.0, 1.0)]), 1.0)]);
        assert_eq!(merged.language.as_deref(), Some("spanish"));
    }

    #[test]
    fn test_merge_missing_duration_uses_planned_length() {
        let mut first = part("a", 0.0, &[(0.0, 290.0)]);
        first.duration = None;
        let merged = merge_transcriptions(vec![
            (first, 300.0),
            (part("b", 300.0, &[(0.0, 150.0)]), 300.0),
        ]);

        assert_eq!(merged.segments[1].start, 300.0);
        assert_eq!(merged.words[1].start, 300.0);
        assert_eq!(merged.duration, Some(600.0));
    }

    #[test]
    fn test_display_statistics() {
        let display = format_for_display(part("uno dos  tres", 3.0, &[(0.0, 3.0)]));
        assert_eq!(display.statistics.word_count, 3);
        assert_eq!(display.statistics.character_count, 13);
        assert_eq!(display.statistics.segments_count, 1);
        assert_eq!(display.statistics.words_with_timestamps, 1);
        assert_eq!(display.statistics.language, "spanish");
    }

    #[test]
    fn test_ogg_sibling() {
        assert_eq!(
            ogg_sibling(Path::new("/tmp/audio-1.opus")),
            PathBuf::from("/tmp/audio-1.ogg")
        );
    }

    #[tokio::test]
    async fn test_oversized_without_splitter_fails_before_network() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audio-big.mp3");
        tokio::fs::write(&path, b"x").await.unwrap();

        // Unroutable base URL: reaching the network would surface a different error
        let whisper = WhisperClient::new(
            "key".to_string(),
            "http://127.0.0.1:9",
            std::time::Duration::from_secs(1),
            1,
        )
        .unwrap();
        let service = TranscriptionService::new(whisper, None);
        let audio = UploadedAudio {
            path,
            original_name: "big.mp3".to_string(),
            size: 26 * 1024 * 1024,
            extension: ".mp3".to_string(),
        };

        let err = service.process_audio_file(&audio, None).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::TooLarge { .. }));
        assert!(err.to_string().contains("25MB"));
    }
}
