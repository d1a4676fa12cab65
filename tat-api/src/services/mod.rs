//! Services for tat-api
//!
//! External API clients (Whisper, Claude), audio splitting, upload storage
//! and the analysis pipelines built on them.

pub mod attribution;
pub mod audio_splitter;
pub mod claude_client;
pub mod prompts;
pub mod reframe;
pub mod sample;
pub mod transcription;
pub mod upload;
pub mod whisper_client;

pub use attribution::{AnalysisError, AnalysisOutcome, AttributionService};
pub use audio_splitter::AudioSplitter;
pub use claude_client::ClaudeClient;
pub use reframe::ReframeScore;
pub use transcription::{TranscriptionError, TranscriptionService};
pub use upload::{UploadError, UploadWriter, UploadedAudio};
pub use whisper_client::WhisperClient;
