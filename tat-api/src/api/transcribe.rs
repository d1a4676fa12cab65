//! Audio transcription endpoint

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::transcription::format_for_display;
use crate::services::upload::{cleanup_file, size_mb};
use crate::services::{UploadWriter, UploadedAudio};
use crate::AppState;

const NO_FILE: &str = "No audio file uploaded. Please provide an audio file.";

/// Parts of the multipart body we use
#[derive(Default)]
struct TranscribeForm {
    audio: Option<UploadedAudio>,
    language: Option<String>,
}

fn multipart_error(err: MultipartError, max_upload_mb: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!(
            "File too large. Maximum size is {}MB.",
            max_upload_mb
        ))
    } else {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

/// Stream the `audio` part to disk and read `language`
///
/// Every file created is pushed to `written` before any bytes arrive, so
/// the caller can remove it whatever happens here.
async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    written: &mut Vec<PathBuf>,
) -> ApiResult<TranscribeForm> {
    let max_mb = state.config.max_upload_mb();
    let mut form = TranscribeForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mb))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") if form.audio.is_none() => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let mut writer = UploadWriter::create(&state.config.upload_dir, &original_name).await?;
                written.push(writer.path().to_path_buf());

                while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_mb))? {
                    writer.write_chunk(&chunk).await?;
                }
                form.audio = Some(writer.finish().await?);
            }
            Some("language") => {
                let text = field.text().await.map_err(|e| multipart_error(e, max_mb))?;
                let text = text.trim();
                if !text.is_empty() {
                    form.language = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn transcribe_form(state: &AppState, form: TranscribeForm) -> ApiResult<Json<Value>> {
    let audio = form
        .audio
        .filter(|a| a.size > 0)
        .ok_or_else(|| ApiError::BadRequest(NO_FILE.into()))?;

    let service = state.transcription.as_ref().ok_or(ApiError::MissingApiKey {
        service: "OpenAI",
        var: "OPENAI_API_KEY",
    })?;

    info!(
        "Processing audio file: {} ({} MB)",
        audio.original_name,
        size_mb(audio.size)
    );

    let outcome = service
        .process_audio_file(&audio, form.language.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Audio transcribed successfully",
        "data": format_for_display(outcome.transcription),
        "metadata": outcome.metadata,
        "file_info": outcome.file_info,
    })))
}

/// POST /api/transcribe
///
/// Multipart body: `audio` file and optional `language` code. The stored
/// upload is deleted before the response is sent.
pub async fn transcribe_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let mut multipart = multipart.map_err(|_| ApiError::BadRequest(NO_FILE.into()))?;
    let mut written = Vec::new();

    let result = match read_form(&state, &mut multipart, &mut written).await {
        Ok(form) => transcribe_form(&state, form).await,
        Err(e) => Err(e),
    };

    for path in &written {
        cleanup_file(path).await;
    }

    result
}

pub fn transcribe_routes() -> Router<AppState> {
    Router::new().route("/api/transcribe", post(transcribe_audio))
}
