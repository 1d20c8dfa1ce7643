//! Speech-to-text via the OpenAI audio transcriptions API.
//!
//! The transcriber is built once at startup and reused for the whole
//! process; its HTTP client and credentials are the expensive shared
//! resource, injected wherever transcription is needed.

use crate::error::TranscribeError;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};
use zeroize::Zeroize;

/// OpenAI audio transcriptions endpoint
const TRANSCRIPTION_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Transcription model
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Converts captured audio into ordered text segments.
#[async_trait]
pub(crate) trait Transcriber: Send + Sync {
    /// Transcribe a WAV container with the given language hint.
    async fn transcribe(
        &self,
        wav_bytes: Vec<u8>,
        language: &str,
    ) -> Result<Vec<String>, TranscribeError>;
}

pub(crate) struct OpenAITranscriber {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    text: String,
}

impl OpenAITranscriber {
    pub(crate) fn new(api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for OpenAITranscriber")?;

        Ok(Self { api_key, client })
    }

    /// Pick the segment texts out of a parsed response, falling back to
    /// the whole-text field when the server omits segments.
    fn extract_segments(response: TranscriptionResponse) -> Result<Vec<String>, TranscribeError> {
        let segments: Vec<String> = if response.segments.is_empty() {
            if response.text.trim().is_empty() {
                Vec::new()
            } else {
                vec![response.text]
            }
        } else {
            response.segments.into_iter().map(|s| s.text).collect()
        };

        if segments.iter().all(|s| s.trim().is_empty()) {
            return Err(TranscribeError::EmptyTranscript);
        }
        Ok(segments)
    }
}

#[async_trait]
impl Transcriber for OpenAITranscriber {
    #[instrument(skip_all, fields(audio_bytes = wav_bytes.len()))]
    async fn transcribe(
        &self,
        wav_bytes: Vec<u8>,
        language: &str,
    ) -> Result<Vec<String>, TranscribeError> {
        let file_part = reqwest::multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(TRANSCRIPTION_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(TranscribeError::ServerError { status, message });
        }

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            TranscribeError::InvalidResponse(format!(
                "Failed to parse transcription response: {}",
                e
            ))
        })?;

        let segments = Self::extract_segments(parsed)?;
        info!(segments = segments.len(), "Transcription complete");
        Ok(segments)
    }
}

impl Drop for OpenAITranscriber {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}

/// Join transcription segments into one transcript: segments are
/// trimmed and concatenated with single spaces.
pub(crate) fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments_single_spaces_and_trims() {
        let segments = vec![
            " Build a birdhouse ".to_string(),
            "  with a sloped roof.".to_string(),
        ];
        assert_eq!(
            join_segments(&segments),
            "Build a birdhouse with a sloped roof."
        );
    }

    #[test]
    fn test_join_segments_skips_empty_segments() {
        let segments = vec!["hello".to_string(), "   ".to_string(), "world".to_string()];
        assert_eq!(join_segments(&segments), "hello world");
    }

    #[test]
    fn test_verbose_response_deserialization() {
        let json = r#"{
            "task": "transcribe",
            "language": "english",
            "duration": 3.2,
            "text": "Build a birdhouse with a sloped roof.",
            "segments": [
                {"id": 0, "start": 0.0, "end": 1.5, "text": " Build a birdhouse"},
                {"id": 1, "start": 1.5, "end": 3.2, "text": " with a sloped roof."}
            ]
        }"#;

        let parsed: TranscriptionResponse =
            serde_json::from_str(json).expect("Failed to deserialize");
        let segments = OpenAITranscriber::extract_segments(parsed).expect("Failed to extract");
        assert_eq!(segments.len(), 2);
        assert_eq!(join_segments(&segments), "Build a birdhouse with a sloped roof.");
    }

    #[test]
    fn test_plain_response_falls_back_to_text_field() {
        let json = r#"{"text": "Plant a garden."}"#;
        let parsed: TranscriptionResponse =
            serde_json::from_str(json).expect("Failed to deserialize");
        let segments = OpenAITranscriber::extract_segments(parsed).expect("Failed to extract");
        assert_eq!(segments, vec!["Plant a garden.".to_string()]);
    }

    #[test]
    fn test_silent_audio_is_empty_transcript() {
        let json = r#"{"text": "  "}"#;
        let parsed: TranscriptionResponse =
            serde_json::from_str(json).expect("Failed to deserialize");
        assert!(matches!(
            OpenAITranscriber::extract_segments(parsed),
            Err(TranscribeError::EmptyTranscript)
        ));
    }
}
