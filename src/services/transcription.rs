//! 语音转写：Gemini为主，Groq Whisper兜底

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::i18n::LanguageCode;
use crate::llm::registry::{Credentials, ProviderKey};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GROQ_TRANSCRIPTION_ENDPOINT: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe this audio file accurately. Output ONLY the spoken text. Do not add any conversational filler or descriptions.";

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("empty audio data")]
    EmptyAudio,

    #[error("{backend} transcription failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Transcription failed. Errors: {}", .0.join("; "))]
    AllFailed(Vec<String>),
}

impl TranscriptionError {
    fn backend(backend: &str, message: impl std::fmt::Display) -> Self {
        TranscriptionError::Backend {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &[u8],
        language: LanguageCode,
    ) -> Result<String, TranscriptionError>;
}

pub struct GeminiTranscriber {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(client: reqwest::Client, credentials: &Credentials) -> Self {
        Self {
            client,
            api_key: credentials.get(ProviderKey::Gemini).map(str::to_string),
            model: "gemini-1.5-flash".to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        _language: LanguageCode,
    ) -> Result<String, TranscriptionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::backend(self.name(), "GOOGLE_API_KEY not found"))?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": TRANSCRIBE_INSTRUCTION },
                    { "inline_data": { "mime_type": "audio/wav", "data": STANDARD.encode(audio) } }
                ]
            }]
        });

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscriptionError::backend(self.name(), e))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TranscriptionError::backend(self.name(), e))?;
        if !status.is_success() {
            return Err(TranscriptionError::backend(
                self.name(),
                format!("HTTP {}: {}", status, payload),
            ));
        }

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| TranscriptionError::backend(self.name(), "response contained no text"))
    }
}

pub struct GroqWhisperTranscriber {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GroqWhisperTranscriber {
    pub fn new(client: reqwest::Client, credentials: &Credentials) -> Self {
        Self {
            client,
            api_key: credentials.get(ProviderKey::Groq).map(str::to_string),
            model: "whisper-large-v3".to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for GroqWhisperTranscriber {
    fn name(&self) -> &str {
        "Groq"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language: LanguageCode,
    ) -> Result<String, TranscriptionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::backend(self.name(), "GROQ_API_KEY not found"))?;

        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::backend(self.name(), e))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", language.code());

        let response = self
            .client
            .post(GROQ_TRANSCRIPTION_ENDPOINT)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::backend(self.name(), e))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TranscriptionError::backend(self.name(), e))?;
        if !status.is_success() {
            return Err(TranscriptionError::backend(
                self.name(),
                format!("HTTP {}: {}", status, payload),
            ));
        }

        payload
            .get("text")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| TranscriptionError::backend(self.name(), "response contained no text"))
    }
}

/// 默认的转写后端链
pub fn default_transcribers(credentials: &Credentials) -> Vec<Arc<dyn Transcriber>> {
    let client = reqwest::Client::new();
    vec![
        Arc::new(GeminiTranscriber::new(client.clone(), credentials)),
        Arc::new(GroqWhisperTranscriber::new(client, credentials)),
    ]
}

/// 依次尝试各后端，返回第一个成功的结果
pub async fn transcribe_with_fallback(
    transcribers: &[Arc<dyn Transcriber>],
    audio: &[u8],
    language: LanguageCode,
) -> Result<String, TranscriptionError> {
    if audio.is_empty() {
        return Err(TranscriptionError::EmptyAudio);
    }

    let mut errors = Vec::new();
    for transcriber in transcribers {
        match transcriber.transcribe(audio, language).await {
            Ok(text) => {
                info!("🎙️ {} 转写完成", transcriber.name());
                return Ok(text);
            }
            Err(e) => {
                warn!("⚠️ {} 转写失败: {}", transcriber.name(), e);
                errors.push(e.to_string());
            }
        }
    }
    Err(TranscriptionError::AllFailed(errors))
}

/// speech_to_text失败时结果的前缀
pub const TRANSCRIPTION_FAILURE_PREFIX: &str = "❌ ";

/// 转写入口：失败时返回以❌开头的错误说明而不是Err
pub async fn speech_to_text(
    transcribers: &[Arc<dyn Transcriber>],
    audio: &[u8],
    language: LanguageCode,
) -> String {
    match transcribe_with_fallback(transcribers, audio, language).await {
        Ok(text) => text,
        Err(e) => format!("{}{}", TRANSCRIPTION_FAILURE_PREFIX, e),
    }
}
