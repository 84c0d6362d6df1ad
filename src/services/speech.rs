use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::i18n::LanguageCode;
use crate::llm::rate_limiter::RateLimiter;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// 单次合成请求允许的最大字符数
const MAX_SEGMENT_CHARS: usize = 180;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech is not supported for language `{0}`")]
    UnsupportedLanguage(LanguageCode),

    #[error("speech service error: {0}")]
    Service(String),

    #[error("speech service returned no audio")]
    Empty,
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        SynthesisError::Service(e.to_string())
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn supports(&self, language: LanguageCode) -> bool {
        language.supports_speech()
    }

    /// 返回mp3字节
    async fn synthesize(&self, text: &str, language: LanguageCode)
    -> Result<Vec<u8>, SynthesisError>;
}

/// Google翻译的朗读接口，长文本分段请求后按顺序拼接
pub struct GoogleSpeech {
    client: reqwest::Client,
    endpoint: String,
    limiter: Arc<RateLimiter>,
}

impl GoogleSpeech {
    pub fn new(timeout: Duration, limiter: Arc<RateLimiter>) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: TTS_ENDPOINT.to_string(),
            limiter,
        })
    }

    async fn fetch_segment(
        &self,
        segment: &str,
        language: LanguageCode,
        index: usize,
        total: usize,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.limiter.acquire("tts").await;

        let total = total.to_string();
        let index = index.to_string();
        let textlen = segment.chars().count().to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language.code()),
                ("q", segment),
                ("total", total.as_str()),
                ("idx", index.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Service(format!("HTTP {}", status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language: LanguageCode,
    ) -> Result<Vec<u8>, SynthesisError> {
        if !self.supports(language) {
            return Err(SynthesisError::UnsupportedLanguage(language));
        }

        let segments = split_for_speech(text, MAX_SEGMENT_CHARS);
        let mut audio = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            let bytes = self
                .fetch_segment(segment, language, index, segments.len())
                .await?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(SynthesisError::Empty);
        }
        Ok(audio)
    }
}

/// 在空白处切分文本，每段不超过max_chars个字符；超长单词按字符硬切
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                segments.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            segments.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
