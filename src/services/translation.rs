use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::i18n::LanguageCode;
use crate::llm::rate_limiter::RateLimiter;

const GTX_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation service error: {0}")]
    Service(String),

    #[error("unexpected translation response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for TranslationError {
    fn from(e: reqwest::Error) -> Self {
        TranslationError::Service(e.to_string())
    }
}

/// 翻译的源语言，Auto由服务端识别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Auto,
    Code(LanguageCode),
}

impl SourceLanguage {
    pub fn as_param(&self) -> &'static str {
        match self {
            SourceLanguage::Auto => "auto",
            SourceLanguage::Code(language) => language.code(),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: SourceLanguage,
        target: LanguageCode,
    ) -> Result<String, TranslationError>;
}

/// Google翻译的免密钥接口
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
    limiter: Arc<RateLimiter>,
}

impl GoogleTranslator {
    pub fn new(timeout: Duration, limiter: Arc<RateLimiter>) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: GTX_ENDPOINT.to_string(),
            limiter,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source: SourceLanguage,
        target: LanguageCode,
    ) -> Result<String, TranslationError> {
        self.limiter.acquire("translate").await;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source.as_param()),
                ("tl", target.code()),
                ("dt", "t"),
            ])
            .form(&[("q", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Service(format!("HTTP {}", status)));
        }

        let body: Value = response.json().await?;
        parse_gtx_response(&body)
    }
}

/// 响应形如 [[["译文","原文",...],...],...]，拼接每个片段的译文
pub fn parse_gtx_response(body: &Value) -> Result<String, TranslationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed("missing sentence list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(TranslationError::Malformed("empty translation".to_string()));
    }
    Ok(translated)
}
