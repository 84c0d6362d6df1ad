//! LLM客户端 - 提供统一的模型调用接口

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::LLMConfig;
use crate::llm::error::{ModelError, RouterError};
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::registry::ProviderKey;

mod providers;

use providers::ProviderClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// 对话历史中的一条消息
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 一次模型调用的完整输入
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub system_prompt: String,
    pub prompt: String,
    pub history: Vec<ChatTurn>,
    pub temperature: f64,
}

/// 统一的模型后端，所有Provider都通过该接口调用
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, ModelError>;
}

/// 为选中的Provider与模型创建后端
pub trait BackendFactory: Send + Sync {
    fn connect(
        &self,
        provider: ProviderKey,
        model: &str,
        secret: Option<&str>,
    ) -> Result<Arc<dyn LanguageModel>, RouterError>;
}

/// 基于rig的后端工厂
pub struct RigBackendFactory {
    llm: LLMConfig,
}

impl RigBackendFactory {
    pub fn new(llm: LLMConfig) -> Self {
        Self { llm }
    }
}

impl BackendFactory for RigBackendFactory {
    fn connect(
        &self,
        provider: ProviderKey,
        model: &str,
        secret: Option<&str>,
    ) -> Result<Arc<dyn LanguageModel>, RouterError> {
        let secret = secret.unwrap_or_default();
        // OLLAMA_HOST既是开关也是服务地址
        let base_url = match provider {
            ProviderKey::Ollama if secret.starts_with("http") => secret.to_string(),
            _ => self.llm.base_url_for(provider),
        };

        let client = ProviderClient::new(provider, secret, &base_url).map_err(|e| {
            RouterError::Configuration(format!("failed to initialise {} client: {}", provider, e))
        })?;

        Ok(Arc::new(RigModel {
            provider,
            model: model.to_string(),
            client,
            max_tokens: self.llm.max_tokens.into(),
        }))
    }
}

struct RigModel {
    provider: ProviderKey,
    model: String,
    client: ProviderClient,
    max_tokens: u64,
}

#[async_trait]
impl LanguageModel for RigModel {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, ModelError> {
        self.client
            .chat(&self.model, invocation, self.max_tokens)
            .await
            .map_err(|e| ModelError::classify(self.provider, e.to_string()))
    }
}

/// 路由器为某个角色解析出的可调用模型
#[derive(Clone)]
pub struct ModelHandle {
    provider: ProviderKey,
    model: String,
    temperature: f64,
    timeout: Duration,
    backend: Arc<dyn LanguageModel>,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ModelHandle {
    pub fn new(
        provider: ProviderKey,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
        backend: Arc<dyn LanguageModel>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            timeout,
            backend,
            limiter,
        }
    }

    pub fn provider(&self) -> ProviderKey {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// 调用模型，空白响应按失败处理
    pub async fn invoke(
        &self,
        system_prompt: &str,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String, ModelError> {
        self.limiter.acquire(self.provider.as_str()).await;

        let invocation = Invocation {
            system_prompt: system_prompt.to_string(),
            prompt: prompt.to_string(),
            history: history.to_vec(),
            temperature: self.temperature,
        };

        debug!(
            provider = %self.provider,
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "调用模型"
        );

        let response = tokio::time::timeout(self.timeout, self.backend.invoke(&invocation))
            .await
            .map_err(|_| ModelError::Timeout {
                provider: self.provider,
                seconds: self.timeout.as_secs(),
            })??;

        if response.trim().is_empty() {
            return Err(ModelError::EmptyResponse {
                provider: self.provider,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<Invocation>>,
        delay: Duration,
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn invoke(&self, invocation: &Invocation) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(invocation.clone());
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    fn handle_with(model: Arc<EchoModel>, timeout: Duration) -> ModelHandle {
        ModelHandle::new(
            ProviderKey::Groq,
            "llama-3.3-70b-versatile",
            0.3,
            timeout,
            model,
            Arc::new(RateLimiter::unlimited()),
        )
    }

    #[tokio::test]
    async fn test_invoke_passes_history_and_temperature() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            reply: "done".to_string(),
        });
        let handle = handle_with(model.clone(), Duration::from_secs(5));

        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let reply = handle.invoke("system", "next", &history).await.unwrap();

        assert_eq!(reply, "done");
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].history, history);
        assert_eq!(seen[0].temperature, 0.3);
        assert_eq!(seen[0].system_prompt, "system");
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            delay: Duration::from_millis(200),
            reply: "late".to_string(),
        });
        let handle = handle_with(model, Duration::from_millis(20));

        let err = handle.invoke("system", "prompt", &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::Timeout { provider: ProviderKey::Groq, .. }));
    }

    #[tokio::test]
    async fn test_blank_response_is_an_error() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            reply: "  \n".to_string(),
        });
        let handle = handle_with(model, Duration::from_secs(5));

        let err = handle.invoke("system", "prompt", &[]).await.unwrap_err();
        assert_eq!(
            err,
            ModelError::EmptyResponse {
                provider: ProviderKey::Groq
            }
        );
    }
}
