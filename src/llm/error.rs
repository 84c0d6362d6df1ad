use thiserror::Error;

use crate::llm::registry::ProviderKey;
use crate::llm::router::AgentRole;

/// 单次模型调用失败的原因
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("{provider} rejected the credentials: {message}")]
    Authentication {
        provider: ProviderKey,
        message: String,
    },

    #[error("{provider} rate limit exceeded: {message}")]
    RateLimit {
        provider: ProviderKey,
        message: String,
    },

    #[error("{provider} did not respond within {seconds}s")]
    Timeout { provider: ProviderKey, seconds: u64 },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: ProviderKey },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderKey,
        message: String,
    },
}

impl ModelError {
    /// 按错误信息中的状态码与关键字归类
    pub fn classify(provider: ProviderKey, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("401")
            || lowered.contains("403")
            || lowered.contains("unauthorized")
            || lowered.contains("invalid api key")
            || lowered.contains("invalid_api_key")
        {
            ModelError::Authentication { provider, message }
        } else if lowered.contains("429")
            || lowered.contains("rate limit")
            || lowered.contains("rate_limit")
            || lowered.contains("too many requests")
        {
            ModelError::RateLimit { provider, message }
        } else {
            ModelError::Transport { provider, message }
        }
    }

    pub fn provider(&self) -> ProviderKey {
        match self {
            ModelError::Authentication { provider, .. }
            | ModelError::RateLimit { provider, .. }
            | ModelError::Timeout { provider, .. }
            | ModelError::EmptyResponse { provider }
            | ModelError::Transport { provider, .. } => *provider,
        }
    }
}

/// 角色路由失败
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no provider available for role `{role}`: configure at least one provider ({hint})")]
    NoProviderAvailable { role: AgentRole, hint: String },
}
