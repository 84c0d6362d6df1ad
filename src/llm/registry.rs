//! Provider注册表与可用性探测

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LLMConfig, ProbeConfig};

/// 已知的LLM Provider
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKey {
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(ProviderKey::Groq),
            "gemini" | "google" => Ok(ProviderKey::Gemini),
            "openai" => Ok(ProviderKey::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKey::Anthropic),
            "deepseek" => Ok(ProviderKey::DeepSeek),
            "ollama" => Ok(ProviderKey::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKey::Groq => "groq",
            ProviderKey::Gemini => "gemini",
            ProviderKey::OpenAI => "openai",
            ProviderKey::Anthropic => "anthropic",
            ProviderKey::DeepSeek => "deepseek",
            ProviderKey::Ollama => "ollama",
        }
    }

    /// 注册表中的静态描述
    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        match self {
            ProviderKey::Groq => &PROVIDERS[0],
            ProviderKey::Gemini => &PROVIDERS[1],
            ProviderKey::DeepSeek => &PROVIDERS[2],
            ProviderKey::OpenAI => &PROVIDERS[3],
            ProviderKey::Anthropic => &PROVIDERS[4],
            ProviderKey::Ollama => &PROVIDERS[5],
        }
    }
}

/// Provider的能力标签
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    HighContext,
    Fast,
    FreeTier,
    Local,
    Premium,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Capability::HighContext => "high-context",
            Capability::Fast => "fast",
            Capability::FreeTier => "free-tier",
            Capability::Local => "local",
            Capability::Premium => "premium",
        };
        write!(f, "{}", label)
    }
}

/// Provider的静态描述，数值越小的priority越优先
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDescriptor {
    pub key: ProviderKey,
    pub display_name: &'static str,
    pub priority: u8,
    pub capability: Capability,
    pub credential_env: &'static str,
    pub default_model: &'static str,
    pub base_url: &'static str,
}

/// 按priority排序的注册表
static PROVIDERS: [ProviderDescriptor; 6] = [
    ProviderDescriptor {
        key: ProviderKey::Groq,
        display_name: "Groq",
        priority: 1,
        capability: Capability::Fast,
        credential_env: "GROQ_API_KEY",
        default_model: "llama-3.3-70b-versatile",
        base_url: "https://api.groq.com/openai/v1",
    },
    ProviderDescriptor {
        key: ProviderKey::Gemini,
        display_name: "Google Gemini",
        priority: 2,
        capability: Capability::HighContext,
        credential_env: "GOOGLE_API_KEY",
        default_model: "gemini-1.5-flash",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
    },
    ProviderDescriptor {
        key: ProviderKey::DeepSeek,
        display_name: "DeepSeek",
        priority: 3,
        capability: Capability::FreeTier,
        credential_env: "DEEPSEEK_API_KEY",
        default_model: "deepseek-chat",
        base_url: "https://api.deepseek.com",
    },
    ProviderDescriptor {
        key: ProviderKey::OpenAI,
        display_name: "OpenAI",
        priority: 4,
        capability: Capability::Premium,
        credential_env: "OPENAI_API_KEY",
        default_model: "gpt-4o-mini",
        base_url: "https://api.openai.com/v1",
    },
    ProviderDescriptor {
        key: ProviderKey::Anthropic,
        display_name: "Anthropic Claude",
        priority: 5,
        capability: Capability::Premium,
        credential_env: "ANTHROPIC_API_KEY",
        default_model: "claude-3-haiku-20240307",
        base_url: "https://api.anthropic.com/v1",
    },
    ProviderDescriptor {
        key: ProviderKey::Ollama,
        display_name: "Ollama",
        priority: 6,
        capability: Capability::Local,
        credential_env: "OLLAMA_HOST",
        default_model: "llama3",
        base_url: "http://localhost:11434",
    },
];

/// 列出全部已知Provider，按priority升序
pub fn describe_providers() -> &'static [ProviderDescriptor] {
    &PROVIDERS
}

/// 启动时采集的一份凭据快照
#[derive(Clone, Default)]
pub struct Credentials {
    secrets: HashMap<ProviderKey, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut configured: Vec<&str> = self.secrets.keys().map(|key| key.as_str()).collect();
        configured.sort_unstable();
        f.debug_struct("Credentials")
            .field("configured", &configured)
            .finish()
    }
}

impl Credentials {
    /// 从进程环境变量读取全部Provider凭据
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 通过查找函数构建，空值与模板占位值视为未配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut credentials = Self::default();
        for descriptor in describe_providers() {
            if let Some(value) = lookup(descriptor.credential_env) {
                credentials.insert(descriptor.key, value);
            }
        }
        credentials
    }

    pub fn with(mut self, key: ProviderKey, secret: impl Into<String>) -> Self {
        self.insert(key, secret);
        self
    }

    pub fn insert(&mut self, key: ProviderKey, secret: impl Into<String>) {
        let secret = secret.into().trim().to_string();
        if is_placeholder(&secret) {
            debug!("忽略未填写的凭据: {}", key.descriptor().credential_env);
            return;
        }
        self.secrets.insert(key, secret);
    }

    /// 合并配置文件中的密钥
    pub fn with_config_overrides(mut self, config: &LLMConfig) -> Self {
        for descriptor in describe_providers() {
            if let Some(secret) = config.api_key_for(descriptor.key) {
                self.insert(descriptor.key, secret);
            }
        }
        self
    }

    pub fn get(&self, key: ProviderKey) -> Option<&str> {
        self.secrets.get(&key).map(String::as_str)
    }

    pub fn has(&self, key: ProviderKey) -> bool {
        self.secrets.contains_key(&key)
    }
}

fn is_placeholder(secret: &str) -> bool {
    secret.is_empty() || secret.starts_with("your_") || secret.starts_with("<")
}

/// 各Provider在本次运行中的可用状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderAvailability {
    states: BTreeMap<ProviderKey, bool>,
}

impl ProviderAvailability {
    pub fn new(states: impl IntoIterator<Item = (ProviderKey, bool)>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    pub fn is_available(&self, key: ProviderKey) -> bool {
        self.states.get(&key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: ProviderKey, available: bool) {
        self.states.insert(key, available);
    }

    /// 可用的Provider，按priority升序
    pub fn available(&self) -> Vec<&'static ProviderDescriptor> {
        describe_providers()
            .iter()
            .filter(|descriptor| self.is_available(descriptor.key))
            .collect()
    }

    pub fn any_available(&self) -> bool {
        self.states.values().any(|available| *available)
    }
}

/// 仅依据凭据判断可用性，不发起网络请求
pub fn probe_availability(credentials: &Credentials) -> ProviderAvailability {
    ProviderAvailability::new(
        describe_providers()
            .iter()
            .map(|descriptor| (descriptor.key, credentials.has(descriptor.key))),
    )
}

/// 网络探测的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// 服务端明确拒绝了凭据
    Rejected,
    /// 网络错误或超时，无法得出结论
    Inconclusive,
}

impl ProbeOutcome {
    /// 无法得出结论时，非严格模式按可用处理
    pub fn is_available(&self, strict: bool) -> bool {
        match self {
            ProbeOutcome::Reachable => true,
            ProbeOutcome::Rejected => false,
            ProbeOutcome::Inconclusive => !strict,
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => ProbeOutcome::Reachable,
            401 | 403 => ProbeOutcome::Rejected,
            _ => ProbeOutcome::Inconclusive,
        }
    }
}

/// 对已配置凭据的Provider发起轻量网络探测
pub async fn probe_reachability(
    credentials: &Credentials,
    llm: &LLMConfig,
    probe: &ProbeConfig,
) -> ProviderAvailability {
    let mut availability = probe_availability(credentials);
    if !probe.deep {
        return availability;
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(probe.timeout_seconds))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("⚠️ 无法创建探测用HTTP客户端，跳过网络探测: {}", e);
            return availability;
        }
    };

    let candidates = availability.available();
    let probes = candidates.iter().map(|descriptor| {
        let client = &client;
        async move {
            let outcome = probe_provider(client, descriptor, credentials, llm).await;
            (descriptor.key, outcome)
        }
    });

    for (key, outcome) in join_all(probes).await {
        let available = outcome.is_available(probe.strict);
        match outcome {
            ProbeOutcome::Reachable => info!("✅ {} 探测通过", key),
            ProbeOutcome::Rejected => warn!("❌ {} 拒绝了凭据，标记为不可用", key),
            ProbeOutcome::Inconclusive => warn!(
                "⚠️ {} 探测无结论，{}",
                key,
                if available { "按可用处理" } else { "严格模式下标记为不可用" }
            ),
        }
        availability.set(key, available);
    }

    availability
}

async fn probe_provider(
    client: &reqwest::Client,
    descriptor: &ProviderDescriptor,
    credentials: &Credentials,
    llm: &LLMConfig,
) -> ProbeOutcome {
    let secret = credentials.get(descriptor.key).unwrap_or_default();
    let base_url = llm.base_url_for(descriptor.key);
    let base_url = base_url.trim_end_matches('/');

    let request = match descriptor.key {
        ProviderKey::Groq | ProviderKey::OpenAI | ProviderKey::DeepSeek => client
            .get(format!("{}/models", base_url))
            .bearer_auth(secret),
        ProviderKey::Gemini => client
            .get(format!("{}/models", base_url))
            .query(&[("key", secret)]),
        ProviderKey::Anthropic => client
            .get(format!("{}/models", base_url))
            .header("x-api-key", secret)
            .header("anthropic-version", "2023-06-01"),
        ProviderKey::Ollama => {
            let host = if secret.starts_with("http") {
                secret.trim_end_matches('/').to_string()
            } else {
                base_url.to_string()
            };
            client.get(format!("{}/api/tags", host))
        }
    };

    match request.send().await {
        Ok(response) => ProbeOutcome::from_status(response.status().as_u16()),
        Err(e) => {
            debug!("{} 探测请求失败: {}", descriptor.key, e);
            ProbeOutcome::Inconclusive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup_matches_key() {
        for descriptor in describe_providers() {
            assert_eq!(descriptor.key.descriptor(), descriptor);
        }
        let priorities: Vec<u8> = describe_providers().iter().map(|d| d.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn test_registry_priority_order() {
        let keys: Vec<ProviderKey> = describe_providers().iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![
                ProviderKey::Groq,
                ProviderKey::Gemini,
                ProviderKey::DeepSeek,
                ProviderKey::OpenAI,
                ProviderKey::Anthropic,
                ProviderKey::Ollama,
            ]
        );
    }

    #[test]
    fn test_provider_key_from_str() {
        assert_eq!("groq".parse::<ProviderKey>().unwrap(), ProviderKey::Groq);
        assert_eq!("Google".parse::<ProviderKey>().unwrap(), ProviderKey::Gemini);
        assert!("mistral".parse::<ProviderKey>().is_err());
    }

    #[test]
    fn test_only_credentialed_providers_are_available() {
        let credentials = Credentials::from_lookup(|name| match name {
            "GOOGLE_API_KEY" => Some("g-secret".to_string()),
            "GROQ_API_KEY" => Some("   ".to_string()),
            "OPENAI_API_KEY" => Some("your_openai_key_here".to_string()),
            _ => None,
        });
        let availability = probe_availability(&credentials);

        assert!(availability.is_available(ProviderKey::Gemini));
        assert!(!availability.is_available(ProviderKey::Groq));
        assert!(!availability.is_available(ProviderKey::OpenAI));
        assert!(!availability.is_available(ProviderKey::Ollama));
        assert_eq!(availability.available().len(), 1);
    }

    #[test]
    fn test_config_keys_override_environment() {
        let mut llm = LLMConfig::default();
        llm.api_keys
            .insert("deepseek".to_string(), "from-config".to_string());
        let credentials = Credentials::default()
            .with(ProviderKey::DeepSeek, "from-env")
            .with_config_overrides(&llm);

        assert_eq!(credentials.get(ProviderKey::DeepSeek), Some("from-config"));
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let credentials = Credentials::default().with(ProviderKey::Groq, "gsk_top_secret");
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("groq"));
        assert!(!rendered.contains("gsk_top_secret"));
    }

    #[test]
    fn test_probe_outcome_policy() {
        assert_eq!(ProbeOutcome::from_status(401), ProbeOutcome::Rejected);
        assert_eq!(ProbeOutcome::from_status(403), ProbeOutcome::Rejected);
        assert_eq!(ProbeOutcome::from_status(200), ProbeOutcome::Reachable);
        assert_eq!(ProbeOutcome::from_status(404), ProbeOutcome::Inconclusive);
        assert_eq!(ProbeOutcome::from_status(429), ProbeOutcome::Inconclusive);
        assert_eq!(ProbeOutcome::from_status(503), ProbeOutcome::Inconclusive);
        assert!(!ProbeOutcome::from_status(503).is_available(true));
        assert!(ProbeOutcome::from_status(503).is_available(false));
        assert!(ProbeOutcome::Inconclusive.is_available(false));
        assert!(!ProbeOutcome::Inconclusive.is_available(true));
        assert!(!ProbeOutcome::Rejected.is_available(false));
    }

    #[tokio::test]
    async fn test_shallow_probe_skips_network() {
        let credentials = Credentials::default().with(ProviderKey::Anthropic, "sk-ant");
        let availability =
            probe_reachability(&credentials, &LLMConfig::default(), &ProbeConfig::default()).await;
        assert!(availability.is_available(ProviderKey::Anthropic));
        assert!(!availability.is_available(ProviderKey::Groq));
    }
}
