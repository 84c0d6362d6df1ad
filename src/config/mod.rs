use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::i18n::LanguageCode;
use crate::llm::registry::ProviderKey;
use crate::llm::router::RolePreference;

/// 未显式指定时尝试加载的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "autoresearch.toml";

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 输出路径
    pub output_path: PathBuf,

    /// 报告的原生语言
    pub language: LanguageCode,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// Provider可用性探测配置
    pub probe: ProbeConfig,

    /// 多语言分发配置
    pub fanout: FanOutConfig,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 调研历史配置
    pub history: HistoryConfig,

    /// 调研流水线配置
    pub crew: CrewConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// 最大tokens
    pub max_tokens: u32,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,

    /// 每个Provider的调用频率限制
    pub rate_limit: RateLimitConfig,

    /// 角色到Provider的偏好表
    pub roles: RolePreference,

    /// 覆盖Provider的默认模型，键为Provider名称
    pub models: HashMap<String, String>,

    /// 覆盖Provider的API基地址
    pub base_urls: HashMap<String, String>,

    /// 配置文件中显式提供的密钥，优先于环境变量
    pub api_keys: HashMap<String, String>,
}

/// 滑动窗口限流配置，max_calls为0时不限流
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// 是否对已配置凭据的Provider发起网络探测
    pub deep: bool,

    /// 严格模式下，探测时网络不可达的Provider视为不可用
    pub strict: bool,

    /// 单次探测超时（秒）
    pub timeout_seconds: u64,
}

/// 多语言分发配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FanOutConfig {
    /// 是否在报告生成后执行翻译与语音合成
    pub enabled: bool,

    /// 目标语言集合
    pub languages: Vec<LanguageCode>,

    /// 单次翻译请求的最大字符数
    pub max_chunk_chars: usize,

    /// 相邻翻译请求之间的间隔（毫秒）
    pub chunk_delay_ms: u64,

    /// 朗读脚本的最大字符数
    pub max_narration_chars: usize,

    /// 小于等于该字节数的音频视为无效
    pub min_audio_bytes: usize,

    /// 同时处理的语言数量
    pub max_parallels: usize,

    /// 翻译请求超时（秒）
    pub translate_timeout_seconds: u64,

    /// 语音合成请求超时（秒）
    pub speech_timeout_seconds: u64,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

/// 调研流水线配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CrewConfig {
    /// 是否在调研前增加规划阶段
    pub planning: bool,

    /// 是否包含趋势分析阶段
    pub trend_analysis: bool,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 加载配置：显式路径必须存在，否则尝试默认配置文件，都没有时使用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// 实际参与分发的语言，原生语言总是包含在内
    pub fn fan_out_languages(&self) -> Vec<LanguageCode> {
        let mut languages = vec![self.language];
        for language in &self.fanout.languages {
            if !languages.contains(language) {
                languages.push(*language);
            }
        }
        languages
    }
}

impl LLMConfig {
    /// Provider的模型，未覆盖时返回注册表中的默认模型
    pub fn model_for(&self, provider: ProviderKey) -> String {
        self.models
            .get(provider.as_str())
            .cloned()
            .unwrap_or_else(|| provider.descriptor().default_model.to_string())
    }

    /// Provider的API基地址
    pub fn base_url_for(&self, provider: ProviderKey) -> String {
        self.base_urls
            .get(provider.as_str())
            .cloned()
            .unwrap_or_else(|| provider.descriptor().base_url.to_string())
    }

    /// 配置文件中的密钥，忽略空值
    pub fn api_key_for(&self, provider: ProviderKey) -> Option<&str> {
        self.api_keys
            .get(provider.as_str())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./output"),
            language: LanguageCode::default(),
            llm: LLMConfig::default(),
            probe: ProbeConfig::default(),
            fanout: FanOutConfig::default(),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            crew: CrewConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            retry_attempts: 3,
            retry_delay_ms: 5000,
            timeout_seconds: 120,
            rate_limit: RateLimitConfig::default(),
            roles: RolePreference::default(),
            models: HashMap::new(),
            base_urls: HashMap::new(),
            api_keys: HashMap::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 30,
            window_seconds: 60,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            deep: false,
            strict: false,
            timeout_seconds: 5,
        }
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: LanguageCode::FAN_OUT_DEFAULT.to_vec(),
            max_chunk_chars: 3500,
            chunk_delay_ms: 500,
            max_narration_chars: 4500,
            min_audio_bytes: 100,
            max_parallels: 3,
            translate_timeout_seconds: 30,
            speech_timeout_seconds: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".autoresearch/cache"),
            expire_hours: 168,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/research_history.json"),
        }
    }
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            planning: false,
            trend_analysis: true,
        }
    }
}
