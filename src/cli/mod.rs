use crate::config::Config;
use crate::i18n::LanguageCode;
use crate::llm::registry::ProviderKey;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// AutoResearch - 多智能体协作的调研报告生成器，支持多语言文本与朗读音频
#[derive(Parser, Debug)]
#[command(name = "autoresearch")]
#[command(
    about = "Multi-agent research pipeline that routes each agent to the best available LLM provider and publishes the final report in several languages with narrated audio."
)]
#[command(version)]
pub struct Args {
    /// 调研主题
    pub topic: Option<String>,

    /// 报告的原生语言 (en, hi, ar, es, fr, de, pt, zh, ja, ru)
    #[arg(short, long)]
    pub language: Option<String>,

    /// 多语言分发的目标语言，逗号分隔
    #[arg(long)]
    pub languages: Option<String>,

    /// 输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 从录音中识别调研主题
    #[arg(long, conflicts_with = "topic")]
    pub topic_audio: Option<PathBuf>,

    /// 跳过翻译与语音合成
    #[arg(long)]
    pub skip_fanout: bool,

    /// 在调研前增加规划阶段
    #[arg(long)]
    pub planning: bool,

    /// 跳过趋势分析阶段
    #[arg(long)]
    pub no_trend_analysis: bool,

    /// 是否禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 启动前对Provider发起网络探测
    #[arg(long)]
    pub deep_probe: bool,

    /// 探测无结论的Provider视为不可用
    #[arg(long)]
    pub strict_probe: bool,

    /// 每个阶段的最大尝试次数
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// 同时处理的语言数量
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 覆盖Provider的模型，格式为provider=model，可重复
    #[arg(long = "model", value_name = "PROVIDER=MODEL")]
    pub models: Vec<String>,

    /// 列出Provider及其可用性后退出
    #[arg(long)]
    pub providers: bool,

    /// 列出最近的调研记录后退出
    #[arg(long)]
    pub history: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置，命令行参数覆盖配置文件
    pub fn into_config(self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }

        if let Some(language) = self.language {
            config.language = language
                .parse::<LanguageCode>()
                .map_err(|e| anyhow!(e))
                .context("Invalid --language")?;
        }
        if let Some(languages) = self.languages {
            let languages = LanguageCode::parse_list(&languages)
                .map_err(|e| anyhow!(e))
                .context("Invalid --languages")?;
            if languages.is_empty() {
                return Err(anyhow!("--languages must name at least one language"));
            }
            config.fanout.languages = languages;
        }

        // 覆盖LLM配置
        if let Some(retry_attempts) = self.retry_attempts {
            config.llm.retry_attempts = retry_attempts.max(1);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        for entry in &self.models {
            let (provider, model) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid --model `{}`, expected PROVIDER=MODEL", entry))?;
            let provider = provider
                .parse::<ProviderKey>()
                .map_err(|e| anyhow!(e))
                .context(format!("Invalid --model `{}`", entry))?;
            config
                .llm
                .models
                .insert(provider.as_str().to_string(), model.trim().to_string());
        }

        if let Some(max_parallels) = self.max_parallels {
            config.fanout.max_parallels = max_parallels.max(1);
        }
        if self.skip_fanout {
            config.fanout.enabled = false;
        }
        if self.planning {
            config.crew.planning = true;
        }
        if self.no_trend_analysis {
            config.crew.trend_analysis = false;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.deep_probe {
            config.probe.deep = true;
        }
        if self.strict_probe {
            config.probe.strict = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        Ok(config)
    }
}
