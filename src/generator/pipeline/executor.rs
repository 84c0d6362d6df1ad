use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::generator::outlet::DiskOutlet;
use crate::generator::pipeline::error::PipelineError;
use crate::generator::pipeline::stage::Stage;
use crate::i18n::LanguageCode;
use crate::llm::client::ModelHandle;
use crate::llm::registry::ProviderKey;
use crate::llm::router::{AgentRole, ModelRouter};

/// 单个阶段的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput {
    pub stage_id: String,
    pub role: AgentRole,
    pub provider: ProviderKey,
    pub model: String,
    /// 实际发送给模型的prompt
    pub prompt: String,
    pub output: String,
    pub attempts: u32,
    pub duration: Duration,
    pub cached: bool,
}

/// 一次完整的流水线运行
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub topic: String,
    pub language: LanguageCode,
    pub started_at: DateTime<Utc>,
    pub outputs: Vec<StageOutput>,
    pub terminal_stage: String,
    /// 终结阶段的输出
    pub report: String,
    pub report_path: Option<PathBuf>,
    pub duration: Duration,
}

impl PipelineRun {
    pub fn output_of(&self, stage_id: &str) -> Option<&StageOutput> {
        self.outputs.iter().find(|output| output.stage_id == stage_id)
    }
}

/// 流水线执行器
pub struct PipelineExecutor {
    router: Arc<ModelRouter>,
    outlet: DiskOutlet,
    cache: Option<Arc<CacheManager>>,
    cancel: CancellationToken,
}

impl PipelineExecutor {
    pub fn new(router: Arc<ModelRouter>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            router,
            outlet: DiskOutlet::new(output_dir),
            cache: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 执行前的静态校验，返回终结阶段的下标
    pub fn validate(stages: &[Stage]) -> Result<usize, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Configuration(
                "pipeline has no stages".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for stage in stages {
            if stage.id.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "stage id must not be empty".to_string(),
                ));
            }
            for upstream in &stage.context {
                if !seen.contains(upstream.as_str()) {
                    return Err(PipelineError::DependencyOrder {
                        stage: stage.id.clone(),
                        missing: upstream.clone(),
                    });
                }
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "duplicate stage id `{}`",
                    stage.id
                )));
            }
        }

        let flagged: Vec<usize> = stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.terminal)
            .map(|(index, _)| index)
            .collect();
        match flagged.as_slice() {
            [] => Ok(stages.len() - 1),
            [index] => Ok(*index),
            _ => Err(PipelineError::Configuration(format!(
                "more than one terminal stage: {}",
                flagged
                    .iter()
                    .map(|index| stages[*index].id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// 按顺序执行全部阶段，任一阶段失败即终止
    pub async fn execute(
        &self,
        topic: &str,
        language: LanguageCode,
        stages: &[Stage],
    ) -> Result<PipelineRun, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::Configuration(
                "topic must not be empty".to_string(),
            ));
        }
        let terminal_index = Self::validate(stages)?;

        let started_at = Utc::now();
        let started = Instant::now();
        info!(
            "🚀 开始调研: {} ({} 个阶段, 语言: {})",
            topic,
            stages.len(),
            language.display_name()
        );

        let mut outputs: Vec<StageOutput> = Vec::with_capacity(stages.len());
        let mut report_path = None;

        for (index, stage) in stages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    stage: stage.id.clone(),
                });
            }

            info!(
                "▶️ [{}/{}] 阶段 {} ({})",
                index + 1,
                stages.len(),
                stage.id,
                stage.role
            );
            let system_prompt = stage.persona.system_prompt(topic, language);
            let prompt = build_prompt(stage, topic, language, &outputs);
            let output = self.run_stage(stage, &system_prompt, prompt).await?;

            if index == terminal_index
                && let Some(file) = &stage.output_file
            {
                let path = self
                    .outlet
                    .save_text(file, &output.output)
                    .await
                    .map_err(|source| PipelineError::Persist {
                        path: self.outlet.resolve(file),
                        source,
                    })?;
                info!("💾 报告已保存: {}", path.display());
                report_path = Some(path);
            }

            outputs.push(output);
        }

        let report = outputs[terminal_index].output.clone();
        let terminal_stage = outputs[terminal_index].stage_id.clone();
        let duration = started.elapsed();
        info!("✅ 调研流水线完成，耗时 {:.2}秒", duration.as_secs_f64());

        Ok(PipelineRun {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            language,
            started_at,
            outputs,
            terminal_stage,
            report,
            report_path,
            duration,
        })
    }

    /// 执行单个阶段；每次尝试都重新路由，因此重试可能落在不同的Provider上
    async fn run_stage(
        &self,
        stage: &Stage,
        system_prompt: &str,
        prompt: String,
    ) -> Result<StageOutput, PipelineError> {
        let max_attempts = stage.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let handle = self
                .router
                .resolve(stage.role, None)
                .map_err(|source| PipelineError::Routing {
                    stage: stage.id.clone(),
                    source,
                })?;

            let cache_key = format!(
                "{}/{}\n{}\n{}",
                handle.provider(),
                handle.model(),
                system_prompt,
                prompt
            );
            if let Some(text) = self.cached_output(&stage.id, &cache_key).await {
                info!("💾 阶段 {} 命中缓存", stage.id);
                return Ok(stage_output(stage, &handle, prompt, text, attempts, Duration::ZERO, true));
            }

            let started = Instant::now();
            match handle.invoke(system_prompt, &prompt, &[]).await {
                Ok(text) => {
                    let elapsed = started.elapsed();
                    info!(
                        "✅ 阶段 {} 完成 ({} / {}，{:.2}秒)",
                        stage.id,
                        handle.provider(),
                        handle.model(),
                        elapsed.as_secs_f64()
                    );
                    if let Some(cache) = &self.cache
                        && let Err(e) = cache
                            .set(&stage.id, &cache_key, text.clone(), Some(handle.model().to_string()))
                            .await
                    {
                        warn!("⚠️ 写入缓存失败: {}", e);
                    }
                    return Ok(stage_output(stage, &handle, prompt, text, attempts, elapsed, false));
                }
                Err(err) => {
                    warn!(
                        "❌ 阶段 {} 调用 {} 出错 (第 {} / {} 次尝试): {}",
                        stage.id,
                        handle.provider(),
                        attempts,
                        max_attempts,
                        err
                    );
                    if attempts >= max_attempts {
                        return Err(PipelineError::StageExecution {
                            stage: stage.id.clone(),
                            role: stage.role,
                            provider: handle.provider(),
                            attempts,
                            source: err,
                        });
                    }

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(PipelineError::Cancelled { stage: stage.id.clone() });
                        }
                        _ = tokio::time::sleep(with_jitter(stage.retry.delay)) => {}
                    }
                }
            }
        }
    }

    async fn cached_output(&self, stage_id: &str, cache_key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get::<String>(stage_id, cache_key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("⚠️ 读取缓存失败: {}", e);
                None
            }
        }
    }
}

fn stage_output(
    stage: &Stage,
    handle: &ModelHandle,
    prompt: String,
    output: String,
    attempts: u32,
    duration: Duration,
    cached: bool,
) -> StageOutput {
    StageOutput {
        stage_id: stage.id.clone(),
        role: stage.role,
        provider: handle.provider(),
        model: handle.model().to_string(),
        prompt,
        output,
        attempts,
        duration,
        cached,
    }
}

/// 组装阶段prompt：指令、期望输出，以及按声明顺序排列的上游输出
pub(crate) fn build_prompt(
    stage: &Stage,
    topic: &str,
    language: LanguageCode,
    completed: &[StageOutput],
) -> String {
    let mut prompt = stage.render_instruction(topic, language);

    let expected = stage.render_expected_output(topic, language);
    if !expected.trim().is_empty() {
        prompt.push_str(&format!("\n\nExpected output: {}", expected.trim()));
    }

    if !stage.context.is_empty() {
        prompt.push_str("\n\n## Context from previous stages");
        for upstream in &stage.context {
            if let Some(output) = completed.iter().find(|output| &output.stage_id == upstream) {
                prompt.push_str(&format!("\n\n### {}\n{}", upstream, output.output.trim()));
            }
        }
    }

    prompt
}

/// 在基础间隔上叠加至多25%的随机抖动
fn with_jitter(delay: Duration) -> Duration {
    let base = delay.as_millis() as u64;
    if base == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::rng().random_range(0..=base / 4);
    Duration::from_millis(base + jitter)
}
