use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::crew::ResearchCrew;
use crate::generator::fanout::LanguageAsset;
use crate::generator::outlet::{DiskOutlet, RunSummary};
use crate::generator::pipeline::{PipelineError, PipelineRun};
use crate::i18n::LanguageCode;
use crate::services::history::{AssetRecord, RunStatus, RunUpdate};

/// 历史记录中保存的报告摘要长度
const HISTORY_EXCERPT_CHARS: usize = 280;

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<String, Instant>,
    phase_durations: HashMap<String, Duration>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: HashMap::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        self.phase_durations
            .insert(phase_name.to_string(), duration);
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn get_phase_durations(&self) -> &HashMap<String, Duration> {
        &self.phase_durations
    }

    /// 按固定顺序列出已完成的阶段
    pub fn ordered_phases(&self) -> Vec<(String, Duration)> {
        TimingKeys::get_all_phase_keys()
            .into_iter()
            .filter_map(|key| {
                self.phase_durations
                    .get(key)
                    .map(|duration| (key.to_string(), *duration))
            })
            .collect()
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.get_total_duration().as_secs_f64()
        );

        let phases = self.ordered_phases();
        if !phases.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in phases {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const PIPELINE: &'static str = "pipeline";
    pub const FAN_OUT: &'static str = "fan_out";

    /// 获取所有阶段的键列表
    pub fn get_all_phase_keys() -> Vec<&'static str> {
        vec![Self::PIPELINE, Self::FAN_OUT]
    }
}

/// 一次调研的全部产出
#[derive(Debug)]
pub struct ResearchOutcome {
    pub run: PipelineRun,
    pub assets: BTreeMap<LanguageCode, LanguageAsset>,
    /// 历史记录ID，未启用或写入失败时为None
    pub history_id: Option<u64>,
    pub summary_path: Option<PathBuf>,
    pub timing_report: String,
}

/// 启动调研工作流：执行调研流程，随后进行多语言分发
pub async fn launch(
    context: &GeneratorContext,
    topic: &str,
) -> Result<ResearchOutcome, PipelineError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(PipelineError::Configuration(
            "topic must not be empty".to_string(),
        ));
    }

    let config = &context.config;
    let language = config.language;
    let mut timing = TimingScope::new();

    let history_id = match &context.history {
        Some(history) => match history.create(topic, language).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("⚠️ 创建调研历史记录失败: {}", e);
                None
            }
        },
        None => None,
    };

    let stages = ResearchCrew::from_config(config).stages(topic);

    timing.start_phase(TimingKeys::PIPELINE);
    let run = match context.executor().execute(topic, language, &stages).await {
        Ok(run) => run,
        Err(e) => {
            record(
                context,
                history_id,
                RunUpdate::failed(e.to_string(), timing.get_total_duration().as_secs_f64()),
            )
            .await;
            return Err(e);
        }
    };
    timing.end_phase(TimingKeys::PIPELINE);

    let assets = if config.fanout.enabled {
        timing.start_phase(TimingKeys::FAN_OUT);
        let assets = context
            .fan_out()
            .fan_out(&run.report, language, &config.fan_out_languages())
            .await;
        timing.end_phase(TimingKeys::FAN_OUT);
        assets
    } else {
        info!("⏭️ 已跳过多语言分发");
        BTreeMap::new()
    };

    let total = timing.get_total_duration();
    record(
        context,
        history_id,
        RunUpdate {
            status: RunStatus::Completed,
            report_path: run.report_path.clone(),
            assets: assets
                .values()
                .map(|asset| AssetRecord {
                    language: asset.language,
                    text_path: asset.text_path.clone(),
                    audio_path: asset.audio_path.clone(),
                })
                .collect(),
            duration_seconds: Some(total.as_secs_f64()),
            summary: Some(report_excerpt(&run.report, HISTORY_EXCERPT_CHARS)),
        },
    )
    .await;

    let summary = RunSummary::new(&run, &assets)
        .with_timing(timing.ordered_phases(), total)
        .with_cache(context.cache_manager.as_ref().map(|cache| cache.report()));
    let summary_path = match summary.save(&DiskOutlet::new(&config.output_path)).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("⚠️ 运行总结写入失败: {}", e);
            None
        }
    };

    info!("🎉 调研完成，耗时 {:.2} 秒", total.as_secs_f64());

    Ok(ResearchOutcome {
        run,
        assets,
        history_id,
        summary_path,
        timing_report: timing.generate_timing_report(),
    })
}

/// 历史记录写入失败只记录警告，不影响调研结果
async fn record(context: &GeneratorContext, history_id: Option<u64>, update: RunUpdate) {
    if let (Some(history), Some(id)) = (&context.history, history_id)
        && let Err(e) = history.update(id, update).await
    {
        warn!("⚠️ 更新调研历史记录失败: {}", e);
    }
}

fn report_excerpt(report: &str, max_chars: usize) -> String {
    let flattened = report.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut excerpt: String = flattened.chars().take(max_chars).collect();
    excerpt.push('…');
    excerpt
}

// Include tests
#[cfg(test)]
mod tests;
