use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheReport;
use crate::generator::fanout::LanguageAsset;
use crate::generator::outlet::DiskOutlet;
use crate::generator::pipeline::PipelineRun;
use crate::i18n::LanguageCode;

pub const SUMMARY_FILE_NAME: &str = "run_summary.md";

/// 运行总结 - 阶段执行情况、多语言资产、耗时与缓存统计
pub struct RunSummary<'a> {
    run: &'a PipelineRun,
    assets: &'a BTreeMap<LanguageCode, LanguageAsset>,
    phases: Vec<(String, Duration)>,
    total: Duration,
    cache: Option<CacheReport>,
}

impl<'a> RunSummary<'a> {
    pub fn new(run: &'a PipelineRun, assets: &'a BTreeMap<LanguageCode, LanguageAsset>) -> Self {
        Self {
            run,
            assets,
            phases: Vec::new(),
            total: run.duration,
            cache: None,
        }
    }

    pub fn with_timing(mut self, phases: Vec<(String, Duration)>, total: Duration) -> Self {
        self.phases = phases;
        self.total = total;
        self
    }

    pub fn with_cache(mut self, cache: Option<CacheReport>) -> Self {
        self.cache = cache;
        self
    }

    /// 生成Markdown格式的总结
    pub fn render(&self) -> String {
        let run = self.run;
        let mut content = String::new();

        content.push_str(&format!("# Research Run Summary: {}\n\n", run.topic));
        content.push_str(&format!("- **Run ID**: {}\n", run.id));
        content.push_str(&format!(
            "- **Started**: {}\n",
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        content.push_str(&format!(
            "- **Language**: {}\n",
            run.language.display_name()
        ));
        if let Some(path) = &run.report_path {
            content.push_str(&format!("- **Report**: {}\n", path.display()));
        }

        content.push_str("\n## Stages\n\n");
        content.push_str("| Stage | Role | Provider | Model | Attempts | Seconds | Cached |\n");
        content.push_str("|---|---|---|---|---|---|---|\n");
        for output in &run.outputs {
            let marker = if output.stage_id == run.terminal_stage {
                " (final)"
            } else {
                ""
            };
            content.push_str(&format!(
                "| {}{} | {} | {} | {} | {} | {:.2} | {} |\n",
                output.stage_id,
                marker,
                output.role,
                output.provider,
                output.model,
                output.attempts,
                output.duration.as_secs_f64(),
                if output.cached { "yes" } else { "no" }
            ));
        }

        content.push_str("\n## Language Assets\n\n");
        if self.assets.is_empty() {
            content.push_str("No language assets were produced.\n");
        } else {
            content.push_str("| Language | Text | Audio | Fallback chunks |\n");
            content.push_str("|---|---|---|---|\n");
            for (language, asset) in self.assets {
                content.push_str(&format!(
                    "| {} | {} | {} | {}/{} |\n",
                    language.display_name(),
                    file_name(&asset.text_path),
                    asset
                        .audio_path
                        .as_deref()
                        .map(file_name)
                        .unwrap_or_else(|| "-".to_string()),
                    asset.fallback_chunks,
                    asset.chunks
                ));
            }
        }

        content.push_str("\n## Timing\n\n");
        content.push_str(&format!(
            "- **Total**: {:.2} seconds\n",
            self.total.as_secs_f64()
        ));
        let total_secs = self.total.as_secs_f64();
        for (phase, duration) in &self.phases {
            let share = if total_secs > 0.0 {
                duration.as_secs_f64() / total_secs * 100.0
            } else {
                0.0
            };
            content.push_str(&format!(
                "- **{}**: {:.2} seconds ({:.1}%)\n",
                phase,
                duration.as_secs_f64(),
                share
            ));
        }

        if let Some(cache) = &self.cache {
            content.push_str("\n## Cache\n\n");
            content.push_str(&format!("- **Hit rate**: {:.1}%\n", cache.hit_rate() * 100.0));
            content.push_str(&format!("- **Hits**: {}\n", cache.hits));
            content.push_str(&format!("- **Misses**: {}\n", cache.misses));
            content.push_str(&format!("- **Writes**: {}\n", cache.writes));
            if cache.errors > 0 {
                content.push_str(&format!("- **Errors**: {}\n", cache.errors));
            }
        }

        content
    }

    pub async fn save(&self, outlet: &DiskOutlet) -> std::io::Result<PathBuf> {
        outlet
            .save_text(Path::new(SUMMARY_FILE_NAME), &self.render())
            .await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
