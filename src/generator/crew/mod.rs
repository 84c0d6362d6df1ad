// 调研团队 - 预置的多智能体调研流程
// 规划（可选） -> 调研 -> 趋势分析 -> 内容提取 -> 摘要 -> 事实核查 -> 撰写
// 事实核查在撰写之前，撰写阶段只消费核查后的结论并产出最终报告

use std::time::Duration;

use crate::config::Config;
use crate::generator::pipeline::{AgentPersona, RetryPolicy, Stage};
use crate::llm::router::AgentRole;

pub mod agents;

use agents::{
    content_extractor::ContentExtractor, executive_summarizer::ExecutiveSummarizer,
    fact_checker::FactChecker, report_writer::ReportWriter, research_analyst::ResearchAnalyst,
    research_planner::ResearchPlanner, trend_analyst::TrendAnalyst,
};

/// 阶段ID
pub struct StageKeys;

impl StageKeys {
    pub const PLAN: &'static str = "plan";
    pub const RESEARCH: &'static str = "research";
    pub const TREND_ANALYSIS: &'static str = "trend_analysis";
    pub const EXTRACTION: &'static str = "extraction";
    pub const SUMMARY: &'static str = "summary";
    pub const FACT_CHECK: &'static str = "fact_check";
    pub const WRITE: &'static str = "write";
}

/// 阶段的Prompt模板
#[derive(Debug, Clone)]
pub struct TaskTemplate {
    pub persona: AgentPersona,
    /// 支持{topic}与{language}占位符
    pub instruction: String,
    pub expected_output: String,
}

/// 调研团队中的一个成员
pub trait CrewAgent: Send + Sync {
    fn stage_id(&self) -> &'static str;

    fn role(&self) -> AgentRole;

    /// 需要注入的上游阶段
    fn context(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn prompt_template(&self) -> TaskTemplate;

    fn stage(&self, retry: RetryPolicy) -> Stage {
        let template = self.prompt_template();
        Stage::new(self.stage_id(), self.role(), template.instruction)
            .with_persona(template.persona)
            .with_expected_output(template.expected_output)
            .with_context(self.context())
            .with_retry(retry)
    }
}

/// 根据配置组装调研流程
#[derive(Debug, Clone)]
pub struct ResearchCrew {
    planning: bool,
    trend_analysis: bool,
    retry: RetryPolicy,
}

impl ResearchCrew {
    pub fn new(planning: bool, trend_analysis: bool, retry: RetryPolicy) -> Self {
        Self {
            planning,
            trend_analysis,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.crew.planning,
            config.crew.trend_analysis,
            RetryPolicy::retryable(
                config.llm.retry_attempts,
                Duration::from_millis(config.llm.retry_delay_ms),
            ),
        )
    }

    pub fn stages(&self, topic: &str) -> Vec<Stage> {
        let mut stages = Vec::new();

        if self.planning {
            stages.push(ResearchPlanner.stage(self.retry));
        }

        let researcher = ResearchAnalyst::new(self.planning);
        stages.push(researcher.stage(self.retry));

        if self.trend_analysis {
            stages.push(TrendAnalyst.stage(self.retry));
        }
        stages.push(ContentExtractor.stage(self.retry));
        stages.push(ExecutiveSummarizer::new(self.trend_analysis).stage(self.retry));
        stages.push(FactChecker::new(self.trend_analysis).stage(self.retry));
        stages.push(
            ReportWriter
                .stage(self.retry)
                .with_output_file(report_file_name(topic))
                .terminal(),
        );

        stages
    }
}

/// 最终报告文件名：空格替换为下划线，去掉路径中不安全的字符
pub fn report_file_name(topic: &str) -> String {
    let stem: String = topic
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "report_final.md".to_string()
    } else {
        format!("{}_final.md", stem)
    }
}
