use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

/// 事实核查专家 - 在撰写之前校验数据、事实与逻辑一致性
#[derive(Default)]
pub struct FactChecker {
    with_trends: bool,
}

impl FactChecker {
    pub fn new(with_trends: bool) -> Self {
        Self { with_trends }
    }
}

impl CrewAgent for FactChecker {
    fn stage_id(&self) -> &'static str {
        StageKeys::FACT_CHECK
    }

    fn role(&self) -> AgentRole {
        AgentRole::FactChecker
    }

    fn context(&self) -> Vec<&'static str> {
        if self.with_trends {
            vec![StageKeys::RESEARCH, StageKeys::TREND_ANALYSIS, StageKeys::SUMMARY]
        } else {
            vec![StageKeys::RESEARCH, StageKeys::SUMMARY]
        }
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Fact Verification Expert",
                "Verify accuracy on {topic}.",
                "Meticulous investigator ensuring 0% misinformation.",
            ),
            instruction: "Verify the research findings, analysis, and summaries. Ensure statistics, \
                          facts, and logical consistency are accurate before the report is written."
                .to_string(),
            expected_output: "A verified and corrected set of data points and summaries, ready for writing."
                .to_string(),
        }
    }
}
