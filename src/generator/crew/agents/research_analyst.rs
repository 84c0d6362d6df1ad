use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

/// 高级调研分析师 - 收集事实、最新进展与统计数据
#[derive(Default)]
pub struct ResearchAnalyst {
    /// 存在规划阶段时以规划结果为上下文
    follows_plan: bool,
}

impl ResearchAnalyst {
    pub fn new(follows_plan: bool) -> Self {
        Self { follows_plan }
    }
}

impl CrewAgent for ResearchAnalyst {
    fn stage_id(&self) -> &'static str {
        StageKeys::RESEARCH
    }

    fn role(&self) -> AgentRole {
        AgentRole::Researcher
    }

    fn context(&self) -> Vec<&'static str> {
        if self.follows_plan {
            vec![StageKeys::PLAN]
        } else {
            Vec::new()
        }
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Senior Research Analyst",
                "Uncover cutting-edge developments, verified facts, and comprehensive data on {topic}.",
                "You are an elite research analyst with a keen eye for detail. You specialize in \
                 digging deep into complex topics to find the most relevant, accurate, and \
                 up-to-date information available. You ignore superficial summaries and look for \
                 raw data and primary sources.",
            ),
            instruction: "Conduct extensive research on: '{topic}'. Find key facts, latest \
                          developments, and statistics."
                .to_string(),
            expected_output: "A comprehensive list of research findings, URLs, and raw data points."
                .to_string(),
        }
    }
}
