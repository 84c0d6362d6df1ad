use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

#[derive(Default)]
pub struct TrendAnalyst;

impl CrewAgent for TrendAnalyst {
    fn stage_id(&self) -> &'static str {
        StageKeys::TREND_ANALYSIS
    }

    fn role(&self) -> AgentRole {
        AgentRole::Analyst
    }

    fn context(&self) -> Vec<&'static str> {
        vec![StageKeys::RESEARCH]
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Market Trend Analyst",
                "Analyze scattered data points to identify emerging patterns, market shifts, and \
                 future predictions regarding {topic}.",
                "You are an expert data strategist and futurist. You do not just read data; you \
                 see the story behind it. You excel at connecting unrelated dots to predict where \
                 a technology or market trend is heading.",
            ),
            instruction: "Analyze the research data for '{topic}'. Identify emerging trends, \
                          patterns, and future predictions."
                .to_string(),
            expected_output: "A trend analysis report highlighting patterns and market shifts."
                .to_string(),
        }
    }
}
