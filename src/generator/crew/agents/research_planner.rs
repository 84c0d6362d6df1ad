use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

/// 调研规划师 - 在调研前拆解主题，给出调研问题与范围
#[derive(Default)]
pub struct ResearchPlanner;

impl CrewAgent for ResearchPlanner {
    fn stage_id(&self) -> &'static str {
        StageKeys::PLAN
    }

    fn role(&self) -> AgentRole {
        AgentRole::Planner
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Research Planner",
                "Break {topic} down into focused research questions and a clear scope.",
                "You design research programs. You decide what must be known, in what order, \
                 and which angles (technical, market, regulatory) deserve attention before \
                 anyone starts digging.",
            ),
            instruction: "Create a research plan for '{topic}'. List the key questions to answer, \
                          the sub-topics to cover and the kinds of evidence that would settle them."
                .to_string(),
            expected_output: "A numbered research plan with questions, sub-topics and evidence targets."
                .to_string(),
        }
    }
}
