use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

#[derive(Default)]
pub struct ExecutiveSummarizer {
    with_trends: bool,
}

impl ExecutiveSummarizer {
    pub fn new(with_trends: bool) -> Self {
        Self { with_trends }
    }
}

impl CrewAgent for ExecutiveSummarizer {
    fn stage_id(&self) -> &'static str {
        StageKeys::SUMMARY
    }

    fn role(&self) -> AgentRole {
        AgentRole::Summarizer
    }

    fn context(&self) -> Vec<&'static str> {
        if self.with_trends {
            vec![StageKeys::TREND_ANALYSIS, StageKeys::EXTRACTION]
        } else {
            vec![StageKeys::EXTRACTION]
        }
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Executive Summarizer",
                "Condense everything known about {topic} into points a decision maker can act on.",
                "You write for busy executives. You keep only what changes a decision, state it \
                 plainly and never pad a bullet point.",
            ),
            instruction: "Summarize the analysis and extracted data into concise executive points \
                          in {language}."
                .to_string(),
            expected_output: "A set of concise executive summaries and bullet points.".to_string(),
        }
    }
}
