use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

/// 内容提取员 - 长上下文模型，从调研材料中提炼技术细节
#[derive(Default)]
pub struct ContentExtractor;

impl CrewAgent for ContentExtractor {
    fn stage_id(&self) -> &'static str {
        StageKeys::EXTRACTION
    }

    fn role(&self) -> AgentRole {
        AgentRole::Extractor
    }

    fn context(&self) -> Vec<&'static str> {
        vec![StageKeys::RESEARCH]
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Content Extractor",
                "Extract clean, technical data about {topic} from raw research material.",
                "You are a data parsing specialist. Your expertise lies in reading long academic \
                 or technical articles and extracting only the relevant specs, figures, and \
                 technical truths. You ignore advertising and navigation noise.",
            ),
            instruction: "Extract relevant technical details and dense information related to '{topic}'."
                .to_string(),
            expected_output: "Structured extracted data and technical summaries.".to_string(),
        }
    }
}
