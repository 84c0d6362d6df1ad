use crate::generator::crew::{CrewAgent, StageKeys, TaskTemplate};
use crate::generator::pipeline::AgentPersona;
use crate::llm::router::AgentRole;

/// 报告撰写人 - 流程的终结阶段，只使用核查后的结论
#[derive(Default)]
pub struct ReportWriter;

impl CrewAgent for ReportWriter {
    fn stage_id(&self) -> &'static str {
        StageKeys::WRITE
    }

    fn role(&self) -> AgentRole {
        AgentRole::Writer
    }

    fn context(&self) -> Vec<&'static str> {
        vec![StageKeys::FACT_CHECK]
    }

    fn prompt_template(&self) -> TaskTemplate {
        TaskTemplate {
            persona: AgentPersona::new(
                "Senior Technical Content Strategist",
                "Assemble verified findings into a professional report.",
                "You are a master of clarity, turning complex data into engaging narratives.\n\n\
                 You specialize in Markdown formatting. Your reports must include an Executive \
                 Summary, a Table of Contents, and deep technical sections.",
            ),
            instruction: "Write a comprehensive professional report on '{topic}' in {language}. \
                          Use the verified facts and analysis provided."
                .to_string(),
            expected_output: "A high-quality markdown research report in {language}.".to_string(),
        }
    }
}
