use std::path::PathBuf;
use std::time::Duration;

use crate::i18n::LanguageCode;
use crate::llm::router::AgentRole;

/// Agent的人设，渲染为系统提示词
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentPersona {
    pub title: String,
    pub goal: String,
    pub backstory: String,
}

impl AgentPersona {
    pub fn new(
        title: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }

    pub fn system_prompt(&self, topic: &str, language: LanguageCode) -> String {
        let mut prompt = String::new();
        if !self.title.is_empty() {
            prompt.push_str(&format!("You are a {}.\n", self.title));
        }
        if !self.goal.is_empty() {
            prompt.push_str(&format!("Your goal: {}\n", render_template(&self.goal, topic, language)));
        }
        if !self.backstory.is_empty() {
            prompt.push_str(&format!("\n{}\n", self.backstory.trim()));
        }
        prompt.push('\n');
        prompt.push_str(&language.prompt_instruction());
        prompt
    }
}

/// 阶段的重试策略，max_attempts包含首次调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn retryable(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.max_attempts > 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// 流水线中的一个阶段
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub id: String,
    pub role: AgentRole,
    pub persona: AgentPersona,
    /// 支持{topic}与{language}占位符
    pub instruction: String,
    pub expected_output: String,
    /// 上游阶段ID，按声明顺序注入prompt
    pub context: Vec<String>,
    pub retry: RetryPolicy,
    /// 相对路径会落在输出目录下
    pub output_file: Option<PathBuf>,
    pub terminal: bool,
}

impl Stage {
    pub fn new(id: impl Into<String>, role: AgentRole, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            persona: AgentPersona::default(),
            instruction: instruction.into(),
            expected_output: String::new(),
            context: Vec::new(),
            retry: RetryPolicy::none(),
            output_file: None,
            terminal: false,
        }
    }

    pub fn with_persona(mut self, persona: AgentPersona) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    pub fn with_context<I, S>(mut self, upstream: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = upstream.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// 标记为终结阶段，其输出即最终报告
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn render_instruction(&self, topic: &str, language: LanguageCode) -> String {
        render_template(&self.instruction, topic, language)
    }

    pub fn render_expected_output(&self, topic: &str, language: LanguageCode) -> String {
        render_template(&self.expected_output, topic, language)
    }
}

fn render_template(template: &str, topic: &str, language: LanguageCode) -> String {
    template
        .replace("{topic}", topic)
        .replace("{language}", language.display_name())
}
