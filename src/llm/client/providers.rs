//! LLM Provider支持模块

use anyhow::Result;
use rig::{
    agent::{Agent, AgentBuilder},
    client::CompletionClient,
    completion::{Chat, CompletionModel, Message, PromptError},
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};

use crate::llm::client::{ChatRole, ChatTurn, Invocation};
use crate::llm::registry::ProviderKey;

/// 统一的Provider客户端枚举，Groq走OpenAI兼容接口
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    DeepSeek(rig::providers::deepseek::Client),
    Anthropic(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client, serde_json::Value),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    /// 根据Provider创建相应的客户端
    pub fn new(provider: ProviderKey, api_key: &str, base_url: &str) -> Result<Self> {
        match provider {
            ProviderKey::Groq | ProviderKey::OpenAI => {
                let client = rig::providers::openai::Client::builder(api_key)
                    .base_url(base_url)
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            ProviderKey::DeepSeek => {
                let client = rig::providers::deepseek::Client::builder(api_key)
                    .base_url(base_url)
                    .build();
                Ok(ProviderClient::DeepSeek(client))
            }
            ProviderKey::Anthropic => {
                let client = rig::providers::anthropic::ClientBuilder::new(api_key).build()?;
                Ok(ProviderClient::Anthropic(client))
            }
            ProviderKey::Gemini => {
                let client = rig::providers::gemini::Client::builder(api_key).build()?;
                // Gemini的请求体必须携带generationConfig
                let params = serde_json::to_value(
                    AdditionalParameters::default().with_config(GenerationConfig::default()),
                )?;
                Ok(ProviderClient::Gemini(client, params))
            }
            ProviderKey::Ollama => {
                let client = rig::providers::ollama::Client::builder()
                    .base_url(base_url)
                    .build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }

    /// 以系统提示词+历史消息+当前prompt发起一次对话
    pub async fn chat(
        &self,
        model: &str,
        invocation: &Invocation,
        max_tokens: u64,
    ) -> Result<String, PromptError> {
        let history: Vec<Message> = invocation.history.iter().map(to_message).collect();
        let prompt = invocation.prompt.as_str();

        match self {
            ProviderClient::OpenAI(client) => {
                let builder = client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder();
                configure_agent(builder, invocation, max_tokens)
                    .chat(prompt, history)
                    .await
            }
            ProviderClient::DeepSeek(client) => {
                configure_agent(client.agent(model), invocation, max_tokens)
                    .chat(prompt, history)
                    .await
            }
            ProviderClient::Anthropic(client) => {
                configure_agent(client.agent(model), invocation, max_tokens)
                    .chat(prompt, history)
                    .await
            }
            ProviderClient::Gemini(client, params) => {
                let builder = client.agent(model).additional_params(params.clone());
                configure_agent(builder, invocation, max_tokens)
                    .chat(prompt, history)
                    .await
            }
            ProviderClient::Ollama(client) => {
                configure_agent(client.agent(model), invocation, max_tokens)
                    .chat(prompt, history)
                    .await
            }
        }
    }
}

/// 所有Provider共用的agent参数：系统提示词、最大tokens、温度
fn configure_agent<M: CompletionModel>(
    builder: AgentBuilder<M>,
    invocation: &Invocation,
    max_tokens: u64,
) -> Agent<M> {
    builder
        .preamble(&invocation.system_prompt)
        .max_tokens(max_tokens)
        .temperature(invocation.temperature)
        .build()
}

fn to_message(turn: &ChatTurn) -> Message {
    match turn.role {
        ChatRole::User => Message::user(turn.content.clone()),
        ChatRole::Assistant => Message::assistant(turn.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> Invocation {
        Invocation {
            system_prompt: "You are a fact checker.".to_string(),
            prompt: "Verify the findings.".to_string(),
            history: Vec::new(),
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn test_deepseek_agent_honors_max_tokens() {
        let client = rig::providers::deepseek::Client::builder("sk-test")
            .base_url("https://api.deepseek.com")
            .build();

        let agent = configure_agent(client.agent("deepseek-chat"), &invocation(), 1234);

        assert_eq!(agent.max_tokens, Some(1234));
        assert_eq!(agent.temperature, Some(0.1));
        assert_eq!(agent.preamble.as_deref(), Some("You are a fact checker."));
    }

    #[tokio::test]
    async fn test_openai_compatible_agent_honors_max_tokens() {
        let client = rig::providers::openai::Client::builder("gsk-test")
            .base_url("https://api.groq.com/openai/v1")
            .build();
        let builder = client
            .completion_model("llama-3.3-70b-versatile")
            .completions_api()
            .into_agent_builder();

        let agent = configure_agent(builder, &invocation(), 512);

        assert_eq!(agent.max_tokens, Some(512));
    }
}
