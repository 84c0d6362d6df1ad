use std::path::PathBuf;

use thiserror::Error;

use crate::llm::error::{ModelError, RouterError};
use crate::llm::registry::ProviderKey;
use crate::llm::router::AgentRole;

/// 调研流水线的失败原因，每种都能定位到具体阶段
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("stage `{stage}` could not resolve a model: {source}")]
    Routing {
        stage: String,
        #[source]
        source: RouterError,
    },

    #[error("stage `{stage}` depends on `{missing}`, which does not run before it")]
    DependencyOrder { stage: String, missing: String },

    #[error("stage `{stage}` ({role}) failed on {provider} after {attempts} attempt(s): {source}")]
    StageExecution {
        stage: String,
        role: AgentRole,
        provider: ProviderKey,
        attempts: u32,
        #[source]
        source: ModelError,
    },

    #[error("pipeline cancelled before stage `{stage}`")]
    Cancelled { stage: String },

    #[error("failed to persist report to {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// 出错的阶段ID，配置错误没有对应阶段
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::Configuration(_) | PipelineError::Persist { .. } => None,
            PipelineError::Routing { stage, .. }
            | PipelineError::DependencyOrder { stage, .. }
            | PipelineError::StageExecution { stage, .. }
            | PipelineError::Cancelled { stage } => Some(stage),
        }
    }

    /// 没有任何可用Provider时给出的修复提示
    pub fn is_no_provider(&self) -> bool {
        matches!(
            self,
            PipelineError::Routing {
                source: RouterError::NoProviderAvailable { .. },
                ..
            }
        )
    }
}
