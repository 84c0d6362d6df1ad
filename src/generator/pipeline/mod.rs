//! 调研流水线 - 按声明顺序执行阶段，上游输出作为下游上下文

mod error;
mod executor;
mod stage;

pub use error::PipelineError;
pub use executor::{PipelineExecutor, PipelineRun, StageOutput};
pub use stage::{AgentPersona, RetryPolicy, Stage};
