//! LLM层 - Provider注册表、角色路由与统一的模型调用句柄

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod registry;
pub mod router;

pub use client::{ChatRole, ChatTurn, Invocation, LanguageModel, ModelHandle};
pub use error::{ModelError, RouterError};
pub use rate_limiter::RateLimiter;
pub use registry::{Credentials, ProviderAvailability, ProviderDescriptor, ProviderKey};
pub use router::{AgentRole, ModelRouter, RolePreference, RoleRoute};
