pub mod cache;
pub mod cli;
pub mod config;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::context::GeneratorContext;
pub use generator::pipeline::{PipelineError, Stage};
pub use generator::workflow::{ResearchOutcome, launch};
pub use i18n::LanguageCode;
pub use llm::registry::Credentials;
