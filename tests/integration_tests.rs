use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use autoresearch::config::Config;
use autoresearch::generator::context::GeneratorContext;
use autoresearch::generator::pipeline::PipelineError;
use autoresearch::generator::workflow::launch;
use autoresearch::i18n::LanguageCode;
use autoresearch::llm::client::{BackendFactory, Invocation, LanguageModel};
use autoresearch::llm::error::{ModelError, RouterError};
use autoresearch::llm::registry::{Credentials, ProviderKey};
use autoresearch::llm::router::ModelRouter;
use autoresearch::services::speech::{SpeechSynthesizer, SynthesisError};
use autoresearch::services::translation::{SourceLanguage, TranslationError, Translator};

const FINAL_REPORT: &str = "# Solar Panel Efficiency\n\n## Executive Summary\n\nPerovskite tandem cells passed 33% in the lab.\n\n## Table of Contents\n\n1. Findings\n2. Outlook\n\n## Findings\n\nCommercial modules sit between 20% and 23%.";

/// 按阶段返回固定内容的模型，可对某个阶段注入前N次失败
struct ScriptedResearchModel {
    failing_marker: Option<&'static str>,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
    providers_seen: Mutex<Vec<ProviderKey>>,
}

impl ScriptedResearchModel {
    fn new(failing_marker: Option<&'static str>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failing_marker,
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            providers_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedResearchModel {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = self.failing_marker
            && invocation.prompt.contains(marker)
            && self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(ModelError::Transport {
                provider: ProviderKey::Groq,
                message: "503 Service Unavailable".to_string(),
            });
        }

        let prompt = &invocation.prompt;
        let output = if prompt.starts_with("Write a comprehensive professional report") {
            FINAL_REPORT.to_string()
        } else if prompt.starts_with("Verify the research findings") {
            "VERIFIED: lab record 33%, modules 20-23%".to_string()
        } else if prompt.starts_with("Conduct extensive research") {
            "RAW: perovskite tandem 33% (lab)".to_string()
        } else {
            format!("NOTES: {}", prompt.lines().next().unwrap_or_default())
        };
        Ok(output)
    }
}

/// 记录每次解析到的Provider
struct RecordingFactory(Arc<ScriptedResearchModel>);

impl BackendFactory for RecordingFactory {
    fn connect(
        &self,
        provider: ProviderKey,
        _model: &str,
        _secret: Option<&str>,
    ) -> Result<Arc<dyn LanguageModel>, RouterError> {
        self.0.providers_seen.lock().unwrap().push(provider);
        Ok(self.0.clone())
    }
}

struct LabelTranslator;

#[async_trait]
impl Translator for LabelTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: SourceLanguage,
        target: LanguageCode,
    ) -> Result<String, TranslationError> {
        Ok(text
            .split("\n\n")
            .map(|paragraph| format!("{} {}", target.code().to_uppercase(), paragraph))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

struct ToneSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _language: LanguageCode,
    ) -> Result<Vec<u8>, SynthesisError> {
        Ok(text.as_bytes().repeat(8))
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config {
        output_path: temp_dir.path().join("output"),
        ..Default::default()
    };
    config.llm.retry_attempts = 3;
    config.llm.retry_delay_ms = 0;
    config.fanout.languages = vec![LanguageCode::English, LanguageCode::French];
    config.fanout.chunk_delay_ms = 0;
    config.cache.enabled = false;
    config.history.enabled = false;
    config
}

fn context_for(
    config: Config,
    credentials: Credentials,
    model: Arc<ScriptedResearchModel>,
) -> GeneratorContext {
    let router = ModelRouter::new(
        credentials,
        config.llm.clone(),
        Arc::new(RecordingFactory(model)),
    );
    GeneratorContext::from_parts(
        config,
        Arc::new(router),
        Arc::new(LabelTranslator),
        Arc::new(ToneSynthesizer),
    )
}

#[tokio::test]
async fn test_solar_panel_research_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let model = ScriptedResearchModel::new(None, 0);
    let credentials = Credentials::default()
        .with(ProviderKey::Groq, "gsk_live")
        .with(ProviderKey::Gemini, "AIza_live");
    let context = context_for(test_config(&temp_dir), credentials, model.clone());

    let outcome = launch(&context, "Solar Panel Efficiency").await.unwrap();
    let output_dir = temp_dir.path().join("output");

    // 撰写阶段只看到核查后的结论
    let write = outcome.run.output_of("write").unwrap();
    assert!(write.prompt.contains("VERIFIED: lab record 33%"));
    assert!(!write.prompt.contains("RAW: perovskite"));
    assert_eq!(outcome.run.report, FINAL_REPORT);

    let report_path = output_dir.join("Solar_Panel_Efficiency_final.md");
    assert_eq!(outcome.run.report_path, Some(report_path.clone()));
    assert_eq!(std::fs::read_to_string(report_path).unwrap(), FINAL_REPORT);

    // 提取与摘要走Gemini，其余走Groq
    assert_eq!(outcome.run.output_of("extraction").unwrap().provider, ProviderKey::Gemini);
    assert_eq!(outcome.run.output_of("summary").unwrap().provider, ProviderKey::Gemini);
    assert_eq!(outcome.run.output_of("research").unwrap().provider, ProviderKey::Groq);
    assert_eq!(outcome.run.output_of("trend_analysis").unwrap().provider, ProviderKey::Groq);

    assert_eq!(
        outcome.assets.keys().copied().collect::<Vec<_>>(),
        vec![LanguageCode::English, LanguageCode::French]
    );
    let english = &outcome.assets[&LanguageCode::English];
    assert_eq!(english.text, FINAL_REPORT);
    let french = &outcome.assets[&LanguageCode::French];
    assert_eq!(
        french.text.split("\n\n").count(),
        FINAL_REPORT.split("\n\n").count()
    );
    assert!(french.text.starts_with("FR # Solar Panel Efficiency"));
    assert!(output_dir.join("report_en.md").exists());
    assert!(output_dir.join("report_fr.md").exists());
    assert!(output_dir.join("audio_en.mp3").exists());
    assert!(output_dir.join("audio_fr.mp3").exists());
    assert!(output_dir.join("run_summary.md").exists());
    assert_eq!(model.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let temp_dir = TempDir::new().unwrap();
    let model = ScriptedResearchModel::new(Some("Extract relevant technical details"), 2);
    let credentials = Credentials::default().with(ProviderKey::Groq, "gsk_live");
    let mut config = test_config(&temp_dir);
    config.fanout.enabled = false;
    let context = context_for(config, credentials, model.clone());

    let outcome = launch(&context, "Solar Panel Efficiency").await.unwrap();

    assert_eq!(outcome.run.output_of("extraction").unwrap().attempts, 3);
    assert_eq!(outcome.run.output_of("research").unwrap().attempts, 1);
    assert_eq!(model.calls.load(Ordering::SeqCst), 8);
    // Gemini未配置，提取阶段回退到Groq
    assert_eq!(
        outcome.run.output_of("extraction").unwrap().provider,
        ProviderKey::Groq
    );
}

#[tokio::test]
async fn test_no_configured_provider_fails_before_any_call() {
    let temp_dir = TempDir::new().unwrap();
    let model = ScriptedResearchModel::new(None, 0);
    let context = context_for(test_config(&temp_dir), Credentials::default(), model.clone());

    let err = launch(&context, "Solar Panel Efficiency").await.unwrap_err();

    assert!(err.is_no_provider());
    assert_eq!(err.stage(), Some("research"));
    assert!(matches!(err, PipelineError::Routing { .. }));
    assert!(err.to_string().contains("GROQ_API_KEY"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert!(model.providers_seen.lock().unwrap().is_empty());
    assert!(!temp_dir.path().join("output").exists());
}
