#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::generator::context::GeneratorContext;
    use crate::generator::outlet::summary::SUMMARY_FILE_NAME;
    use crate::generator::pipeline::PipelineError;
    use crate::generator::workflow::{TimingKeys, TimingScope, launch};
    use crate::i18n::LanguageCode;
    use crate::llm::client::{BackendFactory, Invocation, LanguageModel};
    use crate::llm::error::{ModelError, RouterError};
    use crate::llm::registry::{Credentials, ProviderKey};
    use crate::llm::router::ModelRouter;
    use crate::services::history::{HistoryStore, JsonHistoryStore, RunStatus};
    use crate::services::speech::{SpeechSynthesizer, SynthesisError};
    use crate::services::translation::{SourceLanguage, TranslationError, Translator};

    /// 回显prompt首行；包含failing_marker的prompt总是失败
    struct EchoModel {
        failing_marker: Option<&'static str>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn invoke(&self, invocation: &Invocation) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.failing_marker
                && invocation.prompt.contains(marker)
            {
                return Err(ModelError::RateLimit {
                    provider: ProviderKey::Groq,
                    message: "429 Too Many Requests".to_string(),
                });
            }
            let first_line = invocation.prompt.lines().next().unwrap_or_default();
            Ok(format!("# Report\n\n{}", first_line))
        }
    }

    struct EchoFactory(Arc<EchoModel>);

    impl BackendFactory for EchoFactory {
        fn connect(
            &self,
            _provider: ProviderKey,
            _model: &str,
            _secret: Option<&str>,
        ) -> Result<Arc<dyn LanguageModel>, RouterError> {
            Ok(self.0.clone())
        }
    }

    struct TaggingTranslator;

    #[async_trait]
    impl Translator for TaggingTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: SourceLanguage,
            target: LanguageCode,
        ) -> Result<String, TranslationError> {
            Ok(format!("({}) {}", target.code(), text))
        }
    }

    struct SilentSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for SilentSynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            _language: LanguageCode,
        ) -> Result<Vec<u8>, SynthesisError> {
            Ok(vec![0u8; 2048])
        }
    }

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config {
            output_path: temp_dir.path().join("output"),
            ..Default::default()
        };
        config.llm.retry_attempts = 2;
        config.llm.retry_delay_ms = 0;
        config.fanout.languages = vec![LanguageCode::French];
        config.fanout.chunk_delay_ms = 0;
        config.cache.enabled = false;
        config.history.path = temp_dir.path().join("history.json");
        config
    }

    fn create_test_context(
        config: Config,
        model: Arc<EchoModel>,
    ) -> (GeneratorContext, Arc<JsonHistoryStore>) {
        let router = ModelRouter::new(
            Credentials::default().with(ProviderKey::Groq, "gsk_test"),
            config.llm.clone(),
            Arc::new(EchoFactory(model)),
        );
        let history = Arc::new(JsonHistoryStore::new(config.history.path.clone()));
        let context = GeneratorContext::from_parts(
            config,
            Arc::new(router),
            Arc::new(TaggingTranslator),
            Arc::new(SilentSynthesizer),
        )
        .with_history(history.clone());
        (context, history)
    }

    fn echo_model(failing_marker: Option<&'static str>) -> Arc<EchoModel> {
        Arc::new(EchoModel {
            failing_marker,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_launch_writes_report_assets_history_and_summary() {
        let temp_dir = TempDir::new().unwrap();
        let model = echo_model(None);
        let (context, history) = create_test_context(test_config(&temp_dir), model.clone());

        let outcome = launch(&context, "  Solar Panel Efficiency ").await.unwrap();

        let output_dir = temp_dir.path().join("output");
        assert_eq!(outcome.run.terminal_stage, "write");
        assert_eq!(
            outcome.run.report_path,
            Some(output_dir.join("Solar_Panel_Efficiency_final.md"))
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 6);

        assert_eq!(outcome.assets.len(), 2);
        assert_eq!(outcome.assets[&LanguageCode::English].text, outcome.run.report);
        assert!(
            outcome.assets[&LanguageCode::French]
                .text
                .starts_with("(fr) # Report")
        );
        assert!(output_dir.join("report_fr.md").exists());
        assert!(output_dir.join("audio_en.mp3").exists());

        assert_eq!(outcome.summary_path, Some(output_dir.join(SUMMARY_FILE_NAME)));

        let id = outcome.history_id.unwrap();
        let record = history.list(usize::MAX).await.unwrap().into_iter().find(|r| r.id == id).unwrap();
        assert_eq!(record.topic, "Solar Panel Efficiency");
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.assets.len(), 2);
        assert!(record.duration_seconds.is_some());
    }

    #[tokio::test]
    async fn test_failed_stage_marks_history_failed() {
        let temp_dir = TempDir::new().unwrap();
        let model = echo_model(Some("Verify the research findings"));
        let (context, history) = create_test_context(test_config(&temp_dir), model);

        let err = launch(&context, "Grid Storage").await.unwrap_err();

        match &err {
            PipelineError::StageExecution {
                stage, attempts, ..
            } => {
                assert_eq!(stage, "fact_check");
                assert_eq!(*attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let records = history.list(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Failed);
        assert!(records[0].summary.as_deref().unwrap().contains("fact_check"));
        assert!(!temp_dir.path().join("output").join("report_fr.md").exists());
    }

    #[tokio::test]
    async fn test_fan_out_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.fanout.enabled = false;
        let (context, _history) = create_test_context(config, echo_model(None));

        let outcome = launch(&context, "Hydrogen Aviation").await.unwrap();

        assert!(outcome.assets.is_empty());
        assert!(outcome.run.report_path.unwrap().exists());
        assert!(!temp_dir.path().join("output").join("report_en.md").exists());
    }

    #[tokio::test]
    async fn test_blank_topic_is_rejected_before_history() {
        let temp_dir = TempDir::new().unwrap();
        let model = echo_model(None);
        let (context, history) = create_test_context(test_config(&temp_dir), model.clone());

        let err = launch(&context, "   ").await.unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(history.list(10).await.unwrap().is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timing_scope_orders_phases() {
        let mut timing = TimingScope::new();
        timing.start_phase(TimingKeys::FAN_OUT);
        timing.start_phase(TimingKeys::PIPELINE);
        std::thread::sleep(Duration::from_millis(5));
        assert!(timing.end_phase(TimingKeys::FAN_OUT).is_some());
        assert!(timing.end_phase(TimingKeys::PIPELINE).is_some());
        assert!(timing.end_phase("unknown").is_none());

        let phases: Vec<String> = timing
            .ordered_phases()
            .into_iter()
            .map(|(phase, _)| phase)
            .collect();
        assert_eq!(phases, vec!["pipeline", "fan_out"]);
        assert!(timing.generate_timing_report().contains("- pipeline:"));
    }
}
