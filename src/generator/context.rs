use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::generator::fanout::AssetFanOut;
use crate::generator::pipeline::PipelineExecutor;
use crate::llm::client::RigBackendFactory;
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::registry::{Credentials, probe_reachability};
use crate::llm::router::ModelRouter;
use crate::services::history::{HistoryStore, JsonHistoryStore};
use crate::services::speech::{GoogleSpeech, SpeechSynthesizer};
use crate::services::translation::{GoogleTranslator, Translator};

/// 一次调研运行所需的全部依赖
#[derive(Clone)]
pub struct GeneratorContext {
    /// 配置
    pub config: Config,
    /// 按角色选择模型
    pub router: Arc<ModelRouter>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// 历史记录，未启用时为None
    pub history: Option<Arc<dyn HistoryStore>>,
    /// 阶段输出缓存，未启用时为None
    pub cache_manager: Option<Arc<CacheManager>>,
    pub cancel: CancellationToken,
}

impl GeneratorContext {
    /// 使用真实服务创建上下文，开启深度探测时会先探测各Provider
    pub async fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::from_config(&config.llm.rate_limit));

        let availability = probe_reachability(&credentials, &config.llm, &config.probe).await;
        let router = ModelRouter::new(
            credentials,
            config.llm.clone(),
            Arc::new(RigBackendFactory::new(config.llm.clone())),
        )
        .with_availability(availability)
        .with_limiter(limiter.clone());

        let translator = GoogleTranslator::new(
            Duration::from_secs(config.fanout.translate_timeout_seconds),
            limiter.clone(),
        )?;
        let synthesizer = GoogleSpeech::new(
            Duration::from_secs(config.fanout.speech_timeout_seconds),
            limiter,
        )?;

        let history = config
            .history
            .enabled
            .then(|| JsonHistoryStore::new(config.history.path.clone()));
        let cache_manager = config
            .cache
            .enabled
            .then(|| CacheManager::new(config.cache.clone()));

        let mut context = Self::from_parts(
            config,
            Arc::new(router),
            Arc::new(translator),
            Arc::new(synthesizer),
        );
        if let Some(history) = history {
            context = context.with_history(Arc::new(history));
        }
        if let Some(cache_manager) = cache_manager {
            context = context.with_cache(Arc::new(cache_manager));
        }
        Ok(context)
    }

    /// 由调用方提供各服务，不启用历史与缓存
    pub fn from_parts(
        config: Config,
        router: Arc<ModelRouter>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            config,
            router,
            translator,
            synthesizer,
            history: None,
            cache_manager: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_cache(mut self, cache_manager: Arc<CacheManager>) -> Self {
        self.cache_manager = Some(cache_manager);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn executor(&self) -> PipelineExecutor {
        let executor = PipelineExecutor::new(self.router.clone(), &self.config.output_path)
            .with_cancellation(self.cancel.clone());
        match &self.cache_manager {
            Some(cache) => executor.with_cache(cache.clone()),
            None => executor,
        }
    }

    pub fn fan_out(&self) -> AssetFanOut {
        AssetFanOut::new(
            self.translator.clone(),
            self.synthesizer.clone(),
            self.config.fanout.clone(),
            &self.config.output_path,
        )
        .with_cancellation(self.cancel.clone())
    }
}
