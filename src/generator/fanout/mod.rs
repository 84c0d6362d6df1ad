//! 多语言分发 - 把最终报告翻译成各目标语言并生成朗读音频

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::FanOutConfig;
use crate::generator::outlet::DiskOutlet;
use crate::i18n::LanguageCode;
use crate::services::speech::SpeechSynthesizer;
use crate::services::translation::{SourceLanguage, Translator};
use crate::utils::threads::do_parallel_with_limit;

pub mod chunking;
pub mod narration;

use chunking::{Chunk, chunk_text, join_chunks};
use narration::prepare_narration;

/// 单个语言的产出
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LanguageAsset {
    pub language: LanguageCode,
    pub text: String,
    pub text_path: PathBuf,
    /// 语言不支持朗读或合成失败时为None
    pub audio_path: Option<PathBuf>,
    pub chunks: usize,
    /// 翻译失败、保留原文的分块数
    pub fallback_chunks: usize,
}

#[derive(Debug, Error)]
pub enum LanguageAssetError {
    #[error("{language} text is empty after translation")]
    EmptyText { language: LanguageCode },

    #[error("failed to write {language} text to {path:?}: {source}")]
    Persist {
        language: LanguageCode,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} processing was cancelled")]
    Cancelled(LanguageCode),
}

/// 翻译结果及分块统计
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedText {
    pub text: String,
    pub chunks: usize,
    pub fallback_chunks: usize,
}

pub struct AssetFanOut {
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: FanOutConfig,
    outlet: DiskOutlet,
    cancel: CancellationToken,
}

impl AssetFanOut {
    pub fn new(
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: FanOutConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            translator,
            synthesizer,
            config,
            outlet: DiskOutlet::new(output_dir),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 为每个目标语言生成文本与音频；单个语言失败不影响其它语言，失败的语言不出现在结果中
    pub async fn fan_out(
        &self,
        report: &str,
        native: LanguageCode,
        targets: &[LanguageCode],
    ) -> BTreeMap<LanguageCode, LanguageAsset> {
        let mut languages: Vec<LanguageCode> = Vec::new();
        for language in targets {
            if !languages.contains(language) {
                languages.push(*language);
            }
        }

        info!(
            "🌐 开始多语言分发: {}",
            languages
                .iter()
                .map(LanguageCode::code)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let futures = languages
            .iter()
            .map(|&language| async move {
                (language, self.produce(report, native, language).await)
            })
            .collect::<Vec<_>>();
        let results = do_parallel_with_limit(futures, self.config.max_parallels).await;

        let mut assets = BTreeMap::new();
        for (language, result) in results {
            match result {
                Ok(asset) => {
                    info!(
                        "✅ {} 完成{}",
                        language.display_name(),
                        if asset.audio_path.is_some() { "（含音频）" } else { "" }
                    );
                    assets.insert(language, asset);
                }
                Err(e) => warn!("⚠️ {} 分发失败: {}", language.display_name(), e),
            }
        }
        assets
    }

    /// 处理单个语言：翻译、落盘、朗读
    pub async fn produce(
        &self,
        report: &str,
        native: LanguageCode,
        language: LanguageCode,
    ) -> Result<LanguageAsset, LanguageAssetError> {
        if self.cancel.is_cancelled() {
            return Err(LanguageAssetError::Cancelled(language));
        }

        let translated = if language == native {
            TranslatedText {
                text: report.to_string(),
                chunks: 0,
                fallback_chunks: 0,
            }
        } else {
            self.translate_report(report, native, language).await?
        };

        if translated.text.trim().is_empty() {
            return Err(LanguageAssetError::EmptyText { language });
        }

        let text_file = PathBuf::from(language.report_filename());
        let text_path = self
            .outlet
            .save_text(&text_file, &translated.text)
            .await
            .map_err(|source| LanguageAssetError::Persist {
                language,
                path: self.outlet.resolve(&text_file),
                source,
            })?;

        let audio_path = self.narrate(&translated.text, language).await;

        Ok(LanguageAsset {
            language,
            text: translated.text,
            text_path,
            audio_path,
            chunks: translated.chunks,
            fallback_chunks: translated.fallback_chunks,
        })
    }

    /// 分块翻译；某块失败时保留该块原文，其余块不受影响
    pub async fn translate_report(
        &self,
        report: &str,
        native: LanguageCode,
        target: LanguageCode,
    ) -> Result<TranslatedText, LanguageAssetError> {
        let chunks: Vec<Chunk> = chunk_text(report, self.config.max_chunk_chars);
        let mut pieces: Vec<String> = Vec::with_capacity(chunks.len());
        let mut fallback_chunks = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(LanguageAssetError::Cancelled(target));
            }
            if index > 0 && self.config.chunk_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.chunk_delay_ms)).await;
            }

            match self
                .translator
                .translate(&chunk.text, SourceLanguage::Code(native), target)
                .await
            {
                Ok(text) => pieces.push(repair_markdown(&text)),
                Err(e) => {
                    warn!(
                        "⚠️ {} 第 {}/{} 块翻译失败，保留原文: {}",
                        target.display_name(),
                        index + 1,
                        chunks.len(),
                        e
                    );
                    fallback_chunks += 1;
                    pieces.push(chunk.text.clone());
                }
            }
        }

        let text = join_chunks(
            pieces
                .iter()
                .zip(chunks.iter())
                .map(|(text, chunk)| (text.as_str(), &chunk.joint)),
        );
        Ok(TranslatedText {
            text,
            chunks: chunks.len(),
            fallback_chunks,
        })
    }

    async fn narrate(&self, text: &str, language: LanguageCode) -> Option<PathBuf> {
        if !self.synthesizer.supports(language) {
            info!("🔇 {} 不支持语音合成，跳过音频", language.display_name());
            return None;
        }

        let script = prepare_narration(text, self.config.max_narration_chars);
        if script.is_empty() {
            return None;
        }

        let audio = match self.synthesizer.synthesize(&script, language).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("⚠️ {} 语音合成失败: {}", language.display_name(), e);
                return None;
            }
        };
        if audio.len() <= self.config.min_audio_bytes {
            warn!(
                "⚠️ {} 音频仅 {} 字节，视为无效",
                language.display_name(),
                audio.len()
            );
            return None;
        }

        let audio_file = Path::new(&language.audio_filename()).to_path_buf();
        match self.outlet.save_bytes(&audio_file, &audio).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("⚠️ {} 音频写入失败: {}", language.display_name(), e);
                None
            }
        }
    }
}

/// 修复翻译服务拆散的Markdown标题标记
pub fn repair_markdown(text: &str) -> String {
    text.replace("# # #", "###").replace("# #", "##")
}
