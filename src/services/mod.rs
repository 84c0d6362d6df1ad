//! 外部服务 - 翻译、语音合成、语音转写与调研历史

pub mod history;
pub mod speech;
pub mod transcription;
pub mod translation;

pub use history::{AssetRecord, HistoryStore, JsonHistoryStore, RunRecord, RunStatus, RunUpdate};
pub use speech::{GoogleSpeech, SpeechSynthesizer, SynthesisError};
pub use transcription::{
    GeminiTranscriber, GroqWhisperTranscriber, Transcriber, TranscriptionError, speech_to_text,
};
pub use translation::{GoogleTranslator, SourceLanguage, TranslationError, Translator};
