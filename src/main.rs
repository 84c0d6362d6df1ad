use anyhow::{Context, Result, anyhow};
use autoresearch::cli::Args;
use autoresearch::generator::context::GeneratorContext;
use autoresearch::generator::workflow::{ResearchOutcome, launch};
use autoresearch::llm::registry::{Credentials, describe_providers, probe_reachability};
use autoresearch::services::history::{HistoryStore, JsonHistoryStore};
use autoresearch::services::transcription::{
    TRANSCRIPTION_FAILURE_PREFIX, default_transcribers, speech_to_text,
};
use autoresearch::Config;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// --history默认列出的记录数
const HISTORY_LIST_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let default_filter = if args.verbose {
        "autoresearch=debug"
    } else {
        "autoresearch=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let list_providers = args.providers;
    let list_history = args.history;
    let topic = args.topic.clone();
    let topic_audio = args.topic_audio.clone();

    let config = args.into_config()?;
    let credentials = Credentials::from_env().with_config_overrides(&config.llm);

    if list_providers {
        return print_providers(&config, &credentials).await;
    }
    if list_history {
        return print_history(&config).await;
    }

    let topic = match (topic, topic_audio) {
        (Some(topic), _) => topic,
        (None, Some(audio_path)) => {
            let audio = tokio::fs::read(&audio_path)
                .await
                .context(format!("Failed to read audio file: {:?}", audio_path))?;
            let transcribers = default_transcribers(&credentials);
            let text = speech_to_text(&transcribers, &audio, config.language).await;
            if let Some(reason) = text.strip_prefix(TRANSCRIPTION_FAILURE_PREFIX) {
                return Err(anyhow!("Could not transcribe {:?}: {}", audio_path, reason));
            }
            info!("🎙️ 识别出的调研主题: {}", text);
            text
        }
        (None, None) => {
            return Err(anyhow!(
                "No topic given. Pass a topic or --topic-audio <file>."
            ));
        }
    };

    let context = GeneratorContext::new(config, credentials).await?;

    let cancel = context.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，当前阶段结束后停止");
            cancel.cancel();
        }
    });

    match launch(&context, &topic).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            error!("❌ 调研失败: {}", e);
            if e.is_no_provider() {
                eprintln!(
                    "💡 Set at least one provider key in .env, e.g. GROQ_API_KEY or GOOGLE_API_KEY. Run with --providers to check."
                );
            }
            std::process::exit(1);
        }
    }
}

async fn print_providers(config: &Config, credentials: &Credentials) -> Result<()> {
    let availability = probe_reachability(credentials, &config.llm, &config.probe).await;

    println!("🔌 LLM Providers (priority order)");
    for descriptor in describe_providers() {
        let status = if availability.is_available(descriptor.key) {
            "✅"
        } else {
            "❌"
        };
        println!(
            "  {} {:<18} {:<10} {:<12} model: {:<26} env: {}",
            status,
            descriptor.display_name,
            descriptor.key.as_str(),
            descriptor.capability.to_string(),
            config.llm.model_for(descriptor.key),
            descriptor.credential_env
        );
    }

    if !availability.any_available() {
        println!("\n⚠️ No provider is available. Configure at least one API key.");
    }
    Ok(())
}

async fn print_history(config: &Config) -> Result<()> {
    let store = JsonHistoryStore::new(config.history.path.clone());
    let records = store.list(HISTORY_LIST_LIMIT).await?;
    if records.is_empty() {
        println!("📭 No research runs recorded in {:?}", store.path());
        return Ok(());
    }

    println!("📚 Recent research runs");
    for record in records {
        println!(
            "  #{:<4} {} [{:?}] {} ({}){}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.status,
            record.topic,
            record.language,
            record
                .duration_seconds
                .map(|secs| format!(" {:.1}s", secs))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn print_outcome(outcome: &ResearchOutcome) {
    println!("\n✅ Research complete: {}", outcome.run.topic);
    if let Some(path) = &outcome.run.report_path {
        println!("  📄 Report: {}", path.display());
    }
    for (language, asset) in &outcome.assets {
        println!(
            "  🌐 {:<10} {}{}",
            language.display_name(),
            asset.text_path.display(),
            asset
                .audio_path
                .as_ref()
                .map(|path| format!(" | 🔊 {}", path.display()))
                .unwrap_or_default()
        );
    }
    if let Some(path) = &outcome.summary_path {
        println!("  📊 Summary: {}", path.display());
    }
    println!("\n{}", outcome.timing_report);
}
