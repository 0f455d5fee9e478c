use std::io::Read as _;
use std::sync::Arc;

use podcast_pipeline::chat::TelegramBridgeClient;
use podcast_pipeline::cli;
use podcast_pipeline::config::AppConfig;
use podcast_pipeline::content::PriorityLexicon;
use podcast_pipeline::db::{Database, SupabaseDatabase};
use podcast_pipeline::diacritize::DictaDiacritizationClient;
use podcast_pipeline::domain::{CollectMessage, PreprocessMessage, SynthesizeMessage};
use podcast_pipeline::error::{PipelineError, Result};
use podcast_pipeline::llm::GeminiLlmClient;
use podcast_pipeline::logging::{init_logging, LogConfig};
use podcast_pipeline::queue::{Queue, SqsQueue};
use podcast_pipeline::script::TopicLexicon;
use podcast_pipeline::storage::{BlobStore, S3BlobStore};
use podcast_pipeline::tracker::EpisodeTracker;
use podcast_pipeline::tts::GeminiTtsClient;
use podcast_pipeline::workers::{poll_loop, CollectorWorker, PreprocessorWorker, SynthesizerWorker};

const GEMINI_SCRIPT_MODEL: &str = "gemini-2.0-flash";
const BATCH_SIZE: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        cli::print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-v") {
        cli::print_version();
        return Ok(());
    }

    init_logging(&LogConfig::from_env())
        .map_err(|err| PipelineError::fatal_external(err.to_string()))?;

    let subcommand = args.get(1).map(String::as_str);
    let config = AppConfig::from_env();

    match subcommand {
        Some("collector") => run_collector(&config).await,
        Some("preprocessor") => run_preprocessor(&config).await,
        Some("synthesizer") => run_synthesizer(&config).await,
        Some(other) => Err(PipelineError::validation(format!(
            "unknown subcommand '{other}', expected one of: collector, preprocessor, synthesizer"
        ))),
        None => {
            cli::print_help();
            Err(PipelineError::validation(
                "missing subcommand: collector, preprocessor, synthesizer",
            ))
        }
    }
}

fn database(config: &AppConfig) -> Arc<dyn Database> {
    Arc::new(SupabaseDatabase::new(
        config.supabase_url.clone(),
        config.supabase_service_key.clone(),
    ))
}

fn blob_store(config: &AppConfig) -> Arc<dyn BlobStore> {
    Arc::new(S3BlobStore::new(config.s3_bucket_name.clone()))
}

/// The collector has no durable input queue of its own (what schedules a
/// collection run is out of this pipeline's scope); each invocation handles
/// one `CollectMessage` read as JSON from stdin, mirroring how the original
/// system hands an already-decided collection request to a single
/// invocation rather than polling for one.
async fn run_collector(config: &AppConfig) -> Result<()> {
    let db = database(config);
    let blobs = blob_store(config);
    let tracker = Arc::new(EpisodeTracker::new(db.clone()));
    let chat = Arc::new(TelegramBridgeClient::new(
        config
            .api_base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8081".to_string()),
        config.telegram_api_id.clone(),
        config.telegram_api_hash.clone(),
        config.telegram_session.clone(),
    ));
    let preprocess_queue: Arc<dyn Queue<PreprocessMessage>> =
        Arc::new(SqsQueue::new(config.script_generation_queue_url.clone()));

    let worker = CollectorWorker::new(db, blobs, tracker, chat, preprocess_queue);

    let mut payload = String::new();
    std::io::stdin()
        .read_to_string(&mut payload)
        .map_err(|err| PipelineError::validation(format!("failed to read stdin: {err}")))?;
    let message: CollectMessage = serde_json::from_str(payload.trim())
        .map_err(|err| PipelineError::validation(format!("invalid collect message: {err}")))?;

    worker.handle(message).await
}

async fn run_preprocessor(config: &AppConfig) -> Result<()> {
    let db = database(config);
    let blobs = blob_store(config);
    let tracker = Arc::new(EpisodeTracker::new(db.clone()));
    let llm = Arc::new(GeminiLlmClient::new(
        config.gemini_api_key.clone(),
        GEMINI_SCRIPT_MODEL,
        config.tts_call_timeout,
    ));
    let synthesize_queue: Arc<dyn Queue<SynthesizeMessage>> =
        Arc::new(SqsQueue::new(config.audio_generation_queue_url.clone()));
    let preprocess_queue: Arc<dyn Queue<PreprocessMessage>> =
        Arc::new(SqsQueue::new(config.script_generation_queue_url.clone()));

    let worker = Arc::new(PreprocessorWorker::new(
        db,
        blobs,
        tracker,
        llm,
        PriorityLexicon::default(),
        TopicLexicon::default(),
        synthesize_queue,
    ));

    poll_loop(
        preprocess_queue.as_ref(),
        BATCH_SIZE,
        config.queue_poll_interval,
        move |message: PreprocessMessage| {
            let worker = worker.clone();
            async move { worker.handle(message).await }
        },
    )
    .await;
    Ok(())
}

async fn run_synthesizer(config: &AppConfig) -> Result<()> {
    let db = database(config);
    let blobs = blob_store(config);
    let tracker = Arc::new(EpisodeTracker::new(db.clone()));
    let tts = Arc::new(GeminiTtsClient::new(
        config.gemini_api_key.clone(),
        config.tts_call_timeout,
        config.tts_requests_per_minute,
    ));
    let diacritizer = Arc::new(DictaDiacritizationClient::new(config.tts_call_timeout));
    let synthesize_queue: Arc<dyn Queue<SynthesizeMessage>> =
        Arc::new(SqsQueue::new(config.audio_generation_queue_url.clone()));

    let worker = Arc::new(SynthesizerWorker::new(
        db,
        blobs,
        tracker,
        tts,
        diacritizer,
        config.chunk_max_chars,
        config.chunk_max_workers,
        config.synthesis_invocation_budget,
        config.api_base_url.clone(),
        config.lambda_callback_secret.clone(),
    ));

    poll_loop(
        synthesize_queue.as_ref(),
        BATCH_SIZE,
        config.queue_poll_interval,
        move |message: SynthesizeMessage| {
            let worker = worker.clone();
            async move { worker.handle(message).await }
        },
    )
    .await;
    Ok(())
}
