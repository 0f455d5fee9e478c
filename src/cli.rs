/// CLI argument parsing and help text

pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!("podcast_pipeline v{}", version);
    println!("Collector / preprocessor / synthesizer workers for the episode pipeline");
    println!();
    println!("USAGE:");
    println!("    podcast_pipeline <SUBCOMMAND>");
    println!();
    println!("SUBCOMMANDS:");
    println!("    collector       Run one collection pass, reading a CollectMessage from stdin");
    println!("    preprocessor    Poll the preprocess queue and process messages until killed");
    println!("    synthesizer     Poll the synthesize queue and process messages until killed");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -v, --version         Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    echo '{{\"podcast_config_id\":...}}' | podcast_pipeline collector");
    println!("    podcast_pipeline preprocessor");
    println!("    podcast_pipeline synthesizer");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    S3_BUCKET_NAME                   - Blob storage bucket endpoint");
    println!("    TELEGRAM_API_ID, TELEGRAM_API_HASH, TELEGRAM_SESSION - Chat platform credentials");
    println!("    SUPABASE_URL, SUPABASE_SERVICE_KEY - Episode/config store");
    println!("    GEMINI_API_KEY                   - LLM + TTS credential");
    println!("    SCRIPT_GENERATION_QUEUE_URL      - Collector output / preprocessor input queue");
    println!("    AUDIO_GENERATION_QUEUE_URL       - Preprocessor output / synthesizer input queue");
    println!("    TTS_REQUESTS_PER_MINUTE          - TTS rate limit (default: 9)");
    println!("    API_BASE_URL, LAMBDA_CALLBACK_SECRET - Completion webhook target + auth");
    println!("    TTS_CALL_TIMEOUT_SECONDS         - Per-call TTS/LLM timeout (default: 480)");
    println!("    CHUNK_MAX_CHARS                  - Script chunk size (default: 1200)");
    println!("    CHUNK_MAX_WORKERS                - Parallel chunk renders (default: 2)");
    println!("    QUEUE_POLL_INTERVAL_SECONDS       - Idle poll interval (default: 5)");
    println!("    SYNTHESIS_INVOCATION_BUDGET_SECONDS - Deferral budget (default: 900)");
    println!("    PIPELINE_LOG_DIR, RUST_LOG, LOG_FORMAT - Logging configuration");
    println!();
    println!("CONFIGURATION:");
    println!("    Settings can be configured via a .env file in the current working directory.");
}

pub fn print_version() {
    println!("podcast_pipeline v{}", env!("CARGO_PKG_VERSION"));
}
