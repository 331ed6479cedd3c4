use std::path::Path;
use std::sync::Arc;

use mail_digest::api::{AppState, api_routes};
use mail_digest::config::AppConfig;
use mail_digest::llm::{LlmClient, OpenRouterClient};
use mail_digest::pipeline::{AiAnalyzer, EmailPipeline};
use mail_digest::store::{Database, LibSqlBackend};
use mail_digest::summary::SummaryGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENROUTER_API_KEY=sk-or-...");
        std::process::exit(1);
    });

    eprintln!("📬 mail-digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   API: http://{}/api/v1", config.http_bind);
    eprintln!("   Database: {}", config.db_path);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
                std::process::exit(1);
            }),
    );

    // ── Pipeline ─────────────────────────────────────────────────────────
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::new(&config)?);
    let analyzer = AiAnalyzer::new(llm, &config);
    let pipeline = Arc::new(EmailPipeline::new(Arc::clone(&db), analyzer));

    // ── HTTP server ──────────────────────────────────────────────────────
    let state = AppState {
        db,
        pipeline,
        generator: SummaryGenerator::new(),
        allowed_senders: config.allowed_senders.clone(),
    };
    let app = api_routes(state);

    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!(addr = %config.http_bind, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
