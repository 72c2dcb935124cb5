//! Development server
//!
//! Hosts the schema over HTTP for local work against a real control
//! plane. Each request gets a client copy scoped to the caller's
//! `X-Auth-Token`; the signing key and response cache are shared
//! process-wide.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::{Parser, ValueEnum};
use cloudapi_gql::cloudapi::CloudApi;
use cloudapi_gql::config::Config;
use cloudapi_gql::graphql::{self, CloudApiSchema};
use std::path::PathBuf;
use tracing::Level;

/// GraphQL facade over the Triton CloudAPI control plane
#[derive(Parser, Debug)]
#[command(name = "cloudapi-gql", version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// Control-plane base URL (overrides SDC_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Account login (overrides SDC_ACCOUNT)
    #[arg(long)]
    account: Option<String>,

    /// Signing key name (overrides SDC_KEY_ID)
    #[arg(long)]
    key_id: Option<String>,

    /// Path to the RSA private key PEM (overrides SDC_KEY_PATH)
    #[arg(long)]
    key_path: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Log to a file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_max_level(tracing_level)
            .with_target(true)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(Some(guard))
}

#[derive(Clone)]
struct AppState {
    schema: CloudApiSchema,
    client: CloudApi,
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    // the session plugin's job in production: scope this operation to the
    // caller's delegated token
    let token = headers
        .get("x-auth-token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let client = state.client.with_token(token);
    let request = request.data(client);

    Json(state.schema.execute(request).await)
}

async fn graphiql() -> Html<String> {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    // CLI flags override the environment lookup
    if let Some(url) = &args.api_url {
        std::env::set_var("SDC_URL", url);
    }
    if let Some(account) = &args.account {
        std::env::set_var("SDC_ACCOUNT", account);
    }
    if let Some(key_id) = &args.key_id {
        std::env::set_var("SDC_KEY_ID", key_id);
    }
    if let Some(key_path) = &args.key_path {
        std::env::set_var("SDC_KEY_PATH", key_path.as_os_str());
    }

    let config = Config::from_env().context("failed to resolve configuration")?;
    let client = CloudApi::new(&config).context("failed to create control-plane client")?;
    let schema = graphql::build_schema().context("schema binding validation failed")?;

    let state = AppState { schema, client };
    let app = Router::new()
        .route("/graphql", post(graphql_handler))
        .route("/graphiql", get(graphiql))
        .with_state(state);

    tracing::info!("listening on {}", args.listen);
    tracing::info!("control plane: {}", config.api_base_url);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
