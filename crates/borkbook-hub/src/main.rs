use borkbook_hub::config::{load_config, Config};
use borkbook_hub::{router, AppState};
use std::{
    fs::{File, OpenOptions},
    io,
    net::SocketAddr,
    path::Path,
    sync::Arc,
};
use tracing::{error, info};
use tracing_subscriber::{
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    EnvFilter,
};

#[tokio::main]
async fn main() {
    let config = load_config();
    init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };

    // State must be loaded before the listener accepts anything.
    let state = Arc::new(AppState::initialize(&config));
    let app = router(state.clone());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err);
            return;
        }
    };

    info!(
        event = "hub_start",
        addr = %config.addr,
        meals_file = %config.meals_file.display(),
        subjects = ?config.subjects
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "hub_error", error = %err);
    }

    match state.flush().await {
        Some(outcome) => info!(event = "hub_stop", persisted = outcome.is_persisted()),
        None => info!(event = "hub_stop", persisted = true, changed = false),
    }
}

/// Stdout always; with `log_dir` set, every line is also appended to
/// `borkbook-hub.log` there.
fn init_logging(config: &Config) {
    let level = if config.debug {
        "debug".to_string()
    } else {
        std::env::var("BORKBOOK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let writer = match open_log_file(&config.log_dir) {
        Ok(Some(file)) => BoxMakeWriter::new(io::stdout.and(Arc::new(file))),
        Ok(None) => BoxMakeWriter::new(io::stdout),
        Err(err) => {
            eprintln!("log_file_error: {err}");
            BoxMakeWriter::new(io::stdout)
        }
    };
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init()
    {
        eprintln!("logging_init_error: {err}");
    }
}

fn open_log_file(log_dir: &str) -> io::Result<Option<File>> {
    if log_dir.trim().is_empty() {
        return Ok(None);
    }
    let dir = Path::new(log_dir);
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("borkbook-hub.log"))
        .map(Some)
}
