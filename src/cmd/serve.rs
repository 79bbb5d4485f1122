//! Studio API server command: `synapse serve`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::super::Cli;

pub async fn cmd_serve(
    cli: &Cli,
    project_dir: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    offline: bool,
) -> Result<()> {
    use synapse::config::Config;
    use synapse::server::{AppState, start_server};

    let config = Config::new(project_dir, cli.verbose, cli.yes, cli.max_parallel)?;
    config.ensure_directories()?;

    // Diagnostics go to a rolling file under .synapse/logs/ so the terminal
    // stays free for the status lines. The guard must outlive the server or
    // buffered log lines are dropped.
    let _log_guard = init_file_logging(&config);

    let stages = config.load_stages()?;
    let orchestrator = super::run::build_orchestrator(&config, stages, offline)?;
    let store = Arc::new(config.store());
    let debounce = std::time::Duration::from_millis(config.toml().storage.debounce_ms);
    let state = Arc::new(AppState::new(orchestrator, store).with_debounce(debounce));

    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);
    start_server(state, &host, port).await
}

fn init_file_logging(config: &synapse::config::Config) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::EnvFilter;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "synapse.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let default = if config.verbose {
        "synapse=debug,info"
    } else {
        "synapse=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .json()
        .try_init();
    guard
}
