// ABOUTME: Main entry point for the boti command bot
// ABOUTME: Initializes config and logging, builds the session over the console transport, and runs it

use anyhow::Result;
use boti::{
    app,
    config::{Config, ConfigError},
    console::ConsoleTransport,
};
use boti_core::{AllowList, PeerId};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "boti")]
#[command(about = "Allow-listed command bot")]
#[command(version)]
struct Cli {
    /// Configuration file (default: config.toml, or BOTI_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity used for lines typed on the console
    #[arg(short, long)]
    peer: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

/// Load the config file and apply command line overrides. Errors are
/// logged before they are returned.
fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            return Err(e);
        }
    };

    if let Some(peer) = &cli.peer {
        config.console.peer = peer.clone();
    }
    if cli.debug {
        config.bot.debug = true;
    }
    Ok(config)
}

/// Install the tracing subscriber. The returned guard must live as long as
/// the process so buffered file logs are flushed.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());

    let (file_layer, guard) = match &config.logging.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, "boti.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\nPANIC! Bot crashed with the following error:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = {
        // Stderr-only until the configured subscriber is installed
        let _bootstrap = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_writer(std::io::stderr).finish(),
        );
        load_config(&cli)?
    };

    let _log_guard = init_logging(&config)?;

    tracing::info!("Starting boti");
    tracing::info!(
        identity = %config.identity(),
        allowed = config.bot.allowed.len(),
        max_concurrent = config.dispatch.max_concurrent,
        queue_capacity = config.dispatch.queue_capacity,
        "Configuration loaded"
    );

    let peer = PeerId::new(config.console.peer.clone());
    if !AllowList::new(&config.bot.allowed).is_allowed(&peer) {
        tracing::warn!(peer = %peer, "Console peer is not in the allow-list; its messages will be ignored");
    }

    let transport = Arc::new(ConsoleTransport::stdio(peer));
    let session = app::build_session(&config, transport, app::Backends::default())?;

    tokio::select! {
        result = app::run(&session) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            session.disconnect().await;
        }
    }

    tracing::info!("Bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_errors_are_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let dir = tempfile::TempDir::new().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("missing.toml")),
            peer: None,
            debug: false,
        };
        let result = tracing::subscriber::with_default(subscriber, || load_config(&cli));

        assert!(matches!(result, Err(ConfigError::Read { .. })));
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Configuration error"));
        assert!(logged.contains("missing.toml"));
    }

    #[test]
    fn test_cli_overrides_apply_to_loaded_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bot]\nusername = \"boti@example.com\"\npassword = \"secret\"\nallowed = [\"alice@example.com\"]\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            peer: Some("alice@example.com".to_string()),
            debug: true,
        };

        let config = load_config(&cli).unwrap();
        assert_eq!(config.console.peer, "alice@example.com");
        assert!(config.bot.debug);
    }
}
