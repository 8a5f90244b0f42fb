//! FTP server binary
//!
//! Run with: cargo run --bin snow-owl-ftp-server

use clap::Parser;
use snow_owl_ftp::{Config, LogFormat, Server};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML). When omitted, configuration is
    /// built from CLI flags and `SNOW_OWL_FTP_*` environment variables.
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on (RFC 959 default is 21)
    #[arg(short, long, default_value = "21")]
    port: u16,

    /// Root directory exposed to clients
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Tab-separated login/password database
    #[arg(long)]
    users: Option<PathBuf>,

    /// Disable credential checking (every USER logs in)
    #[arg(long)]
    no_auth: bool,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = if let Some(config_path) = args.config {
        match Config::from_file(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        let mut config = Config::default();
        config.bind_address = args.bind;
        config.port = args.port;

        if let Some(root) = args.root {
            config.root_dir = root;
        }
        if let Some(users) = args.users {
            config.users_file = Some(users);
        }
        if args.no_auth {
            config.auth_enabled = false;
        }
        if let Some(log_format) = args.log_format {
            config.logging.format = log_format;
        }
        if let Some(log_file) = args.log_file {
            config.logging.file = Some(log_file);
        }
        if args.verbose {
            config.logging.level = "debug".to_string();
        }

        config
    };

    let _log_guard = init_logging(&mut config);

    info!(
        event = "server_starting",
        version = env!("CARGO_PKG_VERSION"),
        "starting snow-owl-ftp"
    );

    if !config.root_dir.exists() {
        info!(event = "creating_root_directory", directory = ?config.root_dir, "creating root directory");
        if let Err(e) = std::fs::create_dir_all(&config.root_dir) {
            error!(event = "root_directory_creation_failed", error = %e, "failed to create root directory");
            std::process::exit(1);
        }
    }

    info!(
        event = "server_configuration",
        bind_address = %config.bind_address,
        port = config.port,
        root_dir = ?config.root_dir,
        auth_enabled = config.auth_enabled,
        log_format = ?config.logging.format,
        "server configuration"
    );

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(event = "server_creation_failed", error = %e, "failed to create server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(event = "server_error", error = %e, "server encountered an error");
        std::process::exit(1);
    }
}

fn init_logging(config: &mut Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(log_file) = config.logging.file.clone() {
        if let Some(parent) = log_file.parent() {
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Warning: failed to create log directory: {e}");
                    eprintln!("Falling back to stderr logging");
                    config.logging.file = None;
                }
            }
        }
    }

    let Some(ref log_file) = config.logging.file else {
        match config.logging.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                    .init();
            }
        }
        return None;
    };

    let file_name = log_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snow-owl-ftp.log".to_string());
    let file_appender = tracing_appender::rolling::daily(
        log_file.parent().unwrap_or_else(|| std::path::Path::new(".")),
        file_name,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                .with_writer(non_blocking)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(config.logging.level.clone()))
                .with_writer(non_blocking)
                .init();
        }
    }

    Some(guard)
}
