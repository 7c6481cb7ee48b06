use std::{env, sync::Arc};

use scimpatch_db_memory::InMemoryUserStore;
use scimpatch_server::ServerBuilder;
use scimpatch_server::bootstrap::seed_users;
use scimpatch_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use scimpatch_storage::DynUserStore;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    CliArgument,
    EnvironmentVariable,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SCIMPATCH_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    scimpatch_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    scimpatch_server::observability::apply_logging_level(&cfg.logging.level);
    tracing::info!(
        malformed_items = ?cfg.patch.malformed_items,
        sub_attribute_remove = ?cfg.patch.sub_attribute_remove,
        "Patch policy"
    );

    let store: DynUserStore = Arc::new(InMemoryUserStore::new());
    if let Some(users_file) = &cfg.bootstrap.users_file {
        if let Err(e) = seed_users(store.as_ref(), users_file).await {
            eprintln!("Bootstrap failed: {e:#}");
            std::process::exit(2);
        }
    }

    let server = ServerBuilder::new().with_config(cfg).with_store(store).build();
    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SCIMPATCH_CONFIG
/// 3. Default: scimpatch.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("SCIMPATCH_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_FILE.to_string(), ConfigSource::Default)
}
