use std::{path::Path, sync::Arc};

use audit_expiry::{
    config::ServiceConfig,
    expiration::ExpirationScheduler,
    observability,
    store::{self, ExpiryStore},
};
use clap::Parser;

/// CLI arguments for the audit expiration service
#[derive(Parser, Debug)]
#[command(version, about = "Audit document expiration service", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (built-in defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the expiration scheduler until interrupted (default)
    Run,
    /// Validate the config file and print the effective settings
    Check,
    /// Run store migrations and exit
    Migrate,
    /// Show enabled compile-time features
    Features,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Check) => run_check(args.config.as_deref()),
        Some(Command::Migrate) => run_migrate(args.config.as_deref()).await,
        Some(Command::Features) => run_features(),
        Some(Command::Run) | None => run_service(args.config.as_deref()).await,
    }
}

fn load_config(explicit_config_path: Option<&str>) -> ServiceConfig {
    let Some(path) = explicit_config_path else {
        return ServiceConfig::default();
    };

    match ServiceConfig::from_file(Path::new(path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn run_check(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);

    match toml::to_string_pretty(&config) {
        Ok(rendered) => {
            println!("Configuration is valid.");
            println!();
            print!("{rendered}");
        }
        Err(e) => {
            eprintln!("Error: failed to render configuration: {}", e);
            std::process::exit(1);
        }
    }

    if !config.expiration.is_enabled() {
        println!();
        println!("Note: expiration.interval_secs = 0, the scheduler will not run.");
    } else if config.expiration.is_aggressive() {
        println!();
        println!(
            "Warning: expiration.interval_secs = {} is shorter than one hour.",
            config.expiration.interval_secs
        );
    }
}

async fn run_migrate(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);

    observability::init_tracing(&config.observability.logging)
        .expect("Failed to initialize tracing");

    match &config.store {
        #[cfg(feature = "database-sqlite")]
        audit_expiry::config::StoreConfig::Sqlite(cfg) => {
            tracing::info!(path = %cfg.path, "Running store migrations");
            let mut cfg = cfg.clone();
            cfg.run_migrations = true;
            match store::SqliteAuditStore::connect(&cfg).await {
                Ok(_) => {
                    tracing::info!("Store migrations completed successfully");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Store migrations failed");
                    eprintln!("Error: Store migrations failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        other => {
            eprintln!(
                "Error: the '{}' store has no migrations. Nothing to migrate.",
                other.kind()
            );
            std::process::exit(1);
        }
    }
}

fn run_features() {
    let version = env!("CARGO_PKG_VERSION");

    let features: &[(&str, bool)] = &[
        ("cli", cfg!(feature = "cli")),
        ("database-sqlite", cfg!(feature = "database-sqlite")),
        ("prometheus", cfg!(feature = "prometheus")),
    ];

    println!("audit-expiry {version}");
    println!();
    for (name, enabled) in features {
        let marker = if *enabled { "+" } else { "-" };
        println!("  {marker} {name}");
    }
}

async fn run_service(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);

    observability::init_tracing(&config.observability.logging)
        .expect("Failed to initialize tracing");

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    tracing::info!(
        config_file = explicit_config_path.unwrap_or("<defaults>"),
        store = config.store.kind(),
        "Starting audit expiration service"
    );

    let mut scheduler = match ExpirationScheduler::new(&config.expiration) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!(error = %e, "Invalid expiration configuration");
            std::process::exit(1);
        }
    };

    let audit_store = match store::create_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, store = config.store.kind(), "Failed to open audit store");
            std::process::exit(1);
        }
    };

    let expiry_store: Arc<dyn ExpiryStore> = audit_store;
    scheduler.start(expiry_store);

    shutdown_signal().await;

    tracing::info!("Shutdown signal received, waiting for expiration scheduler to stop...");
    scheduler.stop().await;

    let stats = scheduler.stats();
    tracing::info!(
        cycles_completed = stats.cycles_completed,
        cycles_failed = stats.cycles_failed,
        documents_deleted = stats.documents_deleted,
        "Expiration scheduler stopped"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
