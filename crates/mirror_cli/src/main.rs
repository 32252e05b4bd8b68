//! Catalog mirror CLI
//!
//! Mirrors the upstream catalog into a local SQLite file and browses it.
//!
//! # Commands
//!
//! - `sync` - Pull new and changed records for some or all resources
//! - `overview` - Row counts and watermarks per resource
//! - `search` - Newest or matching records of one resource
//! - `show` - One stored record
//! - `resources` - The resource catalog
//! - `analytics` - Inventory KPIs, for one product or the whole mirror
//! - `serve` - HTTP panel with a sync trigger
//!
//! Exit codes: 0 on success, 1 if a resource failed or the run was aborted,
//! 2 on configuration errors.

mod commands;
mod error;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use commands::{ApiArgs, OutputFormat};
use error::{CliError, CliResult, EXIT_FAILED, EXIT_OK};
use mirror_catalog::Registry;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Incremental mirror of the upstream catalog into SQLite.
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite mirror
    #[arg(global = true, short = 'd', long, env = "INVENTORY_DB_PATH", default_value = "data/inventory.db")]
    db_path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Log filter directive (falls back to RUST_LOG, then info)
    #[arg(global = true, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Also append logs to this file
    #[arg(global = true, long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull new and changed records from the upstream API
    Sync {
        /// Resource to sync; repeat for several (default: all)
        #[arg(short, long = "resource", value_name = "NAME")]
        resources: Vec<String>,

        /// Ignore stored watermarks and fetch everything
        #[arg(long)]
        full_refresh: bool,

        /// Fetch records modified at or after this time
        #[arg(long, value_parser = commands::sync::parse_since)]
        since: Option<DateTime<Utc>>,

        #[command(flatten)]
        api: ApiArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show row counts and watermarks per resource
    Overview {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the newest records of a resource, or those matching a query
    Search {
        /// Resource name
        resource: String,

        /// Id or payload fragment
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of records (1-100)
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one stored record
    Show {
        /// Resource name
        resource: String,

        /// Record id
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Compute inventory KPIs for one product or the whole mirror
    Analytics {
        /// SKU, base code or internal id (default: full inventory report)
        #[arg(short, long)]
        product: Option<String>,

        #[command(flatten)]
        report: commands::analytics::ReportArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the resource catalog
    Resources {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Serve the HTTP panel
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "MIRROR_BIND_ADDR", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("error: {e}");
        return ExitCode::from(e.exit_code());
    }

    match dispatch(cli) {
        Ok(true) => ExitCode::from(EXIT_OK),
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Runs the selected command; `Ok(false)` means it completed with failures.
fn dispatch(cli: Cli) -> CliResult<bool> {
    let mut stdout = std::io::stdout().lock();
    let registry = Registry::builtin();

    match cli.command {
        Commands::Sync {
            resources,
            full_refresh,
            since,
            api,
            format,
        } => {
            let options = commands::sync::build_options(&registry, resources, since, full_refresh)?;
            commands::sync::run(&cli.db_path, &api, options, format, &mut stdout)
        }
        Commands::Overview { format } => {
            let store = commands::open_store(&cli.db_path, &registry)?;
            commands::overview::run(&store, &registry, format, &mut stdout)?;
            Ok(true)
        }
        Commands::Search {
            resource,
            query,
            limit,
            format,
        } => {
            let store = commands::open_store(&cli.db_path, &registry)?;
            commands::search::run_search(
                &store,
                &registry,
                &resource,
                query.as_deref(),
                limit,
                format,
                &mut stdout,
            )?;
            Ok(true)
        }
        Commands::Show {
            resource,
            id,
            format,
        } => {
            let store = commands::open_store(&cli.db_path, &registry)?;
            commands::search::run_show(&store, &registry, &resource, &id, format, &mut stdout)?;
            Ok(true)
        }
        Commands::Analytics {
            product,
            report,
            format,
        } => {
            let store = commands::open_store(&cli.db_path, &registry)?;
            commands::analytics::run(
                &store,
                &registry,
                product.as_deref(),
                &report,
                format,
                &mut stdout,
            )?;
            Ok(true)
        }
        Commands::Resources { format } => {
            commands::resources::run(&registry, format, &mut stdout)?;
            Ok(true)
        }
        Commands::Serve { bind, api } => {
            drop(stdout);
            commands::serve::run(&cli.db_path, &api, bind)?;
            Ok(true)
        }
        Commands::Version => {
            use std::io::Write;
            writeln!(stdout, "mirror v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(stdout, "{} resources registered", registry.len())?;
            Ok(true)
        }
    }
}

fn log_filter(cli: &Cli) -> CliResult<EnvFilter> {
    if cli.verbose {
        return Ok(EnvFilter::new("debug"));
    }
    match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| CliError::InvalidArgument(format!("LOG_LEVEL {level:?}: {e}"))),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

fn init_logging(cli: &Cli) -> CliResult<()> {
    let filter = log_filter(cli)?;

    let file_layer = match &cli.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> CliResult<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
