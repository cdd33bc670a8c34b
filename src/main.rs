//! Permsync command-line entry point
//!
//! Exit codes: 0 success, 1 unexpected failure, 2 configuration error
//! (nothing applied), 3 rule apply failure (backend may be partially applied).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use permsync::common::config::PermsyncConfig;
use permsync::common::error::{Error, Result};
use permsync::common::types::SyncMode;
use permsync::compiler::{lint_assignments, lint_registry, PolicyRegistry};
use permsync::backend::{FileRoleStore, RoleAssignmentStore};
use permsync::{plan_from_config, SyncJob};

#[derive(Parser, Debug)]
#[command(name = "permsync")]
#[command(about = "Row-level permission compiler and synchronizer", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "permsync.toml", env = "PERMSYNC_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Authorization backend admin endpoint
    #[arg(long, env = "PERMSYNC_ENDPOINT")]
    endpoint: Option<String>,

    /// Authorization backend admin credential
    #[arg(long, env = "PERMSYNC_ADMIN_SECRET", hide_env_values = true)]
    admin_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and push rules to the authorization backend
    Sync {
        #[arg(long, value_enum, default_value_t = ModeArg::Create)]
        mode: ModeArg,
    },
    /// Compile and print the merged rules as JSON
    Plan,
    /// Report slots where an unconditional grant absorbs a restricted one
    Lint {
        /// Also lint per role using the configured role assignments
        #[arg(long)]
        with_roles: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Create,
    Drop,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Create => SyncMode::Create,
            ModeArg::Drop => SyncMode::Drop,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    match args.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

fn load_config(args: &Args) -> Result<PermsyncConfig> {
    let mut config = if args.config.exists() {
        PermsyncConfig::load(&args.config)?
    } else {
        info!("Using default configuration");
        PermsyncConfig::default()
    };

    if let Some(endpoint) = &args.endpoint {
        config.backend.endpoint = Some(endpoint.clone());
    }
    if let Some(secret) = &args.admin_secret {
        config.backend.admin_secret = Some(secret.clone());
    }

    Ok(config)
}

async fn execute(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    match &args.command {
        Command::Sync { mode } => {
            let job = SyncJob::from_config(config).await?;
            let summary = job.run((*mode).into()).await?;
            info!(
                applied = summary.report.applied,
                "All {} rules applied",
                summary.rules.len()
            );
        }
        Command::Plan => {
            let plan = plan_from_config(&config).await?;
            println!("{}", serde_json::to_string_pretty(&plan.rules)?);
        }
        Command::Lint { with_roles } => {
            let registry = PolicyRegistry::load(&config.sources.registry_path)?;
            let mut findings = lint_registry(&registry);
            if *with_roles {
                let assignments = FileRoleStore::new(&config.sources.roles_path)
                    .fetch_assignments()
                    .await?;
                findings.extend(lint_assignments(&registry, &assignments)?);
            }

            for finding in &findings {
                println!("{finding}");
            }
            info!(findings = findings.len(), "Lint finished");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    info!("permsync v{}", env!("CARGO_PKG_VERSION"));

    match execute(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn report_error(e: &Error) {
    if e.is_configuration() {
        error!(code = e.error_code(), "Configuration error, nothing applied: {}", e);
    } else if e.is_apply() {
        error!(code = e.error_code(), "Sync failed, backend may be partially applied: {}", e);
    } else {
        error!(code = e.error_code(), "Run failed: {}", e);
    }
}
