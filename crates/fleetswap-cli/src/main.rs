//! Fleetswap - blue/green fleet deployments
//!
//! Usage:
//!   fleetswap deploy <env>     # Stand up a new QA fleet
//!   fleetswap confirm <env>    # Promote QA to production
//!   fleetswap abort <env>      # Tear down the QA fleet
//!   fleetswap logging <env>    # Provision the logging instance only
//!   fleetswap status <env>     # Show the role map

mod banner;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetswap_core::config::ConfigStore;
use fleetswap_core::context::AppContext;
use fleetswap_core::lifecycle::{EnvironmentStatus, Lifecycle};
use fleetswap_core::provisioner::logging::LoggingOutcome;

#[derive(Parser)]
#[command(name = "fleetswap")]
#[command(about = "Blue/green deploys of auto-scaled fleets", long_about = None)]
struct Cli {
    /// Path to fleetswap.toml (defaults to ./fleetswap.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the role ledger and environment locks
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stand up a new fleet in QA next to the live one
    Deploy {
        /// Environment to deploy to
        environment: String,
    },

    /// Put the QA fleet into production and retire the previous one
    Confirm {
        /// Environment to confirm
        environment: String,
    },

    /// Tear down the QA fleet
    Abort {
        /// Environment to abort
        environment: String,
    },

    /// Publish bootstrap files and make sure the logging instance runs
    Logging {
        /// Environment whose settings are used
        environment: String,
    },

    /// Show which fleet holds which role
    Status {
        /// Environment to inspect
        environment: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetswap=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = match cli.config {
        Some(path) => ConfigStore::from_path(path),
        None => ConfigStore::from_current_dir()?,
    };
    let ctx = AppContext::load(store, cli.state_dir)?;
    debug!(
        config = %ctx.config_path().display(),
        state_dir = %ctx.state_dir().display(),
        project = %ctx.config().project,
        "configuration loaded"
    );

    match cli.command {
        Commands::Deploy { environment } => run_deploy(&ctx, &environment).await,
        Commands::Confirm { environment } => run_confirm(&ctx, &environment).await,
        Commands::Abort { environment } => run_abort(&ctx, &environment).await,
        Commands::Logging { environment } => run_logging(&ctx, &environment).await,
        Commands::Status {
            environment,
            format,
        } => run_status(&ctx, &environment, format).await,
    }
}

async fn open(ctx: &AppContext, environment: &str) -> Result<Lifecycle> {
    let env = ctx.environment(environment)?;
    let lifecycle = ctx.lifecycle(ctx.aws_cloud(&env), environment).await;
    fail_with(lifecycle, "Could not open environment")
}

/// Print a failure banner for `result` before handing the error to `main`.
fn fail_with<T>(result: fleetswap_core::error::Result<T>, headline: &str) -> Result<T> {
    result.map_err(|e| {
        banner::failure(&format!("{headline}: {e}"));
        e.into()
    })
}

async fn run_deploy(ctx: &AppContext, environment: &str) -> Result<()> {
    banner::status(&format!("Deploying to {environment}"));
    let mut lifecycle = open(ctx, environment).await?;
    let report = fail_with(lifecycle.deploy().await, "Deploy failed")?;

    banner::success(&format!("Deployed {} to QA", report.fleet));
    banner::detail("instances", report.instances.join(", "));
    for binding in &report.qa_bindings {
        banner::detail(
            &format!("qa slot {}", binding.slot),
            format!("{} -> {}", binding.names.join(", "), binding.address),
        );
    }
    for (instance, address) in &report.elastic_addresses {
        banner::detail("elastic address", format!("{instance} -> {address}"));
    }
    print_logging(&report.logging);
    Ok(())
}

async fn run_confirm(ctx: &AppContext, environment: &str) -> Result<()> {
    banner::status(&format!("Confirming deploy in {environment}"));
    let mut lifecycle = open(ctx, environment).await?;
    let report = fail_with(lifecycle.confirm().await, "Confirm failed")?;

    banner::success(&format!("{} is live in {environment}", report.active));
    banner::detail(
        "load balancer",
        &lifecycle.environment().load_balancer_name,
    );
    if let Some(replaced) = &report.replaced {
        banner::detail("replaced", replaced);
    }
    if !report.deleted.is_empty() {
        banner::detail("deleted", report.deleted.join(", "));
    }
    Ok(())
}

async fn run_abort(ctx: &AppContext, environment: &str) -> Result<()> {
    banner::status(&format!("Aborting QA deploy in {environment}"));
    let mut lifecycle = open(ctx, environment).await?;
    let report = fail_with(lifecycle.abort().await, "Abort failed")?;

    match &report.fleet {
        Some(fleet) => banner::success(&format!("Removed QA fleet {fleet}")),
        None => banner::success("Finished deleting the Old fleet"),
    }
    if !report.deleted.is_empty() {
        banner::detail("deleted", report.deleted.join(", "));
    }
    Ok(())
}

async fn run_logging(ctx: &AppContext, environment: &str) -> Result<()> {
    banner::status("Provisioning logging instance");
    let lifecycle = open(ctx, environment).await?;
    let report = fail_with(lifecycle.provision_logging().await, "Logging failed")?;

    banner::success("Logging instance ready");
    for key in &report.bootstrap_keys {
        banner::detail("bootstrap", key);
    }
    print_logging(&report.outcome);
    Ok(())
}

async fn run_status(ctx: &AppContext, environment: &str, format: OutputFormat) -> Result<()> {
    let lifecycle = open(ctx, environment).await?;
    let status = fail_with(lifecycle.status().await, "Status failed")?;

    match format {
        OutputFormat::Table => print_status_table(&status),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}

fn print_logging(outcome: &LoggingOutcome) {
    match outcome {
        LoggingOutcome::Disabled => {}
        LoggingOutcome::AlreadyRunning { instance } => {
            banner::detail("logging", format!("{instance} (already running)"));
        }
        LoggingOutcome::Provisioned { instance, volume } => {
            banner::detail("logging", format!("{instance} with volume {volume}"));
        }
    }
}

fn print_status_table(status: &EnvironmentStatus) {
    println!(
        "Environment: {} (load balancer {})",
        status.environment, status.load_balancer
    );
    println!();

    if status.fleets.is_empty() {
        println!("No fleets recorded.");
        println!("Create one with: fleetswap deploy {}", status.environment);
        return;
    }

    println!(
        "  {:<10} {:<32} {:<10} {:<12} Assigned",
        "Role", "Fleet", "Instances", "Min/Des/Max"
    );
    println!("  {}", "-".repeat(86));
    for fleet in &status.fleets {
        let name = if fleet.exists {
            fleet.fleet.clone()
        } else {
            format!("{} (missing)", fleet.fleet)
        };
        println!(
            "  {:<10} {:<32} {:<10} {:<12} {}",
            fleet.role.to_string(),
            name,
            fleet.instances.len(),
            format!(
                "{}/{}/{}",
                fleet.min_size, fleet.desired_capacity, fleet.max_size
            ),
            fleet.assigned_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !fleet.suspended_processes.is_empty() {
            println!(
                "  {:<10} suspended: {}",
                "",
                fleet.suspended_processes.join(", ")
            );
        }
    }
}
