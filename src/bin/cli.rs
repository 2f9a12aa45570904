//! CLI for zone sharding operations

use anyhow::Context;
use atlas_zones::common::config::redact_uri;
use atlas_zones::menu::Menu;
use atlas_zones::ops::{
    cleanup_cluster, cluster_info, populate_cluster, test_connection, verify_placement,
    zone_status, ZoneShardingManager,
};
use atlas_zones::{ClusterAdmin, Config, InMemoryCluster, MongoCluster};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "atlas-zones")]
#[command(about = "Zone sharding setup and demo for MongoDB Atlas")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./atlas-zones.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Connection string, overrides the config file
    #[arg(long, env = "MONGODB_URI", global = true, hide_env_values = true)]
    uri: Option<String>,

    /// Run against an in-memory cluster and list the commands sent
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Configure zones, shard tenant collections and pin zone ranges
    Setup,

    /// Insert demo data into every zone database
    Populate,

    /// Show configured zones and their shards
    Status,

    /// Count zone data and check shard placement
    Verify,

    /// Remove zone ranges, zone memberships and demo databases
    Cleanup {
        /// Confirm the cleanup
        #[arg(long)]
        yes: bool,
    },

    /// Test the connection
    Ping,

    /// Show shards and databases
    Info,

    /// Setup, populate, status and verify in one go
    Demo,

    /// Print the effective configuration
    ShowConfig,
}

enum Backend {
    Live(MongoCluster),
    DryRun(InMemoryCluster),
}

impl Backend {
    async fn open(config: &Config, dry_run: bool) -> anyhow::Result<Self> {
        if dry_run {
            tracing::info!("Dry run: using in-memory cluster");
            return Ok(Backend::DryRun(InMemoryCluster::atlas_like()));
        }
        let cluster = MongoCluster::connect(config)
            .await
            .context("failed to create cluster client")?;
        Ok(Backend::Live(cluster))
    }

    fn admin(&self) -> &dyn ClusterAdmin {
        match self {
            Backend::Live(c) => c,
            Backend::DryRun(c) => c,
        }
    }

    async fn close(self, json: bool) {
        match self {
            Backend::Live(c) => c.shutdown().await,
            Backend::DryRun(c) if !json => {
                let commands = c.commands();
                println!("\nDry run: {} admin command(s) recorded", commands.len());
                for command in commands {
                    println!("  {}", command);
                }
            }
            Backend::DryRun(_) => {}
        }
    }
}

fn emit<T: Serialize + Display>(report: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

/// Effective configuration with credentials masked
fn show_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    shown.uri = redact_uri(&shown.uri);
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(uri) = cli.uri {
        config.uri = uri;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(build = atlas_zones::BUILD_INFO, "Starting");

    let command = cli.command.unwrap_or(Commands::Menu);

    if let Commands::ShowConfig = command {
        return show_config(&config);
    }
    if let Commands::Cleanup { yes: false } = command {
        anyhow::bail!("cleanup drops the demo databases; pass --yes to confirm");
    }

    let backend = Backend::open(&config, cli.dry_run).await?;
    let cluster = backend.admin();

    let result = run(cluster, &config, command, cli.json).await;
    backend.close(cli.json).await;
    result
}

async fn run(
    cluster: &dyn ClusterAdmin,
    config: &Config,
    command: Commands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Menu => {
            let stdin = std::io::stdin();
            let mut menu = Menu::new(cluster, config, stdin.lock(), std::io::stdout());
            menu.run().await?;
        }

        Commands::Setup => {
            let report = ZoneShardingManager::new(cluster, config).setup().await?;
            emit(&report, json)?;
            if !report.is_success() {
                anyhow::bail!("{} setup step(s) failed", report.failures());
            }
        }

        Commands::Populate => {
            let report = populate_cluster(cluster, config).await?;
            emit(&report, json)?;
        }

        Commands::Status => {
            let report = zone_status(cluster, config).await?;
            emit(&report, json)?;
        }

        Commands::Verify => {
            let report = verify_placement(cluster, config).await?;
            emit(&report, json)?;
        }

        Commands::Cleanup { .. } => {
            let report = cleanup_cluster(cluster, config).await?;
            emit(&report, json)?;
            if report.failures() > 0 {
                anyhow::bail!("{} cleanup step(s) failed", report.failures());
            }
        }

        Commands::Ping => {
            let report = test_connection(cluster).await?;
            emit(&report, json)?;
        }

        Commands::Info => {
            let report = cluster_info(cluster).await?;
            emit(&report, json)?;
        }

        Commands::Demo => {
            let setup = ZoneShardingManager::new(cluster, config).setup().await?;
            let populated = populate_cluster(cluster, config).await?;
            let status = zone_status(cluster, config).await?;
            let verified = verify_placement(cluster, config).await?;
            if json {
                let all = serde_json::json!({
                    "setup": setup,
                    "populate": populated,
                    "status": status,
                    "verify": verified,
                });
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                println!("{}\n\n{}\n\n{}\n\n{}", setup, populated, status, verified);
            }
        }

        Commands::ShowConfig => show_config(config)?,
    }

    Ok(())
}
