//! AWS Inventory Agent
//!
//! Consolidates the multi-account DNS / load balancer / network ACL
//! inventory scripts into one run: enumerate every configured account and
//! region, correlate DNS records with the load balancers they point at,
//! and export flat CSVs.
//!
//! # Usage
//! ```bash
//! # Full run with defaults (aws_accounts.json, aws-region-names.json)
//! aws-inventory-agent
//!
//! # Force one CLI profile for every account
//! aws-inventory-agent -p security-ro
//!
//! # Echo exported DNS rows as they are written
//! aws-inventory-agent --stdout
//! ```
//!
//! Input file locations come from the environment (`INVENTORY_ACCOUNTS`,
//! `INVENTORY_REGIONS`, `INVENTORY_DOMAINS`, `INVENTORY_OUTPUT_DIR`) with
//! defaults matching the original script conventions.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aws_inventory_agent::aws::AwsCli;
use aws_inventory_agent::config::{self, DomainAllowList};
use aws_inventory_agent::workflow::{OutputPaths, Workflow};

#[derive(Parser, Debug)]
#[command(
    name = "aws-inventory-agent",
    version,
    about = "Multi-account AWS DNS / load balancer / network ACL inventory"
)]
struct Cli {
    /// AWS CLI profile to use for every account (default: one profile per
    /// account, named after the account)
    #[arg(short, long, env = "INVENTORY_PROFILE")]
    profile: Option<String>,

    /// Echo exported DNS rows to stdout as they are written
    #[arg(long = "stdout")]
    stdout: bool,
}

fn env_path(var: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(var).unwrap_or_else(|_| default.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    info!("AWS Inventory Agent starting");

    let accounts_path = env_path("INVENTORY_ACCOUNTS", "aws_accounts.json");
    let regions_path = env_path("INVENTORY_REGIONS", "aws-region-names.json");
    let domains_path = env_path("INVENTORY_DOMAINS", "reference_domains.csv");
    let output_dir = env_path("INVENTORY_OUTPUT_DIR", ".");

    // A bad or missing account/region file is fatal; there is no
    // partial-configuration recovery.
    let accounts = config::load_accounts(&accounts_path)
        .with_context(|| format!("loading account directory {}", accounts_path.display()))?;
    let regions = config::load_regions(&regions_path)
        .with_context(|| format!("loading region list {}", regions_path.display()))?;

    let api = Arc::new(AwsCli::new());
    let mut workflow = Workflow::new(api, accounts, regions)
        .with_profile_override(cli.profile)
        .with_stdout_echo(cli.stdout);

    // The reference domain list is optional; the zone matching procedure
    // only runs when it is present.
    if domains_path.exists() {
        let exclusion = env::var("INVENTORY_EXCLUDE_DOMAIN")
            .unwrap_or_else(|_| DomainAllowList::DEFAULT_EXCLUSION.to_string());
        let allow_list = DomainAllowList::load(&domains_path, &exclusion)
            .with_context(|| format!("loading reference domains {}", domains_path.display()))?;
        workflow = workflow.with_allow_list(allow_list);
    }

    // A console interrupt stops scheduling new units; in-flight work
    // finishes and every sink is flushed before we exit cleanly.
    let shutdown = workflow.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight work");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let outputs = OutputPaths::in_dir(&output_dir);
    let summary = workflow.run(&outputs).await?;

    info!("run complete");
    println!("{summary}");

    Ok(())
}
