//! Config commands (cluster registry).

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Show or edit the cluster registry.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Show configured clusters.
    Show,

    /// Add or replace a cluster's scheduler API URL.
    SetCluster(SetClusterArgs),

    /// Remove a cluster.
    RemoveCluster(RemoveClusterArgs),
}

#[derive(Debug, Args)]
struct SetClusterArgs {
    /// Cluster name.
    name: String,

    /// Scheduler API URL, e.g. http://scheduler.west:8081.
    api_url: String,
}

#[derive(Debug, Args)]
struct RemoveClusterArgs {
    /// Cluster name.
    name: String,
}

#[derive(Debug, Serialize, Tabled)]
struct ClusterRow {
    #[tabled(rename = "Cluster")]
    name: String,

    #[tabled(rename = "API URL")]
    api_url: String,
}

impl ConfigCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ConfigSubcommand::Show => show(ctx),
            ConfigSubcommand::SetCluster(args) => set_cluster(ctx, args),
            ConfigSubcommand::RemoveCluster(args) => remove_cluster(ctx, args),
        }
    }
}

fn show(ctx: CommandContext) -> Result<()> {
    let rows: Vec<ClusterRow> = ctx
        .config
        .clusters
        .iter()
        .map(|(name, cluster)| ClusterRow {
            name: name.to_string(),
            api_url: cluster.api_url.clone(),
        })
        .collect();

    print_output(&rows, &rows, ctx.format);
    Ok(())
}

fn set_cluster(mut ctx: CommandContext, args: SetClusterArgs) -> Result<()> {
    reqwest::Url::parse(&args.api_url)
        .map_err(|e| anyhow::anyhow!("Invalid API URL '{}': {}", args.api_url, e))?;

    let previous = ctx.config.clusters.insert(&args.name, &args.api_url);
    let path = ctx.config.save()?;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({
            "cluster": args.name,
            "api_url": args.api_url,
            "replaced": previous.is_some(),
        })),
        OutputFormat::Table => print_success(&format!(
            "Cluster '{}' now uses {} (saved to {})",
            args.name,
            args.api_url,
            path.display()
        )),
    }

    Ok(())
}

fn remove_cluster(mut ctx: CommandContext, args: RemoveClusterArgs) -> Result<()> {
    if ctx.config.clusters.remove(&args.name).is_none() {
        return Err(CliError::UnknownCluster(args.name).into());
    }
    ctx.config.save()?;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "removed": args.name })),
        OutputFormat::Table => print_success(&format!("Removed cluster '{}'", args.name)),
    }

    Ok(())
}
