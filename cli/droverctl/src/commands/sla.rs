//! SLA commands: job uptime queries and host safety analysis.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgGroup, Args, Subcommand};
use drover_id::{Cluster, JobKey};
use drover_sla::report::{self, ProbeRow, SafeHostRow};
use drover_sla::{Groupings, GROUP_BY_HOST};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_success, OutputFormat};
use crate::parse::{
    duration_secs, format_duration, parse_duration, parse_hosts, parse_percentage,
    parse_percentile, read_hosts_file, read_override_file,
};

use super::CommandContext;

/// Minimum instance count for list-safe-domain and probe-hosts.
const CLI_MIN_INSTANCE_COUNT: &str = "10";

/// SLA commands.
#[derive(Debug, Args)]
pub struct SlaCommand {
    #[command(subcommand)]
    command: SlaSubcommand,
}

#[derive(Debug, Subcommand)]
enum SlaSubcommand {
    /// Percentage of a job's instances up for at least each duration.
    GetTaskUpCount(TaskUpCountArgs),

    /// Uptime reached by each percentile of a job's instances.
    GetJobUptime(JobUptimeArgs),

    /// List hosts that can be taken down without violating any job SLA.
    ListSafeDomain(ListSafeDomainArgs),

    /// Predict the effect on every affected job of taking hosts down.
    ProbeHosts(ProbeHostsArgs),

    /// Fail unless all given hosts can be taken down together.
    CheckHosts(ProbeHostsArgs),
}

#[derive(Debug, Args)]
struct TaskUpCountArgs {
    /// Job key (cluster/role/env/name).
    job: JobKey,

    /// Comma-separated durations in XdYhZmWs form.
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_duration,
        default_values = ["1m", "10m", "1h", "12h", "7d"]
    )]
    durations: Vec<Duration>,
}

#[derive(Debug, Args)]
struct JobUptimeArgs {
    /// Job key (cluster/role/env/name).
    job: JobKey,

    /// Comma-separated percentiles, each in (0, 100).
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_percentile,
        default_values = ["99", "95", "90", "85", "75", "60", "50", "30", "10"]
    )]
    percentiles: Vec<f64>,
}

#[derive(Debug, Args)]
struct SlaTarget {
    /// Cluster to analyze.
    cluster: Cluster,

    /// Percentage of instances required to be up, in (0, 100].
    #[arg(value_parser = parse_percentage)]
    percentage: f64,

    /// How long instances must have been up, in XdYhZmWs form.
    #[arg(value_parser = parse_duration)]
    duration: Duration,

    /// Host grouping; a group is safe only if all its hosts can go down together.
    #[arg(long, default_value = GROUP_BY_HOST)]
    grouping: String,

    /// Ignore jobs with fewer instances.
    #[arg(long, default_value = CLI_MIN_INSTANCE_COUNT)]
    min_instance_count: usize,
}

#[derive(Debug, Args)]
struct ListSafeDomainArgs {
    #[command(flatten)]
    target: SlaTarget,

    /// Only consider jobs on these comma-separated hosts.
    #[arg(long, value_parser = parse_hosts, conflicts_with = "include_file")]
    include_hosts: Option<BTreeSet<String>>,

    /// Only consider jobs on the hosts in this file (one per line).
    #[arg(long)]
    include_file: Option<PathBuf>,

    /// Leave these comma-separated hosts out of the result.
    #[arg(long, value_parser = parse_hosts, conflicts_with = "exclude_file")]
    exclude_hosts: Option<BTreeSet<String>>,

    /// Leave the hosts in this file out of the result.
    #[arg(long)]
    exclude_file: Option<PathBuf>,

    /// Per-job SLA overrides: `cluster/role/env/job percentage duration` lines.
    #[arg(long)]
    override_file: Option<PathBuf>,

    /// Print every job on each safe host with the limit it was held to.
    #[arg(long)]
    list_jobs: bool,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("host_source").required(true).args(["hosts", "filename"])))]
struct ProbeHostsArgs {
    #[command(flatten)]
    target: SlaTarget,

    /// Comma-separated hosts to probe.
    #[arg(long, value_parser = parse_hosts)]
    hosts: Option<BTreeSet<String>>,

    /// File with hosts to probe (one per line).
    #[arg(long)]
    filename: Option<PathBuf>,
}

impl SlaCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            SlaSubcommand::GetTaskUpCount(args) => task_up_count(ctx, args).await,
            SlaSubcommand::GetJobUptime(args) => job_uptime(ctx, args).await,
            SlaSubcommand::ListSafeDomain(args) => list_safe_domain(ctx, args).await,
            SlaSubcommand::ProbeHosts(args) => probe_hosts(ctx, args).await,
            SlaSubcommand::CheckHosts(args) => check_hosts(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpCount {
    duration_secs: i64,
    percentage: f64,
}

#[derive(Tabled)]
struct UpCountRow {
    #[tabled(rename = "Duration")]
    duration: String,

    #[tabled(rename = "Tasks up")]
    percentage: String,
}

async fn task_up_count(ctx: CommandContext, args: TaskUpCountArgs) -> Result<()> {
    let vector = ctx
        .sla(&args.job.cluster)?
        .job_uptime_vector(&args.job)
        .await?;

    let counts: Vec<UpCount> = args
        .durations
        .iter()
        .map(|duration| {
            let secs = duration_secs(*duration);
            UpCount {
                duration_secs: secs,
                percentage: vector.task_up_count(secs, None),
            }
        })
        .collect();

    let rows: Vec<UpCountRow> = args
        .durations
        .iter()
        .zip(&counts)
        .map(|(duration, count)| UpCountRow {
            duration: format_duration(*duration),
            percentage: format!("{:.2} %", count.percentage),
        })
        .collect();

    print_output(&rows, &counts, ctx.format);
    Ok(())
}

#[derive(Debug, Serialize)]
struct JobUptime {
    percentile: f64,
    uptime_secs: i64,
}

#[derive(Tabled)]
struct JobUptimeRow {
    #[tabled(rename = "Percentile")]
    percentile: String,

    #[tabled(rename = "Uptime")]
    uptime: String,
}

async fn job_uptime(ctx: CommandContext, args: JobUptimeArgs) -> Result<()> {
    let vector = ctx
        .sla(&args.job.cluster)?
        .job_uptime_vector(&args.job)
        .await?;

    let uptimes = args
        .percentiles
        .iter()
        .map(|&percentile| -> Result<JobUptime> {
            Ok(JobUptime {
                percentile,
                uptime_secs: vector.job_uptime(percentile)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let rows: Vec<JobUptimeRow> = uptimes
        .iter()
        .map(|uptime| JobUptimeRow {
            percentile: format!("{} percentile", uptime.percentile),
            uptime: format_duration(Duration::from_secs(
                u64::try_from(uptime.uptime_secs).unwrap_or(0),
            )),
        })
        .collect();

    print_output(&rows, &uptimes, ctx.format);
    Ok(())
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host")]
    host: String,
}

#[derive(Tabled)]
struct SafeHostTableRow {
    #[tabled(rename = "Host")]
    host: String,

    #[tabled(rename = "Job")]
    job: String,

    #[tabled(rename = "Predicted SLA")]
    percentage: String,

    #[tabled(rename = "Duration (s)")]
    duration_secs: String,
}

impl From<&SafeHostRow> for SafeHostTableRow {
    fn from(row: &SafeHostRow) -> Self {
        Self {
            host: row.host.clone(),
            job: row.job.to_string(),
            percentage: format!("{:.2}", row.percentage),
            duration_secs: row.duration_secs.to_string(),
        }
    }
}

async fn list_safe_domain(ctx: CommandContext, args: ListSafeDomainArgs) -> Result<()> {
    let target = &args.target;
    let include = host_set(args.include_hosts, args.include_file.as_deref())?;
    let exclude = host_set(args.exclude_hosts, args.exclude_file.as_deref())?.unwrap_or_default();
    let overrides = match &args.override_file {
        Some(path) => read_override_file(path)?,
        None => Default::default(),
    };
    let grouping = Groupings::default().get(&target.grouping)?;

    let analyzer = ctx
        .sla(&target.cluster)?
        .domain_uptime_vector(&target.cluster, target.min_instance_count, include.as_ref())
        .await?;
    let groups = analyzer.safe_hosts(
        target.percentage,
        duration_secs(target.duration),
        &overrides,
        &grouping,
    )?;

    if args.list_jobs {
        let rows = report::safe_host_rows(&groups, &exclude);
        let table: Vec<SafeHostTableRow> = rows.iter().map(Into::into).collect();
        print_output(&table, &rows, ctx.format);
    } else {
        let hosts = report::safe_host_names(&groups, &exclude);
        let table: Vec<HostRow> = hosts.iter().map(|host| HostRow { host: host.clone() }).collect();
        print_output(&table, &hosts, ctx.format);
    }

    Ok(())
}

#[derive(Tabled)]
struct ProbeTableRow {
    #[tabled(rename = "Host")]
    host: String,

    #[tabled(rename = "Job")]
    job: String,

    #[tabled(rename = "Predicted SLA")]
    predicted: String,

    #[tabled(rename = "Safe?")]
    safe: String,

    #[tabled(rename = "Predicted safe in (s)")]
    safe_in: String,
}

impl From<&ProbeRow> for ProbeTableRow {
    fn from(row: &ProbeRow) -> Self {
        Self {
            host: row.host.clone(),
            job: row.job.to_string(),
            predicted: format!("{:.2}", row.predicted_percentage),
            safe: row.safe.to_string(),
            safe_in: row.safe_in(),
        }
    }
}

async fn probe_hosts(ctx: CommandContext, args: ProbeHostsArgs) -> Result<()> {
    let target = &args.target;
    let hosts = required_hosts(args.hosts, args.filename.as_deref())?;
    let grouping = Groupings::default().get(&target.grouping)?;

    let analyzer = ctx
        .sla(&target.cluster)?
        .domain_uptime_vector(&target.cluster, target.min_instance_count, Some(&hosts))
        .await?;
    let groups = analyzer.probe_hosts(target.percentage, duration_secs(target.duration), &grouping)?;

    let rows = report::probe_rows(&groups, false);
    let table: Vec<ProbeTableRow> = rows.iter().map(Into::into).collect();
    print_output(&table, &rows, ctx.format);
    Ok(())
}

async fn check_hosts(ctx: CommandContext, args: ProbeHostsArgs) -> Result<()> {
    let target = &args.target;
    let hosts = required_hosts(args.hosts, args.filename.as_deref())?;
    let grouping = Groupings::default().get(&target.grouping)?;

    let unsafe_hosts = ctx
        .sla(&target.cluster)?
        .check_hosts(
            &target.cluster,
            &hosts,
            target.percentage,
            duration_secs(target.duration),
            &grouping,
        )
        .await?;

    if unsafe_hosts.is_empty() {
        match ctx.format {
            OutputFormat::Json => print_output::<HostRow, _>(&[], &unsafe_hosts, ctx.format),
            OutputFormat::Table => print_success(&format!(
                "All {} host(s) can be taken down together",
                hosts.len()
            )),
        }
        return Ok(());
    }

    let table: Vec<HostRow> = unsafe_hosts
        .iter()
        .map(|host| HostRow { host: host.clone() })
        .collect();
    print_output(&table, &unsafe_hosts, ctx.format);

    Err(CliError::UnsafeHosts {
        count: unsafe_hosts.len(),
    }
    .into())
}

/// Hosts from an inline list or a file, whichever was given.
fn host_set(
    inline: Option<BTreeSet<String>>,
    file: Option<&std::path::Path>,
) -> Result<Option<BTreeSet<String>>> {
    match (inline, file) {
        (Some(hosts), _) => Ok(Some(hosts)),
        (None, Some(path)) => Ok(Some(read_hosts_file(path)?)),
        (None, None) => Ok(None),
    }
}

fn required_hosts(
    inline: Option<BTreeSet<String>>,
    file: Option<&std::path::Path>,
) -> Result<BTreeSet<String>> {
    host_set(inline, file)?.ok_or_else(|| anyhow::anyhow!("No hosts specified. Use --hosts or --filename."))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: SlaSubcommand,
    }

    fn parse(args: &[&str]) -> Result<SlaSubcommand, clap::Error> {
        TestCli::try_parse_from(std::iter::once("sla").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_task_up_count_defaults() {
        let SlaSubcommand::GetTaskUpCount(args) =
            parse(&["get-task-up-count", "west/r/prod/web"]).unwrap()
        else {
            panic!("wrong subcommand");
        };
        let secs: Vec<u64> = args.durations.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![60, 600, 3_600, 43_200, 604_800]);
    }

    #[test]
    fn test_job_uptime_rejects_100th_percentile() {
        assert!(parse(&["get-job-uptime", "west/r/prod/web", "--percentiles", "50,100"]).is_err());

        let SlaSubcommand::GetJobUptime(args) =
            parse(&["get-job-uptime", "west/r/prod/web", "--percentiles", "50,99.9"]).unwrap()
        else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.percentiles, vec![50.0, 99.9]);
    }

    #[test]
    fn test_list_safe_domain_args() {
        let SlaSubcommand::ListSafeDomain(args) = parse(&[
            "list-safe-domain",
            "west",
            "95",
            "30m",
            "--exclude-hosts",
            "h1,h2",
            "--list-jobs",
        ])
        .unwrap() else {
            panic!("wrong subcommand");
        };

        assert_eq!(args.target.cluster.as_str(), "west");
        assert_eq!(args.target.percentage, 95.0);
        assert_eq!(args.target.duration, Duration::from_secs(1_800));
        assert_eq!(args.target.grouping, GROUP_BY_HOST);
        assert_eq!(args.target.min_instance_count, 10);
        assert_eq!(args.exclude_hosts.unwrap().len(), 2);
        assert!(args.list_jobs);
    }

    #[test]
    fn test_list_safe_domain_rejects_conflicting_sources() {
        let result = parse(&[
            "list-safe-domain",
            "west",
            "95",
            "30m",
            "--include-hosts",
            "h1",
            "--include-file",
            "hosts.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_hosts_requires_hosts() {
        assert!(parse(&["probe-hosts", "west", "95", "30m"]).is_err());
        assert!(parse(&["probe-hosts", "west", "95", "30m", "--hosts", "h1"]).is_ok());
        assert!(parse(&["check-hosts", "west", "0", "30m", "--hosts", "h1"]).is_err());
    }

    #[test]
    fn test_host_set_prefers_inline() {
        let inline = BTreeSet::from(["h1".to_string()]);
        let hosts = host_set(Some(inline.clone()), Some(std::path::Path::new("missing")))
            .unwrap()
            .unwrap();
        assert_eq!(hosts, inline);
        assert!(host_set(None, None).unwrap().is_none());
        assert!(required_hosts(None, None).is_err());
    }
}
