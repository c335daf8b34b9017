//! Job commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use drover_id::{parse_instances, InstanceId, JobKey};
use drover_rollout::{
    RestartOutcome, RestartReport, RestartSettings, Restarter, StatusWatcher, DEFAULT_BATCH_SIZE,
};
use drover_tasks::SystemClock;
use tokio::sync::watch;
use tracing::warn;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, print_warning, OutputFormat};
use crate::parse::{format_duration, parse_duration};

use super::CommandContext;

/// Job commands.
#[derive(Debug, Args)]
pub struct JobCommand {
    #[command(subcommand)]
    command: JobSubcommand,
}

#[derive(Debug, Subcommand)]
enum JobSubcommand {
    /// Restart a job's instances in batches, watching each batch until healthy.
    Restart(RestartArgs),
}

#[derive(Debug, Args)]
struct RestartArgs {
    /// Job key (cluster/role/env/name).
    job: JobKey,

    /// Instances to restart, e.g. `0-3,7`. Defaults to every active instance.
    #[arg(long)]
    instances: Option<String>,

    /// Instances restarted per batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Time an instance has to reach RUNNING after a restart.
    #[arg(long, value_parser = parse_duration, default_value = "1m")]
    restart_threshold: Duration,

    /// Time an instance must stay RUNNING to count as healthy.
    #[arg(long, value_parser = parse_duration, default_value = "45s")]
    watch_duration: Duration,

    /// Interval between health polls.
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    health_check_interval: Duration,

    /// Failures tolerated per instance before aborting.
    #[arg(long, default_value_t = 0)]
    max_per_instance_failures: u32,

    /// Failures tolerated across the whole restart before aborting.
    #[arg(long, default_value_t = 0)]
    max_total_failures: u32,
}

impl RestartArgs {
    fn settings(&self) -> RestartSettings {
        RestartSettings {
            batch_size: self.batch_size,
            restart_threshold: self.restart_threshold,
            watch_duration: self.watch_duration,
            health_check_interval: self.health_check_interval,
            max_per_instance_failures: self.max_per_instance_failures,
            max_total_failures: self.max_total_failures,
        }
    }

    fn instance_list(&self) -> Result<Vec<InstanceId>> {
        match &self.instances {
            Some(list) => Ok(parse_instances(list)?),
            None => Ok(Vec::new()),
        }
    }
}

impl JobCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            JobSubcommand::Restart(args) => restart(ctx, args).await,
        }
    }
}

async fn restart(ctx: CommandContext, args: RestartArgs) -> Result<()> {
    let settings = args.settings();
    let instances = args.instance_list()?;
    let scheduler = Arc::new(ctx.scheduler(&args.job.cluster)?);
    let watcher = Arc::new(StatusWatcher::new(
        Arc::clone(&scheduler),
        Arc::new(SystemClock),
        &settings,
    ));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let restarter = Restarter::new(
        args.job.clone(),
        settings.clone(),
        Arc::clone(&scheduler),
        Arc::clone(&watcher),
    )?
    .with_cancel(cancel_rx);

    let interrupt = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current batch");
                cancel_tx.send_replace(true);
                watcher.terminate();
            }
        })
    };

    if ctx.format == OutputFormat::Table {
        print_info(&format!(
            "Restarting {} in batches of {} (watch {}, threshold {})",
            args.job,
            settings.batch_size,
            format_duration(settings.watch_duration),
            format_duration(settings.restart_threshold),
        ));
    }

    let result = restarter.restart(&instances).await;
    interrupt.abort();
    let report = result?;

    print_report(&args.job, &report, ctx.format);

    if report.outcome.is_success() {
        Ok(())
    } else {
        Err(CliError::RestartIncomplete(report.outcome.to_string()).into())
    }
}

fn print_report(job: &JobKey, report: &RestartReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_single(report),
        OutputFormat::Table => {
            match report.outcome {
                RestartOutcome::Done => {
                    print_success(&format!("Restarted {} in {} batch(es)", job, report.batches))
                }
                RestartOutcome::RpcFailed => print_warning(&format!(
                    "Restart of {} failed: {} {}",
                    job,
                    report.response.code,
                    report.response.message()
                )),
                RestartOutcome::Aborted | RestartOutcome::Cancelled => print_warning(&format!(
                    "Restart of {} {} after {} batch(es)",
                    job, report.outcome, report.batches
                )),
            }

            if report.total_failures > 0 {
                print_info(&format!("Failures: {}", report.total_failures));
            }
            if !report.pending.is_empty() {
                let pending: Vec<String> = report.pending.iter().map(ToString::to_string).collect();
                print_info(&format!("Pending instances: {}", pending.join(",")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: JobSubcommand,
    }

    fn parse_restart(args: &[&str]) -> Result<RestartArgs, clap::Error> {
        TestCli::try_parse_from(
            ["job", "restart", "west/www-data/prod/hello"]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .map(|cli| match cli.command {
            JobSubcommand::Restart(args) => args,
        })
    }

    #[test]
    fn test_restart_defaults_match_settings() {
        let args = parse_restart(&[]).unwrap();
        assert_eq!(args.settings(), RestartSettings::default());
        assert!(args.instance_list().unwrap().is_empty());
    }

    #[test]
    fn test_restart_flags() {
        let args = parse_restart(&[
            "--instances",
            "0-3,7",
            "--batch-size",
            "2",
            "--watch-duration",
            "1m30s",
            "--max-total-failures",
            "3",
        ])
        .unwrap();

        let instances: Vec<u32> = args
            .instance_list()
            .unwrap()
            .into_iter()
            .map(u32::from)
            .collect();
        assert_eq!(instances, vec![0, 1, 2, 3, 7]);

        let settings = args.settings();
        assert_eq!(settings.batch_size, 2);
        assert_eq!(settings.watch_duration, Duration::from_secs(90));
        assert_eq!(settings.max_total_failures, 3);
    }

    #[test]
    fn test_restart_rejects_bad_instances() {
        let args = parse_restart(&["--instances", "3-1"]).unwrap();
        assert!(args.instance_list().is_err());
    }

    #[test]
    fn test_zero_batch_size_fails_validation() {
        let args = parse_restart(&["--batch-size", "0"]).unwrap();
        assert!(args.settings().validate().is_err());
    }
}
