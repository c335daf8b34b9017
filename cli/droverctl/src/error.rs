//! Error handling and display for the CLI.

use colored::Colorize;
use drover_tasks::{ResponseCode, SchedulerError};
use drover_sla::SlaError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No scheduler configured for cluster '{0}'")]
    UnknownCluster(String),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{count} host(s) are not safe to take down")]
    UnsafeHosts { count: usize },

    #[error("Rolling restart ended with outcome '{0}'")]
    RestartIncomplete(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", hint.yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<String> {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            match cli_err {
                CliError::UnknownCluster(cluster) => {
                    return Some(format!(
                        "Hint: Run `drover config set-cluster {cluster} <URL>` or pass --api-url."
                    ));
                }
                CliError::Network(_) => {
                    return Some(
                        "Hint: Check your network connection and the scheduler API URL."
                            .to_string(),
                    );
                }
                CliError::UnsafeHosts { .. } => {
                    return Some(
                        "Hint: Run `drover sla probe-hosts` for per-job details.".to_string(),
                    );
                }
                _ => {}
            }
        }

        let scheduler_err = cause.downcast_ref::<SchedulerError>().or_else(|| {
            match cause.downcast_ref::<SlaError>() {
                Some(SlaError::Scheduler(e)) => Some(e),
                _ => None,
            }
        });
        if let Some(e) = scheduler_err {
            return scheduler_hint(e);
        }
    }
    None
}

fn scheduler_hint(err: &SchedulerError) -> Option<String> {
    match err {
        SchedulerError::Transport(_) => Some(
            "Hint: Check your network connection and the scheduler API URL.".to_string(),
        ),
        SchedulerError::Response(response) => match response.code {
            ResponseCode::AuthFailed => {
                Some("Hint: You may not have permission for this operation.".to_string())
            }
            ResponseCode::LockError => {
                Some("Hint: The job is locked by another operation.".to_string())
            }
            ResponseCode::ErrorTransient => {
                Some("Hint: The scheduler reported a transient error; retry.".to_string())
            }
            _ => None,
        },
        SchedulerError::Decode(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use drover_tasks::RpcResponse;

    use super::*;

    #[test]
    fn test_hint_for_unknown_cluster() {
        let err = anyhow::Error::new(CliError::UnknownCluster("west".to_string()));
        assert!(hint(&err).unwrap().contains("set-cluster west"));
    }

    #[test]
    fn test_hint_looks_through_sla_errors() {
        let err = anyhow::Error::new(SlaError::Scheduler(SchedulerError::Response(
            RpcResponse::new(ResponseCode::AuthFailed, "denied"),
        )));
        assert!(hint(&err).unwrap().contains("permission"));
    }

    #[test]
    fn test_hint_follows_context_chain() {
        let err = anyhow::Error::new(SchedulerError::Transport("refused".to_string()))
            .context("failed to fetch tasks");
        assert!(hint(&err).unwrap().contains("network"));
    }

    #[test]
    fn test_no_hint_for_decode_error() {
        let err = anyhow::Error::new(SchedulerError::Decode("bad json".to_string()));
        assert!(hint(&err).is_none());
    }
}
