//! relayd - run engine operations and relay engine events from the shell.
//!
//! Configuration comes from the environment (`DOCKER_HOST`,
//! `DOCKER_API_VERSION`, `JOB_STORE`, ...); see `api::RuntimeConfig`.

use std::time::Duration;

use actors::{OperationRegistry, ParamKind};
use api::{Runtime, RuntimeConfig, SubmitRequest, init_runtime, job_status, submit_job};
use clap::{Parser, Subcommand};
use engine::EventFilters;
use ops_core::{BusMessage, Topic};
use relay::{Broadcaster, RunState};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relayd")]
#[command(about = "Container engine operation runner and event relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay engine events until Ctrl+C, printing each one
    ListenEvents {
        /// Event filter (key=value pairs, repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
        filters: Vec<String>,
    },
    /// Follow a container's log output until Ctrl+C
    TailLogs {
        container_id: String,
    },
    /// Submit an operation and wait for its result
    Run {
        operation: String,
        /// Positional parameters; each is parsed as JSON, falling back to a
        /// plain string
        params: Vec<String>,
        /// Callback token; the job then publishes its notification
        #[arg(long)]
        callback: Option<String>,
        /// Give up waiting after this many seconds
        #[arg(long, default_value = "120")]
        wait_secs: u64,
    },
    /// List supported operations
    Operations,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Operations => {
            for spec in OperationRegistry::new().specs() {
                println!("{}", spec.signature());
            }
        }
        Commands::ListenEvents { filters } => {
            let filters = EventFilters::from_pairs(filters.iter().map(String::as_str))
                .map_err(|pair| format!("Invalid filter {:?}, expected key=value", pair))?;
            let runtime = runtime(0).await?;
            let broadcaster = runtime.broadcaster();
            let root = Topic::public(&runtime.config().relay.root_topic);
            let printer = print_messages(runtime.bus.subscribe(&root));

            let state = relay_until_ctrl_c(&broadcaster, broadcaster.start(filters)).await;
            printer.abort();
            runtime.shutdown().await?;
            report(state?);
        }
        Commands::TailLogs { container_id } => {
            let runtime = runtime(0).await?;
            let broadcaster = runtime.broadcaster();
            let topic = runtime
                .config()
                .relay
                .topics()
                .container_logs(&container_id);
            let printer = print_log_text(runtime.bus.subscribe(&topic));

            let state =
                relay_until_ctrl_c(&broadcaster, broadcaster.start_container_logs(&container_id))
                    .await;
            printer.abort();
            runtime.shutdown().await?;
            report(state?);
        }
        Commands::Run {
            operation,
            params,
            callback,
            wait_secs,
        } => {
            let runtime = runtime(1).await?;
            let request = SubmitRequest {
                parameters: parse_params(&operation, &params),
                operation,
                callback,
            };
            let response = submit_job(&runtime.executor, request).await?;
            info!("Submitted job {} ({})", response.job_id, response.operation);

            let job_id = response.job_id.to_string();
            let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
            let record = loop {
                let record = job_status(&runtime.executor, &job_id).await?;
                if record.status().is_terminal() || tokio::time::Instant::now() >= deadline {
                    break record;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            runtime.shutdown().await?;
        }
    }

    Ok(())
}

async fn runtime(workers: usize) -> Result<Runtime, Box<dyn std::error::Error>> {
    let mut config = RuntimeConfig::from_env()?;
    config.executor = config.executor.with_workers(workers);
    init_runtime(config).await
}

/// Drive a relay run, stopping it on Ctrl+C.
async fn relay_until_ctrl_c<F>(broadcaster: &Broadcaster, run: F) -> Result<RunState, relay::RelayError>
where
    F: Future<Output = Result<RunState, relay::RelayError>>,
{
    let handle = broadcaster.handle();
    let stopper = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping relay");
                handle.stop().await;
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });
    let state = run.await;
    stopper.abort();
    state
}

fn print_messages(mut rx: broadcast::Receiver<BusMessage>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => println!("{}", message.payload),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Skipped {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_log_text(mut rx: broadcast::Receiver<BusMessage>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => print!("{}", message.payload["text"].as_str().unwrap_or_default()),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Skipped {} log chunks", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn report(state: RunState) {
    info!(
        "Relay {} {}: {} published, {} skipped",
        state.instance_id, state.status, state.published, state.skipped
    );
}

/// Parameters for `operation`. String parameters are taken verbatim, so an
/// all-digit container id stays a string; the rest go through
/// [`parse_param`].
fn parse_params(operation: &str, raw: &[String]) -> Vec<Value> {
    let kinds = OperationRegistry::new()
        .resolve(operation)
        .map(|spec| spec.params)
        .unwrap_or_default();
    raw.iter()
        .enumerate()
        .map(|(index, value)| match kinds.get(index).map(|p| p.kind) {
            Some(ParamKind::String) => Value::String(value.clone()),
            _ => parse_param(value),
        })
        .collect()
}

/// JSON if it parses, otherwise the raw string.
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn params_fall_back_to_strings() {
        assert_eq!(parse_param("true"), json!(true));
        assert_eq!(parse_param("{\"ports\":{\"80\":\"8080\"}}"), json!({"ports": {"80": "8080"}}));
        assert_eq!(parse_param("nginx:latest"), json!("nginx:latest"));
        assert_eq!(parse_param("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn string_parameters_stay_strings() {
        assert_eq!(
            parse_params("startContainer", &["123456789012".to_string()]),
            vec![json!("123456789012")]
        );
        assert_eq!(
            parse_params("stopContainer", &["123456789012".to_string(), "5".to_string()]),
            vec![json!("123456789012"), json!(5)]
        );
        assert_eq!(
            parse_params("removeImage", &["nginx".to_string(), "true".to_string()]),
            vec![json!("nginx"), json!(true)]
        );
        let params = parse_params("startContainer", &["123456789012".to_string()]);
        assert!(OperationRegistry::new().bind("startContainer", &params).is_ok());
    }

    #[test]
    fn parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "relayd",
            "listen-events",
            "--filter",
            "type=container",
            "-f",
            "event=start",
        ])
        .unwrap();
        match cli.command {
            Commands::ListenEvents { filters } => {
                assert_eq!(filters, vec!["type=container", "event=start"])
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
