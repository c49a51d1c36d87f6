#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result};
use clap::Parser;
use claw_runtime::adapters::HttpControlPlane;
use claw_runtime::config::Config;
use claw_runtime::core::{
    AgentConfig, AgentDeps, AgentRuntime, HandlerExecutor, InMemoryProposalStore, InMemoryStore,
    MemoryStore, PlannedAction, PluginHost, QueuePlanner, RunSummary, RuntimeService,
};
use claw_runtime::error::AgentError;
use claw_runtime::platform::{
    HeartbeatTask, ShutdownHandle, ShutdownReason, Watchdog, shutdown, start_heartbeat,
};
use claw_runtime::ports::{HeartbeatPayload, RegisterPayload};
use claw_runtime::transport::{AppState, RuntimeEventClient, run_gateway};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

const SAMPLE_MESSAGE: &str = "Hello from Claw Runtime";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let code = match run(&cli).await {
        Ok(reason) => {
            tracing::info!(reason = %reason, "claw runtime exiting");
            reason.exit_code()
        }
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "claw runtime failed");
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(log_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));
    if let Err(error) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Warning: failed to install log subscriber: {error}");
    }
}

enum FirstExit {
    Mission(Result<Option<RunSummary>, AgentError>),
    Signal(Option<ShutdownReason>),
}

async fn run(cli: &Cli) -> Result<ShutdownReason> {
    let config = Config::load(&cli.config)?;
    tracing::info!(
        mission_id = %config.mission_id,
        max_steps = config.max_steps,
        control_plane = %config.control_plane.base_url,
        "claw runtime starting"
    );

    let plugins = Arc::new(PluginHost::new());
    claw_runtime::plugins::register_enabled(&plugins, &config.plugins.enabled)?;
    let memory = Arc::new(InMemoryStore::with_plugins(Arc::clone(&plugins)));

    let proposals = Arc::new(InMemoryProposalStore::new(config.proposals.store_options()));
    let agent = AgentRuntime::new(
        AgentConfig::new(config.mission_id.clone()).with_max_steps(config.max_steps),
        AgentDeps {
            planner: Arc::new(QueuePlanner::new([PlannedAction::new(
                "log",
                json!({ "message": SAMPLE_MESSAGE }),
            )])),
            executor: Arc::new(sample_executor(Arc::clone(&memory))),
            control_plane: Arc::new(HttpControlPlane::new(
                &config.control_plane.base_url,
                config.control_plane.api_key.clone(),
            )),
            plugins: Some(Arc::clone(&plugins)),
            proposals: Some(proposals.clone()),
        },
    );
    let service = Arc::new(RuntimeService::new(Arc::new(agent), proposals));

    let (shutdown_handle, mut signal) = shutdown::channel();
    let cancel = CancellationToken::new();

    let gateway = spawn_gateway(&config, &service, &shutdown_handle, &cancel);
    let heartbeat = start_runtime_events(&config, &service, &memory, &shutdown_handle).await?;

    let watchdog = config.watchdog.as_ref().map(|wd| {
        Arc::new(Watchdog::new(
            RuntimeEventClient::from_env(&wd.base_url, &wd.agent_id),
            wd.auto_exit,
            Some(shutdown_handle.clone()),
        ))
    });
    let panic_guard = watchdog.as_ref().map(Watchdog::install_panic_hook);

    spawn_interrupt_listener(shutdown_handle.clone());

    let first = tokio::select! {
        outcome = service.run() => FirstExit::Mission(outcome),
        reason = signal.recv() => FirstExit::Signal(reason),
    };

    let result = match first {
        FirstExit::Signal(reason) => Ok(reason.unwrap_or(ShutdownReason::Interrupted)),
        FirstExit::Mission(Ok(summary)) => {
            if let Some(summary) = summary {
                tracing::info!(
                    steps = summary.steps,
                    completed = summary.completed,
                    failed = summary.failed,
                    rejected = summary.rejected,
                    stop_reason = %summary.stop_reason,
                    "mission summary"
                );
            }
            if gateway.is_some() {
                tracing::info!("runtime API still serving; waiting for shutdown");
                Ok(signal.recv().await.unwrap_or(ShutdownReason::Requested))
            } else {
                Ok(ShutdownReason::Requested)
            }
        }
        FirstExit::Mission(Err(error)) => {
            let error = anyhow::Error::new(error);
            if let Some(watchdog) = &watchdog {
                // Delivery failures are already logged by the watchdog.
                let _ = watchdog.report_crash(&error).await;
            }
            Err(error.context("mission failed"))
        }
    };

    if let Some(guard) = panic_guard {
        guard.uninstall();
    }
    if let Some(heartbeat) = heartbeat {
        heartbeat.stop().await;
    }
    cancel.cancel();
    if let Some(gateway) = gateway
        && let Err(error) = gateway.await
    {
        tracing::warn!(error = %error, "runtime API task ended abnormally");
    }

    result
}

/// The `log` action: echo `payload.message` and remember it as `last_log`.
fn sample_executor(memory: Arc<InMemoryStore>) -> HandlerExecutor {
    let mut executor = HandlerExecutor::new();
    executor.register("log", move |payload: Value| {
        let memory = Arc::clone(&memory);
        async move {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::info!(target: "mission", "{message}");
            memory.set("last_log", json!(message)).await;
            Ok(json!({ "echoed": message }))
        }
    });
    executor
}

fn spawn_gateway(
    config: &Config,
    service: &Arc<RuntimeService>,
    shutdown_handle: &ShutdownHandle,
    cancel: &CancellationToken,
) -> Option<JoinHandle<()>> {
    let api = config.runtime_api.clone()?;
    let state = AppState::new(Arc::clone(service))
        .with_auth_token(api.auth_token.clone())
        .with_shutdown(shutdown_handle.clone());
    let stop = cancel.clone();
    let on_failure = shutdown_handle.clone();

    Some(tokio::spawn(async move {
        let serving = run_gateway(&api.host, api.port, state, async move {
            stop.cancelled().await;
        })
        .await;
        if let Err(error) = serving {
            on_failure.request(ShutdownReason::Fatal(format!("runtime API: {error:#}")));
        }
    }))
}

/// Register with the monitoring endpoint and start heartbeats. A rejected
/// token or protocol at registration aborts startup.
async fn start_runtime_events(
    config: &Config,
    service: &Arc<RuntimeService>,
    memory: &Arc<InMemoryStore>,
    shutdown_handle: &ShutdownHandle,
) -> Result<Option<HeartbeatTask>> {
    let Some(hb) = &config.heartbeat else {
        return Ok(None);
    };
    let client = RuntimeEventClient::from_env(&hb.base_url, &hb.agent_id);

    let registration = client
        .register(RegisterPayload {
            runtime_id: runtime_id(),
            environment: Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .await;
    match registration {
        Ok(()) => tracing::info!(endpoint = %client.endpoint(), "runtime registered"),
        Err(error) if error.is_fatal() => {
            return Err(error).context("register with runtime monitoring endpoint");
        }
        Err(error) => tracing::warn!(error = %error, "runtime registration failed; continuing"),
    }

    let service = Arc::clone(service);
    let memory = Arc::clone(memory);
    Ok(Some(start_heartbeat(
        client,
        hb.interval(),
        move || HeartbeatPayload {
            status: service.heartbeat_status(),
            memory_size: u64::try_from(memory.len()).ok(),
            token_usage: None,
        },
        Some(shutdown_handle.clone()),
    )))
}

fn runtime_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "claw".to_string());
    format!("{host}-{}", uuid::Uuid::new_v4())
}

fn spawn_interrupt_listener(shutdown_handle: ShutdownHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                shutdown_handle.request(ShutdownReason::Interrupted);
            }
            Err(error) => tracing::warn!(error = %error, "cannot listen for Ctrl-C"),
        }
    });
}
