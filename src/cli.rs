use claw_runtime::config::DEFAULT_CONFIG_PATH;
use clap::Parser;

/// Claw Runtime - approval-gated, step-by-step mission runner.
#[derive(Parser, Debug)]
#[command(name = "claw-runtime")]
#[command(version)]
#[command(about = "Run one mission, gating every step through a control plane.", long_about = None)]
pub struct Cli {
    /// Path to the runtime config (`.toml` or `.json`)
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`, `claw_runtime=trace`)
    #[arg(long)]
    pub log_level: Option<String>,
}
