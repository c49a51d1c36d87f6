mod loader;
pub mod schema;

pub use loader::{DEFAULT_CONFIG_PATH, resolve_config_path};
pub use schema::{
    Config, ControlPlaneConfig, HeartbeatConfig, PluginsConfig, ProposalsConfig,
    RuntimeApiConfig, WatchdogConfig,
};
