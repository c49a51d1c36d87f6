use super::Config;
use super::schema::RuntimeApiConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./claw.toml";

/// Expand a leading `~` against the user's home directory.
pub fn resolve_config_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

impl Config {
    /// Read, parse, apply environment overrides and validate.
    ///
    /// `.json` files parse as JSON; anything else as TOML.
    pub fn load(raw_path: &str) -> Result<Self, ConfigError> {
        let path = resolve_config_path(raw_path);
        let path_display = path.display().to_string();

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Load {
            path: path_display.clone(),
            message: e.to_string(),
        })?;
        let mut config = Self::parse(&path, &contents)?;

        config.apply_env_overrides();
        config.validate()?;
        tracing::debug!(path = %path_display, mission_id = %config.mission_id, "config loaded");
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// File values win; the environment only fills what the file left out.
    pub(super) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.runtime_api.is_none()
            && let Some(port) = lookup("RUNTIME_API_PORT")
            && let Ok(port) = port.trim().parse::<u16>()
            && port != 0
        {
            self.runtime_api = Some(RuntimeApiConfig::new(port));
        }

        if let Some(api) = self.runtime_api.as_mut()
            && api.auth_token.is_none()
            && let Some(token) = lookup("RUNTIME_API_TOKEN")
            && !token.is_empty()
        {
            api.auth_token = Some(token);
        }
    }
}
