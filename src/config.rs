//! Per-workspace settings read from `portal.toml`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CONFIG_FILE: &str = "portal.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Simulated round trip before credentials are checked.
    #[serde(default = "default_login_delay_ms")]
    pub login_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Simulated round trip of an explicit save.
    #[serde(default = "default_save_delay_ms")]
    pub save_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Total absence hours above which a student report is flagged.
    #[serde(default = "default_absence_warning_hours")]
    pub absence_warning_hours: u32,
}

fn default_login_delay_ms() -> u64 {
    500
}

fn default_save_delay_ms() -> u64 {
    600
}

fn default_absence_warning_hours() -> u32 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_delay_ms: default_login_delay_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_delay_ms: default_save_delay_ms(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            absence_warning_hours: default_absence_warning_hours(),
        }
    }
}

impl PortalConfig {
    /// Missing file means defaults. A broken file is logged and also means defaults.
    pub fn load(workspace: &Path) -> PortalConfig {
        let path = workspace.join(CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(_) => return PortalConfig::default(),
        };
        match toml::from_str::<PortalConfig>(&text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable portal config");
                PortalConfig::default()
            }
        }
    }

    pub fn login_delay(&self) -> Duration {
        Duration::from_millis(self.session.login_delay_ms)
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.storage.save_delay_ms)
    }
}
