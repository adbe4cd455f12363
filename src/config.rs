use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SECRETS_FILE: &str = "config.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Root directory for crotp data, e.g. ~/.local/share/crotp.
/// `CROTP_HOME` overrides it.
pub fn data_root() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("CROTP_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let mut dir = dirs::data_dir().ok_or_else(|| anyhow!("cannot get data dir"))?;
    dir.push("crotp");
    Ok(dir)
}

/// Tunables read from `settings.json`; every field is optional.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Display refresh interval in milliseconds.
    pub tick_ms: u64,
    /// Key that leaves the live display and returns to the menu.
    pub quit_key: char,
    /// How long a loaded copy of the secret list may be reused.
    pub store_ttl_secs: u64,
    /// Pause after a status message before the menu is shown again.
    pub notice_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            quit_key: 'q',
            store_ttl_secs: 5,
            notice_ms: 1000,
        }
    }
}

impl Settings {
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(SETTINGS_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        };
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        if settings.tick_ms == 0 {
            anyhow::bail!("tick_ms in {} must be positive", path.display());
        }
        Ok(settings)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store_ttl_secs)
    }

    pub fn notice(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }
}
