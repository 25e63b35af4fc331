use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_UNINSTALL_VALUE: &str = "UninstallString";
const DEFAULT_USER_ID_VALUE: &str = "userId";
const DEFAULT_SILENT_FLAG: &str = "/VERYSILENT";
const DEFAULT_UNINSTALLER_ENTRY: &str = "uninstall.exe";

/// Identity of the product being replaced and the policy used to retire it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductConfig {
    pub app_name: String,
    pub exe_name: String,
    pub window_class: Option<String>,
    pub window_title: Option<String>,
    pub service_name: String,
    /// Settings subtree holding the user preferences, hive included.
    pub app_settings_key: String,
    /// Settings subtree written by the previous installer, hive included.
    pub uninstall_settings_key: String,
    #[serde(default = "default_uninstall_value")]
    pub uninstall_value: String,
    #[serde(default = "default_user_id_value")]
    pub user_id_value: String,
    #[serde(default = "default_silent_flag")]
    pub silent_flag: String,
    pub archive_name: String,
    #[serde(default = "default_uninstaller_entry")]
    pub uninstaller_entry: String,
    pub extra_config_file: String,
    /// Data directory relative to the per-user application data root.
    pub data_dir: String,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub close_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            close_timeout_ms: 5000,
            poll_interval_ms: 100,
            settle_delay_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ProductConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse handover config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to render handover config")
    }

    /// Name of the registered window message the running app answers by
    /// bringing its main window to the foreground.
    pub fn activate_message_name(&self) -> String {
        let compact = self
            .app_name
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>();
        format!("{compact}AppActivate")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("app_name", &self.app_name),
            ("exe_name", &self.exe_name),
            ("service_name", &self.service_name),
            ("app_settings_key", &self.app_settings_key),
            ("uninstall_settings_key", &self.uninstall_settings_key),
            ("uninstall_value", &self.uninstall_value),
            ("user_id_value", &self.user_id_value),
            ("archive_name", &self.archive_name),
            ("uninstaller_entry", &self.uninstaller_entry),
            ("extra_config_file", &self.extra_config_file),
            ("data_dir", &self.data_dir),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("config field '{field}' must not be empty"));
            }
        }

        if self.window_class.is_none() && self.window_title.is_none() {
            return Err(anyhow!(
                "config must name a window_class or a window_title for '{}'",
                self.app_name
            ));
        }

        for (field, value) in [
            ("exe_name", &self.exe_name),
            ("uninstaller_entry", &self.uninstaller_entry),
            ("extra_config_file", &self.extra_config_file),
        ] {
            if value.contains(['/', '\\']) {
                return Err(anyhow!(
                    "config field '{field}' must be a bare file name: {value}"
                ));
            }
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(anyhow!("timing.poll_interval_ms must be greater than zero"));
        }
        if self.timing.poll_interval_ms >= self.timing.close_timeout_ms {
            return Err(anyhow!(
                "timing.poll_interval_ms ({}) must be below timing.close_timeout_ms ({})",
                self.timing.poll_interval_ms,
                self.timing.close_timeout_ms
            ));
        }

        Ok(())
    }
}

fn default_uninstall_value() -> String {
    DEFAULT_UNINSTALL_VALUE.to_string()
}

fn default_user_id_value() -> String {
    DEFAULT_USER_ID_VALUE.to_string()
}

fn default_silent_flag() -> String {
    DEFAULT_SILENT_FLAG.to_string()
}

fn default_uninstaller_entry() -> String {
    DEFAULT_UNINSTALLER_ENTRY.to_string()
}
