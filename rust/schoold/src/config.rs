//! Daemon configuration.
//!
//! Loaded with figment from, in order of precedence (highest first):
//! 1. Environment variables prefixed with `SCHOOLD_` (nested keys split on `__`)
//! 2. TOML file at `<config_dir>/schoold/config.toml` or the `--config` path
//! 3. Built-in defaults

use std::path::PathBuf;

use chrono::NaiveTime;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "schoold";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub attendance: AttendanceConfig,
    pub notifications: NotificationConfig,
    pub logs: LogConfig,
    pub links: LinkConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace opened at startup, before any `workspace.select`.
    pub default_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Percent below which a student counts as at risk.
    pub at_risk_threshold: u32,
    /// History length required before the at-risk rule applies.
    pub min_records_for_risk: usize,
    /// Number of trailing absences that raise an absence-streak alert.
    pub absence_streak_days: usize,
    /// Kiosk scans after this time (`HH:MM`) are recorded as late.
    pub late_after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub subscription_warning_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Newest system-log rows kept after each append.
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub default_country_code: String,
    pub qr_endpoint: String,
    pub qr_size: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            at_risk_threshold: 75,
            min_records_for_risk: 3,
            absence_streak_days: 3,
            late_after: "07:30".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            subscription_warning_days: 30,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { max_entries: 500 }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_country_code: "966".to_string(),
            qr_endpoint: "https://api.qrserver.com/v1/create-qr-code/".to_string(),
            qr_size: 200,
        }
    }
}

impl AttendanceConfig {
    /// Parsed `late_after`; only valid after [`Config::validate`] succeeded.
    #[must_use]
    pub fn late_after_time(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.late_after, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(7, 30, 0).unwrap_or_default())
    }
}

impl Config {
    /// Load configuration with an optional explicit file path.
    ///
    /// # Errors
    ///
    /// Returns an error if a source fails to parse or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SCHOOLD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// # Errors
    ///
    /// Returns an error if any configuration values are out of range.
    pub fn validate(&self) -> Result<()> {
        if self.attendance.at_risk_threshold > 100 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "at_risk_threshold ({}) must be between 0 and 100",
                    self.attendance.at_risk_threshold
                ),
            });
        }
        if self.attendance.absence_streak_days == 0 {
            return Err(Error::ConfigValidation {
                message: "absence_streak_days must be greater than 0".to_string(),
            });
        }
        if NaiveTime::parse_from_str(&self.attendance.late_after, "%H:%M").is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "late_after must be HH:MM, got {:?}",
                    self.attendance.late_after
                ),
            });
        }
        if self.logs.max_entries == 0 {
            return Err(Error::ConfigValidation {
                message: "logs.max_entries must be greater than 0".to_string(),
            });
        }
        if self.links.qr_size == 0 {
            return Err(Error::ConfigValidation {
                message: "links.qr_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
