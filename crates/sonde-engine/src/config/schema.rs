use crate::battery::Battery;
use crate::probe::ProbeSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SondeConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Replaces the built-in column-menu battery when present.
    #[serde(default)]
    pub battery: Option<Battery>,
}

impl SondeConfig {
    /// The configured battery, or the column-menu battery with the probe timeout.
    pub fn battery(&self) -> Battery {
        match &self.battery {
            Some(custom) => custom.clone(),
            None => Battery::column_menu().with_timeout_ms(self.probe.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_window_ms: default_settle_window_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn settings(&self) -> ProbeSettings {
        ProbeSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_window: Duration::from_millis(self.settle_window_ms),
        }
    }
}

fn default_timeout_ms() -> u64 {
    sonde_common::capability::DEFAULT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_window_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Concurrent browser sessions; 1 visits every page in one browser.
    #[serde(default = "default_sessions")]
    pub sessions: usize,
    #[serde(default = "default_preflight")]
    pub preflight: bool,
    #[serde(default = "default_preflight_timeout_ms")]
    pub preflight_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            sessions: default_sessions(),
            preflight: default_preflight(),
            preflight_timeout_ms: default_preflight_timeout_ms(),
        }
    }
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_sessions() -> usize {
    1
}

fn default_preflight() -> bool {
    true
}

fn default_preflight_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// JSON report destination; stdout when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub webdriver_url: Option<String>,
}
