use clap::{Parser, Subcommand};
use sonde_engine::config::SondeConfig;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "sonde",
    version,
    about = "Probe a web app's column-management dropdown for the interactions it supports"
)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Mode,

    /// Config file (default: ./sonde.yaml, then ~/.sonde/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Save a screenshot of the page after every failed probe
    #[arg(long, global = true)]
    pub screenshot_dir: Option<PathBuf>,

    /// Concurrent browser sessions, one page per session when above 1
    #[arg(long, global = true)]
    pub sessions: Option<usize>,

    /// Per-probe timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pause after each navigation in milliseconds
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,

    /// Skip the HTTP reachability check before launching a browser
    #[arg(long, global = true)]
    pub no_preflight: bool,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Launch Chromium and drive it over CDP
    Headless {
        /// Show the browser window
        #[arg(long)]
        visible: bool,
        #[command(flatten)]
        target: Target,
    },
    /// Drive a browser through a running WebDriver server
    Webdriver {
        /// WebDriver server URL (default: browser.webdriver_url from config)
        #[arg(long)]
        url: Option<String>,
        /// Ask the browser to run without a window
        #[arg(long)]
        headless: bool,
        #[command(flatten)]
        target: Target,
    },
}

impl Mode {
    pub fn target(&self) -> &Target {
        match self {
            Mode::Headless { target, .. } | Mode::Webdriver { target, .. } => target,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct Target {
    /// Application root, e.g. http://localhost:3000
    #[arg(long)]
    pub base_url: Url,

    /// Page paths to probe, relative to the base URL
    #[arg(default_value = "/")]
    pub pages: Vec<String>,
}

impl Args {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut SondeConfig) {
        if let Some(path) = &self.report {
            config.report.path = Some(path.clone());
        }
        if let Some(dir) = &self.screenshot_dir {
            config.report.screenshot_dir = Some(dir.clone());
        }
        if let Some(sessions) = self.sessions {
            config.session.sessions = sessions;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.probe.timeout_ms = timeout_ms;
            config.battery = config
                .battery
                .take()
                .map(|battery| battery.with_timeout_ms(timeout_ms));
        }
        if let Some(settle_ms) = self.settle_ms {
            config.session.settle_ms = settle_ms;
        }
        if self.no_preflight {
            config.session.preflight = false;
        }
        match &self.mode {
            Mode::Headless { visible, .. } => {
                config.browser.visible |= *visible;
            }
            Mode::Webdriver { url, .. } => {
                if let Some(url) = url {
                    config.browser.webdriver_url = Some(url.clone());
                }
            }
        }
    }
}
