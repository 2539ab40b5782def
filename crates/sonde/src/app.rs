use crate::args::{Args, Mode};
use anyhow::{Context, Result, anyhow};
use sonde_e::WebDriverDriver;
use sonde_engine::config::{ConfigLoader, SondeConfig};
use sonde_engine::driver::{Driver, DriverFactory};
use sonde_engine::formatter::{format_tally, format_verdict};
use sonde_engine::preflight::check_reachable;
use sonde_engine::probe::Prober;
use sonde_engine::report::{JsonFileSink, JsonWriterSink, ReportSink};
use sonde_engine::run::ProbeRun;
use sonde_engine::session::{SessionPlan, run_parallel, run_session};
use sonde_engine::verdict::RunReport;
use sonde_h::HeadlessDriver;
use std::time::Duration;
use tracing::{info, warn};

/// Run the whole probe and return the process exit code.
pub async fn run(args: Args) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigLoader::load_default()
            .await
            .context("loading default config")?,
    };
    args.apply(&mut config);

    let factory = driver_factory(&args.mode, &config)?;
    let target = args.mode.target();
    let mut run = ProbeRun::new();

    if config.session.preflight {
        let timeout = Duration::from_millis(config.session.preflight_timeout_ms);
        if let Err(e) = check_reachable(target.base_url.as_str(), timeout).await {
            warn!("Preflight failed: {}", e);
            run.record_fatal(None, format!("preflight failed: {}", e));
        }
    }

    if !run.is_fatal() {
        let plan = SessionPlan::new(
            target.base_url.clone(),
            target.pages.clone(),
            config.battery(),
        )
        .with_settle(Duration::from_millis(config.session.settle_ms))
        .with_screenshot_dir(config.report.screenshot_dir.clone());

        let prober = Prober::new(config.probe.settings());
        let sessions = config.session.sessions.max(1);
        info!(
            "Probing {} page(s) on {} with {} session(s)",
            plan.pages.len(),
            plan.base_url,
            sessions
        );
        let session_run = if sessions == 1 {
            let mut driver = factory.create();
            run_session(driver.as_mut(), &plan, &prober).await
        } else {
            run_parallel(factory.as_ref(), &plan, &prober, sessions).await
        };
        run.merge(session_run);
    }

    let report = run
        .into_report()
        .with_target(target.base_url.as_str(), target.pages.clone());
    emit(&report, &config)?;
    Ok(report.exit_code())
}

fn driver_factory(mode: &Mode, config: &SondeConfig) -> Result<Box<dyn DriverFactory>> {
    let factory: Box<dyn DriverFactory> = match mode {
        Mode::Headless { .. } => {
            let visible = config.browser.visible;
            Box::new(move || -> Box<dyn Driver> {
                Box::new(HeadlessDriver::with_visibility(visible))
            })
        }
        Mode::Webdriver { headless, .. } => {
            let url = config
                .browser
                .webdriver_url
                .clone()
                .ok_or_else(|| anyhow!("webdriver mode needs --url or browser.webdriver_url"))?;
            let headless = *headless;
            Box::new(move || -> Box<dyn Driver> {
                Box::new(WebDriverDriver::with_url(url.clone()).headless(headless))
            })
        }
    };
    Ok(factory)
}

/// Print the human summary and write the JSON report. The summary goes to
/// stderr when stdout carries the report.
fn emit(report: &RunReport, config: &SondeConfig) -> Result<()> {
    let mut lines: Vec<String> = report.verdicts.iter().map(format_verdict).collect();
    lines.push(format_tally(&report.summary));

    match &config.report.path {
        Some(path) => {
            for line in &lines {
                println!("{}", line);
            }
            JsonFileSink::new(path)
                .write(report)
                .with_context(|| format!("writing report {}", path.display()))?;
        }
        None => {
            for line in &lines {
                eprintln!("{}", line);
            }
            JsonWriterSink::new(std::io::stdout().lock())
                .write(report)
                .context("writing report to stdout")?;
        }
    }
    Ok(())
}
