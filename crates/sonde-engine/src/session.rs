//! Browser sessions: scoped driver acquisition around a sequence of page visits.

use crate::battery::{Battery, run_battery};
use crate::driver::{Driver, DriverFactory};
use crate::probe::Prober;
use crate::run::ProbeRun;
use futures::FutureExt;
use futures::StreamExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(2000);

/// What one session visits and how.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub base_url: Url,
    pub pages: Vec<String>,
    pub battery: Battery,
    /// Pause after each navigation so client-side rendering can finish.
    pub settle: Duration,
    pub screenshot_dir: Option<PathBuf>,
}

impl SessionPlan {
    pub fn new(base_url: Url, pages: Vec<String>, battery: Battery) -> Self {
        Self {
            base_url,
            pages,
            battery,
            settle: DEFAULT_SETTLE,
            screenshot_dir: None,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.screenshot_dir = dir;
        self
    }

    /// The same plan restricted to a single page.
    pub fn for_page(&self, page: &str) -> Self {
        Self {
            pages: vec![page.to_string()],
            ..self.clone()
        }
    }
}

/// Resolve a page path against the base URL. Paths are taken as relative to
/// the base URL's path, so `/orders` on `http://host/app/` is `http://host/app/orders`.
pub fn page_url(base: &Url, page: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(page.trim_start_matches('/'))
}

/// Launch `driver`, visit every page of `plan`, run the battery on each, and
/// close the driver on every exit path.
///
/// Launch and navigation failures end the session with a whole-run verdict.
pub async fn run_session<D: Driver + ?Sized>(
    driver: &mut D,
    plan: &SessionPlan,
    prober: &Prober,
) -> ProbeRun {
    let mut run = ProbeRun::new();

    info!("Launching driver for {} page(s)", plan.pages.len());
    if let Err(e) = driver.launch().await {
        error!("Driver launch failed: {}", e);
        run.record_fatal(None, format!("browser launch failed: {}", e));
        // A partial launch may still own a process.
        close_driver(driver).await;
        return run;
    }

    let visited = AssertUnwindSafe(visit_pages(driver, plan, prober, &mut run))
        .catch_unwind()
        .await;
    if let Err(panic) = visited {
        let message = panic_message(panic.as_ref());
        error!("Probe sequence panicked: {}", message);
        run.record_fatal(None, format!("probe sequence panicked: {}", message));
    }

    close_driver(driver).await;
    run
}

async fn visit_pages<D: Driver + ?Sized>(
    driver: &mut D,
    plan: &SessionPlan,
    prober: &Prober,
    run: &mut ProbeRun,
) {
    for page in &plan.pages {
        let url = match page_url(&plan.base_url, page) {
            Ok(url) => url,
            Err(e) => {
                run.record_fatal(Some(page), format!("invalid page path '{}': {}", page, e));
                return;
            }
        };

        match driver.navigate(url.as_str()).await {
            Ok(nav) => info!("Navigated to {} ({})", nav.url, nav.title),
            Err(e) => {
                error!("Navigation to {} failed: {}", url, e);
                run.record_fatal(Some(page), format!("navigation to {} failed: {}", url, e));
                return;
            }
        }

        if !plan.settle.is_zero() {
            tokio::time::sleep(plan.settle).await;
        }

        run_battery(
            prober,
            driver,
            &plan.battery,
            page,
            run,
            plan.screenshot_dir.as_deref(),
        )
        .await;
    }
}

async fn close_driver<D: Driver + ?Sized>(driver: &mut D) {
    if let Err(e) = driver.close().await {
        warn!("Failed to close driver cleanly: {}", e);
    }
}

/// One isolated session per page, at most `sessions` at a time. Verdicts are
/// merged in page order regardless of completion order.
pub async fn run_parallel(
    factory: &dyn DriverFactory,
    plan: &SessionPlan,
    prober: &Prober,
    sessions: usize,
) -> ProbeRun {
    let runs: Vec<ProbeRun> = futures::stream::iter(plan.pages.iter().map(|page| {
        let page_plan = plan.for_page(page);
        async move {
            let mut driver = factory.create();
            run_session(driver.as_mut(), &page_plan, prober).await
        }
    }))
    .buffered(sessions.max(1))
    .collect()
    .await;

    let mut merged = ProbeRun::new();
    for run in runs {
        merged.merge(run);
    }
    merged
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
