mod common;

use common::{FakeDom, FakeDriver, column_page};
use sonde_common::verdict::{Outcome, Phase};
use sonde_engine::battery::Battery;
use sonde_engine::driver::Driver;
use sonde_engine::probe::Prober;
use sonde_engine::run::RUN_CAPABILITY;
use sonde_engine::session::{SessionPlan, page_url, run_parallel, run_session};
use std::time::Duration;
use url::Url;

fn plan(pages: &[&str]) -> SessionPlan {
    SessionPlan::new(
        Url::parse("http://localhost:3000").unwrap(),
        pages.iter().map(|p| p.to_string()).collect(),
        Battery::column_menu().with_timeout_ms(300),
    )
    .with_settle(Duration::ZERO)
}

#[test]
fn test_page_url_joins_paths() {
    let base = Url::parse("http://localhost:3000").unwrap();
    assert_eq!(
        page_url(&base, "/inventory/data").unwrap().as_str(),
        "http://localhost:3000/inventory/data"
    );
    assert_eq!(page_url(&base, "/").unwrap().as_str(), "http://localhost:3000/");

    let nested = Url::parse("http://localhost:3002/app").unwrap();
    assert_eq!(
        page_url(&nested, "/orders").unwrap().as_str(),
        "http://localhost:3002/app/orders"
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_visits_pages_in_order_and_closes() {
    let (dom, _) = column_page(2);
    let mut driver = FakeDriver::new(dom);

    let run = run_session(&mut driver, &plan(&["/", "/orders"]), &Prober::default()).await;

    assert_eq!(
        driver.navigations,
        vec![
            "http://localhost:3000/".to_string(),
            "http://localhost:3000/orders".to_string()
        ]
    );
    assert_eq!(run.verdicts().len(), 12);
    assert_eq!(run.verdicts()[0].page.as_deref(), Some("/"));
    assert_eq!(run.verdicts()[5].page.as_deref(), Some("/"));
    assert_eq!(run.verdicts()[6].page.as_deref(), Some("/orders"));
    assert_eq!(driver.close_calls, 1);
    assert!(!driver.is_ready().await);
    assert!(!run.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_is_fatal_and_still_closes() {
    let mut driver = FakeDriver::new(FakeDom::default());
    driver.launch_error = Some("chromium not found".to_string());

    let run = run_session(&mut driver, &plan(&["/"]), &Prober::default()).await;

    assert!(run.is_fatal());
    assert_eq!(run.verdicts().len(), 1);
    let verdict = &run.verdicts()[0];
    assert_eq!(verdict.capability, RUN_CAPABILITY);
    assert_eq!(verdict.outcome, Outcome::Failed);
    assert_eq!(verdict.phase, Some(Phase::Environment));
    assert!(verdict.detail.contains("chromium not found"));
    assert_eq!(driver.close_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_stops_the_session() {
    let mut driver = FakeDriver::new(FakeDom::default());
    driver.navigate_error = Some("net::ERR_CONNECTION_REFUSED".to_string());

    let run = run_session(&mut driver, &plan(&["/", "/orders"]), &Prober::default()).await;

    assert!(run.is_fatal());
    assert_eq!(run.verdicts().len(), 1);
    assert_eq!(run.verdicts()[0].page.as_deref(), Some("/"));
    assert!(
        run.verdicts()[0]
            .detail
            .contains("navigation to http://localhost:3000/ failed")
    );
    assert_eq!(driver.close_calls, 1);
    assert_eq!(run.into_report().exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panic_inside_probes_still_closes_driver() {
    let mut driver = FakeDriver::new(FakeDom::default());
    driver.panic_on_query = true;

    let run = run_session(&mut driver, &plan(&["/"]), &Prober::default()).await;

    assert!(run.is_fatal());
    let last = run.verdicts().last().unwrap();
    assert_eq!(last.capability, RUN_CAPABILITY);
    assert!(last.detail.contains("query exploded"), "{}", last.detail);
    assert_eq!(driver.close_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_sessions_merge_in_page_order() {
    let factory = || -> Box<dyn Driver> {
        let (dom, _) = column_page(1);
        Box::new(FakeDriver::new(dom))
    };

    let pages = ["/", "/orders", "/inventory/data"];
    let run = run_parallel(&factory, &plan(&pages), &Prober::default(), 2).await;

    let visited: Vec<&str> = run
        .verdicts()
        .iter()
        .filter_map(|v| v.page.as_deref())
        .collect();
    let mut expected = Vec::new();
    for page in pages {
        expected.extend(std::iter::repeat_n(page, 6));
    }
    assert_eq!(visited, expected);
    assert_eq!(run.summary().passed, 18);
    assert_eq!(run.into_report().exit_code(), 0);
}
