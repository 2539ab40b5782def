mod common;

use common::{FakeDom, FakeDriver, column_page};
use sonde_common::capability::Action;
use sonde_common::verdict::{Outcome, Phase, ProbeVerdict};
use sonde_engine::battery::{
    Battery, CHECKBOX_KEEPS_MENU_OPEN, CHECKBOX_TOGGLES_STATE, DRAG_HANDLES_PRESENT,
    DRAG_REORDER_KEEPS_MENU_OPEN, OPEN_MENU, OUTSIDE_CLICK_CLOSES_MENU, run_battery,
};
use sonde_engine::probe::Prober;
use sonde_engine::run::ProbeRun;

fn outcomes(run: &ProbeRun) -> Vec<(&str, Outcome)> {
    run.verdicts()
        .iter()
        .map(|v| (v.capability.as_str(), v.outcome))
        .collect()
}

fn verdict<'r>(run: &'r ProbeRun, capability: &str) -> &'r ProbeVerdict {
    run.verdicts()
        .iter()
        .find(|v| v.capability == capability)
        .unwrap()
}

#[test]
fn test_column_menu_battery_order() {
    let battery = Battery::column_menu();
    assert_eq!(
        battery.names(),
        vec![
            OPEN_MENU,
            CHECKBOX_KEEPS_MENU_OPEN,
            CHECKBOX_TOGGLES_STATE,
            DRAG_HANDLES_PRESENT,
            DRAG_REORDER_KEEPS_MENU_OPEN,
            OUTSIDE_CLICK_CLOSES_MENU,
        ]
    );
    assert!(battery.steps[0].requires.is_none());
    assert!(battery.steps[0].descriptor.precondition.is_none());
    assert_eq!(
        battery.step(DRAG_REORDER_KEEPS_MENU_OPEN).unwrap().requires.as_deref(),
        Some(DRAG_HANDLES_PRESENT)
    );
    assert_eq!(
        battery.step(DRAG_REORDER_KEEPS_MENU_OPEN).unwrap().descriptor.action,
        Action::Drag { dx: 0.0, dy: 50.0 }
    );
    // Every later step needs the menu open and knows how to reopen it.
    for step in &battery.steps[1..] {
        assert!(step.requires.is_some());
        assert_eq!(step.setup.as_deref(), Some(OPEN_MENU));
        let precondition = step.descriptor.precondition.as_ref().unwrap();
        assert_eq!(precondition.container(), "menu");
    }
    for step in &battery.steps {
        assert!(step.descriptor.validate().is_ok(), "{}", step.descriptor.name);
    }
}

#[test]
fn test_with_timeout_applies_to_every_step() {
    let battery = Battery::column_menu().with_timeout_ms(4000);
    assert!(battery.steps.iter().all(|s| s.descriptor.timeout_ms == 4000));
}

#[tokio::test(start_paused = true)]
async fn test_full_battery_on_working_page() {
    let (dom, page) = column_page(5);
    let mut driver = FakeDriver::new(dom);
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu(),
        "/inventory/data",
        &mut run,
        None,
    )
    .await;

    assert_eq!(
        outcomes(&run),
        vec![
            (OPEN_MENU, Outcome::Passed),
            (CHECKBOX_KEEPS_MENU_OPEN, Outcome::Passed),
            (CHECKBOX_TOGGLES_STATE, Outcome::Passed),
            (DRAG_HANDLES_PRESENT, Outcome::Passed),
            (DRAG_REORDER_KEEPS_MENU_OPEN, Outcome::Passed),
            (OUTSIDE_CLICK_CLOSES_MENU, Outcome::Passed),
        ]
    );
    assert!(
        run.verdicts()
            .iter()
            .all(|v| v.page.as_deref() == Some("/inventory/data"))
    );
    // Toggled twice: the column ends where it started.
    assert!(driver.dom.element(page.checkboxes[0]).checked);
    assert!(!driver.dom.element(page.menu).visible);
    assert!(!run.has_failures());
    // The menu never closed early, so it was opened exactly once.
    assert_eq!(driver.clicks.iter().filter(|c| *c == "Columns").count(), 1);
    assert_eq!(driver.drags, vec!["grip 0 by (0, 50)".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_trigger_skips_dependent_probes() {
    let mut driver = FakeDriver::new(FakeDom::default());
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu().with_timeout_ms(500),
        "/orders",
        &mut run,
        None,
    )
    .await;

    let verdicts = run.verdicts();
    assert_eq!(verdicts.len(), 6);
    assert_eq!(verdicts[0].outcome, Outcome::Failed);
    assert_eq!(verdicts[0].detail, "no visible candidate for open-menu");
    for verdict in &verdicts[1..] {
        assert_eq!(verdict.outcome, Outcome::Skipped);
        assert_eq!(verdict.detail, "requires open-menu to pass");
    }
    let summary = run.summary();
    assert_eq!((summary.passed, summary.failed, summary.skipped), (0, 1, 5));
}

#[tokio::test(start_paused = true)]
async fn test_menu_closing_on_checkbox_fails_only_persistence() {
    let (mut dom, page) = column_page(3);
    let menu = page.menu;
    for cb in &page.checkboxes {
        dom.on_click(*cb, move |dom| dom.hide(menu));
    }
    let mut driver = FakeDriver::new(dom);
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu(),
        "/",
        &mut run,
        None,
    )
    .await;

    assert_eq!(
        outcomes(&run),
        vec![
            (OPEN_MENU, Outcome::Passed),
            (CHECKBOX_KEEPS_MENU_OPEN, Outcome::Failed),
            (CHECKBOX_TOGGLES_STATE, Outcome::Passed),
            (DRAG_HANDLES_PRESENT, Outcome::Passed),
            (DRAG_REORDER_KEEPS_MENU_OPEN, Outcome::Passed),
            (OUTSIDE_CLICK_CLOSES_MENU, Outcome::Passed),
        ]
    );
    let keeps_open = verdict(&run, CHECKBOX_KEEPS_MENU_OPEN);
    assert_eq!(keeps_open.phase, Some(Phase::Verification));
    assert!(
        keeps_open.detail.contains("menu closed unexpectedly"),
        "{}",
        keeps_open.detail
    );
    // Reopened before the second toggle, before the handle check, and
    // before the outside click. Only the recorded run counts as a verdict.
    assert_eq!(
        driver.clicks,
        vec!["Columns", "column 0", "Columns", "column 0", "Columns", "(50, 50)"]
    );
    assert_eq!(run.verdicts().len(), 6);
    assert!(driver.dom.element(page.checkboxes[0]).checked);
}

#[tokio::test(start_paused = true)]
async fn test_menu_closing_on_drag_fails_reorder_only() {
    let (mut dom, page) = column_page(2);
    let menu = page.menu;
    dom.on_drag(page.handles[0], move |dom| dom.hide(menu));
    let mut driver = FakeDriver::new(dom);
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu(),
        "/",
        &mut run,
        None,
    )
    .await;

    let reorder = verdict(&run, DRAG_REORDER_KEEPS_MENU_OPEN);
    assert_eq!(reorder.outcome, Outcome::Failed);
    assert!(
        reorder.detail.contains("menu closed unexpectedly"),
        "{}",
        reorder.detail
    );
    assert!(reorder.detail.contains("css=.drag-handle"), "{}", reorder.detail);
    assert_eq!(
        run.outcome_of(Some("/"), OUTSIDE_CLICK_CLOSES_MENU),
        Some(Outcome::Passed)
    );
    assert_eq!(driver.drags, vec!["grip 0 by (0, 50)".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_outside_click_fails_when_menu_cannot_be_reopened() {
    let (mut dom, page) = column_page(3);
    let (menu, button) = (page.menu, page.button);
    // The trigger works once, and any checkbox click closes the menu.
    dom.on_click(button, move |dom| dom.disable(button));
    for cb in &page.checkboxes {
        dom.on_click(*cb, move |dom| dom.hide(menu));
    }
    let mut driver = FakeDriver::new(dom);
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu(),
        "/",
        &mut run,
        None,
    )
    .await;

    assert_eq!(
        outcomes(&run),
        vec![
            (OPEN_MENU, Outcome::Passed),
            (CHECKBOX_KEEPS_MENU_OPEN, Outcome::Failed),
            (CHECKBOX_TOGGLES_STATE, Outcome::Failed),
            (DRAG_HANDLES_PRESENT, Outcome::Failed),
            (DRAG_REORDER_KEEPS_MENU_OPEN, Outcome::Skipped),
            (OUTSIDE_CLICK_CLOSES_MENU, Outcome::Failed),
        ]
    );
    let outside = verdict(&run, OUTSIDE_CLICK_CLOSES_MENU);
    assert_eq!(outside.phase, Some(Phase::Precondition));
    assert_eq!(outside.detail, "menu not visible before click_at");
    assert_eq!(
        verdict(&run, CHECKBOX_TOGGLES_STATE).detail,
        "menu not visible before toggle_checkbox"
    );
    // The outside click was never sent to a page without an open menu.
    assert!(!driver.clicks.iter().any(|c| c.starts_with('(')));
}

#[tokio::test(start_paused = true)]
async fn test_without_setup_a_closed_menu_is_a_precondition_failure() {
    let (mut dom, page) = column_page(3);
    let menu = page.menu;
    for cb in &page.checkboxes {
        dom.on_click(*cb, move |dom| dom.hide(menu));
    }
    let mut driver = FakeDriver::new(dom);
    let mut battery = Battery::column_menu();
    for step in &mut battery.steps {
        step.setup = None;
    }
    let mut run = ProbeRun::new();

    run_battery(&Prober::default(), &mut driver, &battery, "/", &mut run, None).await;

    let outside = verdict(&run, OUTSIDE_CLICK_CLOSES_MENU);
    assert_eq!(outside.outcome, Outcome::Failed);
    assert_eq!(outside.phase, Some(Phase::Precondition));
    assert_eq!(
        driver.clicks.iter().filter(|c| *c == "Columns").count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_screenshots_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = FakeDriver::new(FakeDom::default());
    let mut run = ProbeRun::new();

    run_battery(
        &Prober::default(),
        &mut driver,
        &Battery::column_menu().with_timeout_ms(200),
        "/inventory/data",
        &mut run,
        Some(dir.path()),
    )
    .await;

    let shot = dir.path().join("inventory_data-open-menu.png");
    assert!(shot.exists());
    // Skipped probes are not captured.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
