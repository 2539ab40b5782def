//! The column-management battery and the runner that executes a battery on one page.

use crate::driver::Driver;
use crate::probe::Prober;
use crate::run::ProbeRun;
use crate::screenshot::save_failure_screenshot;
use serde::{Deserialize, Serialize};
use sonde_common::capability::{Action, CapabilityDescriptor, PostCondition, Precondition};
use sonde_common::locator::Locator;
use sonde_common::verdict::{Outcome, ProbeVerdict};
use std::path::Path;
use tracing::{debug, info};

pub const OPEN_MENU: &str = "open-menu";
pub const CHECKBOX_TOGGLES_STATE: &str = "checkbox-toggles-state";
pub const CHECKBOX_KEEPS_MENU_OPEN: &str = "checkbox-toggle-keeps-menu-open";
pub const DRAG_HANDLES_PRESENT: &str = "drag-handles-present";
pub const DRAG_REORDER_KEEPS_MENU_OPEN: &str = "drag-reorder-keeps-menu-open";
pub const OUTSIDE_CLICK_CLOSES_MENU: &str = "outside-click-closes-menu";

/// A descriptor plus the capability that must have passed on the same page
/// before it is worth running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStep {
    #[serde(flatten)]
    pub descriptor: CapabilityDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    /// Earlier step re-run, unrecorded, when this step's precondition does
    /// not hold. Restores page state an earlier failure disturbed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

impl ProbeStep {
    pub fn new(descriptor: CapabilityDescriptor) -> Self {
        Self {
            descriptor,
            requires: None,
            setup: None,
        }
    }

    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.requires = Some(capability.into());
        self
    }

    pub fn setup(mut self, capability: impl Into<String>) -> Self {
        self.setup = Some(capability.into());
        self
    }
}

/// Ordered probes executed against one page. Order matters: each probe
/// starts from the page state the previous one left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Battery {
    pub steps: Vec<ProbeStep>,
}

impl Battery {
    pub fn new(steps: Vec<ProbeStep>) -> Self {
        Self { steps }
    }

    /// Apply one timeout to every step.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        for step in &mut self.steps {
            step.descriptor.timeout_ms = timeout_ms;
        }
        self
    }

    pub fn step(&self, name: &str) -> Option<&ProbeStep> {
        self.steps.iter().find(|s| s.descriptor.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|s| s.descriptor.name.as_str())
            .collect()
    }

    /// The column-management dropdown checks.
    pub fn column_menu() -> Self {
        column_menu_with(ColumnMenuLocators::default())
    }
}

impl Default for Battery {
    fn default() -> Self {
        Self::column_menu()
    }
}

/// Locator sets the column-menu battery is assembled from.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMenuLocators {
    pub trigger: Vec<Locator>,
    pub menu: Vec<Locator>,
    pub checkbox: Vec<Locator>,
    pub drag_handle: Vec<Locator>,
    /// Viewport point outside the menu.
    pub outside_point: (f64, f64),
    /// Pointer offset for the reorder drag, about one row down.
    pub drag_offset: (f64, f64),
}

impl Default for ColumnMenuLocators {
    fn default() -> Self {
        Self {
            trigger: vec![
                Locator::tagged_text("button", "Columns"),
                Locator::tagged_text("button", "Column"),
                Locator::attr_contains("aria-label", "column"),
                Locator::attr_contains("data-testid", "column"),
                Locator::attr_contains("title", "column").on_tag("button"),
                Locator::css(".column-toggle"),
                Locator::css(".columns-button"),
            ],
            menu: vec![
                Locator::role("menu"),
                Locator::role("listbox"),
                Locator::css("[data-radix-popper-content-wrapper]"),
                Locator::css(".dropdown-menu"),
                Locator::css(".popover"),
                Locator::css(".columns-dropdown"),
                Locator::css(".column-selector"),
            ],
            checkbox: vec![
                Locator::css("input[type=\"checkbox\"]"),
                Locator::role("checkbox"),
                Locator::role("menuitemcheckbox"),
            ],
            drag_handle: vec![
                Locator::attr_contains("data-testid", "drag"),
                Locator::css(".drag-handle"),
                Locator::css(".grip"),
                Locator::attr_contains("title", "drag"),
                Locator::attr_contains("aria-label", "drag"),
                Locator::css("svg[data-lucide=\"grip-vertical\"]"),
                Locator::css(".lucide-grip-vertical"),
                Locator::css("[class*=\"cursor-grab\"]"),
            ],
            outside_point: (50.0, 50.0),
            drag_offset: (0.0, 50.0),
        }
    }
}

/// Every target locator scoped to every menu locator, menu-major so the
/// preferred menu locator is tried first.
fn inside_menu(menu: &[Locator], targets: &[Locator]) -> Vec<Locator> {
    menu.iter()
        .flat_map(|scope| {
            targets
                .iter()
                .map(move |target| target.clone().within(scope.clone()))
        })
        .collect()
}

/// Steps after `open-menu` need the menu open. Each one checks that first and,
/// when an earlier step left it closed, reopens it through `open-menu`.
pub fn column_menu_with(locators: ColumnMenuLocators) -> Battery {
    let checkboxes = inside_menu(&locators.menu, &locators.checkbox);
    let handles = inside_menu(&locators.menu, &locators.drag_handle);
    let menu_open = Precondition::visible("menu", locators.menu.clone());
    let (x, y) = locators.outside_point;
    let (dx, dy) = locators.drag_offset;

    Battery::new(vec![
        ProbeStep::new(
            CapabilityDescriptor::new(OPEN_MENU, Action::Click)
                .with_locators(locators.trigger.clone())
                .with_post_condition(PostCondition::visible("menu", locators.menu.clone())),
        ),
        ProbeStep::new(
            CapabilityDescriptor::new(CHECKBOX_KEEPS_MENU_OPEN, Action::ToggleCheckbox)
                .with_locators(checkboxes.clone())
                .with_precondition(menu_open.clone())
                .with_post_condition(PostCondition::remains_visible(
                    "menu",
                    locators.menu.clone(),
                )),
        )
        .requires(OPEN_MENU)
        .setup(OPEN_MENU),
        // Toggling again restores the column hidden by the previous step.
        ProbeStep::new(
            CapabilityDescriptor::new(CHECKBOX_TOGGLES_STATE, Action::ToggleCheckbox)
                .with_locators(checkboxes)
                .with_precondition(menu_open.clone())
                .with_post_condition(PostCondition::StateChanged),
        )
        .requires(OPEN_MENU)
        .setup(OPEN_MENU),
        ProbeStep::new(
            CapabilityDescriptor::new(DRAG_HANDLES_PRESENT, Action::Inspect)
                .with_locators(handles.clone())
                .with_precondition(menu_open.clone()),
        )
        .requires(OPEN_MENU)
        .setup(OPEN_MENU),
        ProbeStep::new(
            CapabilityDescriptor::new(DRAG_REORDER_KEEPS_MENU_OPEN, Action::Drag { dx, dy })
                .with_locators(handles)
                .with_precondition(menu_open.clone())
                .with_post_condition(PostCondition::remains_visible(
                    "menu",
                    locators.menu.clone(),
                )),
        )
        .requires(DRAG_HANDLES_PRESENT)
        .setup(OPEN_MENU),
        ProbeStep::new(
            CapabilityDescriptor::new(OUTSIDE_CLICK_CLOSES_MENU, Action::ClickAt { x, y })
                .with_locators([Locator::css("body")])
                .with_precondition(menu_open)
                .with_post_condition(PostCondition::hidden("menu", locators.menu)),
        )
        .requires(OPEN_MENU)
        .setup(OPEN_MENU),
    ])
}

/// Run every step of `battery` against the current page, recording into `run`.
/// With `screenshot_dir`, the page is captured after every probe that fails.
pub async fn run_battery<D: Driver + ?Sized>(
    prober: &Prober,
    driver: &mut D,
    battery: &Battery,
    page: &str,
    run: &mut ProbeRun,
    screenshot_dir: Option<&Path>,
) {
    info!("Running {} probes on {}", battery.steps.len(), page);
    for step in &battery.steps {
        let name = step.descriptor.name.as_str();

        if let Some(required) = &step.requires
            && run.outcome_of(Some(page), required) != Some(Outcome::Passed)
        {
            info!("Skipping {} on {}: {} did not pass", name, page, required);
            run.record(
                ProbeVerdict::skipped(name, format!("requires {} to pass", required))
                    .on_page(page),
            );
            continue;
        }

        if let Some(setup) = &step.setup
            && let Some(precondition) = &step.descriptor.precondition
            && !prober
                .precondition_holds(precondition, driver)
                .await
                .unwrap_or(false)
        {
            restore(prober, driver, battery, setup, name, page).await;
        }

        let failed = prober
            .probe_into(run, page, &step.descriptor, driver)
            .await
            .outcome
            == Outcome::Failed;
        if failed && let Some(dir) = screenshot_dir {
            save_failure_screenshot(driver, dir, page, name).await;
        }
    }
}

/// Re-run the `setup` step without recording it.
async fn restore<D: Driver + ?Sized>(
    prober: &Prober,
    driver: &mut D,
    battery: &Battery,
    setup: &str,
    before: &str,
    page: &str,
) {
    let Some(step) = battery.step(setup) else {
        debug!("No step named {} to run before {}", setup, before);
        return;
    };
    info!("Re-running {} before {} on {}", setup, before, page);
    let verdict = prober.probe(&step.descriptor, driver).await;
    if !verdict.is_passed() {
        debug!("{} did not restore the page: {}", setup, verdict.detail);
    }
}
