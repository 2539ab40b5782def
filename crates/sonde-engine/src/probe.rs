//! Capability probe engine: resolve, act, verify.

use crate::driver::{Driver, DriverError, ElementHandle};
use crate::poll::{DEFAULT_POLL_INTERVAL, Poller};
use crate::run::ProbeRun;
use sonde_common::capability::{
    Action, CapabilityDescriptor, DescriptorError, PostCondition, Precondition,
};
use sonde_common::locator::Locator;
use sonde_common::verdict::{Phase, ProbeVerdict};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(500);

/// The candidate a probe resolved to. At most one exists per probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    /// Position of the winning locator in the candidate list.
    pub index: usize,
    pub locator: Locator,
    pub handle: ElementHandle,
    /// How many elements the winning locator matched.
    pub match_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub poll_interval: Duration,
    /// How long a `RemainsVisible` container must stay visible.
    pub settle_window: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_window: DEFAULT_SETTLE_WINDOW,
        }
    }
}

/// Observations made during the action phase, used by verification.
#[derive(Debug, Clone, Copy, Default)]
struct Effect {
    checked_before: Option<bool>,
    checked_after: Option<bool>,
}

enum Verification {
    Met(String),
    NotMet(String),
}

#[derive(Debug, Clone, Default)]
pub struct Prober {
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Run one capability probe. Every per-probe problem is encoded in the
    /// returned verdict; nothing is propagated.
    pub async fn probe<D: Driver + ?Sized>(
        &self,
        descriptor: &CapabilityDescriptor,
        driver: &mut D,
    ) -> ProbeVerdict {
        let started = Instant::now();
        driver.release_handles().await;
        let verdict = self.run_phases(descriptor, driver).await;
        let verdict = verdict.with_elapsed_ms(started.elapsed().as_millis() as u64);

        match verdict.phase {
            None => info!("{} {}: {}", verdict.outcome, descriptor.name, verdict.detail),
            Some(phase) => warn!(
                "{} {} ({}): {}",
                verdict.outcome, descriptor.name, phase, verdict.detail
            ),
        }
        verdict
    }

    /// [`Prober::probe`], recording the verdict for `page` into `run`.
    pub async fn probe_into<'r, D: Driver + ?Sized>(
        &self,
        run: &'r mut ProbeRun,
        page: &str,
        descriptor: &CapabilityDescriptor,
        driver: &mut D,
    ) -> &'r ProbeVerdict {
        let verdict = self.probe(descriptor, driver).await;
        run.record(verdict.on_page(page))
    }

    /// Whether `precondition` holds right now. Checked once, without polling.
    pub async fn precondition_holds<D: Driver + ?Sized>(
        &self,
        precondition: &Precondition,
        driver: &mut D,
    ) -> Result<bool, DriverError> {
        let found = resolve_once(driver, precondition.locators(), false).await?;
        Ok(found.is_some())
    }

    async fn run_phases<D: Driver + ?Sized>(
        &self,
        descriptor: &CapabilityDescriptor,
        driver: &mut D,
    ) -> ProbeVerdict {
        let name = descriptor.name.as_str();

        if let Err(e) = descriptor.validate() {
            return match e {
                DescriptorError::NoLocators => ProbeVerdict::skipped(name, "no locators configured"),
                other => ProbeVerdict::skipped(name, format!("invalid descriptor: {}", other)),
            };
        }

        if let Some(precondition) = &descriptor.precondition {
            match self.precondition_holds(precondition, driver).await {
                Ok(true) => {}
                Ok(false) => {
                    return ProbeVerdict::failed(
                        name,
                        Phase::Precondition,
                        format!(
                            "{} not visible before {}",
                            precondition.container(),
                            descriptor.action.name()
                        ),
                    );
                }
                Err(e) => {
                    return ProbeVerdict::failed(
                        name,
                        Phase::Precondition,
                        format!("precondition error: {}", e),
                    );
                }
            }
        }

        let poller = Poller::new(
            self.settings.poll_interval,
            Duration::from_millis(descriptor.timeout_ms),
        );

        let resolved = match resolve(driver, &descriptor.candidate_locators, &poller, true).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                return ProbeVerdict::failed(
                    name,
                    Phase::Resolution,
                    format!("no visible candidate for {}", name),
                );
            }
            Err(e) => {
                return ProbeVerdict::failed(
                    name,
                    Phase::Resolution,
                    format!("resolution error: {}", e),
                );
            }
        };
        debug!(
            "{} resolved to {} via candidate {} ({})",
            name, resolved.handle, resolved.index, resolved.locator
        );

        let effect = match perform(driver, &descriptor.action, &resolved).await {
            Ok(effect) => effect,
            Err(e) => {
                return ProbeVerdict::failed(
                    name,
                    Phase::Action,
                    format!("action {} failed: {}", descriptor.action.name(), e),
                );
            }
        };

        let resolution = describe_resolution(&resolved);
        match self
            .verify(driver, &descriptor.post_condition, &resolved, effect, &poller)
            .await
        {
            Ok(Verification::Met(detail)) => {
                ProbeVerdict::passed(name, format!("{}; {}", resolution, detail))
            }
            Ok(Verification::NotMet(reason)) => ProbeVerdict::failed(
                name,
                Phase::Verification,
                format!("{}; post-condition not met: {}", resolution, reason),
            ),
            Err(e) => ProbeVerdict::failed(
                name,
                Phase::Verification,
                format!("{}; verification error: {}", resolution, e),
            ),
        }
    }

    async fn verify<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        condition: &PostCondition,
        resolved: &ResolvedElement,
        effect: Effect,
        poller: &Poller,
    ) -> Result<Verification, DriverError> {
        match condition {
            PostCondition::None => Ok(Verification::Met(match effect.checked_after {
                Some(checked) => format!("checkbox now {}", checked_label(checked)),
                None => "no post-condition".to_string(),
            })),
            PostCondition::Visible {
                container,
                locators,
            } => match resolve(driver, locators, poller, false).await? {
                Some(found) => Ok(Verification::Met(format!(
                    "{} visible via {}",
                    container, found.locator
                ))),
                None => Ok(Verification::NotMet(format!(
                    "{} did not become visible within {}ms",
                    container,
                    poller.timeout.as_millis()
                ))),
            },
            PostCondition::Hidden {
                container,
                locators,
            } => {
                let started = Instant::now();
                let mut still = None;
                let hidden = poller
                    .until(async || {
                        resolve_once(driver, locators, false).await.map(|found| match found {
                            Some(found) => {
                                still = Some(found.locator);
                                None
                            }
                            None => Some(()),
                        })
                    })
                    .await?;
                Ok(match (hidden, still) {
                    (Some(()), _) => Verification::Met(format!(
                        "{} hidden after {}ms",
                        container,
                        started.elapsed().as_millis()
                    )),
                    (None, Some(locator)) => Verification::NotMet(format!(
                        "{} still visible via {} after {}ms",
                        container,
                        locator,
                        poller.timeout.as_millis()
                    )),
                    (None, None) => Verification::NotMet(format!(
                        "{} still visible after {}ms",
                        container,
                        poller.timeout.as_millis()
                    )),
                })
            }
            PostCondition::StateChanged => {
                let Some(before) = effect.checked_before else {
                    return Ok(Verification::NotMet(
                        "no checked state was read before the action".to_string(),
                    ));
                };
                // The first check reuses the read made right after the action.
                let mut observed = effect.checked_after;
                let changed = poller
                    .until(async || {
                        let current = match observed.take() {
                            Some(checked) => Ok(checked),
                            None => driver.is_checked(&resolved.handle).await,
                        };
                        current.map(|checked| (checked != before).then_some(checked))
                    })
                    .await?;
                Ok(match changed {
                    Some(after) => Verification::Met(format!(
                        "checkbox toggled from {} to {}",
                        checked_label(before),
                        checked_label(after)
                    )),
                    None => Verification::NotMet(format!(
                        "checkbox state unchanged (still {})",
                        checked_label(before)
                    )),
                })
            }
            PostCondition::RemainsVisible {
                container,
                locators,
            } => {
                let window = self.settings.settle_window.min(poller.timeout);
                let held = poller
                    .with_timeout(window)
                    .hold(async || resolve_once(driver, locators, false).await)
                    .await?;
                Ok(match held {
                    Some(found) => Verification::Met(format!(
                        "{} remained visible via {} for {}ms",
                        container,
                        found.locator,
                        window.as_millis()
                    )),
                    None => Verification::NotMet(format!("{} closed unexpectedly", container)),
                })
            }
        }
    }
}

/// Poll [`resolve_once`] until a candidate resolves or the poller times out.
pub async fn resolve<D: Driver + ?Sized>(
    driver: &mut D,
    locators: &[Locator],
    poller: &Poller,
    require_enabled: bool,
) -> Result<Option<ResolvedElement>, DriverError> {
    poller
        .until(async || resolve_once(driver, locators, require_enabled).await)
        .await
}

/// One pass over the candidates in order. A candidate is skipped when it
/// matches nothing or its first match is not visible (or not enabled when
/// `require_enabled`). The first surviving candidate wins.
pub async fn resolve_once<D: Driver + ?Sized>(
    driver: &mut D,
    locators: &[Locator],
    require_enabled: bool,
) -> Result<Option<ResolvedElement>, DriverError> {
    for (index, locator) in locators.iter().enumerate() {
        let handles = driver.query(locator).await?;
        let Some(first) = handles.first().copied() else {
            continue;
        };

        // An element detached between query and inspection is simply not there.
        let usable = match driver.is_visible(&first).await {
            Ok(true) if require_enabled => match driver.is_enabled(&first).await {
                Ok(enabled) => enabled,
                Err(DriverError::StaleElement(_)) => false,
                Err(e) => return Err(e),
            },
            Ok(visible) => visible,
            Err(DriverError::StaleElement(_)) => false,
            Err(e) => return Err(e),
        };

        if usable {
            return Ok(Some(ResolvedElement {
                index,
                locator: locator.clone(),
                handle: first,
                match_count: handles.len(),
            }));
        }
    }
    Ok(None)
}

async fn perform<D: Driver + ?Sized>(
    driver: &mut D,
    action: &Action,
    resolved: &ResolvedElement,
) -> Result<Effect, DriverError> {
    let handle = &resolved.handle;
    match action {
        Action::Click => {
            driver.click(handle).await?;
            Ok(Effect::default())
        }
        Action::ToggleCheckbox => {
            let before = driver.is_checked(handle).await?;
            driver.click(handle).await?;
            let after = driver.is_checked(handle).await?;
            Ok(Effect {
                checked_before: Some(before),
                checked_after: Some(after),
            })
        }
        Action::TypeText { text } => {
            driver.set_text(handle, text).await?;
            Ok(Effect::default())
        }
        Action::ClickAt { x, y } => {
            driver.click_at(*x, *y).await?;
            Ok(Effect::default())
        }
        Action::Drag { dx, dy } => {
            driver.drag(handle, *dx, *dy).await?;
            Ok(Effect::default())
        }
        Action::Inspect => Ok(Effect::default()),
    }
}

fn describe_resolution(resolved: &ResolvedElement) -> String {
    if resolved.match_count == 1 {
        format!("resolved via {}", resolved.locator)
    } else {
        format!(
            "resolved via {} ({} matches)",
            resolved.locator, resolved.match_count
        )
    }
}

fn checked_label(checked: bool) -> &'static str {
    if checked { "checked" } else { "unchecked" }
}
