use crate::cdp::{CdpClient, LaunchOptions};
use crate::script::{self, CHILD_TEXTS, CLEAR_VALUE, IS_CHECKED, IS_ENABLED, IS_VISIBLE};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use sonde_engine::driver::{Driver, DriverError, ElementHandle, NavigationResult};
use sonde_engine::locator::{Locator, LocatorQuery};
use std::collections::HashMap;
use tracing::{debug, info};

/// Intermediate pointer moves per drag. Sortable lists only start dragging
/// after the pointer has travelled a few pixels while pressed.
const DRAG_STEPS: u32 = 5;

/// Drives a Chromium instance it launches itself.
pub struct HeadlessDriver {
    client: Option<CdpClient>,
    options: LaunchOptions,
    elements: HashMap<u64, Element>,
    next_handle: u64,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::with_options(LaunchOptions::default())
    }

    pub fn with_visibility(visible: bool) -> Self {
        Self::with_options(LaunchOptions {
            visible,
            ..LaunchOptions::default()
        })
    }

    pub fn with_options(options: LaunchOptions) -> Self {
        Self {
            client: None,
            options,
            elements: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(DriverError::NotReady)
    }

    fn element(&self, handle: &ElementHandle) -> Result<&Element, DriverError> {
        self.elements
            .get(&handle.0)
            .ok_or(DriverError::StaleElement(handle.0))
    }

    fn mint(&mut self, element: Element) -> ElementHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.elements.insert(id, element);
        ElementHandle(id)
    }

    async fn navigation_result(page: &Page) -> Result<NavigationResult, DriverError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an element-level failure, turning a detached node into a stale handle.
fn element_error(handle: &ElementHandle, err: DriverError) -> DriverError {
    if script::is_detached(&err) {
        DriverError::StaleElement(handle.0)
    } else {
        err
    }
}

/// Send one left-button mouse event at `point`.
async fn mouse_event(
    page: &Page,
    kind: DispatchMouseEventType,
    point: Point,
    pressed: bool,
) -> Result<(), DriverError> {
    let event = DispatchMouseEventParams::builder()
        .r#type(kind)
        .x(point.x)
        .y(point.y)
        .button(MouseButton::Left)
        .buttons(if pressed { 1 } else { 0 })
        .click_count(1)
        .build()
        .map_err(|e| DriverError::Other(format!("Failed to build mouse event: {:?}", e)))?;
    page.execute(event)
        .await
        .map_err(|e| DriverError::Other(format!("mouse event failed: {}", e)))?;
    Ok(())
}

/// Resolve a lowered locator, outermost scope first.
async fn find_all(page: &Page, query: &LocatorQuery) -> Result<Vec<Element>, DriverError> {
    let mut chain = Vec::new();
    let mut current = Some(query);
    while let Some(step) = current {
        chain.push(step);
        current = step.scope.as_deref();
    }
    chain.reverse();

    let mut matched: Option<Vec<Element>> = None;
    for step in chain {
        let mut found = Vec::new();
        match matched.take() {
            None => {
                let elements = page
                    .find_elements(step.css.as_str())
                    .await
                    .map_err(|e| DriverError::InvalidLocator(format!("{}: {}", step.css, e)))?;
                found.extend(filter_text(elements, step).await?);
            }
            Some(scopes) => {
                for scope in scopes {
                    // A scope that vanished mid-query simply contributes nothing.
                    let Ok(elements) = scope.find_elements(step.css.as_str()).await else {
                        continue;
                    };
                    found.extend(filter_text(elements, step).await?);
                }
            }
        }
        matched = Some(found);
    }
    Ok(matched.unwrap_or_default())
}

async fn filter_text(
    elements: Vec<Element>,
    query: &LocatorQuery,
) -> Result<Vec<Element>, DriverError> {
    let Some(filter) = &query.text else {
        return Ok(elements);
    };
    // An untyped text match keeps only the innermost element carrying the
    // text, otherwise `html` would always win.
    let innermost = query.css == "*";

    let mut kept = Vec::new();
    for element in elements {
        let text = element
            .inner_text()
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        if !query.accepts_text(text.as_deref()) {
            continue;
        }
        if innermost {
            let children: Vec<String> = script::call(&element, CHILD_TEXTS).await?;
            if children.iter().any(|child| filter.matches(child)) {
                continue;
            }
        }
        kept.push(element);
    }
    Ok(kept)
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching headless driver (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.elements.clear();
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        let page = self.page()?.clone();
        self.elements.clear();

        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        Self::navigation_result(&page).await
    }

    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let page = self.page()?.clone();
        let found = find_all(&page, &locator.to_query()).await?;
        debug!("{} matched {} element(s)", locator, found.len());
        Ok(found.into_iter().map(|el| self.mint(el)).collect())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        script::call(self.element(element)?, IS_VISIBLE)
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        script::call(self.element(element)?, IS_ENABLED)
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| element_error(element, DriverError::Other(e.to_string())))?;
        Ok(())
    }

    async fn is_checked(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        script::call(self.element(element)?, IS_CHECKED)
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn set_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let target = self.element(element)?;
        script::call::<bool>(target, CLEAR_VALUE)
            .await
            .map_err(|e| element_error(element, e))?;
        target
            .focus()
            .await
            .map_err(|e| element_error(element, DriverError::Other(e.to_string())))?
            .type_str(text)
            .await
            .map_err(|e| element_error(element, DriverError::Other(e.to_string())))?;
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError> {
        self.page()?
            .click(Point { x, y })
            .await
            .map_err(|e| DriverError::Other(format!("click at ({}, {}) failed: {}", x, y, e)))?;
        Ok(())
    }

    async fn drag(&mut self, element: &ElementHandle, dx: f64, dy: f64) -> Result<(), DriverError> {
        let page = self.page()?.clone();
        let start = self
            .element(element)?
            .clickable_point()
            .await
            .map_err(|e| element_error(element, DriverError::Other(e.to_string())))?;
        debug!("Dragging {} from ({}, {}) by ({}, {})", element, start.x, start.y, dx, dy);

        // Hover first; some handles only become draggable on pointerenter.
        mouse_event(&page, DispatchMouseEventType::MouseMoved, start, false).await?;
        mouse_event(&page, DispatchMouseEventType::MousePressed, start, true).await?;
        let mut end = start;
        for step in 1..=DRAG_STEPS {
            let progress = f64::from(step) / f64::from(DRAG_STEPS);
            end = Point {
                x: start.x + dx * progress,
                y: start.y + dy * progress,
            };
            mouse_event(&page, DispatchMouseEventType::MouseMoved, end, true).await?;
        }
        mouse_event(&page, DispatchMouseEventType::MouseReleased, end, false).await
    }

    async fn release_handles(&mut self) {
        self.elements.clear();
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.page()?
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Other(format!("Screenshot failed: {}", e)))
    }
}
