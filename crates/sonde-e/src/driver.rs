use crate::webdriver::{WebDriverClient, headless_capabilities};
use async_trait::async_trait;
use fantoccini::Locator as By;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use serde_json::Value;
use sonde_engine::driver::{Driver, DriverError, ElementHandle, NavigationResult};
use sonde_engine::locator::{Locator, LocatorQuery};
use std::collections::HashMap;
use tracing::{debug, info};

const IS_CHECKED: &str = r#"
const el = arguments[0];
if (el.type === 'checkbox' || el.type === 'radio') return !!el.checked;
const aria = el.getAttribute('aria-checked');
if (aria !== null) return aria === 'true' || aria === 'mixed';
return el.getAttribute('data-state') === 'checked';
"#;

const IS_ENABLED: &str = r#"
const el = arguments[0];
if (el.disabled || el.closest('fieldset[disabled]')) return false;
return el.getAttribute('aria-disabled') !== 'true';
"#;

const CHILD_TEXTS: &str = r#"
return Array.from(arguments[0].children).map((c) => c.innerText || c.textContent || '');
"#;

/// WebDriver has no coordinate click without the actions API; dispatch the
/// pointer sequence on whatever sits at the point instead.
const CLICK_AT: &str = r#"
const [x, y] = [arguments[0], arguments[1]];
const target = document.elementFromPoint(x, y) || document.body;
const init = { bubbles: true, cancelable: true, view: window, clientX: x, clientY: y, button: 0 };
target.dispatchEvent(new PointerEvent('pointerdown', init));
target.dispatchEvent(new MouseEvent('mousedown', init));
target.dispatchEvent(new PointerEvent('pointerup', init));
target.dispatchEvent(new MouseEvent('mouseup', init));
target.dispatchEvent(new MouseEvent('click', init));
return true;
"#;

/// Pointer drag from the element's center by `(dx, dy)`. Sortable lists
/// listen for pointer or mouse events; native `draggable` elements also get
/// the HTML5 drag sequence.
const DRAG_BY: &str = r#"
const [el, dx, dy, steps] = [arguments[0], arguments[1], arguments[2], arguments[3]];
const rect = el.getBoundingClientRect();
const x = rect.left + rect.width / 2;
const y = rect.top + rect.height / 2;
const fire = (target, type, px, py, buttons) => {
  const init = { bubbles: true, cancelable: true, view: window, clientX: px, clientY: py, button: 0, buttons };
  const Ctor = type.startsWith('pointer') ? PointerEvent : MouseEvent;
  target.dispatchEvent(new Ctor(type, init));
};
fire(el, 'pointerdown', x, y, 1);
fire(el, 'mousedown', x, y, 1);
let [ex, ey] = [x, y];
for (let i = 1; i <= steps; i++) {
  [ex, ey] = [x + (dx * i) / steps, y + (dy * i) / steps];
  const over = document.elementFromPoint(ex, ey) || el;
  fire(over, 'pointermove', ex, ey, 1);
  fire(over, 'mousemove', ex, ey, 1);
}
const drop = document.elementFromPoint(ex, ey) || el;
if (el.draggable) {
  const data = new DataTransfer();
  el.dispatchEvent(new DragEvent('dragstart', { bubbles: true, dataTransfer: data }));
  drop.dispatchEvent(new DragEvent('dragover', { bubbles: true, cancelable: true, dataTransfer: data, clientX: ex, clientY: ey }));
  drop.dispatchEvent(new DragEvent('drop', { bubbles: true, cancelable: true, dataTransfer: data, clientX: ex, clientY: ey }));
  el.dispatchEvent(new DragEvent('dragend', { bubbles: true, dataTransfer: data }));
}
fire(drop, 'pointerup', ex, ey, 0);
fire(drop, 'mouseup', ex, ey, 0);
return true;
"#;

/// Intermediate pointer moves per drag.
const DRAG_STEPS: u32 = 5;

/// Drives a browser through an external WebDriver server.
pub struct WebDriverDriver {
    client: Option<WebDriverClient>,
    webdriver_url: String,
    headless: bool,
    elements: HashMap<u64, Element>,
    next_handle: u64,
}

impl WebDriverDriver {
    pub fn with_url(webdriver_url: impl Into<String>) -> Self {
        Self {
            client: None,
            webdriver_url: webdriver_url.into(),
            headless: false,
            elements: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn client(&self) -> Result<&WebDriverClient, DriverError> {
        self.client.as_ref().ok_or(DriverError::NotReady)
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

    async fn element_script(
        &self,
        handle: &ElementHandle,
        script: &str,
    ) -> Result<Value, DriverError> {
        let element = serde_json::to_value(self.element(handle)?)?;
        self.client()?
            .client
            .execute(script, vec![element])
            .await
            .map_err(|e| element_error(handle, e))
    }

    async fn navigation_result(client: &WebDriverClient) -> NavigationResult {
        let title = client.client.title().await.unwrap_or_default();
        let url = client
            .client
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_default();
        NavigationResult { url, title }
    }
}

fn element_error(handle: &ElementHandle, err: CmdError) -> DriverError {
    let message = err.to_string();
    if err.is_no_such_element() || message.contains("stale element") {
        DriverError::StaleElement(handle.0)
    } else {
        DriverError::Other(message)
    }
}

fn as_bool(value: Value) -> Result<bool, DriverError> {
    value
        .as_bool()
        .ok_or_else(|| DriverError::Script(format!("expected a boolean, got {}", value)))
}

/// Resolve a lowered locator, outermost scope first.
async fn find_all(
    client: &WebDriverClient,
    query: &LocatorQuery,
) -> Result<Vec<Element>, DriverError> {
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
                let elements = client
                    .client
                    .find_all(By::Css(&step.css))
                    .await
                    .map_err(|e| DriverError::InvalidLocator(format!("{}: {}", step.css, e)))?;
                found.extend(filter_text(client, elements, step).await?);
            }
            Some(scopes) => {
                for scope in scopes {
                    let Ok(elements) = scope.find_all(By::Css(&step.css)).await else {
                        continue;
                    };
                    found.extend(filter_text(client, elements, step).await?);
                }
            }
        }
        matched = Some(found);
    }
    Ok(matched.unwrap_or_default())
}

async fn filter_text(
    client: &WebDriverClient,
    elements: Vec<Element>,
    query: &LocatorQuery,
) -> Result<Vec<Element>, DriverError> {
    let Some(filter) = &query.text else {
        return Ok(elements);
    };
    let innermost = query.css == "*";

    let mut kept = Vec::new();
    for element in elements {
        // WebDriver reports no text for hidden elements.
        let Ok(text) = element.text().await else {
            continue;
        };
        if !query.accepts_text(Some(&text)) {
            continue;
        }
        if innermost {
            let children = client
                .client
                .execute(CHILD_TEXTS, vec![serde_json::to_value(&element)?])
                .await
                .map_err(|e| DriverError::Script(e.to_string()))?;
            let children: Vec<String> = serde_json::from_value(children)?;
            if children.iter().any(|child| filter.matches(child)) {
                continue;
            }
        }
        kept.push(element);
    }
    Ok(kept)
}

#[async_trait]
impl Driver for WebDriverDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Connecting to WebDriver at {}...", self.webdriver_url);
        let capabilities = self.headless.then(|| headless_capabilities((1920, 1080)));
        let client = WebDriverClient::connect(&self.webdriver_url, capabilities)
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
        self.elements.clear();
        let client = self.client()?;

        info!("Navigating to: {}", url);
        client
            .client
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        Ok(Self::navigation_result(client).await)
    }

    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let found = find_all(self.client()?, &locator.to_query()).await?;
        debug!("{} matched {} element(s)", locator, found.len());
        Ok(found.into_iter().map(|el| self.mint(el)).collect())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        self.element(element)?
            .is_displayed()
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        as_bool(self.element_script(element, IS_ENABLED).await?)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn is_checked(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        as_bool(self.element_script(element, IS_CHECKED).await?)
    }

    async fn set_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let target = self.element(element)?;
        target
            .clear()
            .await
            .map_err(|e| element_error(element, e))?;
        target
            .send_keys(text)
            .await
            .map_err(|e| element_error(element, e))
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError> {
        self.client()?
            .client
            .execute(CLICK_AT, vec![Value::from(x), Value::from(y)])
            .await
            .map_err(|e| DriverError::Other(format!("click at ({}, {}) failed: {}", x, y, e)))?;
        Ok(())
    }

    async fn drag(&mut self, element: &ElementHandle, dx: f64, dy: f64) -> Result<(), DriverError> {
        let target = serde_json::to_value(self.element(element)?)?;
        debug!("Dragging {} by ({}, {})", element, dx, dy);
        self.client()?
            .client
            .execute(
                DRAG_BY,
                vec![
                    target,
                    Value::from(dx),
                    Value::from(dy),
                    Value::from(DRAG_STEPS),
                ],
            )
            .await
            .map_err(|e| element_error(element, e))?;
        Ok(())
    }

    async fn release_handles(&mut self) {
        self.elements.clear();
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.client()?
            .client
            .screenshot()
            .await
            .map_err(|e| DriverError::Other(format!("Screenshot failed: {}", e)))
    }
}
