#![allow(dead_code)]

use async_trait::async_trait;
use sonde_common::locator::Locator;
use sonde_engine::driver::{Driver, DriverError, ElementHandle, NavigationResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type Reaction = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub label: String,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    /// Flip `checked` on every click, like a native checkbox.
    pub toggles: bool,
    pub visible_from: Option<Instant>,
    /// Container element; hiding it hides this one too.
    pub parent: Option<usize>,
}

/// In-memory page: elements, which locators match them, and what clicks do.
#[derive(Default)]
pub struct FakeDom {
    elements: Vec<FakeElement>,
    bindings: Vec<(Locator, usize)>,
    reactions: HashMap<usize, Vec<Reaction>>,
    drag_reactions: HashMap<usize, Vec<Reaction>>,
    outside_click: Vec<Reaction>,
    failing_clicks: HashSet<usize>,
}

impl FakeDom {
    pub fn add(&mut self, label: &str, visible: bool) -> usize {
        self.elements.push(FakeElement {
            label: label.to_string(),
            visible,
            enabled: true,
            checked: false,
            toggles: false,
            visible_from: None,
            parent: None,
        });
        self.elements.len() - 1
    }

    /// Add an element rendered inside `parent`.
    pub fn add_child(&mut self, label: &str, parent: usize) -> usize {
        let id = self.add(label, true);
        self.elements[id].parent = Some(parent);
        id
    }

    pub fn add_checkbox(&mut self, label: &str, checked: bool) -> usize {
        let id = self.add(label, true);
        self.elements[id].checked = checked;
        self.elements[id].toggles = true;
        id
    }

    pub fn bind(&mut self, locator: Locator, id: usize) {
        self.bindings.push((locator, id));
    }

    pub fn on_click(&mut self, id: usize, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.reactions.entry(id).or_default().push(Arc::new(reaction));
    }

    pub fn on_drag(&mut self, id: usize, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.drag_reactions
            .entry(id)
            .or_default()
            .push(Arc::new(reaction));
    }

    pub fn on_click_at(&mut self, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.outside_click.push(Arc::new(reaction));
    }

    pub fn fail_clicks_on(&mut self, id: usize) {
        self.failing_clicks.insert(id);
    }

    pub fn show(&mut self, id: usize) {
        self.elements[id].visible = true;
        self.elements[id].visible_from = None;
    }

    pub fn show_after(&mut self, id: usize, delay: Duration) {
        self.elements[id].visible = true;
        self.elements[id].visible_from = Some(Instant::now() + delay);
    }

    pub fn hide(&mut self, id: usize) {
        self.elements[id].visible = false;
    }

    pub fn disable(&mut self, id: usize) {
        self.elements[id].enabled = false;
    }

    pub fn set_checked(&mut self, id: usize, checked: bool) {
        self.elements[id].checked = checked;
    }

    pub fn element(&self, id: usize) -> &FakeElement {
        &self.elements[id]
    }

    fn visible_now(&self, id: usize) -> bool {
        let el = &self.elements[id];
        let shown = el.visible && el.visible_from.is_none_or(|t| Instant::now() >= t);
        shown && el.parent.is_none_or(|parent| self.visible_now(parent))
    }
}

#[derive(Default)]
pub struct FakeDriver {
    pub dom: FakeDom,
    pub launched: bool,
    pub close_calls: u32,
    pub launch_error: Option<String>,
    pub navigate_error: Option<String>,
    pub panic_on_query: bool,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub drags: Vec<String>,
    pub releases: u32,
}

impl FakeDriver {
    pub fn new(dom: FakeDom) -> Self {
        Self {
            dom,
            ..Default::default()
        }
    }

    fn element_id(&self, handle: &ElementHandle) -> Result<usize, DriverError> {
        let id = handle.0 as usize;
        if id < self.dom.elements.len() {
            Ok(id)
        } else {
            Err(DriverError::StaleElement(handle.0))
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        if let Some(message) = &self.launch_error {
            return Err(DriverError::Launch(message.clone()));
        }
        self.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.close_calls += 1;
        self.launched = false;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launched
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        if let Some(message) = &self.navigate_error {
            return Err(DriverError::Navigation(message.clone()));
        }
        self.navigations.push(url.to_string());
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Fake".to_string(),
        })
    }

    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        if self.panic_on_query {
            panic!("query exploded");
        }
        Ok(self
            .dom
            .bindings
            .iter()
            .filter(|(bound, _)| bound == locator)
            .map(|(_, id)| ElementHandle(*id as u64))
            .collect())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        let id = self.element_id(element)?;
        Ok(self.dom.visible_now(id))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        let id = self.element_id(element)?;
        Ok(self.dom.elements[id].enabled)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let id = self.element_id(element)?;
        if self.dom.failing_clicks.contains(&id) {
            return Err(DriverError::Other("element is detached from the DOM".into()));
        }
        self.clicks.push(self.dom.elements[id].label.clone());
        if self.dom.elements[id].toggles {
            self.dom.elements[id].checked = !self.dom.elements[id].checked;
        }
        let reactions = self.dom.reactions.get(&id).cloned().unwrap_or_default();
        for reaction in reactions {
            reaction(&mut self.dom);
        }
        Ok(())
    }

    async fn is_checked(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        let id = self.element_id(element)?;
        Ok(self.dom.elements[id].checked)
    }

    async fn set_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let id = self.element_id(element)?;
        self.dom.elements[id].label = text.to_string();
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError> {
        self.clicks.push(format!("({}, {})", x, y));
        let reactions = self.dom.outside_click.clone();
        for reaction in reactions {
            reaction(&mut self.dom);
        }
        Ok(())
    }

    async fn drag(&mut self, element: &ElementHandle, dx: f64, dy: f64) -> Result<(), DriverError> {
        let id = self.element_id(element)?;
        self.drags
            .push(format!("{} by ({}, {})", self.dom.elements[id].label, dx, dy));
        let reactions = self.dom.drag_reactions.get(&id).cloned().unwrap_or_default();
        for reaction in reactions {
            reaction(&mut self.dom);
        }
        Ok(())
    }

    async fn release_handles(&mut self) {
        self.releases += 1;
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Ok(b"\x89PNG fake".to_vec())
    }
}

pub fn menu_locator() -> Locator {
    Locator::role("menu")
}

pub fn columns_button() -> Locator {
    Locator::tagged_text("button", "Columns")
}

pub fn checkbox_in_menu() -> Locator {
    Locator::css("input[type=\"checkbox\"]").within(menu_locator())
}

/// Element ids of a [`column_page`].
pub struct ColumnPage {
    pub button: usize,
    pub menu: usize,
    pub checkboxes: Vec<usize>,
    pub handles: Vec<usize>,
    pub body: usize,
}

/// A well-behaved column menu: the "Columns" button opens a `role=menu`
/// holding `checkboxes` checkboxes and drag handles. Checkbox clicks and
/// drags keep it open, clicking outside closes it.
pub fn column_page(checkboxes: usize) -> (FakeDom, ColumnPage) {
    let mut dom = FakeDom::default();
    let body = dom.add("body", true);
    dom.bind(Locator::css("body"), body);

    let button = dom.add("Columns", true);
    dom.bind(columns_button(), button);

    let menu = dom.add("menu", false);
    dom.bind(menu_locator(), menu);
    dom.on_click(button, move |dom| dom.show(menu));
    dom.on_click_at(move |dom| dom.hide(menu));

    let mut boxes = Vec::new();
    let mut handles = Vec::new();
    for i in 0..checkboxes {
        let cb = dom.add_checkbox(&format!("column {}", i), true);
        dom.elements[cb].parent = Some(menu);
        dom.bind(checkbox_in_menu(), cb);
        boxes.push(cb);

        let handle = dom.add_child(&format!("grip {}", i), menu);
        dom.bind(Locator::css(".drag-handle").within(menu_locator()), handle);
        handles.push(handle);
    }

    (
        dom,
        ColumnPage {
            button,
            menu,
            checkboxes: boxes,
            handles,
            body,
        },
    )
}
