use crate::locator::{Locator, LocatorError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 1500;

/// Interaction performed against the resolved element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click,
    /// Read the checked state, click, and read it again.
    ToggleCheckbox,
    TypeText {
        text: String,
    },
    /// Pointer click at viewport coordinates. The resolved element only
    /// anchors the probe to a rendered page.
    ClickAt {
        x: f64,
        y: f64,
    },
    /// Press on the element's center, move by the offset, release.
    Drag {
        dx: f64,
        dy: f64,
    },
    /// No interaction; resolving the element is the capability.
    Inspect,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::ToggleCheckbox => "toggle_checkbox",
            Action::TypeText { .. } => "type_text",
            Action::ClickAt { .. } => "click_at",
            Action::Drag { .. } => "drag",
            Action::Inspect => "inspect",
        }
    }
}

/// Observable state that proves an action had the expected effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostCondition {
    None,
    /// Some locator in the set resolves to a visible element.
    Visible {
        container: String,
        locators: Vec<Locator>,
    },
    /// No locator in the set resolves to a visible element.
    Hidden {
        container: String,
        locators: Vec<Locator>,
    },
    /// The checked state read after the action differs from the one read
    /// before it. Direction is not checked.
    StateChanged,
    /// The container stays visible at every poll of the settle window.
    RemainsVisible {
        container: String,
        locators: Vec<Locator>,
    },
}

impl PostCondition {
    pub fn visible(container: impl Into<String>, locators: Vec<Locator>) -> Self {
        PostCondition::Visible {
            container: container.into(),
            locators,
        }
    }

    pub fn hidden(container: impl Into<String>, locators: Vec<Locator>) -> Self {
        PostCondition::Hidden {
            container: container.into(),
            locators,
        }
    }

    pub fn remains_visible(container: impl Into<String>, locators: Vec<Locator>) -> Self {
        PostCondition::RemainsVisible {
            container: container.into(),
            locators,
        }
    }

    fn locators(&self) -> &[Locator] {
        match self {
            PostCondition::Visible { locators, .. }
            | PostCondition::Hidden { locators, .. }
            | PostCondition::RemainsVisible { locators, .. } => locators,
            PostCondition::None | PostCondition::StateChanged => &[],
        }
    }
}

/// Page state that must already hold before the probe resolves its target.
/// Checked once, without polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Precondition {
    /// Some locator in the set resolves to a visible element.
    Visible {
        container: String,
        locators: Vec<Locator>,
    },
}

impl Precondition {
    pub fn visible(container: impl Into<String>, locators: Vec<Locator>) -> Self {
        Precondition::Visible {
            container: container.into(),
            locators,
        }
    }

    pub fn container(&self) -> &str {
        match self {
            Precondition::Visible { container, .. } => container,
        }
    }

    pub fn locators(&self) -> &[Locator] {
        match self {
            Precondition::Visible { locators, .. } => locators,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    #[error("no locators configured")]
    NoLocators,
    #[error("candidate locator {index} is invalid: {source}")]
    InvalidCandidate {
        index: usize,
        #[source]
        source: LocatorError,
    },
    #[error("post-condition has no locators")]
    EmptyPostCondition,
    #[error("post-condition locator {index} is invalid: {source}")]
    InvalidPostCondition {
        index: usize,
        #[source]
        source: LocatorError,
    },
    #[error("precondition has no locators")]
    EmptyPrecondition,
    #[error("precondition locator {index} is invalid: {source}")]
    InvalidPrecondition {
        index: usize,
        #[source]
        source: LocatorError,
    },
    #[error("{0} requires a toggle_checkbox action")]
    StateChangeWithoutToggle(String),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Immutable description of one UI capability to probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    #[serde(default)]
    pub candidate_locators: Vec<Locator>,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<Precondition>,
    #[serde(default = "default_post_condition")]
    pub post_condition: PostCondition,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_post_condition() -> PostCondition {
    PostCondition::None
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            candidate_locators: Vec::new(),
            action,
            precondition: None,
            post_condition: PostCondition::None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_locators(mut self, locators: impl IntoIterator<Item = Locator>) -> Self {
        self.candidate_locators.extend(locators);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn with_post_condition(mut self, post_condition: PostCondition) -> Self {
        self.post_condition = post_condition;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Configuration problems, distinct from anything a page can cause.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.candidate_locators.is_empty() {
            return Err(DescriptorError::NoLocators);
        }
        if self.timeout_ms == 0 {
            return Err(DescriptorError::ZeroTimeout);
        }
        for (index, locator) in self.candidate_locators.iter().enumerate() {
            locator
                .validate()
                .map_err(|source| DescriptorError::InvalidCandidate { index, source })?;
        }

        if let Some(precondition) = &self.precondition {
            if precondition.locators().is_empty() {
                return Err(DescriptorError::EmptyPrecondition);
            }
            for (index, locator) in precondition.locators().iter().enumerate() {
                locator
                    .validate()
                    .map_err(|source| DescriptorError::InvalidPrecondition { index, source })?;
            }
        }

        match &self.post_condition {
            PostCondition::None => {}
            PostCondition::StateChanged => {
                if self.action != Action::ToggleCheckbox {
                    return Err(DescriptorError::StateChangeWithoutToggle(self.name.clone()));
                }
            }
            other => {
                if other.locators().is_empty() {
                    return Err(DescriptorError::EmptyPostCondition);
                }
                for (index, locator) in other.locators().iter().enumerate() {
                    locator
                        .validate()
                        .map_err(|source| DescriptorError::InvalidPostCondition { index, source })?;
                }
            }
        }
        Ok(())
    }
}
