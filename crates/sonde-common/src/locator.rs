use serde::{Deserialize, Serialize};
use std::fmt;

/// How a text locator compares an element's rendered text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Case-insensitive substring, the same semantics as `:has-text()`.
    #[default]
    Contains,
    /// Whitespace-trimmed, case-sensitive equality.
    Exact,
    Regex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrOp {
    #[default]
    Equals,
    /// Case-insensitive substring (`[name*="value" i]`).
    Contains,
    Present,
}

/// A declarative query that may match zero or more live elements.
///
/// Locators never touch a browser themselves. Drivers evaluate the lowered
/// [`LocatorQuery`] form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(default)]
        mode: TextMatch,
    },
    Attribute {
        name: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        op: AttrOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    Role {
        role: String,
    },
    Css {
        selector: String,
    },
    Within {
        scope: Box<Locator>,
        target: Box<Locator>,
    },
}

impl Locator {
    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            tag: None,
            mode: TextMatch::Contains,
        }
    }

    /// Text match restricted to one element type, e.g. `button` containing "Columns".
    pub fn tagged_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            tag: Some(tag.into()),
            mode: TextMatch::Contains,
        }
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            tag: None,
            mode: TextMatch::Exact,
        }
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Locator::Attribute {
            name: name.into(),
            value: value.into(),
            op: AttrOp::Equals,
            tag: None,
        }
    }

    pub fn attr_contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Locator::Attribute {
            name: name.into(),
            value: value.into(),
            op: AttrOp::Contains,
            tag: None,
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Locator::Role { role: role.into() }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    /// Restrict `self` to descendants of elements matched by `scope`.
    pub fn within(self, scope: Locator) -> Self {
        Locator::Within {
            scope: Box::new(scope),
            target: Box::new(self),
        }
    }

    /// Restrict an attribute locator to one element type.
    pub fn on_tag(self, tag: impl Into<String>) -> Self {
        match self {
            Locator::Attribute {
                name, value, op, ..
            } => Locator::Attribute {
                name,
                value,
                op,
                tag: Some(tag.into()),
            },
            Locator::Text { text, mode, .. } => Locator::Text {
                text,
                tag: Some(tag.into()),
                mode,
            },
            other => other,
        }
    }

    /// Check the parts of a locator that can be wrong before any browser is involved.
    pub fn validate(&self) -> Result<(), LocatorError> {
        match self {
            Locator::Text { text, mode, .. } => {
                if text.trim().is_empty() {
                    return Err(LocatorError::EmptyText);
                }
                if *mode == TextMatch::Regex {
                    regex::Regex::new(text)
                        .map_err(|e| LocatorError::InvalidRegex(text.clone(), e.to_string()))?;
                }
                Ok(())
            }
            Locator::Attribute { name, .. } => {
                if name.trim().is_empty() {
                    Err(LocatorError::EmptyAttribute)
                } else {
                    Ok(())
                }
            }
            Locator::Role { role } => {
                if role.trim().is_empty() {
                    Err(LocatorError::EmptyRole)
                } else {
                    Ok(())
                }
            }
            Locator::Css { selector } => {
                if selector.trim().is_empty() {
                    Err(LocatorError::EmptySelector)
                } else {
                    Ok(())
                }
            }
            Locator::Within { scope, target } => {
                scope.validate()?;
                target.validate()
            }
        }
    }

    /// Lower into the browser-independent form drivers evaluate.
    pub fn to_query(&self) -> LocatorQuery {
        match self {
            Locator::Text { text, tag, mode } => LocatorQuery {
                css: tag.clone().unwrap_or_else(|| "*".to_string()),
                text: Some(TextFilter::new(text.clone(), *mode)),
                scope: None,
            },
            Locator::Attribute {
                name,
                value,
                op,
                tag,
            } => {
                let prefix = tag.as_deref().unwrap_or("");
                let css = match op {
                    AttrOp::Equals => format!("{}[{}=\"{}\"]", prefix, name, css_escape(value)),
                    AttrOp::Contains => {
                        format!("{}[{}*=\"{}\" i]", prefix, name, css_escape(value))
                    }
                    AttrOp::Present => format!("{}[{}]", prefix, name),
                };
                LocatorQuery::css(css)
            }
            Locator::Role { role } => LocatorQuery::css(format!("[role=\"{}\"]", css_escape(role))),
            Locator::Css { selector } => LocatorQuery::css(selector.clone()),
            Locator::Within { scope, target } => {
                let mut query = target.to_query();
                query.scope = Some(Box::new(scope.to_query()));
                query
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Text { text, tag, mode } => {
                if let Some(tag) = tag {
                    write!(f, "{}:", tag)?;
                }
                let op = match mode {
                    TextMatch::Contains => "~",
                    TextMatch::Exact => "=",
                    TextMatch::Regex => "/",
                };
                write!(f, "text{}\"{}\"", op, text)
            }
            Locator::Attribute {
                name,
                value,
                op,
                tag,
            } => {
                let tag = tag.as_deref().unwrap_or("");
                match op {
                    AttrOp::Equals => write!(f, "{}[{}=\"{}\"]", tag, name, value),
                    AttrOp::Contains => write!(f, "{}[{}*=\"{}\"]", tag, name, value),
                    AttrOp::Present => write!(f, "{}[{}]", tag, name),
                }
            }
            Locator::Role { role } => write!(f, "role={}", role),
            Locator::Css { selector } => write!(f, "css={}", selector),
            Locator::Within { scope, target } => write!(f, "{} >> {}", scope, target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    #[error("text locator has empty text")]
    EmptyText,
    #[error("attribute locator has empty attribute name")]
    EmptyAttribute,
    #[error("role locator has empty role")]
    EmptyRole,
    #[error("css locator has empty selector")]
    EmptySelector,
    #[error("invalid regex '{0}': {1}")]
    InvalidRegex(String, String),
}

/// Text filter applied after CSS selection. The comparison form is prepared
/// once, at lowering, and reused for every element a driver checks.
#[derive(Debug, Clone)]
pub struct TextFilter {
    text: String,
    mode: TextMatch,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Lowercased needle.
    Contains(String),
    Exact,
    Regex(regex::Regex),
    /// Never matches; descriptors reject invalid patterns up front.
    Invalid,
}

impl TextFilter {
    pub fn new(text: impl Into<String>, mode: TextMatch) -> Self {
        let text = text.into();
        let matcher = match mode {
            TextMatch::Contains => Matcher::Contains(text.to_lowercase()),
            TextMatch::Exact => Matcher::Exact,
            TextMatch::Regex => match regex::Regex::new(&text) {
                Ok(re) => Matcher::Regex(re),
                Err(_) => Matcher::Invalid,
            },
        };
        Self {
            text,
            mode,
            matcher,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> TextMatch {
        self.mode
    }

    /// Whether an element's rendered text satisfies this filter.
    pub fn matches(&self, rendered: &str) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => rendered.to_lowercase().contains(needle.as_str()),
            Matcher::Exact => rendered.trim() == self.text,
            Matcher::Regex(re) => re.is_match(rendered),
            Matcher::Invalid => false,
        }
    }
}

impl PartialEq for TextFilter {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.mode == other.mode
    }
}

impl Eq for TextFilter {}

/// Lowered locator: select by CSS, optionally filter by text, optionally
/// restrict to descendants of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorQuery {
    pub css: String,
    pub text: Option<TextFilter>,
    pub scope: Option<Box<LocatorQuery>>,
}

impl LocatorQuery {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
            scope: None,
        }
    }

    /// Whether a candidate with the given rendered text passes the text filter.
    pub fn accepts_text(&self, rendered: Option<&str>) -> bool {
        match &self.text {
            None => true,
            Some(filter) => filter.matches(rendered.unwrap_or("")),
        }
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
