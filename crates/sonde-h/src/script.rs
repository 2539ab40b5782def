use chromiumoxide::Element;
use serde::de::DeserializeOwned;
use sonde_engine::driver::DriverError;
use std::time::Duration;

/// Longest a single element script may run. A page dialog left open blocks
/// evaluation indefinitely.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Rendered and not hidden by style: a non-empty box, not
/// `visibility: hidden`, not fully transparent.
pub const IS_VISIBLE: &str = r#"function() {
    if (!this.isConnected) return false;
    const style = window.getComputedStyle(this);
    if (style.visibility === 'hidden' || style.visibility === 'collapse') return false;
    if (parseFloat(style.opacity || '1') === 0) return false;
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

pub const IS_ENABLED: &str = r#"function() {
    if (this.disabled) return false;
    if (this.closest('fieldset[disabled]')) return false;
    return this.getAttribute('aria-disabled') !== 'true';
}"#;

/// Native checkboxes report `checked`; ARIA and headless-UI checkboxes
/// carry the state in `aria-checked` or `data-state`.
pub const IS_CHECKED: &str = r#"function() {
    if (this.type === 'checkbox' || this.type === 'radio') return !!this.checked;
    const aria = this.getAttribute('aria-checked');
    if (aria !== null) return aria === 'true' || aria === 'mixed';
    return this.getAttribute('data-state') === 'checked';
}"#;

pub const CLEAR_VALUE: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
    }
    return true;
}"#;

/// Rendered text of each direct child element.
pub const CHILD_TEXTS: &str = r#"function() {
    return Array.from(this.children).map((child) => child.innerText || child.textContent || '');
}"#;

/// Evaluate `function` with the element bound to `this` and deserialize its result.
pub async fn call<T: DeserializeOwned>(element: &Element, function: &str) -> Result<T, DriverError> {
    let returns = tokio::time::timeout(EVAL_TIMEOUT, element.call_js_fn(function, false))
        .await
        .map_err(|_| DriverError::Script("evaluation timed out".into()))?
        .map_err(|e| DriverError::Script(e.to_string()))?;

    if let Some(details) = returns.exception_details {
        return Err(DriverError::Script(details.text));
    }
    let value = returns.result.value.unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value)?)
}

/// Detached nodes surface as protocol errors; callers treat them as stale.
pub fn is_detached(err: &DriverError) -> bool {
    let message = err.to_string();
    message.contains("Could not find node")
        || message.contains("No node with given id")
        || message.contains("Cannot find context")
        || message.contains("Execution context was destroyed")
}
