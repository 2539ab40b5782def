use thiserror::Error;

/// Faults raised by a browser driver.
///
/// "No element matched" is never one of these: queries return an empty list.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Driver not ready")]
    NotReady,
    #[error("Operation not supported by this driver: {0}")]
    NotSupported(String),
    #[error("Launch failed: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Stale element handle {0}")]
    StaleElement(u64),
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
    #[error("Script error: {0}")]
    Script(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

