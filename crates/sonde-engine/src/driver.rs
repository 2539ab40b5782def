use async_trait::async_trait;
pub use sonde_common::error::DriverError;
use sonde_common::locator::Locator;
use std::fmt;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// Opaque reference to a live element, minted and owned by a driver.
/// Valid until the driver's next navigation or [`Driver::release_handles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The minimal browser capability interface the probe engine is written against.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch the browser or connect to it.
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Close the browser and release everything `launch` acquired.
    async fn close(&mut self) -> Result<(), DriverError>;

    async fn is_ready(&self) -> bool;

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError>;

    /// All elements currently matching `locator`, in document order.
    /// No match is an empty list, not an error.
    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError>;

    async fn is_enabled(&mut self, _element: &ElementHandle) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Checked state of a native checkbox or an ARIA checkbox-like element.
    async fn is_checked(&mut self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Focus the element and insert text.
    async fn set_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Pointer click at viewport coordinates.
    async fn click_at(&mut self, _x: f64, _y: f64) -> Result<(), DriverError> {
        Err(DriverError::NotSupported("click_at".into()))
    }

    /// Press on the element's center, move by `(dx, dy)` in steps, release.
    async fn drag(
        &mut self,
        _element: &ElementHandle,
        _dx: f64,
        _dy: f64,
    ) -> Result<(), DriverError> {
        Err(DriverError::NotSupported("drag".into()))
    }

    /// Forget every handle minted so far. Called before each capability
    /// check, so a handle never outlives the check that resolved it.
    async fn release_handles(&mut self) {}

    /// PNG capture of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;
}

/// Creates one independent driver per session.
pub trait DriverFactory: Send + Sync {
    fn create(&self) -> Box<dyn Driver>;
}

impl<F> DriverFactory for F
where
    F: Fn() -> Box<dyn Driver> + Send + Sync,
{
    fn create(&self) -> Box<dyn Driver> {
        self()
    }
}
