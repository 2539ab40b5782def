//! Headless Chromium driver over the DevTools protocol.

pub mod cdp;
pub mod driver;
mod script;

pub use driver::HeadlessDriver;
