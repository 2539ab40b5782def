pub mod battery;
pub mod config;
pub mod driver;
pub mod formatter;
pub mod poll;
pub mod preflight;
pub mod probe;
pub mod report;
pub mod run;
pub mod screenshot;
pub mod session;

pub use sonde_common::{capability, locator, verdict};
