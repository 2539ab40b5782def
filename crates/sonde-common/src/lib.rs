pub mod capability;
pub mod error;
pub mod locator;
pub mod verdict;

pub use capability::{Action, CapabilityDescriptor, DescriptorError, PostCondition};
pub use error::DriverError;
pub use locator::{AttrOp, Locator, LocatorError, LocatorQuery, TextFilter, TextMatch};
pub use verdict::{Outcome, Phase, ProbeVerdict, RunReport, Summary};
