pub mod action;
pub mod actions;
pub mod analysis;
pub mod config;
pub mod driver;
pub mod registry;

pub use action::{Action, Analysis, Capabilities, Dataset};
pub use analysis::{run_analysis, Autocorr, RunningAverage, Stat};
pub use config::{DriverConfig, PartialResultPolicy};
pub use driver::{ActionDriver, ActionResult, CancelToken, DriverState, PartialRun, RunOutput};
pub use registry::{ActionRegistry, AnalysisRegistry, Describe, Registry, RegistryBuilder};

#[cfg(test)]
mod tests;
