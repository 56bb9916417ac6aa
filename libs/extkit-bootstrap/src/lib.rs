//! Application-level plumbing around the extkit engine: layered configuration,
//! logging setup and mapping of configured options onto a builder.

pub mod config;
pub mod logging;
pub mod options;

pub use config::*;
pub use logging::*;
pub use options::*;
