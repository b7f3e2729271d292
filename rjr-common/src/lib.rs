//! Shared engine and diff pipeline for the Remote Job Runner.
//!
//! The execution engine (log channel, shipper, process runner, artifact
//! uploads) is workflow-agnostic: the `rjr-wkr` binary wires it to one
//! job and drives a workflow script over it. The diff pipeline
//! (collection, literal extraction, rendering, persistence) serves the
//! comparison-oriented workflows.

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod client;
pub mod config;
pub mod diff;
pub mod errors;
pub mod logchan;
pub mod logging;
pub mod process;
pub mod rebuild;
pub mod shipper;
pub mod types;
pub mod util;

pub use config::RunnerConfig;
pub use errors::RunnerError;
pub use logchan::{HeartbeatConfig, LogChannel};
pub use logging::{LogConfig, init_logging};
pub use types::{JobKind, JobMetadata, LogLine};
