//! procwatch core - platform-independent pieces of the subprocess watcher
//!
//! This crate provides the configuration, error types and process collaborator
//! traits shared with the platform crates, plus the watcher itself: line
//! reassembly, stream multiplexing, the readiness gate, the output sink and the
//! lifecycle controller that ties them together.

mod config;
mod error;
mod gate;
mod hooks;
mod line;
mod multiplexer;
mod process;
mod sink;
#[cfg(test)]
mod testing;
mod watcher;

pub use config::*;
pub use error::*;
pub use gate::{GateOutcome, ReadinessGate, ReadinessState};
pub use hooks::{OutputObserver, ReadinessPredicate, WatchHooks};
pub use line::{Line, LineBuffer, StreamKind};
pub use multiplexer::{ExitReason, StreamMultiplexer, TickReport, WatchSummary};
pub use process::*;
pub use sink::OutputSink;
pub use watcher::{LifecycleState, ProcessWatcher};
