//! procwatch - launch a child process, watch its stdout and stderr line by
//! line, and block until it reports that it is ready.
//!
//! ```rust,no_run
//! use procwatch::{RunnerConfig, Subprocess, WatchHooks};
//!
//! # fn main() -> Result<(), procwatch::WatchError> {
//! let config = RunnerConfig::from_argv(["./server", "--port", "8080"])?;
//! let hooks = WatchHooks::new()
//!     .on_output(|line, is_stdout| {
//!         print!("[{}] {line}", if is_stdout { "out" } else { "err" });
//!         true
//!     })
//!     .ready_when(|line| line.contains("listening"));
//!
//! let mut server = Subprocess::start(config, hooks)?;
//! // ... talk to the server ...
//! let summary = server.stop()?;
//! println!("{} lines observed", summary.total_lines());
//! # Ok(())
//! # }
//! ```

mod factory;
mod subprocess;

pub use factory::{PlatformHandle, PlatformProcessSpawnerFactory, PlatformSpawner};
pub use subprocess::Subprocess;

// Re-export core functionality
pub use procwatch_core::*;
