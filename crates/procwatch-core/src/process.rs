use crate::config::RunnerConfig;
use crate::error::ProcessError;
use std::io::{self, Read};
use std::time::Duration;

/// Unique identifier for a process
pub type ProcessId = u32;

/// What a non-blocking availability query found on a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Nothing to read right now
    Pending,
    /// This many bytes can be read without blocking
    Bytes(usize),
    /// The writer closed its end; the next read returns what is left, then zero
    HungUp,
}

/// A child output stream that can be checked for readable bytes without blocking
pub trait OutputStream: Read + Send {
    fn poll_available(&mut self) -> io::Result<Availability>;
}

impl<T: OutputStream + ?Sized> OutputStream for Box<T> {
    fn poll_available(&mut self) -> io::Result<Availability> {
        (**self).poll_available()
    }
}

/// The child's stdout and stderr, handed to the watcher thread
pub struct OutputStreams {
    pub stdout: Box<dyn OutputStream>,
    pub stderr: Box<dyn OutputStream>,
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated and reaped
    Success,
    /// Process had already exited on its own
    AlreadyExited,
    /// Process was not found
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

impl TerminationResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TerminationResult::Success
                | TerminationResult::AlreadyExited
                | TerminationResult::ProcessNotFound
        )
    }
}

/// Trait representing a handle to a running child process
pub trait ProcessHandle: Send {
    /// Get the process ID (None if the handle never had one)
    fn pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn command(&self) -> &str;

    /// Hand out the readable ends of the child's stdout and stderr.
    /// Returns None once they were taken.
    fn take_output_streams(&mut self) -> Option<OutputStreams>;

    /// Check if the process is still running (non-blocking)
    fn is_running(&mut self) -> bool;

    /// Terminate and reap the child, escalating to a hard kill after `grace`
    fn terminate(&mut self, grace: Duration) -> TerminationResult;
}

/// Process-creation collaborator
pub trait ProcessSpawner {
    /// The type of process handle this spawner produces
    type Handle: ProcessHandle + 'static;

    /// Spawn the configured command with piped stdout and stderr
    fn spawn(&self, config: &RunnerConfig) -> Result<Self::Handle, ProcessError>;

    /// Get the platform name for logging and debugging
    fn platform_name(&self) -> &'static str;
}

impl ProcessHandle for Box<dyn ProcessHandle> {
    fn pid(&self) -> Option<ProcessId> {
        (**self).pid()
    }

    fn command(&self) -> &str {
        (**self).command()
    }

    fn take_output_streams(&mut self) -> Option<OutputStreams> {
        (**self).take_output_streams()
    }

    fn is_running(&mut self) -> bool {
        (**self).is_running()
    }

    fn terminate(&mut self, grace: Duration) -> TerminationResult {
        (**self).terminate(grace)
    }
}
