use crate::line::StreamKind;
use std::time::Duration;
use thiserror::Error;

/// Error types for the process collaborator
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),
    #[error("Output streams of process {0} are not available")]
    StreamsUnavailable(String),
    #[error("Other error: {0}")]
    Other(String),
}

/// Core error types for watcher operations
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to start process: {0}")]
    StartFailure(#[from] ProcessError),

    #[error("Read failed on {stream}: {source}")]
    StreamReadFailure {
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Process did not become ready within {0:?}")]
    StartupTimedOut(Duration),

    #[error("Process output ended before it became ready")]
    ExitedBeforeReady,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Log sink error: {0}")]
    LogSink(#[source] std::io::Error),

    #[error("Watcher thread panicked")]
    WatcherPanicked,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl WatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        WatchError::ConfigurationError(message.into())
    }

    /// Check if this error was raised while bringing the process up
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            WatchError::StartFailure(_)
                | WatchError::StartupTimedOut(_)
                | WatchError::ExitedBeforeReady
        )
    }
}

/// Returned by [`LineBuffer::pop_line`](crate::LineBuffer::pop_line) when only an
/// unterminated fragment (or nothing) is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no complete line buffered")]
pub struct NoCompleteLine;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WatchError::StartFailure(ProcessError::SpawnFailed("/nope".to_string()));
        let display = format!("{error}");
        assert!(display.contains("Failed to start process"));
        assert!(display.contains("/nope"));

        let error = WatchError::StreamReadFailure {
            stream: StreamKind::Stderr,
            source: std::io::Error::other("boom"),
        };
        assert_eq!(format!("{error}"), "Read failed on stderr: boom");

        let error = WatchError::StartupTimedOut(Duration::from_millis(1500));
        assert!(format!("{error}").contains("1.5s"));
    }

    #[test]
    fn test_error_categorization() {
        assert!(WatchError::ExitedBeforeReady.is_startup_failure());
        assert!(WatchError::StartupTimedOut(Duration::from_secs(1)).is_startup_failure());
        assert!(WatchError::from(ProcessError::Other("x".to_string())).is_startup_failure());

        assert!(!WatchError::configuration("bad").is_startup_failure());
        assert!(!WatchError::WatcherPanicked.is_startup_failure());
    }

    #[test]
    fn test_error_debug_format() {
        let error = WatchError::configuration("missing log file");
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("ConfigurationError"));
        assert!(debug_str.contains("missing log file"));
    }

    #[test]
    fn test_anyhow_conversion() {
        let error: WatchError = anyhow::anyhow!("wrapped").into();
        assert!(matches!(error, WatchError::Other(_)));
    }
}
