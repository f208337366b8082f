use crate::error::WatchError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Tuning of the polling watcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Sleep between polling ticks (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum bytes taken from a stream per read call
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Ticks a stream may hold back a complete line while the other stream
    /// has an unterminated one
    #[serde(default = "default_interleave_deferral_ticks")]
    pub interleave_deferral_ticks: u32,

    /// Consecutive ticks without output after a stop request before the
    /// watcher exits
    #[serde(default = "default_drain_idle_ticks")]
    pub drain_idle_ticks: u32,

    /// Hard cap on ticks after a stop request, for children that never go quiet
    #[serde(default)]
    pub max_drain_ticks: Option<u32>,

    /// How long `start` waits for readiness (None waits forever)
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: Option<u64>,

    /// Time between SIGTERM and SIGKILL on teardown (in milliseconds)
    #[serde(default = "default_termination_grace_ms")]
    pub termination_grace_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            read_chunk_size: default_read_chunk_size(),
            interleave_deferral_ticks: default_interleave_deferral_ticks(),
            drain_idle_ticks: default_drain_idle_ticks(),
            max_drain_ticks: None,
            startup_timeout_ms: default_startup_timeout_ms(),
            termination_grace_ms: default_termination_grace_ms(),
        }
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short ticks for tests and interactive tools
    pub fn fast() -> Self {
        Self {
            poll_interval_ms: 20,
            termination_grace_ms: 500,
            ..Self::default()
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.poll_interval_ms == 0 {
            return Err(WatchError::configuration(
                "poll_interval_ms must be greater than zero",
            ));
        }

        if self.read_chunk_size == 0 {
            return Err(WatchError::configuration(
                "read_chunk_size must be greater than zero",
            ));
        }

        if self.drain_idle_ticks == 0 {
            return Err(WatchError::configuration(
                "drain_idle_ticks must be greater than zero",
            ));
        }

        if self.max_drain_ticks == Some(0) {
            return Err(WatchError::configuration(
                "max_drain_ticks must be greater than zero when set",
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout_ms.map(Duration::from_millis)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}

/// Where formatted output records go
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    #[default]
    Discard,
    Screen,
    File,
    Tracing,
}

/// Main runner configuration
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct RunnerConfig {
    /// Label used in output records, `<name>(stdout)`
    #[builder(default = "default_process_name()")]
    pub name: String,
    pub command: String,
    #[builder(default)]
    #[builder(setter(custom))]
    pub args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default = "true")]
    pub inherit_environment: bool,
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    /// Run the command under `stdbuf -oL -eL`
    #[builder(default)]
    pub line_buffered: bool,
    #[builder(default)]
    pub log_destination: LogDestination,
    #[builder(default)]
    pub log_file: Option<PathBuf>,
    #[builder(default)]
    pub watch: WatchConfig,
}

impl RunnerConfig {
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Build a config from an argument vector, first element is the program
    pub fn from_argv<S: ToString, I: IntoIterator<Item = S>>(argv: I) -> Result<Self, WatchError> {
        let mut argv = argv.into_iter().map(|s| s.to_string());
        let command = argv
            .next()
            .ok_or_else(|| WatchError::configuration("command must not be empty"))?;
        RunnerConfig::builder()
            .command(command)
            .args(argv)
            .build()
            .map_err(|e| WatchError::configuration(e.to_string()))
    }

    /// The full argument vector, program first
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<(), WatchError> {
        if self.command.is_empty() {
            return Err(WatchError::configuration("command must not be empty"));
        }
        if self.log_destination == LogDestination::File && self.log_file.is_none() {
            return Err(WatchError::configuration(
                "log_file is required when logging to a file",
            ));
        }
        self.watch.validate()
    }
}

impl RunnerConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }
    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde
fn default_poll_interval_ms() -> u64 {
    300
}
fn default_read_chunk_size() -> usize {
    1024
}
fn default_interleave_deferral_ticks() -> u32 {
    5
}
fn default_drain_idle_ticks() -> u32 {
    5
}
fn default_startup_timeout_ms() -> Option<u64> {
    Some(30_000)
}
fn default_termination_grace_ms() -> u64 {
    2_000
}
fn default_process_name() -> String {
    "process".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(300));
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.interleave_deferral_ticks, 5);
        assert_eq!(config.drain_idle_ticks, 5);
        assert_eq!(config.startup_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_fast_config() {
        let config = WatchConfig::fast();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.drain_idle_ticks, 5);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = WatchConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.poll_interval_ms = 10;
        config.read_chunk_size = 0;
        assert!(config.validate().is_err());

        config.read_chunk_size = 16;
        config.max_drain_ticks = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization() {
        let config = WatchConfig {
            max_drain_ticks: Some(40),
            startup_timeout_ms: None,
            ..WatchConfig::fast()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("pollIntervalMs"));
        let deserialized: WatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: WatchConfig = serde_json::from_str(r#"{"pollIntervalMs": 50}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.startup_timeout_ms, Some(30_000));
    }

    #[test]
    fn test_builder_defaults() {
        let config = RunnerConfig::builder()
            .command("/bin/echo")
            .args(["hello"])
            .build()
            .unwrap();

        assert_eq!(config.name, "process");
        assert!(config.inherit_environment);
        assert!(!config.line_buffered);
        assert_eq!(config.log_destination, LogDestination::Discard);
        assert_eq!(config.argv(), vec!["/bin/echo", "hello"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_env() {
        let config = RunnerConfig::builder()
            .command("env")
            .env("A", "1")
            .env_multi([("B", "2"), ("C", "3")])
            .build()
            .unwrap();
        assert_eq!(config.env.len(), 3);
        assert_eq!(config.env["B"], "2");
    }

    #[test]
    fn test_from_argv() {
        let config = RunnerConfig::from_argv(["/bin/sh", "-c", "echo hi"]).unwrap();
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.args, vec!["-c", "echo hi"]);

        let empty: [&str; 0] = [];
        assert!(matches!(
            RunnerConfig::from_argv(empty),
            Err(WatchError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_file_destination_requires_path() {
        let mut config = RunnerConfig::from_argv(["true"]).unwrap();
        config.log_destination = LogDestination::File;
        assert!(config.validate().is_err());

        config.log_file = Some(PathBuf::from("/tmp/procwatch.log"));
        assert!(config.validate().is_ok());
    }
}
