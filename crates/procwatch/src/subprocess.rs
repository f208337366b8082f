use crate::factory::{PlatformHandle, PlatformProcessSpawnerFactory};
use procwatch_core::{
    LifecycleState, ProcessId, ProcessWatcher, ReadinessState, RunnerConfig, WatchError,
    WatchHooks, WatchSummary,
};
use tracing::debug;

/// A watched child process on the current platform
pub struct Subprocess {
    inner: ProcessWatcher<PlatformHandle>,
}

impl Subprocess {
    /// Spawn the configured command and block until it is ready
    pub fn start(config: RunnerConfig, hooks: WatchHooks) -> Result<Self, WatchError> {
        let spawner = PlatformProcessSpawnerFactory::create_spawner();
        debug!(
            "Using {} spawner for {}",
            PlatformProcessSpawnerFactory::platform_name(),
            config.name
        );
        let inner = ProcessWatcher::start(&spawner, config, hooks)?;
        Ok(Self { inner })
    }

    /// Spawn `argv` with default settings: no hooks, output discarded,
    /// ready after the first line
    pub fn spawn<S: ToString, I: IntoIterator<Item = S>>(argv: I) -> Result<Self, WatchError> {
        Self::start(RunnerConfig::from_argv(argv)?, WatchHooks::new())
    }

    /// [`start`](Self::start) on tokio's blocking pool
    pub async fn start_async(config: RunnerConfig, hooks: WatchHooks) -> Result<Self, WatchError> {
        tokio::task::spawn_blocking(move || Self::start(config, hooks))
            .await
            .map_err(anyhow::Error::from)?
    }

    /// Drain the remaining output, join the watcher and tear the child down
    pub fn stop(&mut self) -> Result<WatchSummary, WatchError> {
        self.inner.stop()
    }

    /// [`stop`](Self::stop) on tokio's blocking pool
    pub async fn stop_async(mut self) -> Result<WatchSummary, WatchError> {
        tokio::task::spawn_blocking(move || self.stop())
            .await
            .map_err(anyhow::Error::from)?
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state()
    }

    pub fn readiness(&self) -> ReadinessState {
        self.inner.readiness()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.inner.pid()
    }

    pub fn is_process_running(&mut self) -> bool {
        self.inner.is_process_running()
    }
}
