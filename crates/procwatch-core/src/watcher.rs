use crate::config::RunnerConfig;
use crate::error::{ProcessError, WatchError};
use crate::gate::{GateOutcome, ReadinessGate, ReadinessState};
use crate::hooks::{ReadinessPredicate, WatchHooks};
use crate::line::Line;
use crate::multiplexer::{StreamMultiplexer, WatchSummary};
use crate::process::{OutputStreams, ProcessHandle, ProcessId, ProcessSpawner};
use crate::sink::OutputSink;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a watched process is in its life. Only the owning thread moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    StopRequested,
    Drained,
    Terminated,
}

/// Owns a child process and the background thread that watches its output.
///
/// [`start`](Self::start) spawns the child, hands its streams to a watcher
/// thread and blocks until the readiness hook fires. [`stop`](Self::stop)
/// asks the watcher to drain, joins it and tears the child down.
pub struct ProcessWatcher<H: ProcessHandle> {
    name: String,
    handle: H,
    watcher: Option<JoinHandle<WatchSummary>>,
    stop_token: CancellationToken,
    gate: Arc<ReadinessGate>,
    state: LifecycleState,
    termination_grace: Duration,
}

impl<H: ProcessHandle + 'static> ProcessWatcher<H> {
    pub fn start<S>(spawner: &S, config: RunnerConfig, hooks: WatchHooks) -> Result<Self, WatchError>
    where
        S: ProcessSpawner<Handle = H>,
    {
        config.validate()?;
        let WatchHooks { on_output, is_ready } = hooks;
        let sink = OutputSink::open(&config, on_output)?;

        info!(
            "Starting {} on {}: {:?}",
            config.name,
            spawner.platform_name(),
            config.argv()
        );
        let mut handle = spawner.spawn(&config)?;
        let termination_grace = config.watch.termination_grace();

        let Some(streams) = handle.take_output_streams() else {
            handle.terminate(termination_grace);
            return Err(ProcessError::StreamsUnavailable(config.command.clone()).into());
        };

        let gate = Arc::new(ReadinessGate::new());
        let stop_token = CancellationToken::new();
        let watcher = match spawn_watcher(&config, streams, sink, is_ready, &gate, &stop_token) {
            Ok(watcher) => watcher,
            Err(e) => {
                handle.terminate(termination_grace);
                return Err(WatchError::Other(anyhow::Error::new(e).context(format!(
                    "Failed to spawn watcher thread for {}",
                    config.name
                ))));
            }
        };

        let mut this = Self {
            name: config.name.clone(),
            handle,
            watcher: Some(watcher),
            stop_token,
            gate,
            state: LifecycleState::Starting,
            termination_grace,
        };

        let timeout = config.watch.startup_timeout();
        match this.gate.wait(timeout) {
            GateOutcome::Ready => {
                this.state = LifecycleState::Running;
                info!("{} is running (PID: {:?})", this.name, this.pid());
                Ok(this)
            }
            GateOutcome::TimedOut => {
                warn!("{} did not become ready within {:?}", this.name, timeout);
                this.shutdown_after_failed_start();
                Err(WatchError::StartupTimedOut(timeout.unwrap_or_default()))
            }
            GateOutcome::Abandoned => {
                warn!("{} closed its output before becoming ready", this.name);
                this.shutdown_after_failed_start();
                Err(WatchError::ExitedBeforeReady)
            }
        }
    }
}

impl<H: ProcessHandle> ProcessWatcher<H> {
    /// Request a stop, wait for the watcher to drain and exit, then tear the
    /// child down. Calling it again is a no-op.
    pub fn stop(&mut self) -> Result<WatchSummary, WatchError> {
        if self.state == LifecycleState::Terminated {
            return Ok(WatchSummary::default());
        }
        self.shutdown()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.handle.pid()
    }

    pub fn is_process_running(&mut self) -> bool {
        self.handle.is_running()
    }

    fn shutdown_after_failed_start(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Cleanup of {} after failed start reported: {}", self.name, e);
        }
    }

    fn shutdown(&mut self) -> Result<WatchSummary, WatchError> {
        let mut summary = Ok(WatchSummary::default());

        if let Some(watcher) = self.watcher.take() {
            self.state = LifecycleState::StopRequested;
            debug!("Requesting stop of {} watcher", self.name);
            self.stop_token.cancel();
            summary = watcher.join().map_err(|_| WatchError::WatcherPanicked);
            self.state = LifecycleState::Drained;
        }

        let result = self.handle.terminate(self.termination_grace);
        if result.is_success() {
            info!("Stopped {} ({:?})", self.name, result);
        } else {
            warn!("Teardown of {} reported {:?}", self.name, result);
        }
        self.state = LifecycleState::Terminated;

        summary
    }
}

impl<H: ProcessHandle> Drop for ProcessWatcher<H> {
    fn drop(&mut self) {
        if self.state != LifecycleState::Terminated {
            warn!("{} dropped without stop, stopping now", self.name);
            if let Err(e) = self.shutdown() {
                warn!("Stopping {} on drop failed: {}", self.name, e);
            }
        }
    }
}

/// Evaluates the readiness predicate until it first succeeds
struct ReadinessProbe {
    predicate: Option<ReadinessPredicate>,
    gate: Arc<ReadinessGate>,
    fired: bool,
}

impl ReadinessProbe {
    fn observe(&mut self, line: &Line) {
        if self.fired {
            return;
        }
        let ready = match self.predicate.as_mut() {
            Some(predicate) => predicate(&*line.text()),
            None => true,
        };
        if ready {
            self.fired = true;
            self.gate.signal();
        }
    }
}

fn spawn_watcher(
    config: &RunnerConfig,
    streams: OutputStreams,
    mut sink: OutputSink,
    is_ready: Option<ReadinessPredicate>,
    gate: &Arc<ReadinessGate>,
    stop_token: &CancellationToken,
) -> std::io::Result<JoinHandle<WatchSummary>> {
    let multiplexer = StreamMultiplexer::new(streams, &config.watch);
    let mut probe = ReadinessProbe {
        predicate: is_ready,
        gate: gate.clone(),
        fired: false,
    };
    let gate = gate.clone();
    let stop_token = stop_token.clone();
    let name = config.name.clone();

    thread::Builder::new()
        .name(format!("procwatch-{name}"))
        .spawn(move || {
            let summary = multiplexer.run(&stop_token, |line| {
                sink.deliver(&line);
                probe.observe(&line);
            });
            if gate.abandon() {
                debug!("{} watcher exited before readiness was observed", name);
            }
            debug!(
                "{} watcher done: {} stdout / {} stderr lines",
                name, summary.stdout_lines, summary.stderr_lines
            );
            summary
        })
}
