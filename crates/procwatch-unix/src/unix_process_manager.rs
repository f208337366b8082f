use crate::pipe::PipeStream;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use procwatch_core::{
    OutputStreams, ProcessError, ProcessHandle, ProcessId, ProcessSpawner, RunnerConfig,
    TerminationResult,
};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Wrapper that switches the child's stdout and stderr to line buffering
pub const STDBUF_PATH: &str = "/usr/bin/stdbuf";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Unix-specific process handle implementation
pub struct UnixProcessHandle {
    child: Child,
    command: String,
}

impl UnixProcessHandle {
    pub fn new(child: Child, command: String) -> Self {
        Self { child, command }
    }

    /// Poll for exit until `deadline`, reaping the child if it went away
    fn wait_until(&mut self, deadline: Instant) -> bool {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Process {} exited with {}", self.child.id(), status);
                    return true;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => return false,
                Err(e) => {
                    warn!("Failed to poll process {}: {}", self.child.id(), e);
                    return false;
                }
            }
        }
    }

    fn signal_group(&self, sig: Signal) -> Result<(), Errno> {
        let pgid = NixPid::from_raw(self.child.id() as i32);
        signal::killpg(pgid, sig)
    }
}

impl ProcessHandle for UnixProcessHandle {
    fn pid(&self) -> Option<ProcessId> {
        Some(self.child.id())
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn take_output_streams(&mut self) -> Option<OutputStreams> {
        let stdout = self.child.stdout.take()?;
        let Some(stderr) = self.child.stderr.take() else {
            self.child.stdout = Some(stdout);
            return None;
        };
        Some(OutputStreams {
            stdout: Box::new(PipeStream::new(stdout)),
            stderr: Box::new(PipeStream::new(stderr)),
        })
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self, grace: Duration) -> TerminationResult {
        let pid = self.child.id();

        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!("Process {} already exited with {}", pid, status);
                return TerminationResult::AlreadyExited;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to poll process {}: {}", pid, e),
        }

        // The child leads its own process group, so this reaches its descendants too
        match self.signal_group(Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to process group {}", pid);
                if self.wait_until(Instant::now() + grace) {
                    return TerminationResult::Success;
                }
            }
            Err(Errno::ESRCH) => {
                info!("Process group {} not found (already terminated)", pid);
            }
            Err(Errno::EPERM) => {
                warn!("Permission denied to terminate process group {}", pid);
                return TerminationResult::AccessDenied;
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
            }
        }

        match self.signal_group(Signal::SIGKILL) {
            Ok(()) => info!("Sent SIGKILL to process group {}", pid),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to send SIGKILL to process group {}: {}", pid, e),
        }
        if let Err(e) = self.child.kill() {
            debug!("Direct kill of process {} failed: {}", pid, e);
        }

        match self.child.wait() {
            Ok(status) => {
                info!("Process {} terminated with {}", pid, status);
                TerminationResult::Success
            }
            Err(e) => TerminationResult::Failed(format!("wait failed: {e}")),
        }
    }
}

/// Spawns children with piped stdout/stderr in their own process group
#[derive(Debug, Default)]
pub struct UnixProcessManager;

impl UnixProcessManager {
    pub fn new() -> Self {
        info!("Initializing Unix process manager");
        Self
    }

    /// The argument vector actually executed for `config`
    pub fn command_line(config: &RunnerConfig) -> Vec<String> {
        let mut argv = Vec::with_capacity(config.args.len() + 4);
        if config.line_buffered {
            argv.extend([STDBUF_PATH, "-oL", "-eL"].map(String::from));
        }
        argv.extend(config.argv());
        argv
    }
}

impl ProcessSpawner for UnixProcessManager {
    type Handle = UnixProcessHandle;

    fn spawn(&self, config: &RunnerConfig) -> Result<UnixProcessHandle, ProcessError> {
        let argv = Self::command_line(config);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProcessError::SpawnFailed("empty command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);

        if !config.inherit_environment {
            cmd.env_clear();
        }
        cmd.envs(&config.env);

        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Create new process group for better process tree management
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(format!("{program}: {e}")))?;

        info!(
            "Spawned Unix process: {} (PID: {}) with args: {:?}",
            program,
            child.id(),
            args
        );

        Ok(UnixProcessHandle::new(child, config.command.clone()))
    }

    fn platform_name(&self) -> &'static str {
        "unix"
    }
}
