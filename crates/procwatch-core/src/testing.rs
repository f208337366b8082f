//! In-memory streams and a fake spawner for unit tests.

use crate::config::RunnerConfig;
use crate::error::ProcessError;
use crate::process::{
    Availability, OutputStream, OutputStreams, ProcessHandle, ProcessId, ProcessSpawner,
    TerminationResult,
};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    pending: VecDeque<u8>,
    closed: bool,
    broken: bool,
    largest_read: usize,
}

/// In-memory stream fed by the test while the watcher polls it
#[derive(Clone, Default)]
pub struct ScriptedStream(Arc<Mutex<Script>>);

impl ScriptedStream {
    pub fn write(&self, bytes: &[u8]) {
        self.0.lock().unwrap().pending.extend(bytes);
    }
    pub fn close(&self) {
        self.0.lock().unwrap().closed = true;
    }
    pub fn break_stream(&self) {
        self.0.lock().unwrap().broken = true;
    }
    pub fn largest_read(&self) -> usize {
        self.0.lock().unwrap().largest_read
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.0.lock().unwrap();
        let n = buf.len().min(script.pending.len());
        for (slot, byte) in buf.iter_mut().zip(script.pending.drain(..n)) {
            *slot = byte;
        }
        script.largest_read = script.largest_read.max(n);
        Ok(n)
    }
}

impl OutputStream for ScriptedStream {
    fn poll_available(&mut self) -> io::Result<Availability> {
        let script = self.0.lock().unwrap();
        if script.broken {
            return Err(io::Error::other("bad descriptor"));
        }
        Ok(if !script.pending.is_empty() {
            Availability::Bytes(script.pending.len())
        } else if script.closed {
            Availability::HungUp
        } else {
            Availability::Pending
        })
    }
}

/// Has one line ready on every other poll, forever
#[derive(Default)]
pub struct ChattyStream {
    ready: bool,
}

impl Read for ChattyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf[..2].copy_from_slice(b"y\n");
        Ok(2)
    }
}

impl OutputStream for ChattyStream {
    fn poll_available(&mut self) -> io::Result<Availability> {
        self.ready = !self.ready;
        Ok(if self.ready {
            Availability::Bytes(2)
        } else {
            Availability::Pending
        })
    }
}

pub struct FakeHandle {
    streams: Option<OutputStreams>,
    terminations: Arc<AtomicUsize>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<ProcessId> {
        Some(4242)
    }

    fn command(&self) -> &str {
        "fake"
    }

    fn take_output_streams(&mut self) -> Option<OutputStreams> {
        self.streams.take()
    }

    fn is_running(&mut self) -> bool {
        self.terminations.load(Ordering::SeqCst) == 0
    }

    fn terminate(&mut self, _grace: Duration) -> TerminationResult {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        TerminationResult::Success
    }
}

/// Spawns a [`FakeHandle`] wired to two scripted streams
#[derive(Clone, Default)]
pub struct FakeSpawner {
    pub stdout: ScriptedStream,
    pub stderr: ScriptedStream,
    pub terminations: Arc<AtomicUsize>,
    pub refuse: bool,
}

impl FakeSpawner {
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl ProcessSpawner for FakeSpawner {
    type Handle = FakeHandle;

    fn spawn(&self, config: &RunnerConfig) -> Result<FakeHandle, ProcessError> {
        if self.refuse {
            return Err(ProcessError::SpawnFailed(config.command.clone()));
        }
        Ok(FakeHandle {
            streams: Some(OutputStreams {
                stdout: Box::new(self.stdout.clone()),
                stderr: Box::new(self.stderr.clone()),
            }),
            terminations: self.terminations.clone(),
        })
    }

    fn platform_name(&self) -> &'static str {
        "fake"
    }
}
