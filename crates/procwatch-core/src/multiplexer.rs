use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::line::{Line, LineBuffer, StreamKind};
use crate::process::{Availability, OutputStream, OutputStreams};
use std::io::{self, ErrorKind, Read};
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why the polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Both streams reached end-of-stream
    EndOfStreams,
    /// Stop was requested and the child stayed quiet for the idle threshold
    Drained,
    /// Stop was requested and the drain tick cap was reached
    DrainLimit,
}

/// What one polling tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub emitted: usize,
    /// Complete lines were held back by the interleaving rule
    pub held: bool,
}

/// Returned by the watcher thread when it exits
#[derive(Debug, Default)]
pub struct WatchSummary {
    pub stdout_lines: u64,
    pub stderr_lines: u64,
    /// Unterminated bytes still buffered when the loop ended
    pub discarded_bytes: usize,
    /// Streams that were degraded to end-of-stream after an I/O error
    pub read_failures: Vec<WatchError>,
    /// None when no watcher ran for this stop
    pub exit: Option<ExitReason>,
}

impl WatchSummary {
    pub fn lines(&self, stream: StreamKind) -> u64 {
        match stream {
            StreamKind::Stdout => self.stdout_lines,
            StreamKind::Stderr => self.stderr_lines,
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.stdout_lines + self.stderr_lines
    }
}

struct StreamState {
    kind: StreamKind,
    source: Box<dyn OutputStream>,
    buffer: LineBuffer,
    eof: bool,
    skip: u32,
    emitted: u64,
    failure: Option<io::Error>,
}

impl StreamState {
    fn new(kind: StreamKind, source: Box<dyn OutputStream>) -> Self {
        Self {
            kind,
            source,
            buffer: LineBuffer::new(),
            eof: false,
            skip: 0,
            emitted: 0,
            failure: None,
        }
    }

    fn fail(&mut self, error: io::Error) {
        warn!("Reading child {} failed, treating it as closed: {}", self.kind, error);
        self.eof = true;
        self.failure = Some(error);
    }
}

/// Polls the child's stdout and stderr and turns them into one ordered
/// sequence of lines.
///
/// Within a stream order is exact. Across streams a complete line is held
/// back while the other stream has an unterminated line in flight, for at
/// most `interleave_deferral_ticks` ticks.
pub struct StreamMultiplexer {
    streams: [StreamState; 2],
    chunk: Vec<u8>,
    config: WatchConfig,
}

impl StreamMultiplexer {
    pub fn new(streams: OutputStreams, config: &WatchConfig) -> Self {
        Self {
            streams: [
                StreamState::new(StreamKind::Stdout, streams.stdout),
                StreamState::new(StreamKind::Stderr, streams.stderr),
            ],
            chunk: vec![0; config.read_chunk_size.max(1)],
            config: config.clone(),
        }
    }

    /// True once both streams reached end-of-stream
    pub fn is_finished(&self) -> bool {
        self.streams.iter().all(|s| s.eof)
    }

    pub fn is_closed(&self, stream: StreamKind) -> bool {
        self.streams[stream.index()].eof
    }

    /// One polling iteration: read whatever is available on both streams,
    /// then emit the complete lines that the interleaving rule lets through.
    pub fn tick(&mut self, mut emit: impl FnMut(Line)) -> TickReport {
        let mut report = TickReport::default();
        for kind in StreamKind::ALL {
            self.fill(kind);
        }
        for kind in StreamKind::ALL {
            report.emitted += self.drain_lines(kind, &mut emit);
        }
        report.held = self
            .streams
            .iter_mut()
            .any(|s| s.buffer.has_complete_line());
        report
    }

    /// Poll until both streams end, or until a stop request has been followed
    /// by enough quiet ticks.
    pub fn run(mut self, stop: &CancellationToken, mut emit: impl FnMut(Line)) -> WatchSummary {
        let interval = self.config.poll_interval();
        let mut idle_ticks = 0u32;
        let mut drain_ticks = 0u32;

        let exit = loop {
            if self.is_finished() {
                break ExitReason::EndOfStreams;
            }
            thread::sleep(interval);
            let report = self.tick(&mut emit);

            if stop.is_cancelled() {
                drain_ticks += 1;
                // a held line keeps the drain going until it is let through
                if report.emitted > 0 || report.held {
                    idle_ticks = 0;
                } else {
                    idle_ticks += 1;
                }
                if idle_ticks >= self.config.drain_idle_ticks {
                    break ExitReason::Drained;
                }
                if self.config.max_drain_ticks.is_some_and(|max| drain_ticks >= max) {
                    warn!("Child kept writing after stop, leaving after {} ticks", drain_ticks);
                    break ExitReason::DrainLimit;
                }
            }
        };

        self.flush_complete(&mut emit);
        debug!("Stream multiplexer exiting: {:?}", exit);
        self.into_summary(exit)
    }

    pub fn into_summary(self, exit: ExitReason) -> WatchSummary {
        let mut summary = WatchSummary {
            exit: Some(exit),
            ..WatchSummary::default()
        };
        for stream in self.streams {
            match stream.kind {
                StreamKind::Stdout => summary.stdout_lines = stream.emitted,
                StreamKind::Stderr => summary.stderr_lines = stream.emitted,
            }
            if stream.buffer.pending_len() > 0 {
                debug!(
                    "Discarding {} unterminated bytes from {}",
                    stream.buffer.pending_len(),
                    stream.kind
                );
            }
            summary.discarded_bytes += stream.buffer.pending_len();
            if let Some(source) = stream.failure {
                summary.read_failures.push(WatchError::StreamReadFailure {
                    stream: stream.kind,
                    source,
                });
            }
        }
        summary
    }

    /// Emit every complete line still buffered, ignoring the interleaving rule
    fn flush_complete(&mut self, emit: &mut impl FnMut(Line)) {
        for stream in &mut self.streams {
            while let Ok(bytes) = stream.buffer.pop_line() {
                stream.emitted += 1;
                emit(Line::new(stream.kind, bytes));
            }
        }
    }

    fn fill(&mut self, kind: StreamKind) {
        let stream = &mut self.streams[kind.index()];

        while !stream.eof {
            match stream.source.poll_available() {
                Ok(Availability::Pending) | Ok(Availability::Bytes(0)) => break,
                Ok(Availability::Bytes(_)) | Ok(Availability::HungUp) => {}
                Err(e) => {
                    stream.fail(e);
                    break;
                }
            }

            match stream.source.read(&mut self.chunk) {
                Ok(0) => {
                    debug!("Child closed {}", stream.kind);
                    stream.eof = true;
                }
                Ok(n) => stream.buffer.push(&self.chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => stream.fail(e),
            }
        }
    }

    fn drain_lines(&mut self, kind: StreamKind, emit: &mut impl FnMut(Line)) -> usize {
        let [stdout, stderr] = &mut self.streams;
        let (this, other) = match kind {
            StreamKind::Stdout => (stdout, stderr),
            StreamKind::Stderr => (stderr, stdout),
        };
        let max_deferrals = self.config.interleave_deferral_ticks;
        let mut emitted = 0;

        while this.buffer.has_complete_line() {
            // a closed stream will never finish its fragment
            if this.skip < max_deferrals && !other.eof && other.buffer.has_incomplete_line() {
                this.skip += 1;
                break;
            }
            this.skip = 0;
            let Ok(bytes) = this.buffer.pop_line() else {
                break;
            };
            this.emitted += 1;
            emitted += 1;
            emit(Line::new(kind, bytes));
        }

        emitted
    }
}
