use crate::config::{LogDestination, RunnerConfig};
use crate::error::WatchError;
use crate::hooks::OutputObserver;
use crate::line::Line;
use std::fs::OpenOptions;
use std::io::{self, Write};
use tracing::{info, trace, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

enum Target {
    Discard,
    Writer(Box<dyn Write + Send>),
    Tracing,
}

/// Fans each emitted line out to the log destination and the observer callback.
pub struct OutputSink {
    name: String,
    target: Target,
    observer: Option<OutputObserver>,
    write_failed: bool,
}

impl OutputSink {
    /// Open the destination named by the config. A log file is opened for
    /// appending and created when missing.
    pub fn open(config: &RunnerConfig, observer: Option<OutputObserver>) -> Result<Self, WatchError> {
        let target = match config.log_destination {
            LogDestination::Discard => Target::Discard,
            LogDestination::Tracing => Target::Tracing,
            LogDestination::Screen => Target::Writer(Box::new(io::stdout())),
            LogDestination::File => {
                let path = config.log_file.as_ref().ok_or_else(|| {
                    WatchError::configuration("log_file is required when logging to a file")
                })?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(WatchError::LogSink)?;
                info!("Appending output of {} to {}", config.name, path.display());
                Target::Writer(Box::new(file))
            }
        };

        Ok(Self {
            name: config.name.clone(),
            target,
            observer,
            write_failed: false,
        })
    }

    /// Write records to an arbitrary writer instead of a configured destination
    pub fn with_writer(
        name: impl Into<String>,
        writer: Box<dyn Write + Send>,
        observer: Option<OutputObserver>,
    ) -> Self {
        Self {
            name: name.into(),
            target: Target::Writer(writer),
            observer,
            write_failed: false,
        }
    }

    pub fn deliver(&mut self, line: &Line) {
        let text = line.text();

        match &mut self.target {
            Target::Discard => {}
            Target::Tracing => {
                info!(
                    process = %self.name,
                    stream = %line.stream,
                    "{}",
                    text.trim_end_matches('\n')
                );
            }
            Target::Writer(writer) => {
                let record = format_record(&self.name, line);
                let written = writer
                    .write_all(&record)
                    .and_then(|()| writer.flush());
                if let Err(e) = written {
                    if !self.write_failed {
                        warn!("Failed to write output record for {}: {}", self.name, e);
                        self.write_failed = true;
                    }
                }
            }
        }

        if let Some(observer) = self.observer.as_mut() {
            if !observer(&*text, line.is_stdout()) {
                trace!("Observer did not acknowledge {} line", line.stream);
            }
        }
    }
}

/// `<timestamp> <name>(<stream>) <line bytes>`, the bytes keep their newline
fn format_record(name: &str, line: &Line) -> Vec<u8> {
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
    let mut record = format!("{timestamp} {name}({}) ", line.stream).into_bytes();
    record.extend_from_slice(&line.bytes);
    record
}
