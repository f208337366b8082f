//! Run a command under the watcher and mirror its output to the terminal.
//!
//! ```text
//! cargo run -p procwatch --example watch_command -- /bin/sh -c 'echo ready; sleep 2; echo bye'
//! ```

use procwatch::{LogDestination, RunnerConfig, Subprocess, WatchHooks};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up logging
    tracing_subscriber::fmt::init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let argv = if argv.is_empty() {
        vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "echo 'Server started!'; sleep 1; echo 'still going' >&2; sleep 30".to_string(),
        ]
    } else {
        argv
    };

    let mut config = RunnerConfig::from_argv(argv)?;
    config.name = "demo".to_string();
    config.log_destination = LogDestination::Screen;

    let hooks = WatchHooks::new().on_output(|line: &str, is_stdout: bool| {
        if !is_stdout {
            eprint!("[observer] stderr: {line}");
        }
        true
    });

    println!("Starting process...");
    let process = Subprocess::start_async(config, hooks).await?;
    match process.pid() {
        Some(pid) => println!("Process {} is ready (PID: {})", process.name(), pid),
        None => println!("Process {} is ready", process.name()),
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("Stopping...");
    let summary = process.stop_async().await?;
    println!(
        "Done: {} stdout lines, {} stderr lines, exit {:?}",
        summary.stdout_lines, summary.stderr_lines, summary.exit
    );
    Ok(())
}
