use clap::Parser;
use serial_repl_bridge::config::{Config, ConfigLoader};
use serial_repl_bridge::port::available_port_names;
use serial_repl_bridge::telemetry::init_tracing;
use serial_repl_bridge::{BridgeError, NativePlatform, SessionManager};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

/// Commands sent by `--probe`: wake the REPL, then ask for the firmware version.
const PROBE_LINES: [&str; 3] = ["", "import sys", "print(sys.version)"];

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "repl-bridge",
    version,
    about = "Talk to a MicroPython-style REPL over a serial port.",
    long_about = "Opens a serial port, prints everything the device sends, and forwards stdin lines to it. \
                  With --probe or --run, commands are sent one at a time, waiting for the prompt after each."
)]
struct Args {
    /// Serial port to open (name or alias). Defaults to the configured port, then the first one found.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prompt marker printed by the device when it is ready.
    #[arg(long)]
    prompt: Option<String>,

    /// Prompt timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// List serial ports and exit.
    #[arg(long)]
    list: bool,

    /// Print the device's firmware version and exit.
    #[arg(long, conflicts_with = "run")]
    probe: bool,

    /// Send every line of a file, waiting for the prompt after each, then exit.
    #[arg(long)]
    run: Option<PathBuf>,
}

fn load_config(args: &Args) -> Config {
    let loaded = match &args.config {
        Some(path) => ConfigLoader::load_from(path),
        None => ConfigLoader::load(),
    };
    let mut config = match loaded {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            ConfigLoader::with_defaults().into_config()
        }
    };

    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(prompt) = &args.prompt {
        config.prompt.marker = prompt.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.prompt.timeout_ms = timeout_ms;
    }
    config
}

/// Print received text as it arrives and diagnostics on stderr.
fn attach_console(manager: &SessionManager) {
    let printed = Arc::new(AtomicUsize::new(0));
    manager.logs().received.subscribe(move |entries| {
        let start = printed.swap(entries.len(), Ordering::AcqRel);
        let mut stdout = std::io::stdout().lock();
        for entry in entries.iter().skip(start) {
            let _ = stdout.write_all(entry.as_bytes());
        }
        let _ = stdout.flush();
    });

    manager.logs().console.subscribe(|entries| {
        if let Some(last) = entries.last() {
            eprint!("[bridge] {last}");
        }
    });
}

async fn interactive(manager: &SessionManager) -> Result<(), BridgeError> {
    let terminator = manager.settings().line_terminator.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => break,
        };
        let Ok(Some(line)) = line else { break };

        match line.trim() {
            ":quit" => break,
            ":reset" => manager.soft_reset().await?,
            _ => manager.send(&format!("{line}{terminator}")).await?,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return Ok(ExitCode::FAILURE);
    }

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    if args.list {
        for name in available_port_names()? {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let platform = NativePlatform::new(config.serial.resolved_port());
    let manager = SessionManager::new(Arc::new(platform), config.session_settings());
    attach_console(&manager);

    let script = match &args.run {
        Some(path) => Some(tokio::fs::read_to_string(path).await?),
        None => None,
    };

    let baud = args.baud.unwrap_or(config.serial.default_baud);
    if !manager.open(baud).await {
        return Ok(ExitCode::FAILURE);
    }

    let result = if args.probe {
        manager.send_batch(PROBE_LINES).await
    } else if let Some(script) = &script {
        manager.send_batch(script.lines()).await
    } else {
        interactive(&manager).await
    };

    manager.close().await;
    println!();

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::from(if e.is_timeout() { 2 } else { 1 }))
        }
    }
}
