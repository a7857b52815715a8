//! Bridge client CLI
//!
//! Headless front end for a biosensor bridge server.

use biosensor_bridge_client::{Config, DeviceBridgeClient, SessionState, VERSION};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridge-client")]
#[command(version = VERSION)]
#[command(about = "Line-protocol client for biosensor bridge servers", long_about = None)]
struct Cli {
    /// Bridge host (overrides the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Bridge port (overrides the config file)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and forward commands typed on stdin
    Run {
        /// Start logging as soon as the bridge acknowledges the device
        #[arg(long)]
        log: bool,

        /// Polling interval in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,
    },

    /// Send command lines, print responses, then disconnect
    Send {
        /// Command lines to send, in order
        #[arg(required = true)]
        lines: Vec<String>,

        /// How long to wait for responses after the last command
        #[arg(long, default_value = "1000")]
        wait_ms: u64,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration, overrides included, to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command {
        Commands::Run { log, tick_ms } => {
            cmd_run(config, log, Duration::from_millis(tick_ms.max(1)));
        }
        Commands::Send { lines, wait_ms } => {
            cmd_send(config, &lines, Duration::from_millis(wait_ms));
        }
        Commands::Config { save } => {
            cmd_config(&config, save);
        }
    }
}

fn cmd_run(config: Config, auto_log: bool, tick: Duration) {
    println!("Bridge Client v{VERSION}");
    println!();

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create log directory: {e}");
    }

    let mut client = DeviceBridgeClient::new(config);
    println!("Session ID: {}", client.stats().session_id());
    try_connect(&mut client);

    println!();
    println!("Type a command line to send it to the bridge.");
    println!("  :log on | :log off   start/stop logging received lines");
    println!("  :connect             (re)connect to the bridge");
    println!("  :disconnect          disconnect device and socket");
    println!("  :status              show session status");
    println!("  :quit                disconnect and exit (also Ctrl+C)");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let input = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut peer_close_reported = false;

    while running.load(Ordering::SeqCst) {
        drain_received(&mut client, auto_log);

        if client.peer_closed() && !peer_close_reported {
            eprintln!("Bridge closed the connection. Use :disconnect, then :connect to retry.");
            peer_close_reported = true;
        } else if !client.peer_closed() {
            peer_close_reported = false;
        }

        if !stdin_open {
            thread::sleep(tick);
            continue;
        }

        match input.recv_timeout(tick) {
            Ok(line) => {
                if !handle_input(&mut client, &line) {
                    running.store(false, Ordering::SeqCst);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Keep polling until Ctrl+C
                stdin_open = false;
            }
        }
    }

    println!();
    println!("Disconnecting...");
    client.disconnect();

    println!();
    println!("{}", client.stats().summary());
}

fn try_connect(client: &mut DeviceBridgeClient) {
    let (host, port) = (client.config().host.clone(), client.config().port);
    println!("Attempting to connect to {host}:{port}...");
    match client.connect(&host, port) {
        Ok(()) => println!("Connected."),
        Err(e) => eprintln!("Error: {e}. Use :connect to retry."),
    }
}

/// Print or log everything the bridge has sent since the last tick.
fn drain_received(client: &mut DeviceBridgeClient, auto_log: bool) {
    loop {
        let before = client.state();
        let Some(line) = client.poll_received() else {
            break;
        };

        // While logging, lines go to the file only
        if before != SessionState::Logging {
            println!("[SERVER] {line}");
        }

        if before == SessionState::SocketOpen && client.state() == SessionState::DeviceConnected {
            println!("Device connected. Use :log on to start logging.");
            if auto_log {
                enable_logging(client);
            }
        }
    }
}

fn enable_logging(client: &mut DeviceBridgeClient) {
    match client.set_logging(true) {
        Ok(()) => match client.log_path() {
            Some(path) => println!("Started logging data to {path:?}"),
            None => println!("Logging is only available once the device is connected."),
        },
        Err(e) => eprintln!("Error opening log file: {e}"),
    }
}

/// Handle one line typed by the user. Returns false when the user asked to quit.
fn handle_input(client: &mut DeviceBridgeClient, line: &str) -> bool {
    match line.trim() {
        "" => {}
        ":quit" | ":q" => return false,
        ":log on" => enable_logging(client),
        ":log off" => match client.set_logging(false) {
            Ok(()) => println!("Logging stopped."),
            Err(e) => eprintln!("Error: {e}"),
        },
        ":connect" => try_connect(client),
        ":disconnect" => {
            client.disconnect();
            println!("Disconnected.");
        }
        ":status" => print_status(client),
        _ => match client.send_line(line) {
            Ok(()) => println!("[CLIENT] {line}"),
            Err(e) => eprintln!("Error: {e}"),
        },
    }
    true
}

fn print_status(client: &DeviceBridgeClient) {
    println!("State: {}", client.state());
    if let Some(target) = client.target() {
        println!("Bridge: {target}");
    }
    if let Some(path) = client.log_path() {
        println!("Log file: {path:?}");
    }
    if client.peer_closed() {
        println!("Bridge has closed the connection.");
    }
    println!("{}", client.stats().summary());
}

fn cmd_send(config: Config, lines: &[String], wait: Duration) {
    let mut client = DeviceBridgeClient::new(config);
    if let Err(e) = client.connect_configured() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    for line in lines {
        if let Err(e) = client.send_line(line) {
            eprintln!("Error sending {line:?}: {e}");
            client.disconnect();
            std::process::exit(1);
        }
        println!("[CLIENT] {line}");
    }

    let deadline = Instant::now() + wait;
    while Instant::now() < deadline && !client.peer_closed() {
        while let Some(line) = client.poll_received() {
            println!("[SERVER] {line}");
        }
        thread::sleep(Duration::from_millis(10));
    }
    while let Some(line) = client.poll_received() {
        println!("[SERVER] {line}");
    }

    client.disconnect();
}

fn cmd_config(config: &Config, save: bool) {
    if save {
        match config.save() {
            Ok(()) => println!("Saved configuration to {:?}", Config::config_path()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Read stdin lines on a background thread so the polling loop never blocks.
fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    receiver
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not install Ctrl+C handler: {e}");
    }
}
