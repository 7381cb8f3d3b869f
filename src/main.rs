mod config;
mod controller;
mod error;
mod event;
mod model;
mod view;

use clap::Parser;
use config::{LinkConfig, DEFAULT_BAUD_RATE};
use controller::serial::{Connector, SerialConnector};
use controller::{MonitorHandle, SerialLinkMonitor};
use error::LinkError;
use model::Model;
use simplelog::*;
use std::fs::File;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use view::console::ConsoleSink;
use view::DisplaySink;

const TICK: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "commandpad-link",
    version,
    about = "Shows CommandPad volume and now-playing updates from its serial port"
)]
struct Cli {
    /// Serial port of the CommandPad; auto-detected when omitted
    #[arg(value_name = "PORT")]
    port: Option<String>,

    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// How long to look for the device before giving up
    #[arg(long = "discovery-timeout", default_value = "5", value_name = "SECONDS")]
    discovery_timeout: u64,

    /// List serial ports and exit
    #[arg(long = "list-ports")]
    list_ports: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write the log to this file
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn link_config(self: &Self) -> LinkConfig {
        LinkConfig {
            port: self.port.clone(),
            baud_rate: self.baud,
            discovery_timeout: Duration::from_secs(self.discovery_timeout),
            ..LinkConfig::default()
        }
    }

    fn level(self: &Self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = cli.level();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let mut log_file_error = None;
    if let Some(path) = &cli.log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(level, Config::default(), file)),
            Err(e) => log_file_error = Some(format!("{}: {}", path.display(), e)),
        }
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Logger setup failed: {}", e);
    }
    if let Some(e) = log_file_error {
        log::warn!("Cannot open log file {}", e);
    }
}

fn list_ports(connector: &SerialConnector) -> ExitCode {
    match connector.candidates() {
        Ok(ports) => {
            for p in ports {
                println!(
                    "{} {:<16} {}",
                    if p.signature { "*" } else { " " },
                    p.name,
                    p.description
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn is_quit_command(line: &str) -> bool {
    matches!(line.trim(), "q" | "quit")
}

/// Lines typed on stdin; "q" or "quit" asks for a clean shutdown.
fn spawn_quit_listener(tx: mpsc::Sender<()>) {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if is_quit_command(&line) => {
                    tx.send(()).ok();
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });
}

/// Ctrl+C takes the same path as "q": the display loop returns and the
/// monitor is stopped, releasing the port.
fn ctrlc_handler(tx: mpsc::Sender<()>) {
    if let Err(e) = ctrlc::set_handler(move || {
        tx.send(()).ok();
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }
}

fn show<S: DisplaySink>(sink: &mut S, model: &Model) {
    if let Err(e) = sink.show(model.display.frame()) {
        log::warn!("Display error: {}", e);
    }
}

fn run<S: DisplaySink>(
    handle: &MonitorHandle,
    model: &mut Model,
    sink: &mut S,
    quit: &mpsc::Receiver<()>,
) {
    show(sink, model);

    while handle.is_running() {
        if quit.try_recv().is_ok() {
            log::info!("Shutting down...");
            return;
        }

        if let Some(event) = handle.poll_timeout(TICK) {
            if let Some(note) = model.apply(&event, Instant::now()) {
                sink.notify(&note).ok();
            }
            show(sink, model);
        }

        if model.display.tick(Instant::now()) {
            show(sink, model);
        }
    }

    while let Some(event) = handle.poll() {
        if let Some(note) = model.apply(&event, Instant::now()) {
            sink.notify(&note).ok();
        }
    }
    show(sink, model);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.link_config();
    let connector = SerialConnector::new(&config);

    if cli.list_ports {
        return list_ports(&connector);
    }

    log::info!("CommandPad link, press Ctrl+C or type q to quit");

    let handle = match SerialLinkMonitor::start(connector, config) {
        Ok(handle) => handle,
        Err(LinkError::DeviceNotFound) => {
            log::error!("Could not find the CommandPad. Please specify the port manually, e.g. commandpad-link COM3");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut model = Model::new(handle.port().to_string(), Instant::now());
    let mut sink = ConsoleSink::stdout();

    let (quit_tx, quit) = mpsc::channel();
    spawn_quit_listener(quit_tx.clone());
    ctrlc_handler(quit_tx);

    run(&handle, &mut model, &mut sink, &quit);
    println!();
    if !model.is_connected() {
        log::warn!("Exiting while {} is disconnected", model.port);
    }

    match handle.stop() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            for m in model.messages.iter() {
                log::error!("  {}", m);
            }
            ExitCode::FAILURE
        }
    }
}
