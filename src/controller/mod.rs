use std::io::{ErrorKind, Read};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

mod backoff;
pub mod protocol;
pub mod serial;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::event::{ConnectionState, DeviceEvent};
use backoff::Backoff;
use protocol::LineFramer;
use serial::{Connector, Link};

const READ_CHUNK: usize = 64;

pub enum Command {
    Stop,
}

/// Owns the serial link and turns its byte stream into `DeviceEvent`s.
/// Lives on its own thread; the port handle never leaves it.
pub struct SerialLinkMonitor<C: Connector> {
    connector: C,
    config: LinkConfig,
    state: ConnectionState,
    framer: LineFramer,
    backoff: Backoff,
    events: mpsc::Sender<DeviceEvent>,
    rx: mpsc::Receiver<Command>,
}

/// Caller side of a running monitor.
pub struct MonitorHandle {
    port: String,
    events: mpsc::Receiver<DeviceEvent>,
    tx: mpsc::Sender<Command>,
    task: Option<thread::JoinHandle<Result<()>>>,
}

impl<C: Connector> SerialLinkMonitor<C> {
    /// Connects (directly or through discovery) and spawns the link task.
    /// Fails with `DeviceNotFound` once the discovery timeout elapses, or
    /// immediately on a fatal port error.
    pub fn start(connector: C, config: LinkConfig) -> Result<MonitorHandle> {
        let (tx, rx) = mpsc::channel();
        let (events_tx, events) = mpsc::channel();

        let mut monitor = SerialLinkMonitor {
            backoff: Backoff::new(config.backoff_initial, config.backoff_max),
            connector,
            config,
            state: ConnectionState::Searching,
            framer: LineFramer::default(),
            events: events_tx,
            rx,
        };

        let (port, link) = monitor.connect_initial()?;
        log::info!("Connected to {}", port);
        monitor.set_state(ConnectionState::Connected(port.clone()));

        let task = thread::spawn(move || monitor.task(link));

        Ok(MonitorHandle {
            port,
            events,
            tx,
            task: Some(task),
        })
    }

    fn connect_initial(self: &Self) -> Result<(String, Link)> {
        let started = Instant::now();

        loop {
            match self.connect_once() {
                Ok(connected) => return Ok(connected),
                Err(LinkError::DeviceNotFound) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::debug!("Connection attempt failed: {}", e),
            }

            if Instant::now().duration_since(started) >= self.config.discovery_timeout {
                return Err(LinkError::DeviceNotFound);
            }
            thread::sleep(self.config.discovery_interval);
        }
    }

    fn connect_once(self: &Self) -> Result<(String, Link)> {
        match &self.config.port {
            Some(port) => self.connector.open(port).map(|link| (port.clone(), link)),
            None => serial::discover(&self.connector),
        }
    }

    fn task(mut self: Self, link: Link) -> Result<()> {
        let mut link = Some(link);

        loop {
            if let Some(port) = link.as_mut() {
                match self.pump(port) {
                    Ok(()) => {
                        log::info!("Link monitor stopped");
                        return Ok(());
                    }
                    Err(e) if e.is_fatal() => {
                        log::error!("Fatal link error: {}", e);
                        return Err(e);
                    }
                    Err(e) => {
                        link = None;
                        self.connection_lost(e);
                    }
                }
            } else {
                match self.reconnect()? {
                    Some(reopened) => link = Some(reopened),
                    None => {
                        log::info!("Link monitor stopped while reconnecting");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Reads until a stop is requested (`Ok`) or the link fails (`Err`).
    fn pump(self: &mut Self, port: &mut Link) -> Result<()> {
        let mut buffer: [u8; READ_CHUNK] = [0; READ_CHUNK];

        loop {
            if self.stop_requested() {
                return Ok(());
            }

            match port.read(&mut buffer) {
                Ok(0) => return Err(LinkError::ConnectionLost("end of stream".into())),
                Ok(len) => self.handle_bytes(&buffer[0..len]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(LinkError::from_io(self.port_name(), e)),
            }
        }
    }

    fn handle_bytes(self: &mut Self, bytes: &[u8]) {
        let events = &self.events;
        self.framer.feed(bytes, |line| {
            match line.and_then(protocol::decode) {
                Ok(event) => {
                    log::debug!("{:?}", event);
                    events.send(event).ok();
                }
                Err(e) => log::warn!("Dropping line: {}", e),
            }
        });
    }

    fn connection_lost(self: &mut Self, error: LinkError) {
        log::warn!("{}", error);
        if self.framer.pending() > 0 {
            log::debug!("Discarding {} bytes of partial line", self.framer.pending());
        }
        self.framer.reset();

        if self.state != ConnectionState::Lost {
            self.set_state(ConnectionState::Lost);
            self.emit(DeviceEvent::Disconnected);
        }
    }

    /// Retries with backoff until connected (`Some`), stopped (`None`) or a
    /// fatal error occurs.
    fn reconnect(self: &mut Self) -> Result<Option<Link>> {
        loop {
            let delay = self.backoff.next_delay();
            log::info!("Reconnecting in {} ms", delay.as_millis());

            match self.rx.recv_timeout(delay) {
                Ok(Command::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }

            match self.connect_once() {
                Ok((port, link)) => {
                    log::info!("Reconnected to {}", port);
                    self.set_state(ConnectionState::Connected(port.clone()));
                    self.backoff.reset();
                    self.emit(DeviceEvent::Reconnected { port });
                    return Ok(Some(link));
                }
                Err(LinkError::DeviceNotFound) => log::debug!("Device still absent"),
                Err(e) if e.is_fatal() => {
                    log::error!("Fatal link error: {}", e);
                    return Err(e);
                }
                Err(e) => log::debug!("Reconnect attempt failed: {}", e),
            }
        }
    }

    fn set_state(self: &mut Self, state: ConnectionState) {
        log::debug!("Link state: {} -> {}", self.state, state);
        self.state = state;
    }

    fn port_name(self: &Self) -> &str {
        match &self.state {
            ConnectionState::Connected(port) => port,
            ConnectionState::Searching | ConnectionState::Lost => "",
        }
    }

    fn stop_requested(self: &Self) -> bool {
        match self.rx.try_recv() {
            Ok(Command::Stop) | Err(mpsc::TryRecvError::Disconnected) => true,
            Err(mpsc::TryRecvError::Empty) => false,
        }
    }

    fn emit(self: &Self, event: DeviceEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Event receiver gone");
        }
    }
}

impl MonitorHandle {
    /// Port the monitor first connected to.
    pub fn port(self: &Self) -> &str {
        &self.port
    }

    /// Next pending event, without blocking.
    pub fn poll(self: &Self) -> Option<DeviceEvent> {
        self.events.try_recv().ok()
    }

    pub fn poll_timeout(self: &Self, timeout: Duration) -> Option<DeviceEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Blocking stream of events; ends once the link task has terminated.
    pub fn events(self: &Self) -> mpsc::Iter<'_, DeviceEvent> {
        self.events.iter()
    }

    pub fn is_running(self: &Self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stops the task, releasing the port, and returns how it ended.
    pub fn stop(mut self: Self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(self: &mut Self) -> Result<()> {
        self.tx.send(Command::Stop).ok();
        match self.task.take() {
            Some(task) => task.join().unwrap_or_else(|_| {
                Err(LinkError::Io(std::io::Error::new(
                    ErrorKind::Other,
                    "link task panicked",
                )))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Link monitor ended with error: {}", e);
        }
    }
}
