use crate::event::DeviceEvent;
use crate::view::display::Display;
use heapless::Deque as SDeque;
use std::time::{Instant, SystemTime};
use time::{format_description, OffsetDateTime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connection {
    Connected(String),
    Disconnected,
}

pub struct Model {
    pub port: String,
    pub connection: Connection,
    pub display: Display,
    pub messages: SDeque<String, 8>,
}

impl Model {
    pub fn new(port: String, now: Instant) -> Self {
        Model {
            connection: Connection::Connected(port.clone()),
            port,
            display: Display::new(now),
            messages: SDeque::new(),
        }
    }

    pub fn is_connected(self: &Self) -> bool {
        match self.connection {
            Connection::Connected(_) => true,
            Connection::Disconnected => false,
        }
    }

    /// Feeds an event to the display; returns a notification for
    /// connection changes.
    pub fn apply(self: &mut Self, event: &DeviceEvent, now: Instant) -> Option<String> {
        self.display.apply(event, now);

        match event {
            DeviceEvent::Disconnected => {
                self.connection = Connection::Disconnected;
                Some(self.message(format!("Disconnected from {}", self.port)))
            }
            DeviceEvent::Reconnected { port } => {
                self.port = port.clone();
                self.connection = Connection::Connected(port.clone());
                Some(self.message(format!("Reconnected to {}", port)))
            }
            _ => None,
        }
    }

    pub fn message(self: &mut Self, msg: String) -> String {
        if self.messages.is_full() {
            self.messages.pop_front();
        }

        let stamp = format_description::parse("[hour]:[minute]:[second]")
            .ok()
            .and_then(|format| OffsetDateTime::from(SystemTime::now()).format(&format).ok())
            .unwrap_or_default();
        let entry = format!("[{}] {}", stamp, msg);

        self.messages.push_back(entry.clone()).ok();
        entry
    }
}
