#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    VolumeChanged {
        level: u8,
    },
    NowPlaying {
        title: String,
        artist: Option<String>,
        truncated: bool,
    },
    PlaybackStopped,
    Disconnected,
    /// Carries the port, which discovery may have changed.
    Reconnected {
        port: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Searching,
    Connected(String),
    Lost,
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionState::Searching => write!(f, "Searching"),
            ConnectionState::Connected(port) => write!(f, "Connected to {}", port),
            ConnectionState::Lost => write!(f, "Lost"),
        }
    }
}
