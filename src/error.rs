use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("CommandPad not found on any serial port")]
    DeviceNotFound,

    #[error("Permission denied opening {0}")]
    PortPermissionDenied(String),

    #[error("Serial driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LinkError {
    /// Fatal errors end the monitor and reach the caller; everything else is
    /// recovered inside the link task.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::DeviceNotFound
                | LinkError::PortPermissionDenied(_)
                | LinkError::DriverUnavailable(_)
        )
    }

    pub fn from_serialport(port: &str, error: serialport::Error) -> Self {
        use serialport::ErrorKind;
        match error.kind() {
            ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                LinkError::PortPermissionDenied(port.into())
            }
            _ => LinkError::ConnectionLost(format!("{}: {}", port, error)),
        }
    }

    pub fn from_io(port: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => LinkError::PortPermissionDenied(port.into()),
            _ => LinkError::ConnectionLost(format!("{}: {}", port, error)),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
