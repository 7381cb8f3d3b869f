use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use serialport::{available_ports, SerialPort, SerialPortType};
use std::io::{self, Read};
use std::time::Duration;
use std::vec::Vec;

/// USB descriptor fragments announced by the CommandPad's CircuitPython CDC port.
pub const DEVICE_SIGNATURES: [&str; 2] = ["CircuitPython", "CDC"];

#[cfg(windows)]
pub const FALLBACK_PORTS: [&str; 4] = ["COM3", "COM4", "COM5", "COM6"];
#[cfg(not(windows))]
pub const FALLBACK_PORTS: [&str; 2] = ["/dev/ttyACM0", "/dev/ttyACM1"];

pub type Link = Box<dyn Read + Send>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    pub description: String,
    pub signature: bool,
}

/// Access to serial ports. The monitor only ever talks to the port through this.
pub trait Connector: Send + 'static {
    fn candidates(&self) -> Result<Vec<PortCandidate>>;

    fn open(&self, port: &str) -> Result<Link>;

    fn fallback_ports(&self) -> Vec<String> {
        FALLBACK_PORTS.iter().map(|p| p.to_string()).collect()
    }
}

pub struct SerialConnector {
    baud_rate: u32,
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(config: &LinkConfig) -> Self {
        SerialConnector {
            baud_rate: config.baud_rate,
            timeout: config.read_timeout,
        }
    }
}

struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Connector for SerialConnector {
    fn candidates(&self) -> Result<Vec<PortCandidate>> {
        let ports = available_ports().map_err(|e| {
            log::error!("Error listing serial ports: {:?}", e);
            LinkError::DriverUnavailable(e.to_string())
        })?;

        let mut result: Vec<PortCandidate> = Vec::new();
        for p in ports {
            let description = match &p.port_type {
                SerialPortType::UsbPort(info) => format!(
                    "{} {}",
                    info.manufacturer.as_deref().unwrap_or_default(),
                    info.product.as_deref().unwrap_or_default()
                )
                .trim()
                .to_string(),
                SerialPortType::PciPort => String::from("PCI"),
                SerialPortType::BluetoothPort => String::from("Bluetooth"),
                SerialPortType::Unknown => String::new(),
            };
            result.push(PortCandidate {
                signature: matches_signature(&description),
                name: p.port_name,
                description,
            });
        }

        Ok(result)
    }

    fn open(&self, port: &str) -> Result<Link> {
        let builder = serialport::new(port, self.baud_rate)
            .timeout(self.timeout)
            .stop_bits(serialport::StopBits::One)
            .data_bits(serialport::DataBits::Eight);
        match builder.open() {
            Ok(opened_port) => Ok(Box::new(SerialLink { port: opened_port })),
            Err(e) => {
                log::debug!("Port {} connection error: {:?}", port, e);
                Err(LinkError::from_serialport(port, e))
            }
        }
    }
}

pub fn matches_signature(description: &str) -> bool {
    DEVICE_SIGNATURES.iter().any(|s| description.contains(s))
}

/// One discovery pass: ports announcing the device signature first, then the
/// fallback names. A permission error on a signature port is fatal, on a
/// fallback port it only means "not ours".
pub fn discover<C: Connector + ?Sized>(connector: &C) -> Result<(String, Link)> {
    let candidates = connector.candidates()?;

    for candidate in candidates.iter().filter(|c| c.signature) {
        match connector.open(&candidate.name) {
            Ok(link) => {
                log::info!("Found CommandPad on {} ({})", candidate.name, candidate.description);
                return Ok((candidate.name.clone(), link));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::debug!("Candidate {} unusable: {}", candidate.name, e),
        }
    }

    for name in connector.fallback_ports() {
        match connector.open(&name) {
            Ok(link) => {
                log::info!("Using fallback port {}", name);
                return Ok((name, link));
            }
            Err(e) => log::debug!("Fallback {} unusable: {}", name, e),
        }
    }

    Err(LinkError::DeviceNotFound)
}
