use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115200;

#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Port to open directly; discovery is used when absent.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Bounds each blocking read, and with it how fast a stop is noticed.
    pub read_timeout: Duration,
    pub discovery_timeout: Duration,
    pub discovery_interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            discovery_timeout: Duration::from_secs(5),
            discovery_interval: Duration::from_millis(250),
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
        }
    }
}
