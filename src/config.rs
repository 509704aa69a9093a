//! Collection configuration.

use clap::ValueEnum;

/// How the tool should behave once a viable station has been found.
///
/// The collector itself only gathers observations; the mode is carried so
/// downstream consumers know whether to act on them automatically.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConnectMode {
    /// Pick a station and proceed without operator input.
    Auto,
    /// Present observations and wait for the operator.
    Manual,
}

/// Everything the collector needs to know, fully populated before the
/// supervisor process is created.
#[derive(Clone, Debug)]
pub struct Config {
    /// Target network name. Compared byte-for-byte against the SSID element
    /// of management frames; names are not required to be UTF-8.
    pub ssid: Vec<u8>,
    /// Wireless device to capture on, e.g. `wlan0`.
    pub dev: String,
    /// Connection mode for downstream consumers.
    pub connect: ConnectMode,
}

impl Config {
    pub fn new(ssid: impl Into<Vec<u8>>, dev: impl Into<String>, connect: ConnectMode) -> Self {
        Config {
            ssid: ssid.into(),
            dev: dev.into(),
            connect,
        }
    }
}
