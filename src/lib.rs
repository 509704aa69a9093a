//! Monitor-mode reconnaissance of a named wireless network.
//!
//! Wardrift points a wireless adapter at a target network name and builds a
//! live picture of the infrastructure behind it: every access point that
//! advertises the name, and every client station whose data frames flow
//! through one of those access points, together with the signal strength and
//! channel observations needed to pick a station worth impersonating.
//!
//! The crate splits into three layers:
//!
//! * [`frame`] decodes what comes off the air: the radiotap capture header
//!   and the 802.11 MAC header with its information elements.
//! * [`radio`] drives the adapter itself through nl80211: monitor-mode
//!   conversion, frequency/width enumeration, and tuning. The core only
//!   talks to the [`radio::RadioControl`] trait, so everything above it runs
//!   against a fake radio in tests.
//! * [`collect`] is the capture pipeline: a supervisor process that owns the
//!   adapter, hops channels on a fixed cadence, reads raw frames from a
//!   packet socket, classifies them into the network model, and streams
//!   differential updates back to the controlling process.
//!
//! Linux only: monitor-mode semantics, packet sockets and nl80211 are
//! assumed throughout.

#[macro_use]
mod utils;
pub mod bytes;
pub mod collect;
pub mod config;
mod error;
pub mod frame;
pub mod lifecycle;
pub mod radio;

pub use self::error::Error;
