//! Captured-frame decoding: radiotap and the 802.11 MAC layer.
//!
//! A buffer read from the capture socket carries two headers before the
//! frame body:
//!
//! ```notrust
//! LSB                                                          MSB
//! +----------------+--------------------+------------------+ - - - +
//! |    Radiotap    |  802.11 MAC header |       Body       |  FCS  |
//! | (8..n octets)  |    (24 octets)     |    (variable)    | (4 B) |
//! +----------------+--------------------+------------------+ - - - +
//! ```
//!
//! The radiotap header is prepended by the capture path and carries receive
//! metadata (signal strength, channel, flags); it is not part of the frame
//! that was on the air. Its `length` field tells us where the MAC header
//! starts, and its flags tell us whether the driver left the FCS at the end
//! of the buffer.
//!
//! The classifier needs very little of the MAC layer: the frame type and
//! subtype, the three addresses, the two DS bits, and (for a few management
//! subtypes) the SSID information element. [`Mpdu`] decodes exactly that and
//! leaves the rest of the body untouched.
//!
//! All multi-byte fields in both headers are little-endian.

mod hwaddr;
mod ie;
mod mpdu;
mod radiotap;
#[cfg(test)]
pub(crate) mod testutil;

pub use self::hwaddr::HwAddr;
pub use self::ie::{elements, ssid, Element, ElementId, Elements};
pub use self::mpdu::{DsBits, FcFlags, FrameControl, FrameType, ManagementSubtype, Mpdu};
pub use self::radiotap::{Present, Radiotap, RadiotapFlags};

use thiserror::Error;

/// Errors produced while decoding a captured frame.
///
/// All of these are non-fatal to the pipeline: the offending frame is
/// dropped and counted.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Unexpectedly reached the end of the buffer.
    #[error("unexpected end of frame")]
    Eof,

    /// A length field contradicts the amount of data actually present.
    #[error("invalid length value specified")]
    InvalidLength,

    /// Invalid value supplied for a field.
    #[error("invalid value for field")]
    InvalidValue,
}
