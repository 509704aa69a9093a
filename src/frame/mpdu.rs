//! 802.11 MAC header decoding.
//!
//! ```notrust
//! LSB                                                                  MSB
//! +---------+----------+--------+--------+--------+----------+ - - - - -+
//! |  Frame  | Duration | Addr 1 | Addr 2 | Addr 3 | Sequence |   Body   |
//! | Control |  (2 oct) | (6 o.) | (6 o.) | (6 o.) |  (2 oct) |          |
//! +---------+----------+--------+--------+--------+----------+ - - - - -+
//! ```
//!
//! The 16-bit frame control word:
//!
//! ```notrust
//! LSB                                                              MSB
//! +----------+----------+----------+-------+---------+--------------+
//! | Version  |   Type   | Subtype  | To DS | From DS |  More flags  |
//! | (2 bits) | (2 bits) | (4 bits) | (1 b) |  (1 b)  |   (6 bits)   |
//! +----------+----------+----------+-------+---------+--------------+
//! ```
//!
//! Who transmitted and who is addressed depends on the type and the two DS
//! bits; the meanings the classifier relies on are documented on [`DsBits`].

use bitflags::bitflags;

use crate::bytes::ByteReader;
use crate::frame::{HwAddr, ParseError};

enum_with_unknown! {
    /// The four 802.11 frame classes.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum FrameType(u8) {
        Management = 0,
        Control = 1,
        Data = 2,
        Extension = 3,
    }
}

enum_with_unknown! {
    /// Management subtypes the classifier cares about.
    ///
    /// These are the subtypes that carry an SSID element naming the network
    /// in clear text; everything else decodes as `Unknown` and is ignored.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum ManagementSubtype(u8) {
        AssociationRequest = 0,
        ProbeRequest = 4,
        ProbeResponse = 5,
        Beacon = 8,
    }
}

bitflags! {
    /// Frame-control flag bits (the upper byte of the control word).
    pub struct FcFlags: u8 {
        const TO_DS      = 0x01;
        const FROM_DS    = 0x02;
        const MORE_FRAG  = 0x04;
        const RETRY      = 0x08;
        const PWR_MGMT   = 0x10;
        const MORE_DATA  = 0x20;
        const PROTECTED  = 0x40;
        const ORDER      = 0x80;
    }
}

/// The distribution-system bits of a data frame, which determine which
/// address is the BSSID and which is the station.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DsBits {
    /// Neither bit set: ad-hoc traffic, not infrastructure.
    Neither,
    /// `to-ds` only: a station transmitting towards its AP. Addr1 is the
    /// BSSID and addr2 the station, and the receive metadata describes the
    /// station's transmission.
    ToDs,
    /// `from-ds` only: an AP transmitting towards a station. Addr1 is the
    /// station and addr2 the BSSID; the signal strength belongs to the AP,
    /// not the station.
    FromDs,
    /// Both bits set: a wireless bridge with four addresses. Not
    /// infrastructure client traffic.
    Both,
}

/// Decoded frame control word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameControl {
    pub version: u8,
    pub frame_type: FrameType,
    pub subtype: u8,
    pub flags: FcFlags,
}

impl FrameControl {
    fn parse(raw: u16) -> Result<Self, ParseError> {
        let version = (raw & 0b11) as u8;
        if version != 0 {
            return Err(ParseError::InvalidValue);
        }
        Ok(FrameControl {
            version,
            frame_type: FrameType::from(((raw >> 2) & 0b11) as u8),
            subtype: ((raw >> 4) & 0b1111) as u8,
            flags: FcFlags::from_bits_truncate((raw >> 8) as u8),
        })
    }

    /// Returns the DS-bit combination of this frame.
    pub fn ds_bits(&self) -> DsBits {
        match (
            self.flags.contains(FcFlags::TO_DS),
            self.flags.contains(FcFlags::FROM_DS),
        ) {
            (false, false) => DsBits::Neither,
            (true, false) => DsBits::ToDs,
            (false, true) => DsBits::FromDs,
            (true, true) => DsBits::Both,
        }
    }

    /// The subtype as a management subtype (only meaningful for management
    /// frames).
    pub fn management_subtype(&self) -> ManagementSubtype {
        ManagementSubtype::from(self.subtype)
    }
}

/// A decoded 802.11 MAC header plus the untouched frame body.
///
/// Decoding covers the three-address header common to management and data
/// frames. Control frames are shorter than that and fail with `Eof`, which
/// is fine: nothing downstream wants them.
#[derive(Debug, Copy, Clone)]
pub struct Mpdu<'a> {
    pub frame_control: FrameControl,
    pub duration: u16,
    pub addr1: HwAddr,
    pub addr2: HwAddr,
    pub addr3: HwAddr,
    pub sequence: u16,
    /// Everything after the sequence-control field, FCS already trimmed.
    pub body: &'a [u8],
}

impl<'a> Mpdu<'a> {
    /// Decodes the MAC header at the start of `bytes`.
    ///
    /// `fcs_present` comes from the radiotap flags; when set, the last 4
    /// bytes of the buffer are the frame check sequence and are trimmed off
    /// the body.
    pub fn parse(bytes: &'a [u8], fcs_present: bool) -> Result<Self, ParseError> {
        let mut whole = ByteReader::new(bytes);
        let mut r = if fcs_present {
            let mpdu_len = bytes.len().checked_sub(4).ok_or(ParseError::Eof)?;
            whole.split_off(mpdu_len)?
        } else {
            whole
        };
        let frame_control = FrameControl::parse(r.read_u16_le()?)?;
        let duration = r.read_u16_le()?;
        let addr1 = HwAddr::from_reader(&mut r)?;
        let addr2 = HwAddr::from_reader(&mut r)?;
        let addr3 = HwAddr::from_reader(&mut r)?;
        let sequence = r.read_u16_le()?;

        Ok(Mpdu {
            frame_control,
            duration,
            addr1,
            addr2,
            addr3,
            sequence,
            body: r.read_rest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mgmt_header(subtype: u8) -> Vec<u8> {
        let fc = u16::from(subtype) << 4;
        let mut buf = fc.to_le_bytes().to_vec();
        buf.extend_from_slice(&0u16.to_le_bytes()); // duration
        buf.extend_from_slice(&[0x11; 6]); // addr1
        buf.extend_from_slice(&[0x22; 6]); // addr2
        buf.extend_from_slice(&[0x33; 6]); // addr3
        buf.extend_from_slice(&0u16.to_le_bytes()); // sequence
        buf
    }

    #[test]
    fn beacon_header() {
        let mut buf = mgmt_header(8);
        buf.extend_from_slice(b"body");
        let mpdu = Mpdu::parse(&buf, false).unwrap();
        assert_eq!(mpdu.frame_control.frame_type, FrameType::Management);
        assert_eq!(
            mpdu.frame_control.management_subtype(),
            ManagementSubtype::Beacon
        );
        assert_eq!(mpdu.addr1, HwAddr::new([0x11; 6]));
        assert_eq!(mpdu.addr3, HwAddr::new([0x33; 6]));
        assert_eq!(mpdu.body, b"body");
    }

    #[test]
    fn fcs_is_trimmed() {
        let mut buf = mgmt_header(8);
        buf.extend_from_slice(b"body");
        buf.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let mpdu = Mpdu::parse(&buf, true).unwrap();
        assert_eq!(mpdu.body, b"body");
    }

    #[test]
    fn ds_bits() {
        // Data frame, to-ds set.
        let fc: u16 = (2 << 2) | (0x01 << 8);
        let mut buf = fc.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0; 22]);
        let mpdu = Mpdu::parse(&buf, false).unwrap();
        assert_eq!(mpdu.frame_control.frame_type, FrameType::Data);
        assert_eq!(mpdu.frame_control.ds_bits(), DsBits::ToDs);

        let fc: u16 = (2 << 2) | (0x03 << 8);
        let mut buf = fc.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0; 22]);
        let mpdu = Mpdu::parse(&buf, false).unwrap();
        assert_eq!(mpdu.frame_control.ds_bits(), DsBits::Both);
    }

    #[test]
    fn short_control_frame_is_eof() {
        // An ACK frame: frame control, duration, one address.
        let fc: u16 = (1 << 2) | (13 << 4);
        let mut buf = fc.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0; 8]);
        assert_eq!(Mpdu::parse(&buf, false).unwrap_err(), ParseError::Eof);
    }

    #[test]
    fn nonzero_version_rejected() {
        let buf = [0x01u8, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            Mpdu::parse(&buf, false).unwrap_err(),
            ParseError::InvalidValue
        );
    }
}
