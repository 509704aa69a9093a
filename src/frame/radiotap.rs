//! Radiotap capture header.
//!
//! The header is variable-length: a fixed 8-byte preamble, then a chain of
//! 32-bit `present` words, then the announced fields packed in bit order
//! with per-field natural alignment (relative to the start of the header).
//!
//! ```notrust
//! LSB                                                        MSB
//! +---------+---------+------------+-----------+--------------+
//! | Version |   Pad   |   Length   |  Present  |   Fields     |
//! | (1 oct) | (1 oct) | (2 octets) | (4 o. ea) |  (variable)  |
//! +---------+---------+------------+-----------+--------------+
//! ```
//!
//! Only three fields matter to the pipeline: the flags octet (does the
//! buffer still carry the FCS?), the channel frequency, and the antenna
//! signal in dBm. Everything else is skipped by walking the field layout
//! table, and the header's `Length` field is what actually delimits the MAC
//! header that follows.

use bitflags::bitflags;

use crate::bytes::ByteReader;
use crate::frame::ParseError;

bitflags! {
    /// Field bits of a radiotap `present` word.
    pub struct Present: u32 {
        const TSFT              = 1 << 0;
        const FLAGS             = 1 << 1;
        const RATE              = 1 << 2;
        const CHANNEL           = 1 << 3;
        const FHSS              = 1 << 4;
        const ANTENNA_SIGNAL    = 1 << 5;
        const ANTENNA_NOISE     = 1 << 6;
        const LOCK_QUALITY      = 1 << 7;
        const TX_ATTENUATION    = 1 << 8;
        const DB_TX_ATTENUATION = 1 << 9;
        const TX_POWER          = 1 << 10;
        const ANTENNA           = 1 << 11;
        const DB_ANTENNA_SIGNAL = 1 << 12;
        const DB_ANTENNA_NOISE  = 1 << 13;
        const RX_FLAGS          = 1 << 14;
        const TX_FLAGS          = 1 << 15;
        const RTS_RETRIES       = 1 << 16;
        const DATA_RETRIES      = 1 << 17;
        const XCHANNEL          = 1 << 18;
        const MCS               = 1 << 19;
        const AMPDU_STATUS      = 1 << 20;
        const VHT               = 1 << 21;
        const RADIOTAP_NS       = 1 << 29;
        const VENDOR_NS         = 1 << 30;
        const EXT               = 1 << 31;
    }
}

bitflags! {
    /// The radiotap `Flags` field.
    pub struct RadiotapFlags: u8 {
        const CFP           = 0x01;
        const SHORT_PREAMBLE = 0x02;
        const WEP           = 0x04;
        const FRAGMENTATION = 0x08;
        /// The frame in the buffer still ends with its 4-byte FCS.
        const FCS_AT_END    = 0x10;
        const DATA_PAD      = 0x20;
        const BAD_FCS       = 0x40;
        const SHORT_GI      = 0x80;
    }
}

/// Alignment and size of the fields announced by present bits 0..=21, in
/// bit order. Bits past this table have unknown layout, so the walk stops
/// there (the header length still tells us where the MAC header starts).
const FIELD_LAYOUT: [(usize, usize); 22] = [
    (8, 8),  // TSFT
    (1, 1),  // Flags
    (1, 1),  // Rate
    (2, 4),  // Channel: u16 frequency + u16 channel flags
    (2, 2),  // FHSS
    (1, 1),  // dBm antenna signal
    (1, 1),  // dBm antenna noise
    (2, 2),  // lock quality
    (2, 2),  // TX attenuation
    (2, 2),  // dB TX attenuation
    (1, 1),  // dBm TX power
    (1, 1),  // antenna
    (1, 1),  // dB antenna signal
    (1, 1),  // dB antenna noise
    (2, 2),  // RX flags
    (2, 2),  // TX flags
    (1, 1),  // RTS retries
    (1, 1),  // data retries
    (4, 8),  // XChannel
    (1, 3),  // MCS
    (4, 8),  // A-MPDU status
    (2, 12), // VHT
];

/// Decoded receive metadata for one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Radiotap {
    /// Total length of the radiotap header; the MAC header starts here.
    pub len: usize,
    /// The flags octet, or empty if the header did not carry one.
    pub flags: RadiotapFlags,
    /// Antenna signal in dBm, if reported.
    pub rss: Option<i8>,
    /// Channel center frequency in MHz, if reported.
    pub channel_mhz: Option<u16>,
}

impl Radiotap {
    /// Decodes the radiotap header at the start of `buf`.
    ///
    /// Fails if the version is unknown or the declared length does not fit
    /// the buffer; unknown fields past the layout table are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        let mut bytes = ByteReader::new(buf);

        let version = bytes.read_u8()?;
        if version != 0 {
            return Err(ParseError::InvalidValue);
        }
        let _pad = bytes.read_u8()?;
        let len = usize::from(bytes.read_u16_le()?);
        if len < 8 || len > buf.len() {
            return Err(ParseError::InvalidLength);
        }

        // The first present word describes the fields we walk below; any
        // chained words (EXT) belong to further antennas or vendor
        // namespaces and only shift where the fields start.
        let first = Present::from_bits_truncate(bytes.read_u32_le()?);
        let mut pos = 8;
        let mut word = first;
        while word.contains(Present::EXT) {
            word = Present::from_bits_truncate(bytes.read_u32_le()?);
            pos += 4;
        }

        let mut decoded = Radiotap {
            len,
            flags: RadiotapFlags::empty(),
            rss: None,
            channel_mhz: None,
        };

        for (bit, &(align, size)) in FIELD_LAYOUT.iter().enumerate() {
            let announced = match Present::from_bits(1 << bit) {
                Some(p) if first.contains(p) => p,
                _ => continue,
            };

            pos = (pos + align - 1) & !(align - 1);
            if pos + size > len {
                return Err(ParseError::InvalidLength);
            }
            let field = &buf[pos..pos + size];
            pos += size;

            match announced {
                Present::FLAGS => {
                    decoded.flags = RadiotapFlags::from_bits_truncate(field[0]);
                }
                Present::CHANNEL => {
                    decoded.channel_mhz = Some(u16::from_le_bytes([field[0], field[1]]));
                }
                Present::ANTENNA_SIGNAL => {
                    decoded.rss = Some(field[0] as i8);
                }
                _ => {}
            }
        }

        Ok(decoded)
    }

    /// Returns whether the captured buffer still ends with the 4-byte FCS.
    pub fn fcs_at_end(&self) -> bool {
        self.flags.contains(RadiotapFlags::FCS_AT_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal header announcing flags, channel and antenna
    /// signal, which is what typical monitor-mode drivers emit.
    fn header(flags: u8, mhz: u16, rss: i8) -> Vec<u8> {
        let present = Present::FLAGS | Present::CHANNEL | Present::ANTENNA_SIGNAL;
        let mut buf = vec![0, 0, 0, 0];
        buf.extend_from_slice(&present.bits().to_le_bytes());
        buf.push(flags);
        buf.push(0); // padding: channel is 2-aligned
        buf.extend_from_slice(&mhz.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // channel flags
        buf.push(rss as u8);
        let len = buf.len() as u16;
        buf[2..4].copy_from_slice(&len.to_le_bytes());
        buf
    }

    #[test]
    fn typical_monitor_header() {
        let buf = header(0x10, 2437, -60);
        let rt = Radiotap::parse(&buf).unwrap();
        assert_eq!(rt.len, buf.len());
        assert!(rt.fcs_at_end());
        assert_eq!(rt.channel_mhz, Some(2437));
        assert_eq!(rt.rss, Some(-60));
    }

    #[test]
    fn empty_header() {
        // Version 0, no fields at all.
        let buf = [0u8, 0, 8, 0, 0, 0, 0, 0];
        let rt = Radiotap::parse(&buf).unwrap();
        assert_eq!(rt.len, 8);
        assert_eq!(rt.rss, None);
        assert_eq!(rt.channel_mhz, None);
        assert!(!rt.fcs_at_end());
    }

    #[test]
    fn tsft_forces_alignment() {
        // TSFT (8 bytes, 8-aligned) directly follows the preamble, then the
        // channel field lands 2-aligned behind it.
        let present = Present::TSFT | Present::CHANNEL;
        let mut buf = vec![0, 0, 0, 0];
        buf.extend_from_slice(&present.bits().to_le_bytes());
        buf.extend_from_slice(&[0; 8]); // TSFT
        buf.extend_from_slice(&5180u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        let len = buf.len() as u16;
        buf[2..4].copy_from_slice(&len.to_le_bytes());

        let rt = Radiotap::parse(&buf).unwrap();
        assert_eq!(rt.channel_mhz, Some(5180));
    }

    #[test]
    fn extended_present_words_shift_fields() {
        let mut buf = vec![0, 0, 0, 0];
        let first = Present::ANTENNA_SIGNAL | Present::EXT;
        buf.extend_from_slice(&first.bits().to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // second (empty) word
        buf.push((-42i8) as u8);
        let len = buf.len() as u16;
        buf[2..4].copy_from_slice(&len.to_le_bytes());

        let rt = Radiotap::parse(&buf).unwrap();
        assert_eq!(rt.rss, Some(-42));
    }

    #[test]
    fn rejects_bad_version_and_length() {
        assert_eq!(
            Radiotap::parse(&[1, 0, 8, 0, 0, 0, 0, 0]),
            Err(ParseError::InvalidValue)
        );
        // Declared length larger than the buffer.
        assert_eq!(
            Radiotap::parse(&[0, 0, 200, 0, 0, 0, 0, 0]),
            Err(ParseError::InvalidLength)
        );
        // Declared length smaller than the fixed preamble.
        assert_eq!(
            Radiotap::parse(&[0, 0, 4, 0, 0, 0, 0, 0]),
            Err(ParseError::InvalidLength)
        );
    }
}
