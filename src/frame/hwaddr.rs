use core::fmt;
use core::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};

use crate::bytes::ByteReader;
use crate::frame::ParseError;

/// A 6-byte 802.11 hardware address.
///
/// Depending on where it appears in a frame this is a station address, an
/// access point's radio address, or a BSSID; the byte layout is the same.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HwAddr([u8; 6]);

impl HwAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: Self = HwAddr([0xff; 6]);

    /// Creates an address from 6 raw bytes, in transmission order.
    pub const fn new(bytes: [u8; 6]) -> Self {
        HwAddr(bytes)
    }

    /// Reads an address from the next 6 bytes of a captured frame.
    pub fn from_reader(bytes: &mut ByteReader<'_>) -> Result<Self, ParseError> {
        Ok(HwAddr(bytes.read_array::<[u8; 6]>()?))
    }

    /// Returns the raw bytes making up this address.
    pub fn raw(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Returns whether the group bit is set (multicast and broadcast
    /// destinations).
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for HwAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or(ParseError::InvalidLength)?;
            if part.len() != 2 {
                return Err(ParseError::InvalidLength);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseError::InvalidValue)?;
        }
        if parts.next().is_some() {
            return Err(ParseError::InvalidLength);
        }
        Ok(HwAddr(bytes))
    }
}

/// Serialized as the colon-separated hex form so the event pipe stays
/// readable when captured with a terminal attached.
impl Serialize for HwAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HwAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            de::Error::invalid_value(de::Unexpected::Str(&s), &"a colon-separated MAC address")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_representation() {
        let addr = HwAddr::new([0x88, 0xc6, 0x26, 0x04, 0x92, 0x5a]);
        assert_eq!(format!("{}", addr), "88:c6:26:04:92:5a");
        assert_eq!(format!("{:?}", addr), "88:c6:26:04:92:5a");
    }

    #[test]
    fn parse_round_trip() {
        let addr: HwAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(addr, HwAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert!("aa:bb:cc:dd:ee".parse::<HwAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<HwAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:zz".parse::<HwAddr>().is_err());
    }

    #[test]
    fn broadcast_and_group() {
        assert!(HwAddr::BROADCAST.is_broadcast());
        assert!(HwAddr::BROADCAST.is_group());
        let mcast = HwAddr::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        assert!(mcast.is_group());
        assert!(!mcast.is_broadcast());
        let unicast = HwAddr::new([0x02, 0, 0, 0, 0, 1]);
        assert!(!unicast.is_group());
    }

    #[test]
    fn json_form() {
        let addr = HwAddr::new([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"aa:aa:aa:aa:aa:aa\"");
        let back: HwAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
