//! Management-frame information elements.
//!
//! The body of a management frame is a subtype-specific block of fixed
//! parameters followed by a list of length-prefixed elements:
//!
//! ```notrust
//! LSB                                MSB
//! +-----------+-----------+----------+
//! |  Element  |  Length   |   Data   |
//! |  (1 oct)  |  (1 oct)  | (Length) |
//! +-----------+-----------+----------+
//! ```
//!
//! Only the SSID element is interpreted; everything else passes through as
//! raw `(id, data)` pairs so callers can look for what they need.

use crate::bytes::ByteReader;
use crate::frame::{ManagementSubtype, ParseError};

/// A single information element, with its data still raw.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    pub id: u8,
    pub data: &'a [u8],
}

/// Element ID constants.
pub enum ElementId {}

#[allow(unused)]
impl ElementId {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_PARAMETER_SET: u8 = 3;
    pub const TIM: u8 = 5;
    pub const COUNTRY: u8 = 7;
    pub const POWER_CONSTRAINT: u8 = 32;
    pub const HT_CAPABILITIES: u8 = 45;
    pub const RSN: u8 = 48;
    pub const EXT_SUPPORTED_RATES: u8 = 50;
    pub const HT_OPERATION: u8 = 61;
    pub const VHT_CAPABILITIES: u8 = 191;
    pub const VHT_OPERATION: u8 = 192;
    pub const VENDOR_SPECIFIC: u8 = 221;
}

/// Number of fixed-parameter bytes preceding the elements, per subtype.
///
/// Beacons and probe responses start with timestamp (8), beacon interval
/// (2) and capability info (2); association requests with capability info
/// (2) and listen interval (2); probe requests go straight to elements.
fn fixed_parameter_len(subtype: ManagementSubtype) -> Option<usize> {
    match subtype {
        ManagementSubtype::Beacon | ManagementSubtype::ProbeResponse => Some(12),
        ManagementSubtype::AssociationRequest => Some(4),
        ManagementSubtype::ProbeRequest => Some(0),
        ManagementSubtype::Unknown(_) => None,
    }
}

/// Iterator over the information elements of a management-frame body.
pub struct Elements<'a> {
    bytes: ByteReader<'a>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<Element<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.is_empty() {
            return None;
        }

        let item = (|| -> Result<Element<'a>, ParseError> {
            let id = self.bytes.read_u8()?;
            let len = usize::from(self.bytes.read_u8()?);
            let data = self.bytes.read_slice(len)?;
            Ok(Element { id, data })
        })();

        if item.is_err() {
            // Poisoned tail; don't keep yielding errors.
            self.bytes.read_rest();
        }
        Some(item)
    }
}

/// Returns the element iterator for a management-frame body, skipping the
/// subtype's fixed parameters.
///
/// Subtypes without a known fixed-parameter layout yield `InvalidValue`:
/// guessing an offset would produce garbage elements.
pub fn elements(subtype: ManagementSubtype, body: &[u8]) -> Result<Elements<'_>, ParseError> {
    let fixed = fixed_parameter_len(subtype).ok_or(ParseError::InvalidValue)?;
    let mut bytes = ByteReader::new(body);
    bytes.skip(fixed)?;
    Ok(Elements { bytes })
}

/// Extracts the SSID element of a management-frame body, if present.
pub fn ssid(subtype: ManagementSubtype, body: &[u8]) -> Result<Option<&[u8]>, ParseError> {
    for element in elements(subtype, body)? {
        let element = element?;
        if element.id == ElementId::SSID {
            return Ok(Some(element.data));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon_body(ssid_bytes: &[u8]) -> Vec<u8> {
        let mut body = vec![0; 12]; // timestamp + interval + capabilities
        body.push(ElementId::SSID);
        body.push(ssid_bytes.len() as u8);
        body.extend_from_slice(ssid_bytes);
        body.push(ElementId::SUPPORTED_RATES);
        body.push(1);
        body.push(0x82);
        body
    }

    #[test]
    fn ssid_from_beacon() {
        let body = beacon_body(b"coffee");
        assert_eq!(
            ssid(ManagementSubtype::Beacon, &body),
            Ok(Some(&b"coffee"[..]))
        );
    }

    #[test]
    fn ssid_absent() {
        let mut body = vec![0; 12];
        body.push(ElementId::SUPPORTED_RATES);
        body.push(1);
        body.push(0x82);
        assert_eq!(ssid(ManagementSubtype::Beacon, &body), Ok(None));
    }

    #[test]
    fn association_request_offset() {
        let mut body = vec![0; 4]; // capabilities + listen interval
        body.push(ElementId::SSID);
        body.push(3);
        body.extend_from_slice(b"net");
        assert_eq!(
            ssid(ManagementSubtype::AssociationRequest, &body),
            Ok(Some(&b"net"[..]))
        );
    }

    #[test]
    fn truncated_element_is_an_error() {
        let mut body = vec![0; 12];
        body.push(ElementId::SSID);
        body.push(30); // length beyond the buffer
        body.extend_from_slice(b"short");
        assert_eq!(
            ssid(ManagementSubtype::Beacon, &body),
            Err(ParseError::Eof)
        );
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        assert_eq!(
            ssid(ManagementSubtype::Unknown(13), &[0; 16]),
            Err(ParseError::InvalidValue)
        );
    }

    #[test]
    fn iterator_walks_all_elements() {
        let body = beacon_body(b"x");
        let ids: Vec<u8> = elements(ManagementSubtype::Beacon, &body)
            .unwrap()
            .map(|e| e.unwrap().id)
            .collect();
        assert_eq!(ids, vec![ElementId::SSID, ElementId::SUPPORTED_RATES]);
    }
}
