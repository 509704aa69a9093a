//! Builders for synthetic captured frames, shared by the decoding and
//! classification tests.

use crate::frame::{ElementId, HwAddr, Present};

/// Radiotap header announcing channel and antenna signal.
pub fn radiotap(mhz: u16, rss: Option<i8>) -> Vec<u8> {
    let mut present = Present::CHANNEL;
    if rss.is_some() {
        present |= Present::ANTENNA_SIGNAL;
    }
    let mut buf = vec![0, 0, 0, 0];
    buf.extend_from_slice(&present.bits().to_le_bytes());
    buf.extend_from_slice(&mhz.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // channel flags
    if let Some(rss) = rss {
        buf.push(rss as u8);
    }
    let len = buf.len() as u16;
    buf[2..4].copy_from_slice(&len.to_le_bytes());
    buf
}

fn mac_header(fc: u16, addr1: HwAddr, addr2: HwAddr, addr3: HwAddr) -> Vec<u8> {
    let mut buf = fc.to_le_bytes().to_vec();
    buf.extend_from_slice(&0u16.to_le_bytes()); // duration
    buf.extend_from_slice(addr1.raw());
    buf.extend_from_slice(addr2.raw());
    buf.extend_from_slice(addr3.raw());
    buf.extend_from_slice(&0u16.to_le_bytes()); // sequence
    buf
}

/// A complete captured beacon advertising `ssid`, transmitted by `bssid`.
pub fn beacon(ssid: &[u8], bssid: HwAddr, mhz: u16, rss: i8) -> Vec<u8> {
    let mut buf = radiotap(mhz, Some(rss));
    let fc = 8u16 << 4; // management / beacon
    buf.extend_from_slice(&mac_header(fc, HwAddr::BROADCAST, bssid, bssid));
    buf.extend_from_slice(&[0; 12]); // timestamp + interval + capabilities
    buf.push(ElementId::SSID);
    buf.push(ssid.len() as u8);
    buf.extend_from_slice(ssid);
    buf
}

/// A complete captured data frame with the given DS bits.
pub fn data_frame(
    to_ds: bool,
    from_ds: bool,
    addr1: HwAddr,
    addr2: HwAddr,
    mhz: u16,
    rss: Option<i8>,
) -> Vec<u8> {
    let mut buf = radiotap(mhz, rss);
    let mut fc = 2u16 << 2; // data / subtype 0
    if to_ds {
        fc |= 0x01 << 8;
    }
    if from_ds {
        fc |= 0x02 << 8;
    }
    // Addr3 carries the far-side address; the classifier ignores it, so any
    // value will do.
    buf.extend_from_slice(&mac_header(fc, addr1, addr2, HwAddr::new([0xcc; 6])));
    buf.extend_from_slice(b"payload");
    buf
}
