//! The update channel and command pipe.
//!
//! The collector process and its controller share no memory; everything
//! crosses a Unix stream pair as line-delimited JSON, one record per line.
//! Updates flow out of the collector, commands flow in. The stream is
//! ordered per sender, which is what guarantees a station's `StaNew`
//! reaches the controller before any of its `StaUpdated`s.
//!
//! The wire shape is internal to this crate; both ends speak these enums
//! and nothing else does.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::frame::HwAddr;

/// Classes of reportable errors, so the controller can react without
/// string-matching messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Setup failed; the collector is exiting without capturing.
    Setup,
    /// The capture socket failed outside teardown.
    Capture,
    /// Frames were dropped on queue overflow; the message carries the
    /// running total.
    FrameDrop,
    /// Restoration failed; the adapter may need manual recovery.
    Restore,
    /// A worker missed its join deadline.
    WorkerHang,
    /// The collector refused to start without the needed privileges.
    NonPrivileged,
}

/// One station's observation record, as carried by station events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    /// The access point this station was seen talking through.
    pub bssid: HwAddr,
    /// Seconds since the epoch at the last sighting.
    pub last_seen: u64,
    /// Channel number of the last radiotap observation, if it mapped to
    /// one.
    pub channel: Option<u8>,
    /// Signal strength in dBm of the last station-originated frame. Frames
    /// sent *to* the station say nothing about its transmitter, so this
    /// stays unchanged (or null) for those.
    pub rss: Option<i8>,
    /// Impersonation-attempt counter, written by downstream consumers.
    pub spoofed: u32,
    /// Successful-impersonation counter, written by downstream consumers.
    pub success: u32,
}

/// Differential updates published by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Update {
    /// Setup finished; the adapter is hopping over `scan_entries`
    /// frequency/width combinations. Always the first record of a
    /// successful run.
    ScanStarted { scan_entries: usize },
    /// First sighting of an access point advertising the target network.
    ApNew { bssid: HwAddr, rss: Option<i8> },
    /// New observation of a known access point.
    ApUpdated { bssid: HwAddr, rss: Option<i8> },
    /// First sighting of a client station behind a known access point.
    StaNew { sta: HwAddr, record: StationRecord },
    /// New observation of a known station.
    StaUpdated { sta: HwAddr, record: StationRecord },
    /// Something went wrong; informational unless `kind` is `Setup`.
    Error { kind: ErrorKind, message: String },
}

/// Commands accepted by the collector.
///
/// `Pause` and `Resume` are carried on the wire but not yet acted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum Command {
    Quit,
    Pause,
    Resume,
}

/// Writes one record and flushes, so the peer never waits on a buffer.
pub fn send<T: Serialize, W: Write>(writer: &mut W, record: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Reads one record, blocking until a full line arrives.
///
/// Returns `Ok(None)` on a cleanly closed stream.
pub fn recv<T: for<'de> Deserialize<'de>, R: BufRead>(reader: &mut R) -> io::Result<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let record = serde_json::from_str(line.trim_end())?;
    Ok(Some(record))
}

/// Splits a byte buffer of possibly-partial lines into parsed records,
/// leaving any trailing partial line in place.
///
/// The collector reads its command pipe without blocking, so it
/// accumulates bytes and decodes whatever whole lines have arrived.
pub fn drain_lines<T: for<'de> Deserialize<'de>>(buf: &mut Vec<u8>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        match serde_json::from_slice(&line[..line.len() - 1]) {
            Ok(record) => out.push(record),
            Err(e) => log::warn!("undecodable record on pipe: {}", e),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn round_trip_over_a_buffer() {
        let update = Update::StaNew {
            sta: HwAddr::new([0xbb; 6]),
            record: StationRecord {
                bssid: HwAddr::new([0xaa; 6]),
                last_seen: 1_700_000_000,
                channel: Some(6),
                rss: Some(-55),
                spoofed: 0,
                success: 0,
            },
        };
        let mut wire = Vec::new();
        send(&mut wire, &update).unwrap();
        send(&mut wire, &Update::ScanStarted { scan_entries: 12 }).unwrap();

        let mut reader = BufReader::new(&wire[..]);
        assert_eq!(recv::<Update, _>(&mut reader).unwrap(), Some(update));
        assert_eq!(
            recv::<Update, _>(&mut reader).unwrap(),
            Some(Update::ScanStarted { scan_entries: 12 })
        );
        assert_eq!(recv::<Update, _>(&mut reader).unwrap(), None);
    }

    #[test]
    fn null_rss_survives_the_wire() {
        let update = Update::ApNew {
            bssid: HwAddr::new([0xaa; 6]),
            rss: None,
        };
        let mut wire = Vec::new();
        send(&mut wire, &update).unwrap();
        let mut reader = BufReader::new(&wire[..]);
        assert_eq!(recv::<Update, _>(&mut reader).unwrap(), Some(update));
    }

    #[test]
    fn drain_handles_partial_lines() {
        let mut buf = Vec::new();
        send(&mut buf, &Command::Quit).unwrap();
        buf.extend_from_slice(b"{\"cmd\":\"pa"); // partial record
        let cmds: Vec<Command> = drain_lines(&mut buf);
        assert_eq!(cmds, vec![Command::Quit]);
        assert_eq!(buf, b"{\"cmd\":\"pa");

        buf.extend_from_slice(b"use\"}\n");
        let cmds: Vec<Command> = drain_lines(&mut buf);
        assert_eq!(cmds, vec![Command::Pause]);
        assert!(buf.is_empty());
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let mut buf = b"not json\n".to_vec();
        send(&mut buf, &Command::Quit).unwrap();
        let cmds: Vec<Command> = drain_lines(&mut buf);
        assert_eq!(cmds, vec![Command::Quit]);
    }
}
