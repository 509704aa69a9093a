//! The in-memory network model.
//!
//! Two maps: BSSID to access point and station address to station record.
//! The model is owned by the classifier loop and mutated nowhere else;
//! every mutation returns the [`Update`] that describes it, and the update
//! stream is the only view anyone outside the collector ever gets.
//!
//! Entries are only ever created or updated; nothing is removed until the
//! whole collector shuts down and the model is dropped with it.

use std::collections::{HashMap, HashSet};

use crate::collect::event::{StationRecord, Update};
use crate::frame::HwAddr;

/// An access point advertising the target network.
#[derive(Debug, Clone)]
pub struct AccessPoint {
    /// Signal strength of the last observed frame from this AP.
    pub rss: Option<i8>,
    /// Channel the AP was last observed carrying client traffic on.
    pub channel: Option<u8>,
    /// Stations seen talking through this AP.
    pub stations: HashSet<HwAddr>,
}

/// The authoritative map of what has been observed.
#[derive(Debug, Default)]
pub struct NetworkModel {
    aps: HashMap<HwAddr, AccessPoint>,
    stations: HashMap<HwAddr, StationRecord>,
}

impl NetworkModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a management-frame observation of `bssid`.
    ///
    /// Signal strength is last-writer-wins; the most recent observation is
    /// what a downstream impersonator cares about.
    pub fn observe_ap(&mut self, bssid: HwAddr, rss: Option<i8>) -> Update {
        match self.aps.get_mut(&bssid) {
            Some(ap) => {
                ap.rss = rss;
                Update::ApUpdated { bssid, rss }
            }
            None => {
                self.aps.insert(
                    bssid,
                    AccessPoint {
                        rss,
                        channel: None,
                        stations: HashSet::new(),
                    },
                );
                Update::ApNew { bssid, rss }
            }
        }
    }

    /// Records a data-frame observation of `sta` talking through `bssid`.
    ///
    /// Returns `None` unless `bssid` is already a known access point:
    /// stations only exist relative to an AP of the target network, and a
    /// broadcast "station" is never recorded. A null `rss` (frame sent
    /// towards the station) leaves the previous signal observation in
    /// place.
    pub fn observe_station(
        &mut self,
        sta: HwAddr,
        bssid: HwAddr,
        now: u64,
        channel: Option<u8>,
        rss: Option<i8>,
    ) -> Option<Update> {
        if sta.is_broadcast() {
            return None;
        }
        let ap = self.aps.get_mut(&bssid)?;

        // Client traffic pins down the AP's operating channel more reliably
        // than the hop the management frame happened to be caught on.
        if channel.is_some() {
            ap.channel = channel;
        }
        ap.stations.insert(sta);

        match self.stations.get_mut(&sta) {
            Some(record) => {
                record.bssid = bssid;
                record.last_seen = now;
                record.channel = channel;
                if rss.is_some() {
                    record.rss = rss;
                }
                Some(Update::StaUpdated {
                    sta,
                    record: *record,
                })
            }
            None => {
                let record = StationRecord {
                    bssid,
                    last_seen: now,
                    channel,
                    rss,
                    spoofed: 0,
                    success: 0,
                };
                self.stations.insert(sta, record);
                Some(Update::StaNew { sta, record })
            }
        }
    }

    pub fn ap(&self, bssid: &HwAddr) -> Option<&AccessPoint> {
        self.aps.get(bssid)
    }

    pub fn station(&self, sta: &HwAddr) -> Option<&StationRecord> {
        self.stations.get(sta)
    }

    pub fn ap_count(&self) -> usize {
        self.aps.len()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }
}
