//! Scan-list construction.
//!
//! The tuner can only hop between combinations the driver actually
//! accepts, and drivers disagree wildly about which frequency/width pairs
//! those are. Rather than encode per-driver knowledge, the list is built
//! empirically at setup: take the Cartesian product of the radio's
//! advertised frequencies and all width tags, try to tune each one, and
//! keep what sticks. An "invalid argument" answer drops the combination;
//! any other driver error aborts setup, because it means the adapter is in
//! a state we don't understand.
//!
//! The list is immutable after construction. As a side effect of probing,
//! the adapter ends up parked on the first entry, which is exactly where
//! the tuner starts.

use log::{debug, info};

use crate::radio::{ChannelWidth, RadioControl, RadioError, Tune};
use crate::Error;

/// One accepted (frequency, width) tuning target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub mhz: u16,
    pub width: ChannelWidth,
}

/// The immutable list of tuning targets for one capture run.
#[derive(Debug, Clone)]
pub struct ScanList {
    entries: Vec<ScanEntry>,
}

impl ScanList {
    /// Probes the adapter and builds the scan list.
    ///
    /// Fails if the radio reports no usable frequency at all, or if any
    /// probe fails with something other than "invalid argument".
    pub fn build<R: RadioControl>(radio: &mut R, wiphy: u32, ifindex: u32) -> Result<Self, Error> {
        let freqs = radio.supported_freqs(wiphy)?;
        let mut entries = Vec::new();

        for &mhz in &freqs {
            for width in ChannelWidth::all() {
                match radio.set_freq(ifindex, mhz, width) {
                    Ok(Tune::Applied) => entries.push(ScanEntry { mhz, width }),
                    Ok(Tune::Rejected) => {
                        debug!("{} MHz {} not supported", mhz, width.label());
                    }
                    Err(RadioError::InvalidArgument) => {
                        debug!("{} MHz {} rejected", mhz, width.label());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if entries.is_empty() {
            return Err(Error::Setup("no tunable frequencies found".into()));
        }

        info!(
            "scan list: {} entries over {} frequencies",
            entries.len(),
            freqs.len()
        );
        Ok(ScanList { entries })
    }

    /// Parks the adapter on the first entry, where the tuner will start.
    pub fn park<R: RadioControl>(&self, radio: &mut R, ifindex: u32) -> Result<(), Error> {
        let first = self.entries[0];
        match radio.set_freq(ifindex, first.mhz, first.width)? {
            Tune::Applied => Ok(()),
            // The entry tuned fine moments ago during probing.
            Tune::Rejected => Err(Error::Setup(format!(
                "park on {} MHz {} rejected",
                first.mhz,
                first.width.label()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `i`, which must be in bounds.
    pub fn entry(&self, i: usize) -> ScanEntry {
        self.entries[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = ScanEntry> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::testutil::FakeRadio;

    #[test]
    fn product_is_filtered_by_probing() {
        let mut radio = FakeRadio::new(
            "wlan0",
            vec![2412, 2437, 2462],
            vec![
                (2412, ChannelWidth::NoHt),
                (2412, ChannelWidth::Ht20),
                (2437, ChannelWidth::NoHt),
            ],
        );
        let scan = ScanList::build(&mut radio, 0, 1).unwrap();
        let entries: Vec<(u16, ChannelWidth)> = scan.iter().map(|e| (e.mhz, e.width)).collect();
        assert_eq!(
            entries,
            vec![
                (2412, ChannelWidth::NoHt),
                (2412, ChannelWidth::Ht20),
                (2437, ChannelWidth::NoHt),
            ]
        );
    }

    #[test]
    fn no_entries_is_a_setup_error() {
        let mut radio = FakeRadio::new("wlan0", vec![2412], vec![]);
        assert!(matches!(
            ScanList::build(&mut radio, 0, 1),
            Err(Error::Setup(_))
        ));
    }

    #[test]
    fn driver_error_aborts() {
        let mut radio = FakeRadio::new("wlan0", vec![2412], vec![(2412, ChannelWidth::NoHt)]);
        radio.tune_errno = Some(libc::EBUSY);
        assert!(matches!(
            ScanList::build(&mut radio, 0, 1),
            Err(Error::Radio(RadioError::Os(_)))
        ));
    }

    #[test]
    fn park_retunes_first_entry() {
        let mut radio = FakeRadio::new(
            "wlan0",
            vec![2412, 2437],
            vec![(2412, ChannelWidth::NoHt), (2437, ChannelWidth::NoHt)],
        );
        let scan = ScanList::build(&mut radio, 0, 1).unwrap();
        radio.tunes.lock().unwrap().clear();
        scan.park(&mut radio, 1).unwrap();
        assert_eq!(
            *radio.tunes.lock().unwrap(),
            vec![(2412, ChannelWidth::NoHt)]
        );
    }
}
