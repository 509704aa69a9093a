//! The channel hopper.
//!
//! One background thread, one job: every [`SCAN_PERIOD`] advance to the
//! next scan entry and retune. The stop signal is an owned channel given to
//! the tuner at construction; sleeping *on* that channel means a stop
//! request never waits longer than one period to be honored.
//!
//! Hops visit entries in list order, so under steady state every entry is
//! visited within `|scan| * SCAN_PERIOD` (tune calls themselves permitting;
//! no wall-clock fairness is promised beyond that).

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};

use crate::radio::scan::ScanList;
use crate::radio::{RadioControl, RadioError, Tune};

/// Dwell time per scan entry.
pub const SCAN_PERIOD: Duration = Duration::from_millis(200);

/// Runs the hop loop until stopped or until the adapter goes away.
///
/// The scan list was pre-filtered by probing, so a rejected tune here is
/// unexpected but harmless: the entry is skipped and the next period moves
/// on. A real driver error means the interface was torn down under us
/// (teardown does exactly that), so the loop ends.
pub fn run<R: RadioControl>(mut radio: R, ifindex: u32, scan: ScanList, stop: Receiver<()>) {
    let mut i = 0;
    loop {
        match stop.recv_timeout(SCAN_PERIOD) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("tuner: stop");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        i = (i + 1) % scan.len();
        let entry = scan.entry(i);
        match radio.set_freq(ifindex, entry.mhz, entry.width) {
            Ok(Tune::Applied) => {}
            Ok(Tune::Rejected) | Err(RadioError::InvalidArgument) => {
                debug!("tuner: {} MHz {} rejected", entry.mhz, entry.width.label());
            }
            Err(e) => {
                warn!("tuner: exiting, tune failed: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::testutil::FakeRadio;
    use crate::radio::ChannelWidth;
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Instant;

    fn scan_radio() -> (FakeRadio, ScanList) {
        let accepts = vec![
            (2412, ChannelWidth::NoHt),
            (2437, ChannelWidth::NoHt),
            (2462, ChannelWidth::NoHt),
        ];
        let mut radio = FakeRadio::new("wlan0", vec![2412, 2437, 2462], accepts);
        let scan = ScanList::build(&mut radio, 0, 1).unwrap();
        radio.tunes.lock().unwrap().clear();
        (radio, scan)
    }

    #[test]
    fn visits_every_entry_and_wraps() {
        let (radio, scan) = scan_radio();
        let tunes = radio.tunes.clone();
        let (stop_tx, stop_rx) = bounded(1);
        let handle = thread::spawn(move || {
            run(radio, 1, scan, stop_rx);
        });
        // Five periods cover the full list once plus the wrap back to the
        // first entry; generous slack for a loaded test machine.
        thread::sleep(SCAN_PERIOD * 5 + SCAN_PERIOD / 2);
        stop_tx.send(()).unwrap();
        handle.join().unwrap();

        let seen = tunes.lock().unwrap();
        for mhz in [2412u16, 2437, 2462] {
            assert!(
                seen.iter().any(|&(m, _)| m == mhz),
                "never tuned {} MHz: {:?}",
                mhz,
                *seen
            );
        }
    }

    #[test]
    fn stop_is_prompt() {
        let (radio, scan) = scan_radio();
        let (stop_tx, stop_rx) = bounded(1);
        let started = Instant::now();
        let handle = thread::spawn(move || {
            run(radio, 1, scan, stop_rx);
        });
        stop_tx.send(()).unwrap();
        handle.join().unwrap();
        assert!(started.elapsed() < SCAN_PERIOD * 2);
    }

    #[test]
    fn dropped_sender_stops_the_loop() {
        let (radio, scan) = scan_radio();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            run(radio, 1, scan, stop_rx);
        });
        drop(stop_tx);
        handle.join().unwrap();
    }

    #[test]
    fn driver_failure_ends_the_loop() {
        let (mut radio, scan) = scan_radio();
        radio.tune_errno = Some(libc::ENODEV);
        let (_stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            run(radio, 1, scan, stop_rx);
        });
        // No stop signal needed; the first tune attempt fails.
        handle.join().unwrap();
    }
}
