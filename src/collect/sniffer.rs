//! The capture socket and its reader thread.
//!
//! A raw `AF_PACKET` socket bound to the monitor interface with protocol
//! `ETH_P_ALL` delivers every frame the adapter hears, radiotap header
//! included. The reader does nothing but move buffers: read, enqueue,
//! repeat. All decoding happens on the classifier side of the queue.
//!
//! Closing a packet socket does not wake a thread blocked in `recv(2)`, so
//! the socket carries a one-second receive timeout and the reader checks a
//! stop flag on every wakeup. Once the flag is set, any read error is the
//! expected end of capture; before that, an error means the capture path
//! broke underneath us and is reported.

use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::socket::{self, sockopt, MsgFlags, SockFlag, SockType};
use nix::sys::time::TimeVal;

use crate::utils::FrameDump;
use crate::Error;

/// Largest frame the capture path can deliver: the maximum 802.11 MPDU
/// plus radiotap overhead.
pub const MAX_FRAME_LEN: usize = 7935;

/// How long a read may block before the stop flag is rechecked.
const READ_TIMEOUT_SECS: i64 = 1;

/// Capacity of the frame queue between sniffer and classifier.
pub const FRAME_QUEUE_DEPTH: usize = 4096;

/// Opens the packet socket bound to `ifindex`.
pub fn open_capture_socket(ifindex: u32) -> Result<OwnedFd, Error> {
    let fd = socket::socket(
        socket::AddressFamily::Packet,
        SockType::Raw,
        SockFlag::empty(),
        None,
    )
    .map_err(|e| Error::Setup(format!("packet socket: {}", e)))?;

    socket::setsockopt(
        &fd,
        sockopt::ReceiveTimeout,
        &TimeVal::new(READ_TIMEOUT_SECS, 0),
    )
    .map_err(|e| Error::Setup(format!("socket timeout: {}", e)))?;

    // nix has no constructor for AF_PACKET bind addresses, so build the
    // sockaddr_ll by hand.
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
    addr.sll_ifindex = ifindex as libc::c_int;
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(Error::Setup(format!(
            "bind capture socket: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(fd)
}

/// Reader-thread state.
pub struct Sniffer {
    fd: OwnedFd,
    stop: Arc<AtomicBool>,
    frames: Sender<Vec<u8>>,
    /// Overflow drain: when the queue is full the oldest frame is pulled
    /// out and discarded to make room for the new one.
    overflow: Receiver<Vec<u8>>,
    drops: Arc<AtomicU64>,
}

impl Sniffer {
    pub fn new(
        fd: OwnedFd,
        stop: Arc<AtomicBool>,
        frames: Sender<Vec<u8>>,
        overflow: Receiver<Vec<u8>>,
        drops: Arc<AtomicU64>,
    ) -> Self {
        Sniffer {
            fd,
            stop,
            frames,
            overflow,
            drops,
        }
    }

    /// Runs until the stop flag is set or the capture path dies.
    ///
    /// Returns `Ok` for a commanded stop, `Err` if the socket failed while
    /// capture was still supposed to be running.
    pub fn run(self) -> Result<(), Error> {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        loop {
            if self.stop.load(Ordering::Relaxed) {
                debug!("sniffer: stop requested");
                return Ok(());
            }
            match socket::recv(self.fd.as_raw_fd(), &mut buf, MsgFlags::empty()) {
                Ok(0) => continue,
                Ok(n) => {
                    trace!("frame: {:?}", FrameDump::new(&buf[..n]));
                    self.enqueue(buf[..n].to_vec());
                }
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => continue,
                Err(e) => {
                    if self.stop.load(Ordering::Relaxed) {
                        debug!("sniffer: socket closed during teardown ({})", e);
                        return Ok(());
                    }
                    return Err(Error::CaptureClosed(e.to_string()));
                }
            }
        }
    }

    fn enqueue(&self, frame: Vec<u8>) {
        match self.frames.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                // Lossy capture is fine; shed the oldest first.
                if self.overflow.try_recv().is_ok() {
                    self.drops.fetch_add(1, Ordering::Relaxed);
                }
                if self.frames.try_send(frame).is_err() {
                    self.drops.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("sniffer: frame queue disconnected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn overflow_drops_oldest() {
        let (tx, rx) = bounded(2);
        let drops = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        // A socketpair stands in for the packet socket; run() is not
        // called, only the queue policy is exercised.
        let (fd, _peer) = nix::sys::socket::socketpair(
            nix::sys::socket::AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .unwrap();
        let sniffer = Sniffer::new(fd, stop, tx, rx.clone(), drops.clone());

        sniffer.enqueue(vec![1]);
        sniffer.enqueue(vec![2]);
        sniffer.enqueue(vec![3]);

        assert_eq!(drops.load(Ordering::Relaxed), 1);
        let remaining: Vec<Vec<u8>> = rx.try_iter().collect();
        assert_eq!(remaining, vec![vec![2], vec![3]]);
    }
}
