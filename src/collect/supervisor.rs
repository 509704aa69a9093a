//! The collector supervisor.
//!
//! Capture runs in a child process. Converting an adapter to monitor mode
//! is the one destructive thing this tool does, and a parser or driver
//! mishap must not be able to take the controlling process down with the
//! adapter stuck in monitor mode. The child owns the radio, the packet
//! socket and the worker threads; the parent holds nothing but a Unix
//! stream carrying commands one way and updates the other.
//!
//! Inside the child, three threads run in parallel:
//!
//! * the tuner, hopping the scan list on its 200 ms cadence,
//! * the sniffer, moving raw frames from the packet socket to the queue,
//! * the supervisor loop itself, multiplexing the command pipe and the
//!   frame queue, classifying frames and publishing updates.
//!
//! Restoration comes first in teardown, before the workers are even
//! joined: their loops notice the vanished interface or the stop flag on
//! their next wakeup, but the adapter is already back in its original
//! mode by then. Workers that miss their join deadline are reported and
//! abandoned rather than waited on forever.

use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use nix::errno::Errno;
use nix::sys::socket::{self, MsgFlags, SockFlag, SockType};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::collect::classify::Classifier;
use crate::collect::event::{self, Command, ErrorKind, Update};
use crate::collect::model::NetworkModel;
use crate::collect::sniffer::{self, Sniffer, FRAME_QUEUE_DEPTH};
use crate::collect::tuner;
use crate::config::Config;
use crate::radio::scan::ScanList;
use crate::radio::{Controller, MonitorHandle, Nl80211Control};
use crate::utils::FrameDump;
use crate::Error;

/// How long teardown waits for each worker thread.
const JOIN_DEADLINE: Duration = Duration::from_secs(5);

/// Wakeup interval of the supervisor loop when nothing arrives.
const SELECT_WAKEUP: Duration = Duration::from_secs(1);

/// How many queued frames are classified per wakeup before commands are
/// checked again.
const FRAME_BURST: usize = 256;

/// Seconds since the epoch; observation timestamps on station records.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parent-side handle to a running collector process.
pub struct Collector {
    pid: Pid,
    stream: UnixStream,
    rx_buf: Vec<u8>,
    pending: Vec<Update>,
}

impl Collector {
    /// Forks the collector process.
    ///
    /// The child never returns from this call; it runs the capture
    /// lifecycle and exits. The parent gets the handle immediately; setup
    /// success or failure arrives as the first update on the stream
    /// (`ScanStarted`, or an error of kind `Setup`/`NonPrivileged`).
    pub fn spawn(config: &Config) -> Result<Collector, Error> {
        let (parent_fd, child_fd) = socket::socketpair(
            socket::AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(|e| Error::Setup(format!("socketpair: {}", e)))?;

        match unsafe { fork() }.map_err(|e| Error::Setup(format!("fork: {}", e)))? {
            ForkResult::Child => {
                drop(parent_fd);
                let stream = UnixStream::from(child_fd);
                let code = collector_main(stream, config.clone());
                process::exit(code);
            }
            ForkResult::Parent { child } => {
                drop(child_fd);
                let stream = UnixStream::from(parent_fd);
                stream.set_read_timeout(Some(Duration::from_millis(500)))?;
                Ok(Collector {
                    pid: child,
                    stream,
                    rx_buf: Vec::new(),
                    pending: Vec::new(),
                })
            }
        }
    }

    /// Returns the next update, waiting at most the stream's read timeout.
    ///
    /// `Ok(None)` means nothing arrived yet; a closed stream means the
    /// collector is gone and reads as `CaptureClosed`.
    pub fn next_event(&mut self) -> Result<Option<Update>, Error> {
        if !self.pending.is_empty() {
            return Ok(Some(self.pending.remove(0)));
        }

        let mut tmp = [0u8; 4096];
        match self.stream.read(&mut tmp) {
            Ok(0) => return Err(Error::CaptureClosed("collector exited".into())),
            Ok(n) => self.rx_buf.extend_from_slice(&tmp[..n]),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }

        self.pending = event::drain_lines(&mut self.rx_buf);
        if self.pending.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.pending.remove(0)))
        }
    }

    /// Asks the collector to tear down and exit.
    pub fn quit(&mut self) -> Result<(), Error> {
        event::send(&mut self.stream, &Command::Quit)?;
        Ok(())
    }

    /// Waits for the collector to exit, killing it after `deadline`.
    ///
    /// Returns whether the exit was clean (voluntary, status 0).
    pub fn wait(self, deadline: Duration) -> Result<bool, Error> {
        let start = std::time::Instant::now();
        loop {
            match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {
                    if start.elapsed() > deadline {
                        warn!("collector did not exit in time, killing it");
                        let _ = nix::sys::signal::kill(self.pid, nix::sys::signal::SIGKILL);
                        let _ = waitpid(self.pid, None);
                        return Ok(false);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Ok(WaitStatus::Exited(_, code)) => return Ok(code == 0),
                Ok(_) => return Ok(false),
                Err(Errno::ECHILD) => return Ok(true),
                Err(e) => return Err(Error::Setup(format!("waitpid: {}", e))),
            }
        }
    }
}

/// Entry point of the child process; every failure is reported on the
/// stream rather than escaping.
fn collector_main(stream: UnixStream, config: Config) -> i32 {
    // Ctrl-C in the controlling terminal hits the whole process group.
    // The collector must only die by QUIT so that restoration always
    // runs, so the signal is ignored here.
    unsafe {
        let _ = nix::sys::signal::signal(
            nix::sys::signal::Signal::SIGINT,
            nix::sys::signal::SigHandler::SigIgn,
        );
    }

    let mut events = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return 1,
    };

    let mut runtime = match Runtime::setup(&config) {
        Ok(r) => r,
        Err(e) => {
            let kind = match e {
                Error::NonPrivileged => ErrorKind::NonPrivileged,
                _ => ErrorKind::Setup,
            };
            let _ = event::send(
                &mut events,
                &Update::Error {
                    kind,
                    message: e.to_string(),
                },
            );
            return 1;
        }
    };

    // The update stream opens with the setup acknowledgement.
    let hello = Update::ScanStarted {
        scan_entries: runtime.scan_entries,
    };
    if event::send(&mut events, &hello).is_err() {
        // Nobody is listening; restore and leave.
        return if runtime.teardown(&mut events) { 0 } else { 1 };
    }

    // Teardown runs on every exit path, a panicking classifier included.
    let looped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        runtime.run_loop(&stream, &mut events)
    }));
    let clean = runtime.teardown(&mut events);

    match looped {
        Ok(()) if clean => 0,
        Ok(()) => 1,
        Err(_) => {
            warn!("supervisor loop panicked; adapter restoration attempted anyway");
            1
        }
    }
}

/// Everything the supervisor loop owns once setup has succeeded.
struct Runtime {
    controller: Controller<Nl80211Control>,
    handle: MonitorHandle,
    scan_entries: usize,
    classifier: Classifier,
    model: NetworkModel,
    frame_rx: Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
    tuner_stop: Sender<()>,
    drops: Arc<AtomicU64>,
    sniffer_thread: JoinHandle<()>,
    sniffer_done: Receiver<Result<(), Error>>,
    tuner_thread: JoinHandle<()>,
    tuner_done: Receiver<()>,
}

impl Runtime {
    /// Brings the adapter, the socket and the workers up.
    ///
    /// Once monitor conversion has happened, any later failure restores
    /// the adapter before the error propagates; the caller only ever sees
    /// the adapter untouched or fully set up.
    fn setup(config: &Config) -> Result<Runtime, Error> {
        if !nix::unistd::Uid::effective().is_root() {
            return Err(Error::NonPrivileged);
        }

        let radio = Nl80211Control::new()?;
        let tuner_radio = Nl80211Control::new()?;
        let mut controller = Controller::new(radio);

        let handle = controller.to_monitor(&config.dev)?;
        let monitor = handle.monitor.clone();

        let prepared = (|| -> Result<_, Error> {
            let scan = ScanList::build(controller.radio(), monitor.wiphy, monitor.ifindex)?;
            scan.park(controller.radio(), monitor.ifindex)?;
            let fd = sniffer::open_capture_socket(monitor.ifindex)?;
            Ok((scan, fd))
        })();
        let (scan, fd) = match prepared {
            Ok(x) => x,
            Err(e) => {
                let _ = controller.restore(&handle);
                return Err(e);
            }
        };

        info!(
            "capture up on {} ({} scan entries)",
            monitor.name,
            scan.len()
        );

        let stop = Arc::new(AtomicBool::new(false));
        let drops = Arc::new(AtomicU64::new(0));
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE_DEPTH);
        let (tuner_stop, tuner_stop_rx) = bounded(1);
        let (sniffer_done_tx, sniffer_done) = bounded(1);
        let (tuner_done_tx, tuner_done) = bounded(1);

        let sniffer = Sniffer::new(
            fd,
            Arc::clone(&stop),
            frame_tx,
            frame_rx.clone(),
            Arc::clone(&drops),
        );
        let sniffer_thread = thread::Builder::new()
            .name("sniffer".into())
            .spawn(move || {
                let _ = sniffer_done_tx.send(sniffer.run());
            })?;

        let scan_for_tuner = scan.clone();
        let tuner_ifindex = monitor.ifindex;
        let tuner_thread = thread::Builder::new().name("tuner".into()).spawn(move || {
            tuner::run(tuner_radio, tuner_ifindex, scan_for_tuner, tuner_stop_rx);
            let _ = tuner_done_tx.send(());
        })?;

        Ok(Runtime {
            controller,
            handle,
            scan_entries: scan.len(),
            classifier: Classifier::new(config.ssid.clone()),
            model: NetworkModel::new(),
            frame_rx,
            stop,
            tuner_stop,
            drops,
            sniffer_thread,
            sniffer_done,
            tuner_thread,
            tuner_done,
        })
    }

    /// The supervisor loop: multiplexes the command pipe and the frame
    /// queue until QUIT (or a dead pipe) ends the run.
    fn run_loop(&mut self, cmd_stream: &UnixStream, events: &mut UnixStream) {
        let mut cmd_buf: Vec<u8> = Vec::new();
        let mut reported_drops = 0u64;
        let mut capture_dead = false;

        'run: loop {
            // Commands first so a flooded frame queue cannot starve QUIT.
            let mut tmp = [0u8; 4096];
            match socket::recv(cmd_stream.as_raw_fd(), &mut tmp, MsgFlags::MSG_DONTWAIT) {
                Ok(0) => {
                    debug!("command pipe closed, treating as quit");
                    break 'run;
                }
                Ok(n) => cmd_buf.extend_from_slice(&tmp[..n]),
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => {}
                Err(e) => {
                    warn!("command pipe failed: {}", e);
                    break 'run;
                }
            }
            for cmd in event::drain_lines::<Command>(&mut cmd_buf) {
                match cmd {
                    Command::Quit => {
                        debug!("quit command");
                        break 'run;
                    }
                    Command::Pause | Command::Resume => {
                        debug!("{:?} not implemented, ignoring", cmd);
                    }
                }
            }

            let drops = self.drops.load(Ordering::Relaxed);
            if drops > reported_drops {
                reported_drops = drops;
                if self.publish_error(events, ErrorKind::FrameDrop, format!("{} frames", drops)) {
                    break 'run;
                }
            }

            if capture_dead {
                thread::sleep(SELECT_WAKEUP);
                continue;
            }

            match self.frame_rx.recv_timeout(SELECT_WAKEUP) {
                Ok(frame) => {
                    if self.classify_and_publish(events, &frame) {
                        break 'run;
                    }
                    for _ in 0..FRAME_BURST {
                        match self.frame_rx.try_recv() {
                            Ok(frame) => {
                                if self.classify_and_publish(events, &frame) {
                                    break 'run;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    capture_dead = true;
                    let message = match self.sniffer_done.try_recv() {
                        Ok(Err(e)) => e.to_string(),
                        _ => "capture stopped".into(),
                    };
                    warn!("sniffer exited early: {}", message);
                    if self.publish_error(events, ErrorKind::Capture, message) {
                        break 'run;
                    }
                }
            }
        }
    }

    /// Classifies one frame and publishes its update, if any. Returns true
    /// when the event stream is gone and the run should end.
    fn classify_and_publish(&mut self, events: &mut UnixStream, frame: &[u8]) -> bool {
        match self
            .classifier
            .classify(&mut self.model, frame, unix_now())
        {
            Ok(Some(update)) => event::send(events, &update).is_err(),
            Ok(None) => false,
            Err(e) => {
                trace!("frame dropped: {}: {:?}", e, FrameDump::new(frame));
                false
            }
        }
    }

    fn publish_error(&mut self, events: &mut UnixStream, kind: ErrorKind, message: String) -> bool {
        event::send(events, &Update::Error { kind, message }).is_err()
    }

    /// Restores the adapter, then reels the workers in.
    ///
    /// Every step runs regardless of earlier failures. Returns whether
    /// everything came back cleanly.
    fn teardown(mut self, events: &mut UnixStream) -> bool {
        info!("tearing down");
        let mut clean = true;

        self.stop.store(true, Ordering::Relaxed);
        let _ = self.tuner_stop.send(());

        if let Err(e) = self.controller.restore(&self.handle) {
            clean = false;
            let _ = event::send(
                events,
                &Update::Error {
                    kind: ErrorKind::Restore,
                    message: e.to_string(),
                },
            );
        }

        clean &= join_worker(
            "sniffer",
            self.sniffer_thread,
            &self.sniffer_done,
            JOIN_DEADLINE,
            events,
        );
        clean &= join_worker(
            "tuner",
            self.tuner_thread,
            &self.tuner_done,
            JOIN_DEADLINE,
            events,
        );

        clean
    }
}

/// Joins one worker within `deadline`; a worker that does not stop in time
/// is reported and abandoned.
fn join_worker<T>(
    name: &'static str,
    handle: JoinHandle<()>,
    done: &Receiver<T>,
    deadline: Duration,
    events: &mut UnixStream,
) -> bool {
    match done.recv_timeout(deadline) {
        Ok(_) | Err(RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            true
        }
        Err(RecvTimeoutError::Timeout) => {
            let _ = event::send(
                events,
                &Update::Error {
                    kind: ErrorKind::WorkerHang,
                    message: name.into(),
                },
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_now_is_sane() {
        // After 2020, before the heat death.
        let now = unix_now();
        assert!(now > 1_577_836_800);
    }

    #[test]
    fn join_worker_waits_for_done_signal() {
        let (mut events, _peer) = UnixStream::pair().unwrap();
        let (done_tx, done_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let _ = done_tx.send(());
        });
        assert!(join_worker(
            "tuner",
            handle,
            &done_rx,
            Duration::from_secs(1),
            &mut events,
        ));
    }

    #[test]
    fn hung_worker_is_reported_and_abandoned() {
        let (events_tx, mut events_rx) = UnixStream::pair().unwrap();
        let mut events = events_tx;
        // A worker blocked past the deadline.
        let (block_tx, block_rx) = bounded::<()>(1);
        let (_never_tx, never_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let _ = block_rx.recv();
        });

        assert!(!join_worker(
            "sniffer",
            handle,
            &never_rx,
            Duration::from_millis(20),
            &mut events,
        ));
        block_tx.send(()).unwrap();

        let mut wire = vec![0u8; 256];
        events_rx
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let n = events_rx.read(&mut wire).unwrap();
        wire.truncate(n);
        let updates: Vec<Update> = event::drain_lines(&mut wire);
        assert_eq!(
            updates,
            vec![Update::Error {
                kind: ErrorKind::WorkerHang,
                message: "sniffer".into(),
            }]
        );
    }
}
