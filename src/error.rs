use thiserror::Error;

use crate::frame::ParseError;
use crate::radio::RadioError;

/// Errors surfaced by the collection pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The adapter could not be prepared for capture: monitor conversion
    /// failed, no usable scan entries were found, or the packet socket could
    /// not be bound. Fatal; the supervisor reports it and exits.
    #[error("setup: {0}")]
    Setup(String),

    /// A single captured frame failed to decode. Non-fatal; the frame is
    /// dropped.
    #[error("frame: {0}")]
    Parse(#[from] ParseError),

    /// The driver rejected a frequency/width combination. Non-fatal; the
    /// entry is skipped.
    #[error("tune rejected by driver")]
    TuneInvalid,

    /// The capture socket read failed outside of teardown.
    #[error("capture closed: {0}")]
    CaptureClosed(String),

    /// Teardown could not restore the adapter's original configuration. The
    /// process still exits, but the operator is told the adapter may need
    /// manual recovery.
    #[error("restore: {0}")]
    Restore(String),

    /// A worker thread did not finish within its join deadline.
    #[error("worker did not stop in time: {0}")]
    WorkerHang(&'static str),

    /// Monitor mode and packet sockets need root (or the equivalent
    /// capabilities); startup refuses to continue without them.
    #[error("insufficient privileges: monitor mode needs CAP_NET_ADMIN and packet sockets need CAP_NET_RAW")]
    NonPrivileged,

    /// A wireless-control operation failed.
    #[error("radio: {0}")]
    Radio(#[from] RadioError),

    /// Pipe or socket I/O towards the other process failed.
    #[error("pipe: {0}")]
    Pipe(#[from] std::io::Error),

    /// A lifecycle command was issued in a state that does not permit it.
    #[error("command not allowed in state {0:?}")]
    BadState(crate::lifecycle::LifecycleState),
}
