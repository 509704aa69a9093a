//! The collection pipeline.
//!
//! Data flows one way:
//!
//! ```notrust
//! packet socket -> sniffer -> frame queue -> classifier -> model
//!                                                            |
//!                    controlling process  <-  update channel +
//! ```
//!
//! and control flows the other: the controlling process writes commands
//! onto the pipe, the supervisor arbitrates them, and teardown restores the
//! adapter no matter how the run ends.
//!
//! Everything except the supervisor is testable in isolation: the
//! classifier and model are pure against byte traces, the tuner runs on a
//! fake radio, and the event codec round-trips through plain buffers.

pub mod classify;
pub mod event;
pub mod model;
pub mod sniffer;
pub mod supervisor;
pub mod tuner;

pub use self::classify::Classifier;
pub use self::event::{Command, ErrorKind, StationRecord, Update};
pub use self::model::{AccessPoint, NetworkModel};
pub use self::supervisor::Collector;
pub use self::tuner::SCAN_PERIOD;
