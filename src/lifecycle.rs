//! Operational lifecycle of the presenter process.
//!
//! The state machine gates every command that can alter radio state. It
//! lives in the presenter's address space as a single owned value; the
//! collector process never sees it and only influences it indirectly through
//! events on the update channel.
//!
//! The states past `Stopped` (`Connecting` through `Operational`) belong to
//! the connection workflow built on top of the collector. They are
//! representable here so the gating table covers them, but nothing in this
//! crate enters them.

use crate::Error;

/// Operational state of the tool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not configured yet; only Configure and Quit make sense.
    Invalid,
    /// Configuration complete, collector not running.
    Configured,
    /// The collector owns the adapter and is hopping/capturing.
    Scanning,
    /// A collector ran and has been torn down; can be re-run.
    Stopped,
    /// Reserved for the connection workflow.
    Connecting,
    /// Reserved for the connection workflow.
    Connected,
    /// Reserved for the connection workflow.
    GettingIp,
    /// Reserved for the connection workflow.
    Verifying,
    /// Reserved for the connection workflow.
    Operational,
    /// Terminal; teardown has been requested.
    Quitting,
}

/// Commands the operator can issue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Configure,
    Run,
    Stop,
    View,
    Quit,
}

/// The lifecycle state machine.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            state: LifecycleState::Invalid,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns whether `action` is permitted in the current state.
    ///
    /// Viewing collected observations is always allowed; it reads the
    /// presenter's projection and touches no radio state.
    pub fn permits(&self, action: Action) -> bool {
        use LifecycleState::*;

        match action {
            Action::Configure => matches!(self.state, Invalid | Configured | Stopped),
            Action::Run => matches!(self.state, Configured | Stopped),
            Action::Stop => self.state == Scanning,
            Action::View => self.state != Quitting,
            Action::Quit => self.state != Quitting,
        }
    }

    /// A complete configuration was accepted.
    pub fn configured(&mut self) -> Result<(), Error> {
        self.advance(Action::Configure, LifecycleState::Configured)
    }

    /// The supervisor finished setup and the adapter is scanning.
    pub fn scan_started(&mut self) -> Result<(), Error> {
        self.advance(Action::Run, LifecycleState::Scanning)
    }

    /// The supervisor completed a clean teardown.
    pub fn scan_stopped(&mut self) -> Result<(), Error> {
        self.advance(Action::Stop, LifecycleState::Stopped)
    }

    /// Teardown requested; terminal.
    pub fn quitting(&mut self) -> Result<(), Error> {
        self.advance(Action::Quit, LifecycleState::Quitting)
    }

    fn advance(&mut self, action: Action, next: LifecycleState) -> Result<(), Error> {
        if self.permits(action) {
            self.state = next;
            Ok(())
        } else {
            Err(Error::BadState(self.state))
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
