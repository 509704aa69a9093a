//! Adapter control.
//!
//! Everything that alters radio state goes through the [`RadioControl`]
//! trait: interface enumeration, virtual-interface add/delete, link state,
//! frequency enumeration and tuning. The one production implementation is
//! [`Nl80211Control`], which speaks generic netlink to the kernel; the rest
//! of the crate never talks to the kernel directly, so the collection logic
//! runs against an in-memory fake in tests.
//!
//! [`Controller`] layers the capture-specific operations on top: convert a
//! device to monitor mode (recording what it looked like before), and put
//! it back afterwards. Monitor conversion is the destructive step of the
//! whole tool, so its bookkeeping lives in one place.

pub mod channel;
mod nl80211;
pub mod scan;

pub use self::channel::ChannelWidth;
pub use self::nl80211::Nl80211Control;

use log::{debug, info, warn};
use thiserror::Error;

use crate::frame::HwAddr;

/// Errors reported by a [`RadioControl`] implementation.
#[derive(Debug, Error)]
pub enum RadioError {
    /// The driver rejected the parameters (`EINVAL`). During scan-list
    /// probing this is expected and simply drops the combination.
    #[error("driver rejected parameters")]
    InvalidArgument,

    /// No interface by that name exists.
    #[error("no such device: {0}")]
    NoSuchDevice(String),

    /// The physical radio cannot do monitor mode at all.
    #[error("adapter does not support monitor mode")]
    MonitorUnsupported,

    /// The kernel returned some other error.
    #[error("errno {0}")]
    Os(i32),

    /// The netlink conversation itself failed.
    #[error("netlink: {0}")]
    Netlink(String),
}

enum_with_unknown! {
    /// nl80211 interface types.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum InterfaceMode(u32) {
        Adhoc = 1,
        Station = 2,
        Ap = 3,
        ApVlan = 4,
        Wds = 5,
        Monitor = 6,
        MeshPoint = 7,
        P2pClient = 8,
        P2pGo = 9,
        P2pDevice = 10,
        Ocb = 11,
    }
}

/// What the kernel knows about one wireless interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub ifindex: u32,
    /// Index of the physical radio this interface sits on.
    pub wiphy: u32,
    pub name: String,
    pub mode: InterfaceMode,
    pub mac: Option<HwAddr>,
}

/// Result of a tuning attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tune {
    /// The adapter is now on the requested frequency/width.
    Applied,
    /// The driver rejected the combination with "invalid argument".
    Rejected,
}

/// The wireless-control surface the collector needs.
///
/// Implementations must distinguish the driver's "invalid argument" answer
/// on [`set_freq`](Self::set_freq) from real failures: the former is how
/// unsupported frequency/width combinations are discovered, the latter
/// aborts setup.
pub trait RadioControl {
    /// Looks up one interface by name.
    fn device_info(&mut self, dev: &str) -> Result<DeviceInfo, RadioError>;

    /// Lists all nl80211 interfaces on the given physical radio.
    fn interfaces_on(&mut self, wiphy: u32) -> Result<Vec<DeviceInfo>, RadioError>;

    /// Creates a new virtual interface on a physical radio.
    fn add_interface(
        &mut self,
        wiphy: u32,
        name: &str,
        mode: InterfaceMode,
    ) -> Result<DeviceInfo, RadioError>;

    /// Deletes a virtual interface.
    fn del_interface(&mut self, ifindex: u32) -> Result<(), RadioError>;

    /// Brings an interface administratively up.
    fn set_link_up(&mut self, ifindex: u32) -> Result<(), RadioError>;

    /// Returns whether the physical radio supports monitor mode.
    fn supports_monitor(&mut self, wiphy: u32) -> Result<bool, RadioError>;

    /// Enumerates the center frequencies (MHz) the radio can tune,
    /// excluding disabled channels.
    fn supported_freqs(&mut self, wiphy: u32) -> Result<Vec<u16>, RadioError>;

    /// Tunes the interface to `mhz` at the given width.
    fn set_freq(&mut self, ifindex: u32, mhz: u16, width: ChannelWidth)
        -> Result<Tune, RadioError>;
}

/// The interface name the collector creates for capture.
pub const MONITOR_IFNAME: &str = "cap8";

/// A device converted to monitor mode, remembering how to undo it.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    /// The device as it was before conversion; restoration target.
    pub original: DeviceInfo,
    /// The monitor interface frames are captured on.
    pub monitor: DeviceInfo,
}

/// Capture-specific orchestration over a [`RadioControl`].
pub struct Controller<R: RadioControl> {
    radio: R,
}

impl<R: RadioControl> Controller<R> {
    pub fn new(radio: R) -> Self {
        Controller { radio }
    }

    pub fn radio(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Looks up the device and checks it is usable for capture.
    pub fn probe(&mut self, dev: &str) -> Result<DeviceInfo, RadioError> {
        let info = self.radio.device_info(dev)?;
        if !self.radio.supports_monitor(info.wiphy)? {
            return Err(RadioError::MonitorUnsupported);
        }
        Ok(info)
    }

    /// Converts `dev` to a fresh monitor interface named
    /// [`MONITOR_IFNAME`].
    ///
    /// The original interface is replaced rather than retuned: a new
    /// monitor interface is created on the same radio, every other virtual
    /// interface on that radio is removed so the driver cannot fight over
    /// channel state, and the monitor interface is brought up. The returned
    /// handle remembers the original name and mode for [`restore`].
    ///
    /// [`restore`]: Controller::restore
    pub fn to_monitor(&mut self, dev: &str) -> Result<MonitorHandle, RadioError> {
        let original = self.probe(dev)?;
        info!(
            "{}: converting to monitor (was {:?})",
            original.name, original.mode
        );

        let monitor =
            self.radio
                .add_interface(original.wiphy, MONITOR_IFNAME, InterfaceMode::Monitor)?;

        // Remove every sibling, the original included. Failing to remove a
        // leftover sibling is survivable; failing to remove the original
        // is not.
        for sibling in self.radio.interfaces_on(original.wiphy)? {
            if sibling.ifindex == monitor.ifindex {
                continue;
            }
            debug!("removing sibling interface {}", sibling.name);
            if let Err(e) = self.radio.del_interface(sibling.ifindex) {
                if sibling.ifindex == original.ifindex {
                    // Roll back the half-finished conversion.
                    let _ = self.radio.del_interface(monitor.ifindex);
                    return Err(e);
                }
                warn!("could not remove sibling {}: {}", sibling.name, e);
            }
        }

        self.radio.set_link_up(monitor.ifindex)?;

        Ok(MonitorHandle { original, monitor })
    }

    /// Undoes [`to_monitor`](Controller::to_monitor): removes the monitor
    /// interface, re-creates an interface with the original name and mode,
    /// and brings it up.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// error is returned so the operator learns the adapter may need manual
    /// recovery.
    pub fn restore(&mut self, handle: &MonitorHandle) -> Result<(), RadioError> {
        info!(
            "restoring {} to {:?}",
            handle.original.name, handle.original.mode
        );

        let mut first_err = None;
        let mut note = |r: Result<(), RadioError>| {
            if let Err(e) = r {
                warn!("restore step failed: {}", e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        };

        note(self.radio.del_interface(handle.monitor.ifindex));
        match self.radio.add_interface(
            handle.original.wiphy,
            &handle.original.name,
            handle.original.mode,
        ) {
            Ok(restored) => note(self.radio.set_link_up(restored.ifindex)),
            Err(e) => note(Err(e)),
        }

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::FakeRadio;
    use super::*;

    fn fake() -> FakeRadio {
        FakeRadio::new(
            "wlan0",
            vec![2412, 2437],
            vec![(2412, ChannelWidth::NoHt), (2437, ChannelWidth::NoHt)],
        )
    }

    #[test]
    fn monitor_round_trip_restores_original_mode() {
        let mut ctrl = Controller::new(fake());
        let handle = ctrl.to_monitor("wlan0").unwrap();
        assert_eq!(handle.monitor.name, MONITOR_IFNAME);
        assert_eq!(handle.monitor.mode, InterfaceMode::Monitor);
        assert!(ctrl.radio().up.contains(&handle.monitor.ifindex));
        // The original interface is gone while capturing.
        assert!(ctrl.radio().device_info("wlan0").is_err());

        ctrl.restore(&handle).unwrap();
        let restored = ctrl.radio().device_info("wlan0").unwrap();
        assert_eq!(restored.mode, InterfaceMode::Station);
        assert!(ctrl.radio().device_info(MONITOR_IFNAME).is_err());
    }

    #[test]
    fn siblings_are_removed() {
        let mut radio = fake();
        radio
            .add_interface(0, "wlan0-p2p", InterfaceMode::P2pDevice)
            .unwrap();
        let mut ctrl = Controller::new(radio);
        ctrl.to_monitor("wlan0").unwrap();
        let names: Vec<String> = ctrl
            .radio()
            .interfaces_on(0)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec![MONITOR_IFNAME.to_owned()]);
    }

    #[test]
    fn monitor_unsupported_fails_probe() {
        let mut radio = fake();
        radio.monitor_capable = false;
        let mut ctrl = Controller::new(radio);
        assert!(ctrl.probe("wlan0").is_err());
        assert!(ctrl.to_monitor("wlan0").is_err());
    }

    #[test]
    fn missing_device() {
        let mut ctrl = Controller::new(fake());
        assert!(matches!(
            ctrl.probe("wlan9"),
            Err(RadioError::NoSuchDevice(_))
        ));
    }
}
