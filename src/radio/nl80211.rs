//! `RadioControl` over generic netlink.
//!
//! Two netlink sockets: a generic-netlink one for the nl80211 family
//! (interface and wiphy commands) and a route-netlink one for flipping the
//! administrative link state. Command and attribute numbers follow
//! `linux/nl80211.h`; only the handful this crate issues are enumerated,
//! everything else deserializes into the catch-all variant and is ignored.
//!
//! The kernel answers a tuning request for an unsupported frequency/width
//! combination with `EINVAL` on the error ack. That answer is load-bearing:
//! scan-list probing interprets it as "drop this combination" while every
//! other errno aborts setup, so the error mapping below must keep them
//! distinct.

use std::collections::BTreeSet;
use std::convert::TryInto;
use std::fmt::Display;

use log::trace;
use neli::consts::genl::{Cmd, NlAttrType};
use neli::consts::nl::{NlmF, NlmFFlags};
use neli::consts::rtnl::{Arphrd, Iff, IffFlags, RtAddrFamily, Rtm};
use neli::consts::socket::NlFamily;
use neli::err::NlError;
use neli::genl::{Genlmsghdr, Nlattr};
use neli::neli_enum;
use neli::nl::{NlPayload, Nlmsghdr};
use neli::rtnl::Ifinfomsg;
use neli::socket::NlSocketHandle;
use neli::types::{Buffer, GenlBuffer, RtBuffer};

use crate::frame::HwAddr;
use crate::radio::{ChannelWidth, DeviceInfo, InterfaceMode, RadioControl, RadioError, Tune};

const NL80211_FAMILY: &str = "nl80211";
const NL80211_VERSION: u8 = 0;

#[neli_enum(serialized_type = "u8")]
pub(crate) enum Nl80211Command {
    Unspec = 0,
    GetWiphy = 1,
    SetWiphy = 2,
    NewWiphy = 3,
    GetInterface = 5,
    SetInterface = 6,
    NewInterface = 7,
    DelInterface = 8,
}

impl Cmd for Nl80211Command {}

#[neli_enum(serialized_type = "u16")]
pub(crate) enum Nl80211Attr {
    Unspec = 0,
    Wiphy = 1,
    WiphyName = 2,
    Ifindex = 3,
    Ifname = 4,
    Iftype = 5,
    Mac = 6,
    WiphyBands = 22,
    SupportedIftypes = 32,
    WiphyFreq = 38,
    WiphyChannelType = 39,
}

impl NlAttrType for Nl80211Attr {}

#[neli_enum(serialized_type = "u16")]
pub(crate) enum Nl80211BandAttr {
    Invalid = 0,
    Freqs = 1,
}

impl NlAttrType for Nl80211BandAttr {}

#[neli_enum(serialized_type = "u16")]
pub(crate) enum Nl80211FreqAttr {
    Invalid = 0,
    Freq = 1,
    Disabled = 2,
}

impl NlAttrType for Nl80211FreqAttr {}

const NL80211_IFTYPE_MONITOR: u16 = 6;

type Nl80211Payload = Genlmsghdr<Nl80211Command, Nl80211Attr>;

fn map_nl_err<T, P>(e: NlError<T, P>) -> RadioError
where
    NlError<T, P>: Display,
{
    match e {
        NlError::Nlmsgerr(err) => errno_to_radio(-err.error),
        other => RadioError::Netlink(other.to_string()),
    }
}

fn map_io_err(e: std::io::Error) -> RadioError {
    RadioError::Netlink(e.to_string())
}

fn map_ser_err(e: neli::err::SerError) -> RadioError {
    RadioError::Netlink(e.to_string())
}

fn errno_to_radio(errno: i32) -> RadioError {
    match errno {
        libc::EINVAL => RadioError::InvalidArgument,
        other => RadioError::Os(other),
    }
}

fn attr(
    ty: Nl80211Attr,
    payload: impl neli::Size + neli::ToBytes,
) -> Result<Nlattr<Nl80211Attr, Buffer>, RadioError> {
    Nlattr::new(false, false, ty, payload).map_err(map_ser_err)
}

/// nl80211-backed adapter control.
pub struct Nl80211Control {
    genl: NlSocketHandle,
    rtnl: NlSocketHandle,
    family: u16,
}

impl Nl80211Control {
    /// Connects both netlink sockets and resolves the nl80211 family.
    pub fn new() -> Result<Self, RadioError> {
        let mut genl =
            NlSocketHandle::connect(NlFamily::Generic, None, &[]).map_err(map_io_err)?;
        let family = genl
            .resolve_genl_family(NL80211_FAMILY)
            .map_err(|e| RadioError::Netlink(e.to_string()))?;
        let rtnl = NlSocketHandle::connect(NlFamily::Route, None, &[]).map_err(map_io_err)?;
        Ok(Nl80211Control { genl, rtnl, family })
    }

    /// Sends one nl80211 request and collects every payload message of the
    /// reply, ending on the ack (or, for dumps, on done).
    fn request(
        &mut self,
        cmd: Nl80211Command,
        flags: &[NlmF],
        attrs: GenlBuffer<Nl80211Attr, Buffer>,
    ) -> Result<Vec<Nl80211Payload>, RadioError> {
        trace!("nl80211 {:?}", cmd);
        let genl = Genlmsghdr::new(cmd, NL80211_VERSION, attrs);
        let msg = Nlmsghdr::new(
            None,
            self.family,
            NlmFFlags::new(flags),
            None,
            None,
            NlPayload::Payload(genl),
        );
        self.genl.send(msg).map_err(map_ser_err)?;

        let mut out = Vec::new();
        loop {
            match self.genl.recv::<u16, Nl80211Payload>() {
                Ok(Some(msg)) => match msg.nl_payload {
                    NlPayload::Payload(p) => out.push(p),
                    NlPayload::Ack(_) => break,
                    _ => {}
                },
                Ok(None) => break,
                Err(e) => return Err(map_nl_err(e)),
            }
        }
        Ok(out)
    }

    fn parse_interface(genl: &Nl80211Payload) -> Option<DeviceInfo> {
        let mut handle = genl.get_attr_handle();
        let ifindex = handle
            .get_attr_payload_as::<u32>(Nl80211Attr::Ifindex)
            .ok()?;
        let wiphy = handle.get_attr_payload_as::<u32>(Nl80211Attr::Wiphy).ok()?;
        let name = handle
            .get_attr_payload_as_with_len::<String>(Nl80211Attr::Ifname)
            .ok()?;
        let mode = handle
            .get_attr_payload_as::<u32>(Nl80211Attr::Iftype)
            .map(InterfaceMode::from)
            .unwrap_or(InterfaceMode::Unknown(0));
        let mac = handle.get_attribute(Nl80211Attr::Mac).and_then(|a| {
            let raw: &[u8] = a.nla_payload.as_ref();
            let bytes: [u8; 6] = raw.try_into().ok()?;
            Some(HwAddr::new(bytes))
        });
        Some(DeviceInfo {
            ifindex,
            wiphy,
            name,
            mode,
            mac,
        })
    }
}

impl RadioControl for Nl80211Control {
    fn device_info(&mut self, dev: &str) -> Result<DeviceInfo, RadioError> {
        let ifindex = nix::net::if_::if_nametoindex(dev)
            .map_err(|_| RadioError::NoSuchDevice(dev.to_owned()))?;

        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Ifindex, ifindex as u32)?);
        let replies = self.request(
            Nl80211Command::GetInterface,
            &[NlmF::Request, NlmF::Ack],
            attrs,
        )?;

        replies
            .iter()
            .find_map(Self::parse_interface)
            .ok_or_else(|| RadioError::NoSuchDevice(dev.to_owned()))
    }

    fn interfaces_on(&mut self, wiphy: u32) -> Result<Vec<DeviceInfo>, RadioError> {
        let replies = self.request(
            Nl80211Command::GetInterface,
            &[NlmF::Request, NlmF::Dump],
            GenlBuffer::new(),
        )?;
        Ok(replies
            .iter()
            .filter_map(Self::parse_interface)
            .filter(|i| i.wiphy == wiphy)
            .collect())
    }

    fn add_interface(
        &mut self,
        wiphy: u32,
        name: &str,
        mode: InterfaceMode,
    ) -> Result<DeviceInfo, RadioError> {
        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Wiphy, wiphy)?);
        attrs.push(attr(Nl80211Attr::Ifname, name.to_owned())?);
        attrs.push(attr(Nl80211Attr::Iftype, u32::from(mode))?);
        self.request(
            Nl80211Command::NewInterface,
            &[NlmF::Request, NlmF::Ack],
            attrs,
        )?;

        self.device_info(name)
    }

    fn del_interface(&mut self, ifindex: u32) -> Result<(), RadioError> {
        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Ifindex, ifindex)?);
        self.request(
            Nl80211Command::DelInterface,
            &[NlmF::Request, NlmF::Ack],
            attrs,
        )?;
        Ok(())
    }

    fn set_link_up(&mut self, ifindex: u32) -> Result<(), RadioError> {
        let ifmsg = Ifinfomsg::new(
            RtAddrFamily::Unspecified,
            Arphrd::Ether,
            ifindex as libc::c_int,
            IffFlags::new(&[Iff::Up]),
            IffFlags::new(&[Iff::Up]),
            RtBuffer::new(),
        );
        let msg = Nlmsghdr::new(
            None,
            Rtm::Newlink,
            NlmFFlags::new(&[NlmF::Request, NlmF::Ack]),
            None,
            None,
            NlPayload::Payload(ifmsg),
        );
        self.rtnl.send(msg).map_err(map_ser_err)?;
        loop {
            match self.rtnl.recv::<u16, Ifinfomsg>() {
                Ok(Some(msg)) => {
                    if let NlPayload::Ack(_) = msg.nl_payload {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(map_nl_err(e)),
            }
        }
        Ok(())
    }

    fn supports_monitor(&mut self, wiphy: u32) -> Result<bool, RadioError> {
        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Wiphy, wiphy)?);
        let replies = self.request(
            Nl80211Command::GetWiphy,
            &[NlmF::Request, NlmF::Dump],
            attrs,
        )?;

        for genl in &replies {
            let mut handle = genl.get_attr_handle();
            if let Ok(iftypes) =
                handle.get_nested_attributes::<u16>(Nl80211Attr::SupportedIftypes)
            {
                if iftypes
                    .iter()
                    .any(|a| a.nla_type == NL80211_IFTYPE_MONITOR.into())
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn supported_freqs(&mut self, wiphy: u32) -> Result<Vec<u16>, RadioError> {
        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Wiphy, wiphy)?);
        let replies = self.request(
            Nl80211Command::GetWiphy,
            &[NlmF::Request, NlmF::Dump],
            attrs,
        )?;

        // Band and frequency entries are nested lists indexed by position;
        // a wiphy dump may spread the bands over several messages, so
        // collect into a set.
        let mut freqs = BTreeSet::new();
        for genl in &replies {
            let mut handle = genl.get_attr_handle();
            let bands = match handle.get_nested_attributes::<u16>(Nl80211Attr::WiphyBands) {
                Ok(bands) => bands,
                Err(_) => continue,
            };
            for band in bands.iter() {
                let mut band_handle = match band.get_attr_handle::<Nl80211BandAttr>() {
                    Ok(h) => h,
                    Err(_) => continue,
                };
                let entries =
                    match band_handle.get_nested_attributes::<u16>(Nl80211BandAttr::Freqs) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };
                for entry in entries.iter() {
                    let mut freq_handle = match entry.get_attr_handle::<Nl80211FreqAttr>() {
                        Ok(h) => h,
                        Err(_) => continue,
                    };
                    if freq_handle.get_attribute(Nl80211FreqAttr::Disabled).is_some() {
                        continue;
                    }
                    if let Ok(mhz) = freq_handle.get_attr_payload_as::<u32>(Nl80211FreqAttr::Freq)
                    {
                        freqs.insert(mhz as u16);
                    }
                }
            }
        }

        Ok(freqs.into_iter().collect())
    }

    fn set_freq(
        &mut self,
        ifindex: u32,
        mhz: u16,
        width: ChannelWidth,
    ) -> Result<Tune, RadioError> {
        let mut attrs = GenlBuffer::new();
        attrs.push(attr(Nl80211Attr::Ifindex, ifindex)?);
        attrs.push(attr(Nl80211Attr::WiphyFreq, u32::from(mhz))?);
        attrs.push(attr(Nl80211Attr::WiphyChannelType, width.nl_channel_type())?);
        match self.request(Nl80211Command::SetWiphy, &[NlmF::Request, NlmF::Ack], attrs) {
            Ok(_) => Ok(Tune::Applied),
            Err(RadioError::InvalidArgument) => Ok(Tune::Rejected),
            Err(e) => Err(e),
        }
    }
}
