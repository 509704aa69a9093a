//! Frame classification.
//!
//! One entry point, [`Classifier::classify`], invoked per frame pulled off
//! the capture queue. It decodes the radiotap and MAC headers, decides
//! whether the frame says anything about the target network, and applies
//! the observation to the model. At most one update falls out per frame.
//!
//! Frames are dropped (returning `Ok(None)` or a `ParseError` the caller
//! counts) liberally: capture is lossy by nature and a passive observer
//! loses nothing by ignoring what it cannot read.

use log::trace;

use crate::collect::event::Update;
use crate::collect::model::NetworkModel;
use crate::frame::{self, DsBits, FrameType, ManagementSubtype, Mpdu, ParseError, Radiotap};
use crate::radio::channel::freq_to_channel;

/// Classifies captured frames against a target network name.
pub struct Classifier {
    ssid: Vec<u8>,
}

impl Classifier {
    pub fn new(ssid: impl Into<Vec<u8>>) -> Self {
        Classifier { ssid: ssid.into() }
    }

    /// Processes one captured buffer.
    ///
    /// `now` is the observation timestamp in seconds since the epoch;
    /// passing it in keeps the decision logic replayable in tests.
    pub fn classify(
        &self,
        model: &mut NetworkModel,
        buf: &[u8],
        now: u64,
    ) -> Result<Option<Update>, ParseError> {
        let rt = Radiotap::parse(buf)?;
        let mpdu = Mpdu::parse(&buf[rt.len..], rt.fcs_at_end())?;
        let channel = rt.channel_mhz.and_then(freq_to_channel);

        let update = match mpdu.frame_control.frame_type {
            FrameType::Management => self.classify_management(model, &rt, &mpdu)?,
            FrameType::Data => Self::classify_data(model, &rt, &mpdu, channel, now),
            // Control, extension and anything the parser could not pin
            // down say nothing about network membership.
            _ => None,
        };
        Ok(update)
    }

    /// Management path: beacons, probe responses and association requests
    /// advertise the network name; the transmitter (addr3, the BSSID role
    /// for these subtypes) is the access point.
    fn classify_management(
        &self,
        model: &mut NetworkModel,
        rt: &Radiotap,
        mpdu: &Mpdu<'_>,
    ) -> Result<Option<Update>, ParseError> {
        match mpdu.frame_control.management_subtype() {
            ManagementSubtype::Beacon
            | ManagementSubtype::ProbeResponse
            | ManagementSubtype::AssociationRequest => {}
            _ => return Ok(None),
        }

        match frame::ssid(mpdu.frame_control.management_subtype(), mpdu.body)? {
            Some(ssid) if ssid == self.ssid.as_slice() => {
                trace!("{}: management frame for target network", mpdu.addr3);
                Ok(Some(model.observe_ap(mpdu.addr3, rt.rss)))
            }
            _ => Ok(None),
        }
    }

    /// Data path: the DS bits say which address is the station and whether
    /// the receive metadata describes the station's own transmission.
    fn classify_data(
        model: &mut NetworkModel,
        rt: &Radiotap,
        mpdu: &Mpdu<'_>,
        channel: Option<u8>,
        now: u64,
    ) -> Option<Update> {
        let (bssid, sta, rss) = match mpdu.frame_control.ds_bits() {
            DsBits::ToDs => (mpdu.addr1, mpdu.addr2, rt.rss),
            DsBits::FromDs => (mpdu.addr2, mpdu.addr1, None),
            // Ad-hoc and four-address bridge traffic is not infrastructure
            // client traffic.
            DsBits::Neither | DsBits::Both => return None,
        };

        model.observe_station(sta, bssid, now, channel, rss)
    }

    /// The configured target network name.
    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }
}
