//! Typed frame model of the DMG MAC.
//!
//! The bit layout of headers and information elements belongs to the external
//! frame library; frames cross the PHY boundary as the values defined here,
//! every field reachable through a named member.

use crate::time::Duration;

pub mod action;
pub mod beacon;
pub mod mgmt;
pub mod sls;

pub use action::{ActionFrame, ChannelMeasurement, DmgAction, RelayCapableSta, SprFrame};
pub use beacon::{AllocationField, AllocationType, BfControl, DmgBeacon};
pub use mgmt::{AssocRequest, AssocResponse, DmgCapabilities, ProbeRequest, ProbeResponse, Ssid, StatusCode};
pub use sls::{SswFbckFrame, SswFeedbackField, SswField, SswFrame, SweepDirection};

/// Capacity of a single MSDU payload buffer.
pub const MAX_MSDU_SIZE: usize = 256;

/// An MSDU payload as handed over by (or forwarded to) the upper layer.
pub type Msdu = heapless::Vec<u8, MAX_MSDU_SIZE>;

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// A group (multicast or broadcast) address has the I/G bit set.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl core::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// An association identifier. 0 while unassociated, 0xFF is the broadcast AID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Aid(pub u8);

impl Aid {
    pub const UNASSOCIATED: Self = Self(0);
    pub const BROADCAST: Self = Self(0xFF);
}

/// The MAC header fields the station MAC reads and writes.
///
/// Addr1 is the receiver, Addr2 the transmitter, Addr3 the BSSID or the final
/// destination depending on the To-DS/From-DS encoding. Control frames leave
/// Addr3 zeroed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Header {
    pub addr1: MacAddress,
    pub addr2: MacAddress,
    pub addr3: MacAddress,
    /// The duration/ID field. For swept control frames this carries the
    /// remaining allocation time.
    pub duration: Duration,
}

impl Header {
    pub fn control(receiver: MacAddress, transmitter: MacAddress, duration: Duration) -> Self {
        Self {
            addr1: receiver,
            addr2: transmitter,
            addr3: MacAddress([0; 6]),
            duration,
        }
    }
}

/// A full MAC frame: header plus the typed body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Frame {
    pub header: Header,
    pub body: FrameBody,
}

/// Every frame kind the station MAC produces or consumes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum FrameBody {
    Beacon(DmgBeacon),
    Ssw(SswFrame),
    SswFbck(SswFbckFrame),
    SswAck(SswFbckFrame),
    Poll,
    Grant,
    Spr(SprFrame),
    ProbeRequest(ProbeRequest),
    ProbeResponse(ProbeResponse),
    AssocRequest(AssocRequest),
    AssocResponse(AssocResponse),
    Action(ActionFrame),
    ActionNoAck(ActionFrame),
    QosData(QosData),
    QosNull,
}

impl FrameBody {
    pub fn is_data(&self) -> bool {
        matches!(self, FrameBody::QosData(_) | FrameBody::QosNull)
    }
}

/// A QoS Data frame body. The QoS Data and QoS Null subtypes are the only
/// data subtypes a DMG STA transmits.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct QosData {
    pub tid: u8,
    pub payload: MsduPayload,
}

/// Either a single MSDU or an A-MSDU aggregate to be deaggregated on receive.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MsduPayload {
    Single(Msdu),
    Aggregate(heapless::Vec<Msdu, 4>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_is_group() {
        assert!(MacAddress::BROADCAST.is_group());
        assert!(MacAddress::BROADCAST.is_broadcast());

        let unicast = MacAddress([0x02, 0, 0, 0, 0, 1]);
        assert!(!unicast.is_group());

        let multicast = MacAddress([0x01, 0, 0x5E, 0, 0, 1]);
        assert!(multicast.is_group());
        assert!(!multicast.is_broadcast());
    }
}
