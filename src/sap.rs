//! The operations and observability events offered to the layer above the
//! MAC. Every request gets a typed confirm; traces arrive as [StaEvent]s.

use crate::{
    wire::{MacAddress, Msdu},
    AccessPeriod, AssociationState,
};

/// Result of a request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Status {
    #[default]
    Success,
    /// The station is not associated; the frame was dropped and an
    /// association attempt was kicked off.
    NotAssociated,
    /// A queue or table had no room for the request.
    CapacityExceeded,
    PhyError,
}

/// A request the MAC can process.
pub trait Request: Into<RequestValue> {
    type Confirm: From<ConfirmValue> + Into<ConfirmValue>;
}

macro_rules! impl_request {
    ($request:ident => $confirm:ident) => {
        impl Request for $request {
            type Confirm = $confirm;
        }

        impl From<$request> for RequestValue {
            fn from(value: $request) -> Self {
                RequestValue::$request(value)
            }
        }

        impl From<RequestValue> for $request {
            fn from(value: RequestValue) -> Self {
                match value {
                    RequestValue::$request(value) => value,
                    _ => panic!("request variant mismatch"),
                }
            }
        }

        impl From<$confirm> for ConfirmValue {
            fn from(value: $confirm) -> Self {
                ConfirmValue::$confirm(value)
            }
        }

        impl From<ConfirmValue> for $confirm {
            fn from(value: ConfirmValue) -> Self {
                match value {
                    ConfirmValue::$confirm(value) => value,
                    _ => panic!("confirm variant mismatch"),
                }
            }
        }
    };
}

/// Start (or re-start) the association procedure if the station is currently
/// out of a BSS. A no-op in every other association state, including REFUSED:
/// clearing a refusal takes this explicit call after state has gone back to
/// beacon-missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureAssociatedRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureAssociatedConfirm;

impl_request!(EnsureAssociatedRequest => EnsureAssociatedConfirm);

/// Turn unsolicited probing on or off. Turning it on immediately tries to
/// ensure association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetActiveProbingRequest {
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetActiveProbingConfirm;

impl_request!(SetActiveProbingRequest => SetActiveProbingConfirm);

/// Submit an MSDU for transmission to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRequest {
    pub destination: MacAddress,
    pub tid: u8,
    pub payload: Msdu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueConfirm {
    pub status: Status,
}

impl_request!(EnqueueRequest => EnqueueConfirm);

/// Ask the PCP/AP for the capabilities of `subject`. The answer arrives as an
/// Information Response frame and lands in the station-information map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInformationRequest {
    pub subject: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInformationConfirm;

impl_request!(RequestInformationRequest => RequestInformationConfirm);

/// Start relay discovery towards `destination` (become the source REDS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayDiscoveryRequest {
    pub destination: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayDiscoveryConfirm {
    pub status: Status,
}

impl_request!(RelayDiscoveryRequest => RelayDiscoveryConfirm);

/// Snapshot of the externally observable MAC state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusConfirm {
    pub state: AssociationState,
    pub aid: u8,
    pub bssid: Option<MacAddress>,
    pub access_period: AccessPeriod,
    pub relay_mode: bool,
    /// Peers reachable without going through the PCP/AP.
    pub direct_peers: heapless::Vec<MacAddress, 8>,
}

impl_request!(StatusRequest => StatusConfirm);

#[derive(Debug, Clone, PartialEq)]
pub enum RequestValue {
    EnsureAssociatedRequest(EnsureAssociatedRequest),
    SetActiveProbingRequest(SetActiveProbingRequest),
    EnqueueRequest(EnqueueRequest),
    RequestInformationRequest(RequestInformationRequest),
    RelayDiscoveryRequest(RelayDiscoveryRequest),
    StatusRequest(StatusRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmValue {
    EnsureAssociatedConfirm(EnsureAssociatedConfirm),
    SetActiveProbingConfirm(SetActiveProbingConfirm),
    EnqueueConfirm(EnqueueConfirm),
    RequestInformationConfirm(RequestInformationConfirm),
    RelayDiscoveryConfirm(RelayDiscoveryConfirm),
    StatusConfirm(StatusConfirm),
}

/// Observability events, fired on the edges the specification traces.
#[derive(Debug, Clone, PartialEq)]
pub enum StaEvent {
    /// Entered the associated state with this BSSID.
    Assoc { bssid: MacAddress },
    /// Left the associated state.
    DeAssoc { bssid: MacAddress },
    LinkUp,
    LinkDown,
    /// A sector-level sweep finished and produced a transmit config.
    SlsCompleted {
        peer: MacAddress,
        access_period: AccessPeriod,
        tx_sector: u8,
        tx_antenna: u8,
    },
    /// A Multi-Relay Channel Measurement Report arrived from `peer`.
    ChannelReportReceived { peer: MacAddress },
    /// A received MSDU, already deaggregated.
    Data {
        source: MacAddress,
        destination: MacAddress,
        payload: Msdu,
    },
}
