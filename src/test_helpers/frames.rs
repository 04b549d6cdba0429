//! Frame constructors for scripted peers (the PCP/AP and other stations).

use crate::{
    consts::{sector_sweep_slot_time, MBIFS},
    time::{Duration, Instant},
    wire::{
        beacon::{BeaconIntervalControl, DmgOperation, DmgParameters, NextDmgAti, MAX_ALLOCATIONS},
        sls::{BfLinkMaintenance, BrpRequest, SswFeedbackField},
        ActionFrame, AllocationField, AssocResponse, DmgAction, DmgBeacon, DmgCapabilities, Frame,
        FrameBody, Header, MacAddress, MsduPayload, ProbeResponse, QosData, Ssid, SswFbckFrame,
        SswField, SswFrame, StatusCode, SweepDirection,
    },
};

pub const AP_ADDRESS: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0xAA]);

/// A DMG beacon source with sane defaults: 4 A-BFT slots of 8 SSW frames,
/// no ATI, a 100 ms beacon interval.
#[derive(Debug, Clone)]
pub struct BeaconTemplate {
    pub bssid: MacAddress,
    pub bti_duration: Duration,
    pub abft_slots: u8,
    pub fss: u8,
    pub ati_present: bool,
    pub ati_duration: Duration,
    pub beacon_interval: Duration,
    pub cbap_only: bool,
    pub cbap_source: bool,
    pub responder_txss: bool,
    pub schedule: heapless::Vec<AllocationField, MAX_ALLOCATIONS>,
}

impl BeaconTemplate {
    pub fn new(bssid: MacAddress) -> Self {
        Self {
            bssid,
            bti_duration: Duration::from_micros(400),
            abft_slots: 4,
            fss: 8,
            ati_present: false,
            ati_duration: Duration::ZERO,
            beacon_interval: Duration::from_millis(100),
            cbap_only: false,
            cbap_source: false,
            responder_txss: true,
            schedule: heapless::Vec::new(),
        }
    }

    pub fn abft_duration(&self) -> Duration {
        sector_sweep_slot_time(self.fss) * self.abft_slots as i64
    }

    pub fn slot_time(&self) -> Duration {
        sector_sweep_slot_time(self.fss)
    }

    /// When the A-BFT begins, for a beacon transmitted at the BTI start.
    pub fn abft_start(&self, bti_start: Instant) -> Instant {
        bti_start + self.bti_duration + MBIFS
    }

    /// When the DTI begins, for a beacon transmitted at the BTI start.
    pub fn dti_start(&self, bti_start: Instant) -> Instant {
        let after_abft = self.abft_start(bti_start) + self.abft_duration();
        if self.ati_present {
            after_abft + self.ati_duration
        } else {
            after_abft
        }
    }

    /// The beacon frame as transmitted at `at`, opening the BTI.
    pub fn frame(&self, at: Instant) -> Frame {
        let min_bhi =
            self.bti_duration + self.abft_duration() + self.ati_duration + 2 * MBIFS;

        Frame {
            header: Header {
                addr1: self.bssid,
                addr2: self.bssid,
                addr3: self.bssid,
                // The duration field covers the rest of the BTI
                duration: self.bti_duration,
            },
            body: FrameBody::Beacon(DmgBeacon {
                timestamp: at,
                beacon_interval: self.beacon_interval,
                bi_control: BeaconIntervalControl {
                    cc_present: false,
                    discovery_mode: false,
                    n_bi: 1,
                    ati_present: self.ati_present,
                    abft_length: self.abft_slots,
                    fss: self.fss,
                    is_responder_txss: self.responder_txss,
                },
                parameters: DmgParameters {
                    cbap_only: self.cbap_only,
                    cbap_source: self.cbap_source,
                },
                operation: DmgOperation {
                    min_bhi_duration: min_bhi,
                },
                next_ati: NextDmgAti {
                    ati_duration: self.ati_duration,
                },
                sector_sweep: SswField {
                    direction: SweepDirection::Initiator,
                    countdown: 0,
                    sector_id: 1,
                    antenna_id: 1,
                },
                schedule: self.schedule.clone(),
            }),
        }
    }
}

pub fn probe_response(
    ap: MacAddress,
    sta: MacAddress,
    ssid: &[u8],
    beacon_interval: Duration,
) -> Frame {
    Frame {
        header: Header {
            addr1: sta,
            addr2: ap,
            addr3: ap,
            duration: Duration::ZERO,
        },
        body: FrameBody::ProbeResponse(ProbeResponse {
            ssid: Ssid::new(ssid),
            beacon_interval,
        }),
    }
}

pub fn assoc_response(ap: MacAddress, sta: MacAddress, status: StatusCode, aid: u8) -> Frame {
    Frame {
        header: Header {
            addr1: sta,
            addr2: ap,
            addr3: ap,
            duration: Duration::ZERO,
        },
        body: FrameBody::AssocResponse(AssocResponse { status, aid }),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn ssw(
    from: MacAddress,
    to: MacAddress,
    direction: SweepDirection,
    countdown: u16,
    sector_id: u8,
    antenna_id: u8,
    feedback_sector: u8,
    feedback_antenna: u8,
) -> Frame {
    Frame {
        header: Header::control(to, from, Duration::from_micros(300)),
        body: FrameBody::Ssw(SswFrame {
            ssw: SswField {
                direction,
                countdown,
                sector_id,
                antenna_id,
            },
            feedback: SswFeedbackField {
                is_part_of_iss: direction == SweepDirection::Initiator,
                sector: feedback_sector,
                antenna: feedback_antenna,
                poll_required: false,
            },
        }),
    }
}

fn feedback_body(sector: u8, antenna: u8) -> SswFbckFrame {
    SswFbckFrame {
        feedback: SswFeedbackField {
            is_part_of_iss: false,
            sector,
            antenna,
            poll_required: false,
        },
        brp_request: BrpRequest::default(),
        link_maintenance: BfLinkMaintenance { is_master: true },
    }
}

pub fn ssw_fbck(
    from: MacAddress,
    to: MacAddress,
    sector: u8,
    antenna: u8,
    duration: Duration,
) -> Frame {
    Frame {
        header: Header::control(to, from, duration),
        body: FrameBody::SswFbck(feedback_body(sector, antenna)),
    }
}

pub fn ssw_ack(from: MacAddress, to: MacAddress, sector: u8, antenna: u8) -> Frame {
    Frame {
        header: Header::control(to, from, Duration::from_micros(300)),
        body: FrameBody::SswAck(feedback_body(sector, antenna)),
    }
}

pub fn dmg_action(from: MacAddress, to: MacAddress, action: DmgAction) -> Frame {
    Frame {
        header: Header {
            addr1: to,
            addr2: from,
            addr3: from,
            duration: Duration::ZERO,
        },
        body: FrameBody::Action(ActionFrame::Dmg(action)),
    }
}

/// An Information Response from the PCP/AP describing `subject`.
pub fn information_response(
    ap: MacAddress,
    sta: MacAddress,
    subject: MacAddress,
    aid: u8,
) -> Frame {
    dmg_action(
        ap,
        sta,
        DmgAction::InformationResponse {
            subject_address: subject,
            capabilities: DmgCapabilities {
                sta_address: subject,
                aid,
                num_rx_antennas: 1,
                num_sectors: 8,
                rxss_length: 8,
                relay_capable: true,
            },
        },
    )
}

pub fn qos_data(ap: MacAddress, sta: MacAddress, source: MacAddress, payload: &[u8]) -> Frame {
    Frame {
        header: Header {
            addr1: sta,
            addr2: ap,
            addr3: source,
            duration: Duration::ZERO,
        },
        body: FrameBody::QosData(QosData {
            tid: 0,
            payload: MsduPayload::Single(
                heapless::Vec::from_slice(payload).expect("test payload fits"),
            ),
        }),
    }
}

pub fn poll(ap: MacAddress, sta: MacAddress) -> Frame {
    Frame {
        header: Header {
            addr1: sta,
            addr2: ap,
            addr3: MacAddress([0; 6]),
            duration: Duration::ZERO,
        },
        body: FrameBody::Poll,
    }
}
