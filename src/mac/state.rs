use heapless::{FnvIndexMap, Vec};
use rand_core::RngCore;

use super::StaConfig;
use crate::{
    steering::{AntennaConfig, SteeringTable},
    time::{DelayNsExt, Duration, Instant},
    wire::{
        action::MAX_RELAY_CANDIDATES, beacon::MAX_ALLOCATIONS, AllocationField, DmgCapabilities,
        MacAddress, RelayCapableSta,
    },
    AccessPeriod, AssociationState, RelayRole,
};

/// Everything the engine mutates between events. Exactly one of these exists
/// per running MAC, owned by the engine task.
pub struct StaState {
    pub access_period: AccessPeriod,
    pub association: AssociationState,
    pub aid: u8,
    pub bssid: Option<MacAddress>,
    pub active_probing: bool,

    pub steering: SteeringTable,
    pub station_info: FnvIndexMap<MacAddress, DmgCapabilities, 8>,
    /// Peers data can be addressed to directly (trained SLS links).
    pub data_forwarding: Vec<MacAddress, 8>,
    /// Destinations with a service period in the current BI.
    pub sp_stations: Vec<MacAddress, 8>,

    /// Timing snapshot of the current BI, installed by the first DMG beacon
    /// of a BTI and read by every later phase of that interval.
    pub bi: Option<BiTiming>,
    /// Whether a DMG beacon was already accepted this BI. Duplicate beacons
    /// only feed the SNR map.
    pub received_dmg_beacon: bool,

    /// A-BFT slotting. `remaining_slots` shrinks as fallback retries consume
    /// the front of the A-BFT.
    pub slot_index: u8,
    pub remaining_slots: u8,
    pub scheduled_period_after_abft: bool,
    /// Peers that already got an SSW-FBCK this BI.
    pub sector_feedback_sent: Vec<MacAddress, 8>,

    pub sls: Option<SlsSession>,
    /// Duration field of the last received SSW-FBCK, consumed by the
    /// SSW-ACK construction.
    pub ssw_fbck_duration: Duration,

    pub relay: RelayState,
    pub timers: Timers,
}

impl StaState {
    pub fn new<Rng: RngCore, Delay: DelayNsExt>(config: &StaConfig<Rng, Delay>) -> Self {
        Self {
            access_period: AccessPeriod::Bti,
            association: AssociationState::BeaconMissed,
            aid: 0,
            bssid: None,
            active_probing: config.active_probing,
            steering: SteeringTable::new(),
            station_info: FnvIndexMap::new(),
            data_forwarding: Vec::new(),
            sp_stations: Vec::new(),
            bi: None,
            received_dmg_beacon: false,
            slot_index: 0,
            remaining_slots: 0,
            scheduled_period_after_abft: false,
            sector_feedback_sent: Vec::new(),
            sls: None,
            ssw_fbck_duration: Duration::ZERO,
            relay: RelayState::new(config.rds_activated),
            timers: Timers::new(),
        }
    }

    pub fn is_associated(&self) -> bool {
        self.association == AssociationState::Associated
    }

    /// The time still left in the running beamforming allocation.
    pub fn remaining_allocation_time(&self, now: Instant) -> Duration {
        match &self.sls {
            Some(session) => {
                session.allocation_length - (now - session.allocation_started)
            }
            None => Duration::ZERO,
        }
    }

    pub fn is_sp_station(&self, address: MacAddress) -> bool {
        self.sp_stations.iter().any(|s| *s == address)
    }

    pub fn is_direct_peer(&self, address: MacAddress) -> bool {
        self.data_forwarding.iter().any(|s| *s == address)
    }

    pub fn add_direct_peer(&mut self, address: MacAddress) {
        if !self.is_direct_peer(address) && self.data_forwarding.push(address).is_err() {
            warn!("Data forwarding set is full, dropping {}", address);
        }
    }

    pub fn feedback_sent_to(&self, address: MacAddress) -> bool {
        self.sector_feedback_sent.iter().any(|s| *s == address)
    }

    pub fn mark_feedback_sent(&mut self, address: MacAddress) {
        if !self.feedback_sent_to(address) && self.sector_feedback_sent.push(address).is_err() {
            warn!("Sector feedback set is full, dropping {}", address);
        }
    }
}

/// The timing snapshot taken from the first DMG beacon of a BI.
#[derive(Debug, Clone)]
pub struct BiTiming {
    pub bti_started: Instant,
    pub bti_duration: Duration,
    pub abft_duration: Duration,
    pub ati_duration: Duration,
    pub beacon_interval: Duration,
    pub ss_slots_per_abft: u8,
    pub ss_frames_per_slot: u8,
    pub responder_txss: bool,
    pub ati_present: bool,
    pub cbap_only: bool,
    pub cbap_source: bool,
    pub schedule: Vec<AllocationField, MAX_ALLOCATIONS>,
}

/// A running sector-level sweep, initiator or responder side.
#[derive(Debug, Clone)]
pub struct SlsSession {
    pub peer: MacAddress,
    pub is_initiator: bool,
    /// Sector currently being swept, 1-based.
    pub sector_id: u8,
    /// Antenna currently being swept, 1-based.
    pub antenna_id: u8,
    /// Sweep frames still to transmit after the current one; doubles as the
    /// countdown field on air.
    pub remaining: u16,
    /// The config reported back to the peer in RSS/FBCK frames.
    pub feedback_config: AntennaConfig,
    pub allocation_started: Instant,
    pub allocation_length: Duration,
}

/// Relay session state across the three RLS roles.
pub struct RelayState {
    pub role: RelayRole,
    /// True when this station is configured to serve as an RDS.
    pub rds_activated: bool,
    /// True while operating a relayed link (any role).
    pub relay_mode: bool,
    /// Discovery suspended until the Information Response for this peer.
    pub pending_discovery: Option<MacAddress>,
    pub dst_reds_address: Option<MacAddress>,
    pub dst_reds_aid: u8,
    pub src_reds_address: Option<MacAddress>,
    pub selected_relay_aid: u8,
    pub selected_relay_address: Option<MacAddress>,
    pub waiting_destination_reds_reports: bool,
    pub rds_list: Vec<RelayCapableSta, MAX_RELAY_CANDIDATES>,
}

impl RelayState {
    fn new(rds_activated: bool) -> Self {
        Self {
            role: if rds_activated {
                RelayRole::RelayRds
            } else {
                RelayRole::None
            },
            rds_activated,
            relay_mode: false,
            pending_discovery: None,
            dst_reds_address: None,
            dst_reds_aid: 0,
            src_reds_address: None,
            selected_relay_aid: 0,
            selected_relay_address: None,
            waiting_destination_reds_reports: false,
            rds_list: Vec::new(),
        }
    }
}

/// Which period follows the one currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStart {
    Ati,
    Dti,
}

/// An action installed for a point inside the DTI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DtiAction {
    StartContention {
        duration: Duration,
    },
    EndContention,
    StartServicePeriod {
        peer: MacAddress,
        duration: Duration,
        is_source: bool,
    },
    EndServicePeriod,
    InitiateBeamforming {
        peer: MacAddress,
        initiator_txss: bool,
        duration: Duration,
    },
}

/// A deadline stamped with the order it was armed in. Deadlines that land on
/// the same instant fire in arming order, like events of a discrete event
/// queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    seq: u64,
}

impl Deadline {
    fn key(&self) -> (Instant, u64) {
        (self.at, self.seq)
    }
}

/// Every deadline the engine can be waiting on. A `None` is a cancelled or
/// never-armed timer; firing logic that finds its precondition gone treats
/// the event as a no-op, which makes cancellation races harmless. Arming
/// goes through the `arm_*` methods so every deadline gets its sequence
/// stamp.
pub struct Timers {
    next_seq: u64,
    pub probe_request: Option<Deadline>,
    pub assoc_request: Option<Deadline>,
    pub beacon_watchdog: Option<Deadline>,
    /// High-water mark of the watchdog deadline. Never moves backwards.
    pub beacon_watchdog_end: Instant,
    pub abft_start: Option<Deadline>,
    /// Start of the chosen responder sweep slot in the A-BFT.
    pub rss_slot: Option<Deadline>,
    /// Collision detection: fires when the slot passed without an SSW-FBCK.
    pub abft_fallback: Option<Deadline>,
    /// ATI or DTI entry after the A-BFT (and DTI entry after the ATI).
    pub next_period: Option<(Deadline, PeriodStart)>,
    pub next_bti: Option<Deadline>,
    /// SBIFS-paced next sweep frame of the running SLS session.
    pub ssw_step: Option<Deadline>,
    /// Responder sector sweep towards a DTI initiator.
    pub rss_start: Option<(Deadline, MacAddress)>,
    pub ssw_fbck_send: Option<(Deadline, MacAddress)>,
    pub ssw_ack_send: Option<(Deadline, MacAddress)>,
    pub dti_events: Vec<(Deadline, DtiAction), 16>,
}

/// A timer that came due, with the payload captured at scheduling time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerEvent {
    NextBti,
    AbftStart,
    RssSlot,
    AbftFallback,
    NextPeriod(PeriodStart),
    Dti(DtiAction),
    SswStep,
    RssStart(MacAddress),
    SendSswFbck(MacAddress),
    SendSswAck(MacAddress),
    ProbeTimeout,
    AssocTimeout,
    BeaconWatchdog,
}

impl Timers {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            probe_request: None,
            assoc_request: None,
            beacon_watchdog: None,
            beacon_watchdog_end: Instant::EPOCH,
            abft_start: None,
            rss_slot: None,
            abft_fallback: None,
            next_period: None,
            next_bti: None,
            ssw_step: None,
            rss_start: None,
            ssw_fbck_send: None,
            ssw_ack_send: None,
            dti_events: Vec::new(),
        }
    }

    fn deadline(&mut self, at: Instant) -> Deadline {
        let seq = self.next_seq;
        self.next_seq += 1;
        Deadline { at, seq }
    }

    pub fn arm_probe_request(&mut self, at: Instant) {
        self.probe_request = Some(self.deadline(at));
    }

    pub fn arm_assoc_request(&mut self, at: Instant) {
        self.assoc_request = Some(self.deadline(at));
    }

    pub fn arm_beacon_watchdog(&mut self, at: Instant) {
        self.beacon_watchdog = Some(self.deadline(at));
    }

    pub fn arm_abft_start(&mut self, at: Instant) {
        self.abft_start = Some(self.deadline(at));
    }

    pub fn arm_rss_slot(&mut self, at: Instant) {
        self.rss_slot = Some(self.deadline(at));
    }

    pub fn arm_abft_fallback(&mut self, at: Instant) {
        self.abft_fallback = Some(self.deadline(at));
    }

    pub fn arm_next_period(&mut self, at: Instant, period: PeriodStart) {
        self.next_period = Some((self.deadline(at), period));
    }

    pub fn arm_next_bti(&mut self, at: Instant) {
        self.next_bti = Some(self.deadline(at));
    }

    pub fn arm_ssw_step(&mut self, at: Instant) {
        self.ssw_step = Some(self.deadline(at));
    }

    pub fn arm_rss_start(&mut self, at: Instant, peer: MacAddress) {
        self.rss_start = Some((self.deadline(at), peer));
    }

    pub fn arm_ssw_fbck_send(&mut self, at: Instant, peer: MacAddress) {
        self.ssw_fbck_send = Some((self.deadline(at), peer));
    }

    pub fn arm_ssw_ack_send(&mut self, at: Instant, peer: MacAddress) {
        self.ssw_ack_send = Some((self.deadline(at), peer));
    }

    pub fn schedule_dti_event(&mut self, at: Instant, action: DtiAction) {
        let deadline = self.deadline(at);
        if self.dti_events.push((deadline, action)).is_err() {
            error!("DTI event table is full, allocation action dropped");
        }
    }

    pub fn clear_dti_events(&mut self) {
        self.dti_events.clear();
    }

    /// The earliest pending deadline and its event. Deadlines on the same
    /// instant resolve by their arming sequence, so same-instant events fire
    /// first-armed first.
    pub fn next(&self) -> Option<(Instant, TimerEvent)> {
        let mut next: Option<(Deadline, TimerEvent)> = None;

        let mut consider = |deadline: Deadline, event: TimerEvent| match next {
            Some((best, _)) if best.key() <= deadline.key() => {}
            _ => next = Some((deadline, event)),
        };

        if let Some(deadline) = self.next_bti {
            consider(deadline, TimerEvent::NextBti);
        }
        if let Some(deadline) = self.abft_start {
            consider(deadline, TimerEvent::AbftStart);
        }
        if let Some(deadline) = self.rss_slot {
            consider(deadline, TimerEvent::RssSlot);
        }
        if let Some(deadline) = self.abft_fallback {
            consider(deadline, TimerEvent::AbftFallback);
        }
        if let Some((deadline, period)) = self.next_period {
            consider(deadline, TimerEvent::NextPeriod(period));
        }
        for &(deadline, action) in &self.dti_events {
            consider(deadline, TimerEvent::Dti(action));
        }
        if let Some(deadline) = self.ssw_step {
            consider(deadline, TimerEvent::SswStep);
        }
        if let Some((deadline, peer)) = self.rss_start {
            consider(deadline, TimerEvent::RssStart(peer));
        }
        if let Some((deadline, peer)) = self.ssw_fbck_send {
            consider(deadline, TimerEvent::SendSswFbck(peer));
        }
        if let Some((deadline, peer)) = self.ssw_ack_send {
            consider(deadline, TimerEvent::SendSswAck(peer));
        }
        if let Some(deadline) = self.probe_request {
            consider(deadline, TimerEvent::ProbeTimeout);
        }
        if let Some(deadline) = self.assoc_request {
            consider(deadline, TimerEvent::AssocTimeout);
        }
        if let Some(deadline) = self.beacon_watchdog {
            consider(deadline, TimerEvent::BeaconWatchdog);
        }

        next.map(|(deadline, event)| (deadline.at, event))
    }

    /// Remove the source of a fired event so it cannot fire twice. The DTI
    /// table drops the first matching entry, keeping the rest in arming
    /// order.
    pub fn acknowledge(&mut self, at: Instant, event: TimerEvent) {
        match event {
            TimerEvent::NextBti => self.next_bti = None,
            TimerEvent::AbftStart => self.abft_start = None,
            TimerEvent::RssSlot => self.rss_slot = None,
            TimerEvent::AbftFallback => self.abft_fallback = None,
            TimerEvent::NextPeriod(_) => self.next_period = None,
            TimerEvent::Dti(action) => {
                if let Some(index) = self
                    .dti_events
                    .iter()
                    .position(|&(deadline, a)| deadline.at == at && a == action)
                {
                    self.dti_events.remove(index);
                }
            }
            TimerEvent::SswStep => self.ssw_step = None,
            TimerEvent::RssStart(_) => self.rss_start = None,
            TimerEvent::SendSswFbck(_) => self.ssw_fbck_send = None,
            TimerEvent::SendSswAck(_) => self.ssw_ack_send = None,
            TimerEvent::ProbeTimeout => self.probe_request = None,
            TimerEvent::AssocTimeout => self.assoc_request = None,
            TimerEvent::BeaconWatchdog => self.beacon_watchdog = None,
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_deadline_wins() {
        let mut timers = Timers::new();
        timers.arm_probe_request(Instant::from_micros(500));
        timers.arm_next_bti(Instant::from_micros(300));
        timers.schedule_dti_event(
            Instant::from_micros(400),
            DtiAction::StartContention {
                duration: Duration::from_micros(100),
            },
        );

        let (at, event) = timers.next().unwrap();
        assert_eq!(at, Instant::from_micros(300));
        assert_eq!(event, TimerEvent::NextBti);
    }

    #[test]
    fn same_instant_fires_in_arming_order() {
        let at = Instant::from_micros(100);

        // Armed ack-send first, BTI second: the ack-send fires first
        let mut timers = Timers::new();
        timers.arm_ssw_ack_send(at, MacAddress([2, 0, 0, 0, 0, 9]));
        timers.arm_next_bti(at);
        let (_, event) = timers.next().unwrap();
        assert_eq!(event, TimerEvent::SendSswAck(MacAddress([2, 0, 0, 0, 0, 9])));

        // Armed the other way round, the BTI fires first
        let mut timers = Timers::new();
        timers.arm_next_bti(at);
        timers.arm_ssw_ack_send(at, MacAddress([2, 0, 0, 0, 0, 9]));
        let (_, event) = timers.next().unwrap();
        assert_eq!(event, TimerEvent::NextBti);
    }

    #[test]
    fn rearming_moves_to_the_back_of_a_tie() {
        let at = Instant::from_micros(100);

        let mut timers = Timers::new();
        timers.arm_probe_request(at);
        timers.arm_abft_start(at);
        // Re-arming the probe for the same instant makes it the newest
        timers.arm_probe_request(at);

        let (_, event) = timers.next().unwrap();
        assert_eq!(event, TimerEvent::AbftStart);
    }

    #[test]
    fn dti_ties_keep_arming_order_across_acknowledge() {
        let mut timers = Timers::new();
        let at = Instant::from_micros(100);
        timers.schedule_dti_event(at, DtiAction::EndContention);
        timers.schedule_dti_event(
            at,
            DtiAction::StartServicePeriod {
                peer: MacAddress([2, 0, 0, 0, 0, 9]),
                duration: Duration::from_micros(50),
                is_source: true,
            },
        );
        timers.schedule_dti_event(at, DtiAction::EndServicePeriod);

        // First armed, first fired
        let (fired_at, event) = timers.next().unwrap();
        assert_eq!(event, TimerEvent::Dti(DtiAction::EndContention));
        timers.acknowledge(fired_at, event);

        // Removing it must not disturb the order of the remaining tie
        let (fired_at, event) = timers.next().unwrap();
        assert!(matches!(
            event,
            TimerEvent::Dti(DtiAction::StartServicePeriod { .. })
        ));
        timers.acknowledge(fired_at, event);

        let (_, event) = timers.next().unwrap();
        assert_eq!(event, TimerEvent::Dti(DtiAction::EndServicePeriod));
    }

    #[test]
    fn no_timers_means_no_wakeup() {
        let timers = Timers::new();
        assert!(timers.next().is_none());
    }
}
