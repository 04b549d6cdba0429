//! The DMG beacon and the extended schedule it carries.

use super::sls::SswField;
use crate::time::{Duration, Instant};

/// Maximum number of allocation fields one extended schedule can carry here.
pub const MAX_ALLOCATIONS: usize = 8;

/// The Beacon Interval Control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BeaconIntervalControl {
    pub cc_present: bool,
    pub discovery_mode: bool,
    /// Number of beacon intervals between BTIs that include this STA.
    /// 1 means every BI carries a BTI this STA can train in.
    pub n_bi: u8,
    pub ati_present: bool,
    /// Number of sector-sweep slots in the A-BFT.
    pub abft_length: u8,
    /// SSW frames per A-BFT slot (FSS).
    pub fss: u8,
    pub is_responder_txss: bool,
}

/// The DMG Parameters field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DmgParameters {
    pub cbap_only: bool,
    pub cbap_source: bool,
}

/// The DMG Operation element, reduced to the field this MAC consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DmgOperation {
    pub min_bhi_duration: Duration,
}

/// The Next DMG ATI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct NextDmgAti {
    pub ati_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AllocationType {
    ServicePeriod,
    Cbap,
}

/// The BF Control subfield of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BfControl {
    pub beamform_training: bool,
    pub initiator_txss: bool,
    pub responder_txss: bool,
}

/// One allocation of the extended schedule element. Start is an offset from
/// the beginning of the DTI; the schedule is immutable once a BI has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AllocationField {
    pub allocation_type: AllocationType,
    pub source_aid: u8,
    pub destination_aid: u8,
    pub allocation_start: Duration,
    pub allocation_block_duration: Duration,
    pub bf_control: BfControl,
}

/// A DMG beacon, one per swept sector during the BTI.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DmgBeacon {
    /// TSF timestamp at transmission.
    pub timestamp: Instant,
    pub beacon_interval: Duration,
    pub bi_control: BeaconIntervalControl,
    pub parameters: DmgParameters,
    pub operation: DmgOperation,
    pub next_ati: NextDmgAti,
    /// The sector this beacon was transmitted over.
    pub sector_sweep: SswField,
    pub schedule: heapless::Vec<AllocationField, MAX_ALLOCATIONS>,
}
