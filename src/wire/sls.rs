//! Control frames of the sector-level-sweep exchange.

/// Which side of the beamforming exchange transmitted a sweep frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SweepDirection {
    Initiator,
    Responder,
}

/// The Sector Sweep field carried by SSW frames and DMG beacons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SswField {
    pub direction: SweepDirection,
    /// Number of sweep frames still to come after this one.
    pub countdown: u16,
    /// Sector currently being swept, 1-based.
    pub sector_id: u8,
    /// DMG antenna currently being swept, 1-based.
    pub antenna_id: u8,
}

/// The Sector Sweep Feedback field.
///
/// Inside an ISS it advertises the sweep dimensions; everywhere else it
/// reports the best sector/antenna the receiver of the field should transmit
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SswFeedbackField {
    pub is_part_of_iss: bool,
    pub sector: u8,
    pub antenna: u8,
    pub poll_required: bool,
}

/// An SSW frame: one step of a transmit sector sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SswFrame {
    pub ssw: SswField,
    pub feedback: SswFeedbackField,
}

/// The BRP Request field. Beam refinement is not initiated by this MAC,
/// both request bits stay clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BrpRequest {
    pub mid_req: bool,
    pub bc_req: bool,
}

/// The beamformed-link maintenance field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BfLinkMaintenance {
    pub is_master: bool,
}

/// Body shared by SSW-FBCK and SSW-ACK frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SswFbckFrame {
    pub feedback: SswFeedbackField,
    pub brp_request: BrpRequest,
    pub link_maintenance: BfLinkMaintenance,
}
