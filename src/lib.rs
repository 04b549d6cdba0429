#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![allow(async_fn_in_trait)]

// This must go FIRST so that all the other modules see its macros.
mod fmt;

// Pull in the critical-section implementation the simulation needs
#[cfg(feature = "std")]
use critical_section as _;

pub mod consts;
pub mod mac;
pub mod phy;
mod reqresp;
pub mod sap;
pub mod steering;
pub mod time;
pub mod wire;

#[cfg(feature = "std")]
pub mod test_helpers;

/// The access periods a beacon interval is partitioned into.
/// Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AccessPeriod {
    /// Beacon transmission interval: the PCP/AP sweeps its beacons.
    Bti,
    /// Association beamforming training: slotted responder sweeps.
    Abft,
    /// Announcement transmission interval.
    Ati,
    /// Data transmission interval: SPs and CBAPs per the schedule.
    Dti,
}

/// The association state of the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AssociationState {
    /// Not synchronized to any PCP/AP. The initial state, and the state a
    /// beacon-watchdog expiry falls back to.
    BeaconMissed,
    WaitProbeResp,
    WaitAssocResp,
    Associated,
    /// The PCP/AP turned the association down. Sticky until association is
    /// explicitly restarted from outside.
    Refused,
}

/// The roles of a relay link setup session. A station holds at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum RelayRole {
    #[default]
    None,
    /// The REDS that initiates discovery and RLS.
    SourceReds,
    /// The relay station forwarding between the two REDS.
    RelayRds,
    /// The REDS terminating the relayed link.
    DestinationReds,
}

/// The errors that end the MAC engine or a PHY interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MacError<PE> {
    PhyError(PE),
    /// A peer sent a DMG action subtype this MAC cannot model. Dropping it
    /// silently would desynchronize multi-party state, so it is fatal.
    UnsupportedDmgAction { action: u8 },
}

impl<PE: core::fmt::Debug> core::fmt::Display for MacError<PE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<PE> From<PE> for MacError<PE> {
    fn from(v: PE) -> Self {
        Self::PhyError(v)
    }
}
