//! Management frame bodies: probing and association.

use super::MacAddress;
use crate::time::Duration;

/// A service set identifier, compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Ssid(pub heapless::Vec<u8, 32>);

impl Ssid {
    pub fn new(name: &[u8]) -> Self {
        Self(unwrap!(heapless::Vec::from_slice(name)))
    }
}

/// Status code of an Association Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum StatusCode {
    Success,
    Refused,
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

/// The DMG Capabilities element, reduced to named fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DmgCapabilities {
    pub sta_address: MacAddress,
    pub aid: u8,
    pub num_rx_antennas: u8,
    pub num_sectors: u8,
    pub rxss_length: u8,
    pub relay_capable: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ProbeRequest {
    pub ssid: Ssid,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ProbeResponse {
    pub ssid: Ssid,
    pub beacon_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AssocRequest {
    pub ssid: Ssid,
    pub capabilities: DmgCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AssocResponse {
    pub status: StatusCode,
    pub aid: u8,
}
