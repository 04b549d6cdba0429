//! DMG PHY/MAC timing constants and the derived sector-sweep durations.

use crate::time::Duration;

/// Short interframe space.
#[doc(alias = "aSIFSTime")]
pub const SIFS: Duration = Duration::from_micros(3);

/// Short beamforming interframe space, separating SSW frames of one sweep.
#[doc(alias = "aSBIFSTime")]
pub const SBIFS: Duration = Duration::from_micros(1);

/// Medium beamforming interframe space, separating sweep phases
/// (ISS to RSS, RSS to SSW-FBCK, SSW-FBCK to SSW-ACK).
#[doc(alias = "aMBIFSTime")]
pub const MBIFS: Duration = Duration::from_micros(9);

/// One-way air propagation allowance.
#[doc(alias = "aAirPropagationTime")]
pub const AIR_PROPAGATION_TIME: Duration = Duration::from_nanos(100);

/// Airtime of one SSW frame on the control PHY (MCS 0).
pub const SSW_FRAME_TX_TIME: Duration = Duration::from_nanos(15_800);

/// Airtime of an SSW-FBCK (and SSW-ACK) frame on the control PHY.
pub const SSW_FBCK_TX_TIME: Duration = Duration::from_nanos(18_250);

/// The AID value meaning "all stations".
pub const BROADCAST_AID: u8 = 0xFF;

/// Time taken by a transmit sector sweep of `frames` SSW frames,
/// SBIFS-separated. A countdown field value maps directly to the number of
/// frames still to come after the current one.
pub fn sector_sweep_duration(frames: u16) -> Duration {
    if frames == 0 {
        return Duration::ZERO;
    }

    SSW_FRAME_TX_TIME * frames as i64 + SBIFS * (frames - 1) as i64
}

/// Length of a single A-BFT sector-sweep slot when each slot carries
/// `frames_per_slot` SSW frames (the FSS field of the beacon).
pub fn sector_sweep_slot_time(frames_per_slot: u8) -> Duration {
    AIR_PROPAGATION_TIME + sector_sweep_duration(frames_per_slot as u16) + SSW_FBCK_TX_TIME + MBIFS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_duration_counts_gaps() {
        assert_eq!(sector_sweep_duration(0), Duration::ZERO);
        assert_eq!(sector_sweep_duration(1), SSW_FRAME_TX_TIME);
        assert_eq!(
            sector_sweep_duration(8),
            SSW_FRAME_TX_TIME * 8 + SBIFS * 7
        );
    }

    #[test]
    fn slot_time_exceeds_sweep() {
        let slot = sector_sweep_slot_time(8);
        assert!(slot > sector_sweep_duration(8));
    }
}
