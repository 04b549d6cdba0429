//! Per-peer antenna training state: the best-config table and the Tx SNR map
//! filled in during sector sweeps, plus the AID to MAC address mapping the
//! schedule and relay machinery resolve peers through.

use heapless::FnvIndexMap;

use crate::wire::MacAddress;

/// Peers tracked simultaneously. Must be a power of two.
pub const MAX_PEERS: usize = 8;
/// (sector, antenna) combinations tracked per peer. Must be a power of two.
pub const MAX_SECTOR_COMBINATIONS: usize = 64;

/// A (sector, antenna) pair. Sector 0 marks an untrained receive side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AntennaConfig {
    pub sector: u8,
    pub antenna: u8,
}

impl AntennaConfig {
    pub fn is_trained(&self) -> bool {
        self.sector >= 1
    }
}

/// Best transmit and receive configuration towards one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BestConfig {
    pub tx: AntennaConfig,
    pub rx: AntennaConfig,
}

#[derive(Default)]
struct PeerSnr {
    samples: FnvIndexMap<(u8, u8), f32, MAX_SECTOR_COMBINATIONS>,
}

/// The antenna training store.
///
/// `map_tx_snr` is fed from every received sweep frame and beacon;
/// `best_tx_config` answers "which of the peer's sectors reached us best",
/// which is exactly what gets fed back to that peer.
pub struct SteeringTable {
    best: FnvIndexMap<MacAddress, BestConfig, MAX_PEERS>,
    snr: FnvIndexMap<MacAddress, PeerSnr, MAX_PEERS>,
    aid_to_mac: FnvIndexMap<u8, MacAddress, MAX_PEERS>,
    mac_to_aid: FnvIndexMap<MacAddress, u8, MAX_PEERS>,
}

impl SteeringTable {
    pub fn new() -> Self {
        Self {
            best: FnvIndexMap::new(),
            snr: FnvIndexMap::new(),
            aid_to_mac: FnvIndexMap::new(),
            mac_to_aid: FnvIndexMap::new(),
        }
    }

    /// Record the SNR at which `peer`'s transmission over (sector, antenna)
    /// was received.
    pub fn map_tx_snr(&mut self, peer: MacAddress, sector: u8, antenna: u8, snr: f32) {
        if !self.snr.contains_key(&peer) && self.snr.insert(peer, PeerSnr::default()).is_err() {
            warn!("SNR map is full, dropping sample for {}", peer);
            return;
        }

        let samples = &mut unwrap!(self.snr.get_mut(&peer)).samples;
        if samples.insert((sector, antenna), snr).is_err() {
            warn!("SNR samples full for {}", peer);
        }
    }

    /// Forget everything measured about a peer. Called at the start of a new
    /// BTI so stale sectors cannot win the feedback.
    pub fn clear_snr(&mut self, peer: MacAddress) {
        self.snr.remove(&peer);
    }

    /// The (sector, antenna) of `peer` with the highest recorded SNR, with
    /// the SNR itself.
    pub fn best_tx_config(&self, peer: MacAddress) -> Option<(AntennaConfig, f32)> {
        let samples = &self.snr.get(&peer)?.samples;

        samples
            .iter()
            .max_by(|a, b| unwrap!(a.1.partial_cmp(b.1)))
            .map(|(&(sector, antenna), &snr)| (AntennaConfig { sector, antenna }, snr))
    }

    pub fn best_config(&self, peer: MacAddress) -> Option<BestConfig> {
        self.best.get(&peer).copied()
    }

    /// Store the transmit config this station should use towards `peer`.
    /// The receive side is reset to untrained; RxSS would fill it in.
    pub fn set_best_tx_config(&mut self, peer: MacAddress, tx: AntennaConfig) {
        let entry = BestConfig {
            tx,
            rx: AntennaConfig::default(),
        };
        if self.best.insert(peer, entry).is_err() {
            warn!("Best-config table is full, dropping entry for {}", peer);
        }
    }

    pub fn map_aid(&mut self, aid: u8, address: MacAddress) {
        let _ = self.aid_to_mac.insert(aid, address);
        let _ = self.mac_to_aid.insert(address, aid);
    }

    pub fn aid_to_mac(&self, aid: u8) -> Option<MacAddress> {
        self.aid_to_mac.get(&aid).copied()
    }

    pub fn mac_to_aid(&self, address: MacAddress) -> Option<u8> {
        self.mac_to_aid.get(&address).copied()
    }
}

impl Default for SteeringTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: MacAddress = MacAddress([2, 0, 0, 0, 0, 1]);

    #[test]
    fn best_config_is_argmax_over_samples() {
        let mut table = SteeringTable::new();
        table.map_tx_snr(PEER, 1, 1, 4.0);
        table.map_tx_snr(PEER, 2, 1, 11.5);
        table.map_tx_snr(PEER, 3, 1, 7.25);

        let (config, snr) = table.best_tx_config(PEER).unwrap();
        assert_eq!(config, AntennaConfig { sector: 2, antenna: 1 });
        assert_eq!(snr, 11.5);
    }

    #[test]
    fn later_sample_for_same_sector_wins() {
        let mut table = SteeringTable::new();
        table.map_tx_snr(PEER, 1, 1, 9.0);
        table.map_tx_snr(PEER, 1, 1, 2.0);
        table.map_tx_snr(PEER, 2, 1, 5.0);

        let (config, _) = table.best_tx_config(PEER).unwrap();
        assert_eq!(config.sector, 2);
    }

    #[test]
    fn clearing_removes_history() {
        let mut table = SteeringTable::new();
        table.map_tx_snr(PEER, 1, 1, 9.0);
        table.clear_snr(PEER);

        assert!(table.best_tx_config(PEER).is_none());
    }

    #[test]
    fn aid_mapping_is_bidirectional() {
        let mut table = SteeringTable::new();
        table.map_aid(5, PEER);

        assert_eq!(table.aid_to_mac(5), Some(PEER));
        assert_eq!(table.mac_to_aid(PEER), Some(5));
        assert_eq!(table.aid_to_mac(6), None);
    }

    #[test]
    fn stored_tx_config_resets_rx_training() {
        let mut table = SteeringTable::new();
        table.set_best_tx_config(PEER, AntennaConfig { sector: 3, antenna: 2 });

        let best = table.best_config(PEER).unwrap();
        assert!(best.tx.is_trained());
        assert!(!best.rx.is_trained());
    }
}
