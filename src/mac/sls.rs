use rand_core::RngCore;

use super::{commander::MacHandler, state::SlsSession, state::StaState, StaConfig};
use crate::{
    consts::{sector_sweep_duration, MBIFS, SBIFS, SIFS, SSW_FBCK_TX_TIME},
    phy::{DirectionalAntenna, Phy, TxParams},
    sap::StaEvent,
    steering::AntennaConfig,
    time::{DelayNsExt, Duration, Instant},
    wire::{
        sls::{BfLinkMaintenance, BrpRequest, SswFeedbackField},
        Frame, FrameBody, Header, MacAddress, SswFbckFrame, SswField, SswFrame, SweepDirection,
    },
    AccessPeriod, MacError,
};

/// Begin an initiator sector sweep towards `peer` inside a beamforming
/// allocation of the given length.
pub async fn start_initiator_sector_sweep<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    peer: MacAddress,
    initiator_txss: bool,
    duration: Duration,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    info!("Starting ISS with {}", peer);

    mac_state.sls = Some(SlsSession {
        peer,
        is_initiator: true,
        sector_id: 1,
        antenna_id: 1,
        remaining: 0,
        feedback_config: AntennaConfig::default(),
        allocation_started: now,
        allocation_length: duration,
    });

    if initiator_txss {
        start_transmit_sector_sweep(phy, mac_state, config, now).await
    } else {
        start_receive_sector_sweep(mac_state, peer);
        Ok(())
    }
}

/// Begin a responder sector sweep towards `peer`, answering its ISS (in the
/// DTI) or training with the PCP/AP (in an A-BFT slot).
pub async fn start_responder_sector_sweep<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    peer: MacAddress,
    responder_txss: bool,
    duration: Duration,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    info!("Starting RSS with {}", peer);

    // The feedback carried in our RSS frames: the peer's sector that reached
    // us best during its sweep
    let feedback_config = mac_state
        .steering
        .best_tx_config(peer)
        .map(|(config, _)| config)
        .unwrap_or_default();

    mac_state.sls = Some(SlsSession {
        peer,
        is_initiator: false,
        sector_id: 1,
        antenna_id: 1,
        remaining: 0,
        feedback_config,
        allocation_started: now,
        allocation_length: duration,
    });

    if responder_txss {
        start_transmit_sector_sweep(phy, mac_state, config, now).await
    } else {
        // The peer is iterating its receiver while we hold a fixed sector
        phy.antenna().set_omni_rx();
        start_receive_sector_sweep(mac_state, peer);
        Ok(())
    }
}

/// The RSS slot chosen during A-BFT entry came up: train with the PCP/AP.
pub async fn start_abft_rss<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    let Some(bi) = mac_state.bi.clone() else {
        return Ok(());
    };
    let Some(bssid) = mac_state.bssid else {
        return Ok(());
    };

    let duration = sector_sweep_duration(bi.ss_frames_per_slot as u16);
    start_responder_sector_sweep(phy, mac_state, config, bssid, bi.responder_txss, duration, now)
        .await
}

fn start_receive_sector_sweep(mac_state: &mut StaState, peer: MacAddress) {
    // The receive sweep variant is not trained by this MAC; the session sits
    // idle until the allocation elapses.
    warn!("Receive sector sweep towards {} is not performed", peer);
    mac_state.sls = None;
}

async fn start_transmit_sector_sweep<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    let sectors = phy.antenna().num_sectors() as u16;
    let antennas = phy.antenna().num_antennas() as u16;

    let Some(session) = mac_state.sls.as_mut() else {
        return Ok(());
    };
    session.sector_id = 1;
    session.antenna_id = 1;
    session.remaining = sectors * antennas - 1;

    send_sweep_frame(phy, mac_state, config, now).await
}

/// The SBIFS pacing timer expired: transmit the next sweep frame.
pub async fn continue_sweep<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    send_sweep_frame(phy, mac_state, config, now).await
}

/// Transmit one SSW frame of the running session over its current sector,
/// then advance the iteration on tx-ok.
async fn send_sweep_frame<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    let Some(session) = mac_state.sls.clone() else {
        return Ok(());
    };
    let responder_txss = mac_state
        .bi
        .as_ref()
        .map(|bi| bi.responder_txss)
        .unwrap_or(true);

    let direction = if session.is_initiator {
        SweepDirection::Initiator
    } else {
        SweepDirection::Responder
    };

    let feedback = if session.is_initiator {
        // Inside an ISS the feedback field advertises the sweep dimensions
        SswFeedbackField {
            is_part_of_iss: true,
            sector: session.remaining as u8,
            antenna: phy.antenna().num_antennas(),
            poll_required: false,
        }
    } else {
        SswFeedbackField {
            is_part_of_iss: false,
            sector: session.feedback_config.sector,
            antenna: session.feedback_config.antenna,
            poll_required: false,
        }
    };

    // The swept sector is written to the antenna right before the transmit
    if session.is_initiator || responder_txss {
        let antenna = phy.antenna();
        antenna.set_tx_sector(session.sector_id);
        antenna.set_tx_antenna(session.antenna_id);
    }

    let duration = mac_state.remaining_allocation_time(now);
    let frame = Frame {
        header: Header::control(session.peer, config.address, duration),
        body: FrameBody::Ssw(SswFrame {
            ssw: SswField {
                direction,
                countdown: session.remaining,
                sector_id: session.sector_id,
                antenna_id: session.antenna_id,
            },
            feedback,
        }),
    };

    trace!(
        "Sending SSW frame, sector {} antenna {}",
        session.sector_id,
        session.antenna_id
    );

    let tx_ok_at = phy
        .start_transmission(frame, TxParams::swept_control(duration))
        .await?;
    sweep_frame_tx_ok(phy, mac_state, tx_ok_at);
    Ok(())
}

/// Advance the sector iteration after a sweep frame made it out. The next
/// frame follows after SBIFS; the last frame flips the receiver to omni for
/// the peer's phase.
fn sweep_frame_tx_ok<P: Phy>(phy: &mut P, mac_state: &mut StaState, now: Instant) {
    let sectors = phy.antenna().num_sectors();
    let antennas = phy.antenna().num_antennas();

    let Some(session) = mac_state.sls.as_mut() else {
        return;
    };

    if session.remaining > 0 {
        advance_sweep(session, sectors, antennas);
        mac_state.timers.arm_ssw_step(now + SBIFS);
    } else {
        // Sweep finished, wait for the peer's phase
        phy.antenna().set_omni_rx();
    }
}

/// One step of the sector iteration: sectors cycle 1..=N, then the antenna
/// advances.
fn advance_sweep(session: &mut SlsSession, sectors: u8, antennas: u8) {
    if session.sector_id < sectors {
        session.sector_id += 1;
    } else if session.sector_id == sectors && session.antenna_id < antennas {
        session.sector_id = 1;
        session.antenna_id += 1;
    }
    session.remaining -= 1;
}

/// A sweep frame arrived from a peer.
pub fn handle_ssw(mac_state: &mut StaState, header: &Header, frame: &SswFrame, rx_snr: f32, now: Instant) {
    let peer = header.addr2;

    // Map the sector the peer swept to the SNR it reached us with
    mac_state
        .steering
        .map_tx_snr(peer, frame.ssw.sector_id, frame.ssw.antenna_id, rx_snr);

    match frame.ssw.direction {
        SweepDirection::Responder => {
            trace!("Received SSW as part of RSS from {}", peer);

            // One SSW-FBCK per peer per allocation; the first RSS frame
            // already carries the ISS feedback
            if !mac_state.feedback_sent_to(peer) {
                mac_state.mark_feedback_sent(peer);

                // The peer reports the best of OUR sectors from the ISS
                mac_state.steering.set_best_tx_config(
                    peer,
                    AntennaConfig {
                        sector: frame.feedback.sector,
                        antenna: frame.feedback.antenna,
                    },
                );
                debug!(
                    "Best tx sector towards {} is {} on antenna {}",
                    peer, frame.feedback.sector, frame.feedback.antenna
                );

                let at = now + sector_sweep_duration(frame.ssw.countdown) + MBIFS;
                mac_state.timers.arm_ssw_fbck_send(at, peer);
            }
        }
        SweepDirection::Initiator => {
            trace!("Received SSW as part of ISS from {}", peer);

            // Answer the first initiator heard this allocation, once its
            // sweep has run out
            if mac_state.timers.rss_start.is_none() {
                let at = now + sector_sweep_duration(frame.ssw.countdown) + MBIFS;
                mac_state.timers.arm_rss_start(at, peer);
            }
        }
    }
}

/// Transmit the SSW-FBCK closing the peer's responder sweep.
pub async fn send_ssw_fbck<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    peer: MacAddress,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    let duration = mac_state.remaining_allocation_time(now);

    // Feed back the peer sector that reached us best
    let feedback_config = mac_state
        .steering
        .best_tx_config(peer)
        .map(|(config, _)| config)
        .unwrap_or_default();
    if let Some(session) = mac_state.sls.as_mut() {
        session.feedback_config = feedback_config;
    }

    let frame = Frame {
        header: Header::control(peer, config.address, duration),
        body: FrameBody::SswFbck(SswFbckFrame {
            feedback: SswFeedbackField {
                is_part_of_iss: false,
                sector: feedback_config.sector,
                antenna: feedback_config.antenna,
                poll_required: false,
            },
            brp_request: BrpRequest::default(),
            link_maintenance: BfLinkMaintenance { is_master: true },
        }),
    };

    info!("Sending SSW-FBCK to {}", peer);
    steer_to_best_tx(phy, mac_state, peer);
    phy.start_transmission(frame, TxParams::swept_control(duration))
        .await?;
    Ok(())
}

/// Transmit the SSW-ACK closing the exchange, then report completion.
pub async fn send_ssw_ack<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    peer: MacAddress,
    _now: Instant,
) -> Result<(), MacError<P::Error>> {
    // The feedback duration must still cover the gap and the ack airtime.
    // The header itself carries the full allocation length.
    let residual = mac_state.ssw_fbck_duration - (SIFS + SSW_FBCK_TX_TIME);
    debug_assert!(residual.is_positive());
    let header_duration = mac_state
        .sls
        .as_ref()
        .map(|session| session.allocation_length)
        .unwrap_or(Duration::ZERO);

    let feedback_config = mac_state
        .steering
        .best_tx_config(peer)
        .map(|(config, _)| config)
        .unwrap_or_default();

    let frame = Frame {
        header: Header::control(peer, config.address, header_duration),
        body: FrameBody::SswAck(SswFbckFrame {
            feedback: SswFeedbackField {
                is_part_of_iss: false,
                sector: feedback_config.sector,
                antenna: feedback_config.antenna,
                poll_required: false,
            },
            brp_request: BrpRequest::default(),
            link_maintenance: BfLinkMaintenance { is_master: true },
        }),
    };

    info!("Sending SSW-ACK to {}", peer);
    steer_to_best_tx(phy, mac_state, peer);
    phy.start_transmission(frame, TxParams::swept_control(header_duration))
        .await?;

    // The acked exchange completes the responder side of the sweep
    handler.emit(StaEvent::SlsCompleted {
        peer,
        access_period: AccessPeriod::Dti,
        tx_sector: feedback_config.sector,
        tx_antenna: feedback_config.antenna,
    });
    Ok(())
}

/// An SSW-FBCK arrived: the peer reports which of our sectors to use.
pub fn handle_ssw_fbck(
    mac_state: &mut StaState,
    handler: &MacHandler<'_>,
    header: &Header,
    frame: &SswFbckFrame,
    now: Instant,
) {
    let peer = header.addr2;
    info!("Received SSW-FBCK from {}", peer);

    let reported = AntennaConfig {
        sector: frame.feedback.sector,
        antenna: frame.feedback.antenna,
    };
    mac_state.steering.set_best_tx_config(peer, reported);

    match mac_state.access_period {
        AccessPeriod::Abft => {
            debug!(
                "Best tx sector towards the AP is {} on antenna {}",
                reported.sector, reported.antenna
            );

            handler.emit(StaEvent::SlsCompleted {
                peer,
                access_period: AccessPeriod::Bti,
                tx_sector: reported.sector,
                tx_antenna: reported.antenna,
            });

            // Feedback received, the slot was not a collision
            mac_state.slot_index = 0;
            mac_state.timers.abft_fallback = None;
        }
        AccessPeriod::Dti => {
            mac_state.ssw_fbck_duration = header.duration;
            mac_state.add_direct_peer(peer);
            mac_state.timers.arm_ssw_ack_send(now + MBIFS, peer);
        }
        _ => {}
    }
}

/// An SSW-ACK arrived: the initiator side of the exchange is complete.
pub fn handle_ssw_ack(mac_state: &mut StaState, handler: &MacHandler<'_>, header: &Header) {
    let peer = header.addr2;
    info!("Received SSW-ACK from {}", peer);

    mac_state.add_direct_peer(peer);

    let (best, _) = mac_state
        .steering
        .best_tx_config(peer)
        .unwrap_or_default();
    handler.emit(StaEvent::SlsCompleted {
        peer,
        access_period: AccessPeriod::Dti,
        tx_sector: best.sector,
        tx_antenna: best.antenna,
    });
}

/// Point the transmitter at the best trained sector towards `peer`.
fn steer_to_best_tx<P: Phy>(phy: &mut P, mac_state: &StaState, peer: MacAddress) {
    if let Some(best) = mac_state.steering.best_config(peer) {
        if best.tx.is_trained() {
            let antenna = phy.antenna();
            antenna.set_tx_sector(best.tx.sector);
            antenna.set_tx_antenna(best.tx.antenna);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SlsSession {
        SlsSession {
            peer: MacAddress([2, 0, 0, 0, 0, 7]),
            is_initiator: true,
            sector_id: 1,
            antenna_id: 1,
            remaining: 0,
            feedback_config: AntennaConfig::default(),
            allocation_started: Instant::EPOCH,
            allocation_length: Duration::from_micros(300),
        }
    }

    #[test]
    fn sweep_iterates_every_sector_antenna_pair() {
        let sectors = 4u8;
        let antennas = 2u8;

        let mut s = session();
        s.remaining = (sectors as u16 * antennas as u16) - 1;

        let mut seen = std::vec![(s.sector_id, s.antenna_id)];
        while s.remaining > 0 {
            advance_sweep(&mut s, sectors, antennas);
            seen.push((s.sector_id, s.antenna_id));
        }

        assert_eq!(seen.len(), 8);
        // Sectors cycle within an antenna before the antenna advances
        assert_eq!(seen[0], (1, 1));
        assert_eq!(seen[3], (4, 1));
        assert_eq!(seen[4], (1, 2));
        assert_eq!(seen[7], (4, 2));
        // No duplicates
        for (i, a) in seen.iter().enumerate() {
            for b in &seen[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn countdown_reaches_zero_on_last_frame() {
        let mut s = session();
        s.remaining = 7;

        for _ in 0..7 {
            advance_sweep(&mut s, 8, 1);
        }

        assert_eq!(s.remaining, 0);
        assert_eq!(s.sector_id, 8);
    }
}
