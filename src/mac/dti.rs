use rand_core::RngCore;

use super::{
    commander::MacHandler,
    sls,
    state::{BiTiming, DtiAction, StaState},
    StaConfig,
};
use crate::{
    consts::BROADCAST_AID,
    phy::{DirectionalAntenna, Phy},
    time::{DelayNsExt, Duration, Instant},
    wire::AllocationType,
    MacError,
};

/// Walk the extended schedule at DTI entry and install an action for every
/// allocation that involves this station. Runs once per BI; duplicate
/// beacons never reach this point.
pub fn install_schedule(
    mac_state: &mut StaState,
    bi: &BiTiming,
    remaining_dti: Duration,
    now: Instant,
) {
    mac_state.sp_stations.clear();

    // A STA may only transmit within a CBAP under the AID rules below; with
    // the CBAP-only bit set (and not sourced) the whole DTI is one
    // contention period.
    if bi.cbap_only && !bi.cbap_source {
        info!("CBAP-only DTI");
        mac_state.timers.schedule_dti_event(
            now,
            DtiAction::StartContention {
                duration: remaining_dti,
            },
        );
        return;
    }

    for field in &bi.schedule {
        let start = now + field.allocation_start;
        let duration = field.allocation_block_duration;

        match field.allocation_type {
            AllocationType::ServicePeriod => {
                if field.source_aid == mac_state.aid {
                    let Some(destination) = mac_state.steering.aid_to_mac(field.destination_aid)
                    else {
                        warn!("No address known for AID {}", field.destination_aid);
                        continue;
                    };

                    if field.bf_control.beamform_training {
                        mac_state.timers.schedule_dti_event(
                            start,
                            DtiAction::InitiateBeamforming {
                                peer: destination,
                                initiator_txss: field.bf_control.initiator_txss,
                                duration,
                            },
                        );
                    } else {
                        if mac_state.sp_stations.push(destination).is_err() {
                            warn!("SP station list full, dropping {}", destination);
                        }
                        mac_state.timers.schedule_dti_event(
                            start,
                            DtiAction::StartServicePeriod {
                                peer: destination,
                                duration,
                                is_source: true,
                            },
                        );
                        mac_state
                            .timers
                            .schedule_dti_event(start + duration, DtiAction::EndServicePeriod);
                    }
                } else if field.source_aid == BROADCAST_AID
                    && field.destination_aid == BROADCAST_AID
                {
                    // Quiet period: the PCP/AP blocks this span of the BI
                    info!(
                        "No transmission allowed for {} from {}",
                        duration,
                        field.allocation_start
                    );
                } else if field.destination_aid == mac_state.aid
                    || field.destination_aid == BROADCAST_AID
                {
                    // Receive state for the duration of the SP
                    let Some(source) = mac_state.steering.aid_to_mac(field.source_aid) else {
                        warn!("No address known for AID {}", field.source_aid);
                        continue;
                    };

                    mac_state.timers.schedule_dti_event(
                        start,
                        DtiAction::StartServicePeriod {
                            peer: source,
                            duration,
                            is_source: false,
                        },
                    );
                    mac_state
                        .timers
                        .schedule_dti_event(start + duration, DtiAction::EndServicePeriod);
                }
            }
            AllocationType::Cbap => {
                if field.source_aid == BROADCAST_AID
                    || field.source_aid == mac_state.aid
                    || field.destination_aid == mac_state.aid
                {
                    mac_state
                        .timers
                        .schedule_dti_event(start, DtiAction::StartContention { duration });
                }
            }
        }
    }
}

/// Execute one scheduled allocation action.
pub async fn handle_dti_action<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    _handler: &MacHandler<'_>,
    action: DtiAction,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    match action {
        DtiAction::StartContention { duration } => {
            debug!("Starting contention period for {}", duration);
            phy.enable_contention_access();
            mac_state
                .timers
                .schedule_dti_event(now + duration, DtiAction::EndContention);
            Ok(())
        }
        DtiAction::EndContention => {
            phy.disable_contention_access();
            Ok(())
        }
        DtiAction::StartServicePeriod {
            peer,
            duration,
            is_source,
        } => {
            debug!("Starting service period with {} for {}", peer, duration);
            if is_source {
                // Transmissions inside the SP use the trained sector
                if let Some(best) = mac_state.steering.best_config(peer) {
                    debug_assert!(best.tx.is_trained());
                    let antenna = phy.antenna();
                    antenna.set_tx_sector(best.tx.sector);
                    antenna.set_tx_antenna(best.tx.antenna);
                } else {
                    warn!("Service period towards untrained peer {}", peer);
                }
                phy.enable_service_period_access();
            } else {
                // Receive state: point the receiver at the source
                match mac_state.steering.best_config(peer) {
                    Some(best) if best.rx.is_trained() => {
                        let antenna = phy.antenna();
                        antenna.set_rx_sector(best.rx.sector);
                        antenna.set_rx_antenna(best.rx.antenna);
                    }
                    _ => phy.antenna().set_omni_rx(),
                }
            }
            Ok(())
        }
        DtiAction::EndServicePeriod => {
            phy.disable_service_period_access();
            Ok(())
        }
        DtiAction::InitiateBeamforming {
            peer,
            initiator_txss,
            duration,
        } => {
            info!("Initiating beamforming with {}", peer);
            sls::start_initiator_sector_sweep(
                phy, mac_state, config, peer, initiator_txss, duration, now,
            )
            .await
        }
    }
}
