use heapless::Vec;
use rand_core::RngCore;

use super::{commander::MacHandler, state::StaState, StaConfig};
use crate::{
    phy::{AccessCategory, Phy},
    sap::StaEvent,
    time::{DelayNsExt, Duration},
    wire::{
        action::{encode_measured_snr, MAX_RELAY_CANDIDATES},
        ActionFrame, ChannelMeasurement, DmgAction, Frame, FrameBody, Header, MacAddress,
        SprFrame,
    },
    MacError, RelayRole,
};

/// Dialog token used for the RLS setup leg, matching the token the original
/// procedure opens with.
const RLS_DIALOG_TOKEN: u8 = 10;

/// Begin relay discovery towards `destination` as the source REDS. If the
/// peer's capabilities are unknown, ask the PCP/AP first; the procedure
/// resumes when the Information Response arrives.
pub async fn do_relay_discovery<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    destination: MacAddress,
) -> Result<(), MacError<P::Error>> {
    info!("Starting relay discovery towards {}", destination);
    mac_state.relay.dst_reds_address = Some(destination);
    mac_state.relay.waiting_destination_reds_reports = false;

    if let Some(info) = mac_state.station_info.get(&destination).copied() {
        mac_state.relay.dst_reds_aid = info.aid;
        mac_state.relay.role = RelayRole::SourceReds;
        send_relay_search_request(phy, mac_state, config, 0, info.aid).await
    } else {
        mac_state.relay.pending_discovery = Some(destination);
        send_information_request(phy, mac_state, config, destination).await
    }
}

/// Ask the PCP/AP for the capabilities of `subject`.
pub async fn send_information_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    subject: MacAddress,
) -> Result<(), MacError<P::Error>> {
    let Some(bssid) = mac_state.bssid else {
        warn!("Cannot request information without a BSSID");
        return Ok(());
    };

    debug!("Requesting information about {}", subject);
    queue_action(
        phy,
        config.address,
        bssid,
        DmgAction::InformationRequest {
            subject_address: subject,
        },
    )
    .await
}

async fn send_relay_search_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    dialog_token: u8,
    destination_aid: u8,
) -> Result<(), MacError<P::Error>> {
    let Some(bssid) = mac_state.bssid else {
        warn!("Cannot search for relays without a BSSID");
        return Ok(());
    };

    debug!("Sending relay search request for AID {}", destination_aid);
    queue_action(
        phy,
        config.address,
        bssid,
        DmgAction::RelaySearchRequest {
            dialog_token,
            destination_aid,
        },
    )
    .await
}

async fn send_measurement_request<P: Phy>(
    phy: &mut P,
    own_address: MacAddress,
    to: MacAddress,
) -> Result<(), MacError<P::Error>> {
    debug!("Sending channel measurement request to {}", to);
    queue_action(
        phy,
        own_address,
        to,
        DmgAction::MultiRelayChannelMeasurementRequest { dialog_token: 1 },
    )
    .await
}

async fn send_rls_request<P: Phy>(
    phy: &mut P,
    own_address: MacAddress,
    to: MacAddress,
    dialog_token: u8,
    source_aid: u8,
    relay_aid: u8,
    destination_aid: u8,
) -> Result<(), MacError<P::Error>> {
    debug!("Sending RLS request to {}", to);
    queue_action(
        phy,
        own_address,
        to,
        DmgAction::RlsRequest {
            dialog_token,
            source_aid,
            relay_aid,
            destination_aid,
        },
    )
    .await
}

async fn send_rls_response<P: Phy>(
    phy: &mut P,
    own_address: MacAddress,
    to: MacAddress,
    dialog_token: u8,
) -> Result<(), MacError<P::Error>> {
    debug!("Sending RLS response to {}", to);
    queue_action(
        phy,
        own_address,
        to,
        DmgAction::RlsResponse {
            dialog_token,
            relay_status: 0,
            destination_status: 0,
        },
    )
    .await
}

/// Route a received DMG action frame. An unsupported subtype is a fatal
/// protocol error by design.
pub async fn handle_dmg_action<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    header: &Header,
    action: DmgAction,
) -> Result<(), MacError<P::Error>> {
    let sender = header.addr2;

    match action {
        DmgAction::RelaySearchResponse {
            relay_capable_list, ..
        } => {
            debug!(
                "Relay search response with {} candidates",
                relay_capable_list.len()
            );
            mac_state.relay.rds_list = relay_capable_list;

            if mac_state.relay.role == RelayRole::SourceReds {
                // Measure the channel towards every candidate RDS
                let candidates = mac_state.relay.rds_list.clone();
                for candidate in &candidates {
                    let Some(address) = mac_state.steering.aid_to_mac(candidate.aid) else {
                        warn!("No address known for candidate AID {}", candidate.aid);
                        continue;
                    };
                    send_measurement_request(phy, config.address, address).await?;
                }
            }
            Ok(())
        }

        DmgAction::MultiRelayChannelMeasurementRequest { dialog_token } => {
            info!("Received channel measurement request from {}", sender);
            let measurements = build_measurement_report(mac_state, sender);
            queue_action(
                phy,
                config.address,
                sender,
                DmgAction::MultiRelayChannelMeasurementReport {
                    dialog_token,
                    measurements,
                },
            )
            .await
        }

        DmgAction::MultiRelayChannelMeasurementReport { measurements, .. } => {
            if mac_state.relay.role == RelayRole::SourceReds {
                if !mac_state.relay.waiting_destination_reds_reports {
                    // Candidate reports are in; measure towards the
                    // destination REDS next
                    mac_state.relay.waiting_destination_reds_reports = true;
                    if let Some(destination) = mac_state.relay.dst_reds_address {
                        send_measurement_request(phy, config.address, destination).await?;
                    }
                } else {
                    // The destination's report closes the measurement phase.
                    // The fold leaves the last listed RDS selected.
                    for measurement in &measurements {
                        mac_state.relay.selected_relay_aid = measurement.peer_aid;
                    }

                    let selected = mac_state.relay.selected_relay_aid;
                    mac_state.relay.selected_relay_address =
                        mac_state.steering.aid_to_mac(selected);

                    if let Some(relay_address) = mac_state.relay.selected_relay_address {
                        info!("Selected relay AID {}, setting up RLS", selected);
                        send_rls_request(
                            phy,
                            config.address,
                            relay_address,
                            RLS_DIALOG_TOKEN,
                            mac_state.aid,
                            selected,
                            mac_state.relay.dst_reds_aid,
                        )
                        .await?;
                    } else {
                        warn!("No address known for selected relay AID {}", selected);
                    }
                }
                handler.emit(StaEvent::ChannelReportReceived { peer: sender });
            }
            Ok(())
        }

        DmgAction::RlsRequest {
            dialog_token,
            source_aid,
            relay_aid,
            destination_aid,
        } => {
            if mac_state.relay.rds_activated {
                info!("RLS request from source REDS {}, forwarding", sender);
                mac_state.relay.src_reds_address = Some(sender);
                let Some(destination) = mac_state.steering.aid_to_mac(destination_aid) else {
                    warn!("No address known for destination AID {}", destination_aid);
                    return Ok(());
                };
                send_rls_request(
                    phy,
                    config.address,
                    destination,
                    dialog_token,
                    source_aid,
                    relay_aid,
                    destination_aid,
                )
                .await
            } else {
                info!("RLS request from RDS {}, responding", sender);
                mac_state.relay.role = RelayRole::DestinationReds;
                mac_state.relay.selected_relay_address = Some(sender);
                mac_state.relay.relay_mode = true;
                send_rls_response(phy, config.address, sender, dialog_token).await
            }
        }

        DmgAction::RlsResponse {
            dialog_token,
            relay_status,
            destination_status,
        } => {
            if mac_state.relay.rds_activated {
                info!("RLS response from destination REDS, forwarding to source");
                let Some(source) = mac_state.relay.src_reds_address else {
                    warn!("RLS response without a pending request");
                    return Ok(());
                };
                mac_state.relay.relay_mode = true;
                send_rls_response(phy, config.address, source, dialog_token).await
            } else {
                if relay_status == 0 && destination_status == 0 {
                    // This station is the source REDS; announce the link
                    mac_state.relay.relay_mode = true;
                    info!("Relay link setup succeeded, announcing to the PCP/AP");
                    if let Some(bssid) = mac_state.bssid {
                        queue_action(
                            phy,
                            config.address,
                            bssid,
                            DmgAction::RlsAnnouncement {
                                destination_aid: mac_state.relay.dst_reds_aid,
                                relay_aid: mac_state.relay.selected_relay_aid,
                                source_aid: mac_state.aid,
                            },
                        )
                        .await?;
                    }
                }
                Ok(())
            }
        }

        DmgAction::InformationResponse {
            subject_address,
            capabilities,
        } => {
            if subject_address.is_broadcast() {
                // Information about all associated stations; nothing stored
                return Ok(());
            }

            debug!("Information response about {}", subject_address);
            if mac_state
                .station_info
                .insert(subject_address, capabilities)
                .is_err()
            {
                warn!("Station info table full, dropping {}", subject_address);
            }
            mac_state
                .steering
                .map_aid(capabilities.aid, subject_address);

            // A relay discovery suspended on this peer resumes here
            if mac_state.relay.pending_discovery == Some(subject_address) {
                mac_state.relay.pending_discovery = None;
                mac_state.relay.dst_reds_aid = capabilities.aid;
                mac_state.relay.role = RelayRole::SourceReds;
                send_relay_search_request(phy, mac_state, config, 0, capabilities.aid).await?;
            }
            Ok(())
        }

        // These subtypes terminate at the PCP/AP; a station receiving one is
        // talking to a peer it cannot model.
        other @ (DmgAction::InformationRequest { .. }
        | DmgAction::RelaySearchRequest { .. }
        | DmgAction::RlsAnnouncement { .. }) => Err(MacError::UnsupportedDmgAction {
            action: other.action_code(),
        }),

        DmgAction::Unsupported { action } => Err(MacError::UnsupportedDmgAction { action }),
    }
}

/// Build the measurement entries for a Channel Measurement Report. An RDS
/// reports the link towards the requesting source REDS; a destination REDS
/// reports the links towards every RDS it knows of.
fn build_measurement_report(
    mac_state: &StaState,
    requester: MacAddress,
) -> Vec<ChannelMeasurement, MAX_RELAY_CANDIDATES> {
    let mut measurements = Vec::new();

    let snr_towards = |address: MacAddress| {
        mac_state
            .steering
            .best_tx_config(address)
            .map(|(_, snr)| snr)
            .unwrap_or(0.0)
    };

    if mac_state.relay.rds_activated {
        let _ = measurements.push(ChannelMeasurement {
            peer_aid: 0,
            snr: encode_measured_snr(snr_towards(requester)),
        });
    } else {
        for rds in &mac_state.relay.rds_list {
            let address = mac_state
                .steering
                .aid_to_mac(rds.aid)
                .unwrap_or(requester);
            let _ = measurements.push(ChannelMeasurement {
                peer_aid: rds.aid,
                snr: encode_measured_snr(snr_towards(address)),
            });
        }
    }

    measurements
}

/// Answer a Poll frame from the PCP/AP with a service period request on the
/// ATI queue.
pub async fn send_spr<P: Phy>(
    phy: &mut P,
    mac_state: &StaState,
    own_address: MacAddress,
    to: MacAddress,
) -> Result<(), MacError<P::Error>> {
    debug!("Sending SPR to {}", to);

    let frame = Frame {
        header: Header {
            addr1: to,
            addr2: own_address,
            addr3: MacAddress([0; 6]),
            duration: Duration::ZERO,
        },
        body: FrameBody::Spr(SprFrame {
            source_aid: mac_state.aid,
            allocation_duration: Duration::from_micros(32_000),
        }),
    };

    phy.queue_ati(frame).await?;
    Ok(())
}

async fn queue_action<P: Phy>(
    phy: &mut P,
    own_address: MacAddress,
    to: MacAddress,
    action: DmgAction,
) -> Result<(), MacError<P::Error>> {
    let frame = Frame {
        header: Header {
            addr1: to,
            addr2: own_address,
            addr3: to,
            duration: Duration::ZERO,
        },
        body: FrameBody::Action(ActionFrame::Dmg(action)),
    };

    phy.queue_contention(frame, AccessCategory::BestEffort).await?;
    Ok(())
}
