use rand_core::RngCore;

use super::{association, beacon_interval, commander::MacHandler, relay, sls, state::StaState, StaConfig};
use crate::{
    phy::{Phy, ReceivedFrame},
    sap::StaEvent,
    time::DelayNsExt,
    wire::{ActionFrame, FrameBody, Header, MsduPayload, QosData},
    MacError,
};

/// Classify an inbound frame and route it to the state machine it feeds.
pub async fn handle_frame<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    received: ReceivedFrame,
) -> Result<(), MacError<P::Error>> {
    let ReceivedFrame {
        frame,
        rx_snr,
        timestamp: now,
    } = received;
    let header = frame.header;

    if header.addr3 == config.address {
        // One of our own transmissions echoed back
        trace!("Frame sent by us, dropping");
        return Ok(());
    }

    let is_beacon = matches!(frame.body, FrameBody::Beacon(_));
    if header.addr1 != config.address && !header.addr1.is_group() && !is_beacon {
        trace!("Frame is not for us, dropping");
        return Ok(());
    }

    match frame.body {
        FrameBody::QosData(data) => {
            if !mac_state.is_associated() && Some(header.addr2) != mac_state.bssid {
                trace!("Data frame while not associated, dropping");
                return Ok(());
            }
            forward_up(mac_state, handler, &header, data);
            Ok(())
        }
        FrameBody::QosNull => Ok(()),

        FrameBody::ProbeRequest(_) | FrameBody::AssocRequest(_) | FrameBody::Spr(_) => {
            // Frames aimed at the PCP/AP
            trace!("AP-bound frame, dropping");
            Ok(())
        }

        FrameBody::Action(action) | FrameBody::ActionNoAck(action) => match action {
            ActionFrame::Dmg(dmg) => {
                relay::handle_dmg_action(phy, mac_state, config, handler, &header, dmg).await
            }
            ActionFrame::Other { category } => {
                // Non-DMG categories belong to the adjacent subsystems
                trace!("Delegating action frame of category {}", category);
                Ok(())
            }
        },

        FrameBody::Ssw(ssw) => {
            sls::handle_ssw(mac_state, &header, &ssw, rx_snr, now);
            Ok(())
        }
        FrameBody::SswFbck(fbck) => {
            sls::handle_ssw_fbck(mac_state, handler, &header, &fbck, now);
            Ok(())
        }
        FrameBody::SswAck(_) => {
            sls::handle_ssw_ack(mac_state, handler, &header);
            Ok(())
        }

        FrameBody::Poll => relay::send_spr(phy, mac_state, config.address, header.addr2).await,
        FrameBody::Grant => {
            trace!("Received grant frame from {}", header.addr2);
            Ok(())
        }

        FrameBody::Beacon(beacon) => {
            beacon_interval::handle_beacon(mac_state, &header, &beacon, rx_snr);
            Ok(())
        }

        FrameBody::ProbeResponse(response) => {
            association::handle_probe_response(
                phy, mac_state, config, handler, &header, &response, now,
            )
            .await
        }
        FrameBody::AssocResponse(response) => {
            association::handle_assoc_response(phy, mac_state, handler, &header, &response).await
        }
    }
}

/// Hand received MSDUs to the upper layer, deaggregating A-MSDUs.
fn forward_up(mac_state: &StaState, handler: &MacHandler<'_>, header: &Header, data: QosData) {
    match data.payload {
        MsduPayload::Single(payload) => {
            handler.emit(StaEvent::Data {
                source: header.addr3,
                destination: header.addr1,
                payload,
            });
        }
        MsduPayload::Aggregate(subframes) => {
            debug_assert!(Some(header.addr3) == mac_state.bssid);
            for payload in subframes {
                handler.emit(StaEvent::Data {
                    source: header.addr3,
                    destination: header.addr1,
                    payload,
                });
            }
        }
    }
}
