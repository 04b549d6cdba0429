use embassy_futures::select::{select, Either};
use rand_core::RngCore;

mod association;
mod beacon_interval;
mod commander;
mod dti;
mod relay;
mod rx;
mod sls;
mod state;

pub use commander::StaCommander;
use commander::{MacHandler, RequestResponder};
use state::{StaState, TimerEvent};

use crate::{
    phy::{AccessCategory, Phy, ReceivedFrame},
    sap::{
        EnqueueConfirm, EnqueueRequest, EnsureAssociatedConfirm, EnsureAssociatedRequest,
        RelayDiscoveryConfirm, RelayDiscoveryRequest, RequestInformationConfirm,
        RequestInformationRequest, RequestValue, SetActiveProbingConfirm, SetActiveProbingRequest,
        Status, StatusConfirm, StatusRequest,
    },
    time::{DelayNsExt, Duration, Instant},
    wire::{Frame, FrameBody, Header, MacAddress, MsduPayload, QosData, Ssid},
    AccessPeriod, MacError,
};

/// Configuration of the station MAC.
#[derive(Debug, Clone)]
pub struct StaConfig<Rng: RngCore, Delay: DelayNsExt> {
    /// The MAC address of this station.
    pub address: MacAddress,
    /// The SSID probing and association look for.
    pub ssid: Ssid,
    /// The interval between two consecutive probe request attempts.
    pub probe_request_timeout: Duration,
    /// The interval between two consecutive association request attempts.
    pub assoc_request_timeout: Duration,
    /// Number of consecutively missed beacons before association restarts.
    pub max_missed_beacons: u32,
    /// If true, unsolicited probe requests are sent.
    pub active_probing: bool,
    /// If true, this station serves as a relay DMG station.
    pub rds_activated: bool,
    pub rng: Rng,
    pub delay: Delay,
}

impl<Rng: RngCore, Delay: DelayNsExt> StaConfig<Rng, Delay> {
    pub fn new(address: MacAddress, ssid: Ssid, rng: Rng, delay: Delay) -> Self {
        Self {
            address,
            ssid,
            probe_request_timeout: Duration::from_millis(50),
            assoc_request_timeout: Duration::from_millis(500),
            max_missed_beacons: 10,
            active_probing: false,
            rds_activated: false,
            rng,
            delay,
        }
    }
}

/// Run the MAC layer of a non-AP DMG station.
///
/// This is an async function that should always be polled in the background.
/// The given [StaCommander] is the method of communicating with the MAC.
///
/// The function only returns on a fatal protocol error; PHY errors are
/// logged and operation continues.
pub async fn run_sta_engine<Rng: RngCore, Delay: DelayNsExt, P: Phy>(
    mut phy: P,
    commander: &StaCommander,
    mut config: StaConfig<Rng, Delay>,
) -> MacError<P::Error> {
    let handler = commander.get_handler();
    let mut mac_state = StaState::new(&config);

    // A station powers up into the BTI, listening omni for a DMG beacon.
    beacon_interval::start_bti(&mut phy, &mut mac_state);

    if config.active_probing {
        if let Err(e) =
            association::try_to_ensure_associated(&mut phy, &mut mac_state, &config, &handler)
                .await
        {
            error!("Initial association attempt failed: {:?}", e);
        }
    }

    loop {
        let mut delay = config.delay.clone();

        let result = select(
            wait_for_mac_event(&mut phy, &mac_state, &mut delay),
            handler.wait_for_request(),
        )
        .await;

        let outcome = match result {
            Either::First(event) => {
                handle_mac_event(event, &mut phy, &mut mac_state, &mut config, &handler).await
            }
            Either::Second(responder) => {
                handle_request(responder, &mut phy, &mut mac_state, &mut config, &handler).await
            }
        };

        match outcome {
            Ok(()) => {}
            Err(MacError::PhyError(e)) => {
                error!("PHY error: {:?}", e);
            }
            Err(fatal @ MacError::UnsupportedDmgAction { .. }) => {
                error!("Fatal MAC error: {:?}", fatal);
                return fatal;
            }
        }
    }
}

enum MacEvent<P: Phy> {
    Frame(ReceivedFrame),
    Timer { at: Instant, event: TimerEvent },
    PhyError(P::Error),
}

/// Wait for a frame or the earliest pending deadline, whichever comes first.
/// Cancel-safe: dropping this future between polls loses nothing, the timers
/// live in the state and are recomputed on the next call.
async fn wait_for_mac_event<P: Phy>(
    phy: &mut P,
    mac_state: &StaState,
    delay: &mut impl DelayNsExt,
) -> MacEvent<P> {
    let now = phy.now().await;

    let timer = wait_for_timer(mac_state, now, delay);
    let radio = phy.wait();

    match select(radio, timer).await {
        Either::First(Ok(frame)) => MacEvent::Frame(frame),
        Either::First(Err(e)) => MacEvent::PhyError(e),
        Either::Second(timer_event) => timer_event,
    }
}

async fn wait_for_timer<P: Phy>(
    mac_state: &StaState,
    now: Instant,
    delay: &mut impl DelayNsExt,
) -> MacEvent<P> {
    match mac_state.timers.next() {
        Some((at, event)) => {
            delay.delay_until(now, at).await;
            MacEvent::Timer { at, event }
        }
        None => core::future::pending().await,
    }
}

async fn handle_mac_event<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    event: MacEvent<P>,
    phy: &mut P,
    mac_state: &mut StaState,
    config: &mut StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
) -> Result<(), MacError<P::Error>> {
    match event {
        MacEvent::PhyError(e) => Err(e.into()),
        MacEvent::Frame(frame) => rx::handle_frame(phy, mac_state, config, handler, frame).await,
        MacEvent::Timer { at, event } => {
            mac_state.timers.acknowledge(at, event);
            dispatch_timer(phy, mac_state, config, handler, event, at).await
        }
    }
}

async fn dispatch_timer<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &mut StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    event: TimerEvent,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    match event {
        TimerEvent::NextBti => {
            beacon_interval::start_bti(phy, mac_state);
            Ok(())
        }
        TimerEvent::AbftStart => {
            beacon_interval::start_abft(mac_state, config, now);
            Ok(())
        }
        TimerEvent::AbftFallback => {
            // A fallback landing after the A-BFT closed has nothing to retry
            if mac_state.access_period == AccessPeriod::Abft {
                beacon_interval::start_abft(mac_state, config, now);
            }
            Ok(())
        }
        TimerEvent::RssSlot => sls::start_abft_rss(phy, mac_state, config, now).await,
        TimerEvent::NextPeriod(state::PeriodStart::Ati) => {
            beacon_interval::start_ati(phy, mac_state, now);
            Ok(())
        }
        TimerEvent::NextPeriod(state::PeriodStart::Dti) => {
            beacon_interval::start_dti(phy, mac_state, config, handler, now).await
        }
        TimerEvent::Dti(action) => {
            dti::handle_dti_action(phy, mac_state, config, handler, action, now).await
        }
        TimerEvent::SswStep => sls::continue_sweep(phy, mac_state, config, now).await,
        TimerEvent::RssStart(peer) => {
            // The initiator's sweep ended; answer it with a 300 us responder sweep
            sls::start_responder_sector_sweep(
                phy,
                mac_state,
                config,
                peer,
                true,
                Duration::from_micros(300),
                now,
            )
            .await
        }
        TimerEvent::SendSswFbck(peer) => sls::send_ssw_fbck(phy, mac_state, config, peer, now).await,
        TimerEvent::SendSswAck(peer) => {
            sls::send_ssw_ack(phy, mac_state, config, handler, peer, now).await
        }
        TimerEvent::ProbeTimeout => {
            association::probe_request_timeout(phy, mac_state, config, handler, now).await
        }
        TimerEvent::AssocTimeout => {
            association::assoc_request_timeout(phy, mac_state, config, handler, now).await
        }
        TimerEvent::BeaconWatchdog => {
            association::missed_beacons(phy, mac_state, config, handler, now).await
        }
    }
}

async fn handle_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    responder: RequestResponder<'_, RequestValue>,
    phy: &mut P,
    mac_state: &mut StaState,
    config: &mut StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
) -> Result<(), MacError<P::Error>> {
    match &responder.request {
        RequestValue::EnsureAssociatedRequest(_) => {
            let responder = responder.into_concrete::<EnsureAssociatedRequest>();
            let result =
                association::try_to_ensure_associated(phy, mac_state, config, handler).await;
            responder.respond(EnsureAssociatedConfirm);
            result
        }
        RequestValue::SetActiveProbingRequest(_) => {
            let responder = responder.into_concrete::<SetActiveProbingRequest>();
            let enable = responder.request.enable;
            mac_state.active_probing = enable;
            let result = if enable {
                association::try_to_ensure_associated(phy, mac_state, config, handler).await
            } else {
                mac_state.timers.probe_request = None;
                Ok(())
            };
            responder.respond(SetActiveProbingConfirm);
            result
        }
        RequestValue::EnqueueRequest(_) => {
            process_enqueue_request(responder.into_concrete(), phy, mac_state, config, handler)
                .await
        }
        RequestValue::RequestInformationRequest(_) => {
            let responder = responder.into_concrete::<RequestInformationRequest>();
            let subject = responder.request.subject;
            let result = relay::send_information_request(phy, mac_state, config, subject).await;
            responder.respond(RequestInformationConfirm);
            result
        }
        RequestValue::RelayDiscoveryRequest(_) => {
            let responder = responder.into_concrete::<RelayDiscoveryRequest>();
            let destination = responder.request.destination;
            let result = relay::do_relay_discovery(phy, mac_state, config, destination).await;
            responder.respond(RelayDiscoveryConfirm {
                status: Status::Success,
            });
            result
        }
        RequestValue::StatusRequest(_) => {
            let responder = responder.into_concrete::<StatusRequest>();
            responder.respond(StatusConfirm {
                state: mac_state.association,
                aid: mac_state.aid,
                bssid: mac_state.bssid,
                access_period: mac_state.access_period,
                relay_mode: mac_state.relay.relay_mode,
                direct_peers: mac_state.data_forwarding.clone(),
            });
            Ok(())
        }
    }
}

/// Submit an MSDU for transmission. Unassociated stations drop the frame and
/// kick the association machinery instead.
async fn process_enqueue_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    responder: RequestResponder<'_, EnqueueRequest>,
    phy: &mut P,
    mac_state: &mut StaState,
    config: &mut StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
) -> Result<(), MacError<P::Error>> {
    let EnqueueRequest {
        destination,
        tid,
        payload,
    } = responder.request.clone();

    if !mac_state.is_associated() {
        trace!("Dropping MSDU to {}: not associated", destination);
        let result = association::try_to_ensure_associated(phy, mac_state, config, handler).await;
        responder.respond(EnqueueConfirm {
            status: Status::NotAssociated,
        });
        return result;
    }

    let Some(bssid) = mac_state.bssid else {
        responder.respond(EnqueueConfirm {
            status: Status::NotAssociated,
        });
        return Ok(());
    };

    // A TID above 7 means the MSDU carried no QoS tag; use best effort
    let tid = if tid > 7 { 0 } else { tid };

    // Direct links established through SLS bypass the PCP/AP
    let header = if mac_state.is_direct_peer(destination) {
        Header {
            addr1: destination,
            addr2: config.address,
            addr3: bssid,
            duration: Duration::ZERO,
        }
    } else {
        Header {
            addr1: bssid,
            addr2: config.address,
            addr3: destination,
            duration: Duration::ZERO,
        }
    };

    let frame = Frame {
        header,
        body: FrameBody::QosData(QosData {
            tid,
            payload: MsduPayload::Single(payload),
        }),
    };

    if mac_state.is_sp_station(destination) {
        debug_assert!(
            mac_state
                .steering
                .best_config(destination)
                .is_some_and(|best| best.tx.is_trained()),
            "SP transmission towards an untrained peer"
        );
        phy.queue_service_period(frame).await?;
    } else {
        phy.queue_contention(frame, AccessCategory::from_tid(tid)).await?;
    }

    responder.respond(EnqueueConfirm {
        status: Status::Success,
    });
    Ok(())
}
