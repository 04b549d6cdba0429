use rand_core::RngCore;

use super::{
    commander::MacHandler,
    state::{StaState, Timers},
    StaConfig,
};
use crate::{
    phy::{AccessCategory, DirectionalAntenna, Phy},
    sap::StaEvent,
    time::{DelayNsExt, Duration, Instant},
    wire::{
        AssocRequest, AssocResponse, DmgCapabilities, Frame, FrameBody, Header, MacAddress,
        ProbeRequest, ProbeResponse,
    },
    AssociationState, MacError,
};

/// Drive the association machine towards ASSOCIATED if it is currently out
/// of a BSS. Every other state is already making progress (or, for REFUSED,
/// deliberately stuck) and is left alone.
pub async fn try_to_ensure_associated<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
) -> Result<(), MacError<P::Error>> {
    match mac_state.association {
        AssociationState::Associated => Ok(()),
        AssociationState::WaitProbeResp => {
            // A probe request is in flight; the probe timeout repeats it
            Ok(())
        }
        AssociationState::WaitAssocResp => {
            // Same, with the association timeout
            Ok(())
        }
        AssociationState::Refused => {
            // Terminal until association is restarted from outside
            Ok(())
        }
        AssociationState::BeaconMissed => {
            handler.emit(StaEvent::LinkDown);
            if mac_state.active_probing {
                set_state(mac_state, handler, AssociationState::WaitProbeResp);
                send_probe_request(phy, mac_state, config).await?;
            }
            Ok(())
        }
    }
}

pub async fn send_probe_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
) -> Result<(), MacError<P::Error>> {
    debug!("Sending probe request");
    let now = phy.now().await;

    let frame = Frame {
        header: Header {
            addr1: MacAddress::BROADCAST,
            addr2: config.address,
            addr3: MacAddress::BROADCAST,
            duration: Duration::ZERO,
        },
        body: FrameBody::ProbeRequest(ProbeRequest {
            ssid: config.ssid.clone(),
        }),
    };

    // Management frames go out over the contention machinery
    phy.queue_contention(frame, AccessCategory::BestEffort).await?;

    mac_state
        .timers
        .arm_probe_request(now + config.probe_request_timeout);
    Ok(())
}

pub async fn send_association_request<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
) -> Result<(), MacError<P::Error>> {
    let Some(bssid) = mac_state.bssid else {
        warn!("Cannot send an association request without a BSSID");
        return Ok(());
    };

    debug!("Sending association request to {}", bssid);
    let now = phy.now().await;

    let frame = Frame {
        header: Header {
            addr1: bssid,
            addr2: config.address,
            addr3: bssid,
            duration: Duration::ZERO,
        },
        body: FrameBody::AssocRequest(AssocRequest {
            ssid: config.ssid.clone(),
            capabilities: dmg_capabilities(phy, mac_state, config),
        }),
    };

    phy.queue_contention(frame, AccessCategory::BestEffort).await?;
    mac_state
        .timers
        .arm_assoc_request(now + config.assoc_request_timeout);

    // The station talks to the DMG AP only, steer towards it
    if let Some(best) = mac_state.steering.best_config(bssid) {
        let antenna = phy.antenna();
        antenna.set_tx_sector(best.tx.sector);
        antenna.set_tx_antenna(best.tx.antenna);
        if best.rx.is_trained() {
            antenna.set_rx_sector(best.rx.sector);
            antenna.set_rx_antenna(best.rx.antenna);
        }
    } else {
        warn!("No trained sector towards {} yet", bssid);
    }

    Ok(())
}

/// The DMG capabilities this station advertises.
fn dmg_capabilities<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &StaState,
    config: &StaConfig<Rng, Delay>,
) -> DmgCapabilities {
    let antenna = phy.antenna();
    DmgCapabilities {
        sta_address: config.address,
        aid: mac_state.aid,
        num_rx_antennas: antenna.num_antennas(),
        num_sectors: antenna.num_sectors(),
        rxss_length: antenna.num_sectors(),
        relay_capable: config.rds_activated,
    }
}

pub async fn probe_request_timeout<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    _now: Instant,
) -> Result<(), MacError<P::Error>> {
    set_state(mac_state, handler, AssociationState::WaitProbeResp);
    send_probe_request(phy, mac_state, config).await
}

pub async fn assoc_request_timeout<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    _now: Instant,
) -> Result<(), MacError<P::Error>> {
    set_state(mac_state, handler, AssociationState::WaitAssocResp);
    send_association_request(phy, mac_state, config).await
}

/// Extend (never shorten) the beacon watchdog and make sure it is armed.
pub fn restart_beacon_watchdog(timers: &mut Timers, now: Instant, delay: Duration) {
    timers.beacon_watchdog_end = timers.beacon_watchdog_end.max(now + delay);
    if timers.beacon_watchdog.is_none() {
        debug!("Arming beacon watchdog");
        timers.arm_beacon_watchdog(now + delay);
    }
}

/// The watchdog fired. If the deadline was pushed out since it was armed,
/// re-arm for the remainder; otherwise the beacons are gone.
pub async fn missed_beacons<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    if mac_state.timers.beacon_watchdog_end > now {
        let deadline = mac_state.timers.beacon_watchdog_end;
        mac_state.timers.arm_beacon_watchdog(deadline);
        return Ok(());
    }

    debug!("Beacon missed");
    set_state(mac_state, handler, AssociationState::BeaconMissed);
    try_to_ensure_associated(phy, mac_state, config, handler).await
}

pub async fn handle_probe_response<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    header: &Header,
    response: &ProbeResponse,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    if mac_state.association != AssociationState::WaitProbeResp {
        return Ok(());
    }
    if response.ssid != config.ssid {
        // Not a probe response for our SSID
        return Ok(());
    }

    mac_state.bssid = Some(header.addr3);
    restart_beacon_watchdog(
        &mut mac_state.timers,
        now,
        response.beacon_interval * config.max_missed_beacons as i64,
    );
    mac_state.timers.probe_request = None;
    set_state(mac_state, handler, AssociationState::WaitAssocResp);
    send_association_request(phy, mac_state, config).await
}

pub async fn handle_assoc_response<P: Phy>(
    _phy: &mut P,
    mac_state: &mut StaState,
    handler: &MacHandler<'_>,
    header: &Header,
    response: &AssocResponse,
) -> Result<(), MacError<P::Error>> {
    if mac_state.association != AssociationState::WaitAssocResp {
        return Ok(());
    }

    mac_state.timers.assoc_request = None;

    if response.status.is_success() {
        mac_state.aid = response.aid;
        set_state(mac_state, handler, AssociationState::Associated);
        debug!("Association completed with {}", header.addr1);
        handler.emit(StaEvent::LinkUp);
    } else {
        debug!("Association refused");
        set_state(mac_state, handler, AssociationState::Refused);
    }

    Ok(())
}

/// Change the association state, tracing the edges in and out of ASSOCIATED.
pub fn set_state(mac_state: &mut StaState, handler: &MacHandler<'_>, value: AssociationState) {
    let previous = mac_state.association;
    mac_state.association = value;

    let bssid = mac_state.bssid.unwrap_or(MacAddress::BROADCAST);
    if value == AssociationState::Associated && previous != AssociationState::Associated {
        handler.emit(StaEvent::Assoc { bssid });
    } else if value != AssociationState::Associated && previous == AssociationState::Associated {
        handler.emit(StaEvent::DeAssoc { bssid });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_deadline_is_monotone() {
        let mut timers = Timers::new();
        let t0 = Instant::from_micros(1_000_000);

        restart_beacon_watchdog(&mut timers, t0, Duration::from_millis(300));
        let first_end = timers.beacon_watchdog_end;
        assert_eq!(first_end, t0 + Duration::from_millis(300));

        // A shorter restart must not pull the deadline in
        restart_beacon_watchdog(&mut timers, t0, Duration::from_millis(100));
        assert_eq!(timers.beacon_watchdog_end, first_end);

        // A longer one pushes it out
        restart_beacon_watchdog(&mut timers, t0, Duration::from_millis(500));
        assert!(timers.beacon_watchdog_end > first_end);
    }

    #[test]
    fn watchdog_arms_only_once() {
        let mut timers = Timers::new();
        let t0 = Instant::from_micros(1_000_000);

        restart_beacon_watchdog(&mut timers, t0, Duration::from_millis(300));
        let armed = timers.beacon_watchdog;
        assert!(armed.is_some());

        // While armed, restarts only move the high-water mark
        restart_beacon_watchdog(&mut timers, t0, Duration::from_millis(600));
        assert_eq!(timers.beacon_watchdog, armed);
    }
}
