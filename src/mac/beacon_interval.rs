use rand_core::RngCore;

use super::{
    association,
    commander::MacHandler,
    dti,
    state::{BiTiming, PeriodStart, StaState},
    StaConfig,
};
use crate::{
    consts::{sector_sweep_slot_time, MBIFS},
    phy::{DirectionalAntenna, Phy},
    time::{DelayNsExt, Instant},
    wire::{DmgBeacon, Header},
    AccessPeriod, AssociationState, MacError,
};

/// Enter the beacon transmission interval. All channel access closes, the
/// antenna goes quasi-omni, and the per-BI bookkeeping resets.
pub fn start_bti<P: Phy>(phy: &mut P, mac_state: &mut StaState) {
    info!("Starting BTI");
    mac_state.access_period = AccessPeriod::Bti;

    mac_state.scheduled_period_after_abft = false;
    mac_state.sector_feedback_sent.clear();
    mac_state.timers.clear_dti_events();

    phy.disable_contention_access();
    phy.disable_service_period_access();
    if mac_state.relay.rds_activated {
        phy.suspend_rds_operation();
    }

    phy.antenna().set_omni_rx();
}

/// Process a received DMG beacon. The first beacon of a BI installs the
/// timing snapshot and the A-BFT; every beacon feeds the SNR map with the
/// sector it was swept over.
pub fn handle_beacon(mac_state: &mut StaState, header: &Header, beacon: &DmgBeacon, rx_snr: f32) {
    trace!("Received DMG beacon with BSSID {}", header.addr1);

    if !mac_state.received_dmg_beacon {
        mac_state.received_dmg_beacon = true;
        mac_state.steering.clear_snr(header.addr1);

        let bic = &beacon.bi_control;
        let abft_duration = sector_sweep_slot_time(bic.fss) * bic.abft_length as i64;
        let ati_duration = beacon.next_ati.ati_duration;
        let bti_duration =
            beacon.operation.min_bhi_duration - abft_duration - ati_duration - 2 * MBIFS;
        // The duration field of a beacon covers the rest of the BTI
        let bti_started = beacon.timestamp + header.duration - bti_duration;

        debug!(
            "BTI started at {}, BTI {}, beacon interval {}",
            bti_started.ticks(),
            bti_duration,
            beacon.beacon_interval
        );

        if bic.cc_present && bic.discovery_mode {
            // A-BFT participation is restricted while the AP is in discovery
            // mode; sit this interval out.
            debug!("Discovery mode beacon, skipping A-BFT");
        } else if bic.n_bi == 1 {
            let abft_start = bti_started + bti_duration + MBIFS;
            mac_state.bssid = Some(header.addr1);
            mac_state.slot_index = 0;
            mac_state.remaining_slots = bic.abft_length;
            mac_state.timers.arm_abft_start(abft_start);
            debug!("A-BFT scheduled at {}", abft_start.ticks());
        }

        mac_state.bi = Some(BiTiming {
            bti_started,
            bti_duration,
            abft_duration,
            ati_duration,
            beacon_interval: beacon.beacon_interval,
            ss_slots_per_abft: bic.abft_length,
            ss_frames_per_slot: bic.fss,
            responder_txss: bic.is_responder_txss,
            ati_present: bic.ati_present,
            cbap_only: beacon.parameters.cbap_only,
            cbap_source: beacon.parameters.cbap_source,
            schedule: beacon.schedule.clone(),
        });
    }

    // Every beacon maps the swept sector to the SNR it arrived with
    mac_state.steering.map_tx_snr(
        header.addr1,
        beacon.sector_sweep.sector_id,
        beacon.sector_sweep.antenna_id,
        rx_snr,
    );
}

/// Enter (or re-enter, after a detected collision) the A-BFT. Draws a
/// responder slot uniformly over the slots still ahead and installs the
/// collision fallback one slot after it.
pub fn start_abft<Rng: RngCore, Delay: DelayNsExt>(
    mac_state: &mut StaState,
    config: &mut StaConfig<Rng, Delay>,
    now: Instant,
) {
    let Some(bi) = mac_state.bi.clone() else {
        // No beacon received this BI, nothing to train against
        return;
    };

    info!("Starting A-BFT");
    mac_state.access_period = AccessPeriod::Abft;

    let slot_time = sector_sweep_slot_time(bi.ss_frames_per_slot);

    if mac_state.remaining_slots > 0 {
        let draw = config.rng.next_u32() % mac_state.remaining_slots as u32;
        mac_state.slot_index = draw as u8;

        let rss_at = now + slot_time * mac_state.slot_index as i64;
        mac_state.timers.arm_rss_slot(rss_at);
        debug!(
            "Chose sector slot index {}, RSS at {}",
            mac_state.slot_index,
            rss_at.ticks()
        );
    } else {
        debug!("No A-BFT slots left, waiting for the next BI");
    }

    if !mac_state.scheduled_period_after_abft {
        let next_at = now + bi.abft_duration;
        let next = if bi.ati_present {
            PeriodStart::Ati
        } else {
            PeriodStart::Dti
        };
        mac_state.timers.arm_next_period(next_at, next);
        mac_state.scheduled_period_after_abft = true;
    }

    if mac_state.remaining_slots > 0 {
        // Missing SSW-FBCK by the end of our slot means we collided
        let timeout = slot_time * (mac_state.slot_index + 1) as i64;
        mac_state.timers.arm_abft_fallback(now + timeout);
        mac_state.remaining_slots -= mac_state.slot_index + 1;
    }
}

/// Enter the announcement transmission interval and hand it to the ATI
/// contention handler.
pub fn start_ati<P: Phy>(phy: &mut P, mac_state: &mut StaState, now: Instant) {
    info!("Starting ATI");
    mac_state.access_period = AccessPeriod::Ati;
    mac_state.scheduled_period_after_abft = false;

    // Stay omni, announcement traffic can come over any sector
    phy.antenna().set_omni_rx();

    let Some(bi) = &mac_state.bi else {
        return;
    };

    mac_state
        .timers
        .arm_next_period(now + bi.ati_duration, PeriodStart::Dti);
    phy.start_ati(bi.ati_duration);
}

/// Enter the data transmission interval: schedule the next BTI, make an
/// association attempt if none succeeded yet, and install the allocations.
pub async fn start_dti<P: Phy, Rng: RngCore, Delay: DelayNsExt>(
    phy: &mut P,
    mac_state: &mut StaState,
    config: &StaConfig<Rng, Delay>,
    handler: &MacHandler<'_>,
    now: Instant,
) -> Result<(), MacError<P::Error>> {
    info!("Starting DTI");
    mac_state.access_period = AccessPeriod::Dti;
    mac_state.received_dmg_beacon = false;

    let Some(bi) = mac_state.bi.clone() else {
        return Ok(());
    };

    // Keyed to the BTI start so clock drift does not accumulate over BIs
    let next_bti_in = bi.beacon_interval - (now - bi.bti_started);
    mac_state.timers.arm_next_bti(now + next_bti_in);

    if mac_state.relay.rds_activated {
        phy.resume_rds_operation();
        return Ok(());
    }

    if !mac_state.is_associated() {
        association::set_state(mac_state, handler, AssociationState::WaitAssocResp);
        association::send_association_request(phy, mac_state, config).await?;
    }

    dti::install_schedule(mac_state, &bi, next_bti_in, now);
    Ok(())
}
