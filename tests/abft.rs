use dmg_sta_rs::{
    sap::StaEvent,
    test_helpers::{
        frames::{self, AP_ADDRESS},
        run_sta, STA_ADDRESS,
    },
    time::Duration,
    wire::{FrameBody, SweepDirection},
    AccessPeriod,
};

/// The station picks slot 1 of 4 (fixed RNG), sweeps its sectors there, and
/// on a missing SSW-FBCK re-draws among the remaining slots.
#[test_log::test]
fn abft_slot_selection_and_collision_fallback() {
    let (_commander, air, mut runner) = run_sta(|_| {});

    runner.attach_test_task(async move {
        let template = frames::BeaconTemplate::new(AP_ADDRESS);
        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);

        let abft_at = template.abft_start(t0);
        let slot = template.slot_time();

        // FixedRng(1) over 4 slots draws slot 1
        let first = air.next_transmission().await;
        assert_eq!(first.at, abft_at + slot * 1);

        let FrameBody::Ssw(ref sweep) = first.frame.body else {
            panic!("expected an SSW frame, got {:?}", first.frame.body);
        };
        assert_eq!(sweep.ssw.direction, SweepDirection::Responder);
        assert_eq!(sweep.ssw.countdown, 7);
        assert_eq!(sweep.ssw.sector_id, 1);
        assert_eq!(first.frame.header.addr1, AP_ADDRESS);
        assert_eq!(first.antenna.tx_sector, 1);
        assert!(first.params.disable_rts && first.params.disable_ack);

        // The remaining 7 frames of the sweep count down to zero
        for expected in (0..7).rev() {
            let tx = air.next_transmission().await;
            let FrameBody::Ssw(ref sweep) = tx.frame.body else {
                panic!("expected an SSW frame");
            };
            assert_eq!(sweep.ssw.countdown, expected);
            assert_eq!(tx.antenna.tx_sector, sweep.ssw.sector_id);
        }

        // No SSW-FBCK arrives: at the end of our slot the station re-enters
        // the A-BFT and draws among the 2 remaining slots (slot 1 again)
        let retry = air.next_transmission().await;
        let fallback_at = abft_at + slot * 2;
        assert_eq!(retry.at, fallback_at + slot * 1);
        let FrameBody::Ssw(ref sweep) = retry.frame.body else {
            panic!("expected an SSW frame");
        };
        assert_eq!(sweep.ssw.countdown, 7);

        for _ in 0..7 {
            air.next_transmission().await;
        }

        // All slots are used up; nothing more goes on air this A-BFT
        air.sleep_until(template.dti_start(t0)).await;
        air.sleep(Duration::from_micros(50)).await;
        assert!(air.try_next_transmission().is_none());
    });

    runner.run();
}

/// Receiving the SSW-FBCK inside the A-BFT completes training with the AP:
/// the fallback is cancelled and the sweep result is reported.
#[test_log::test]
fn abft_feedback_completes_training() {
    let (commander, air, mut runner) = run_sta(|_| {});

    runner.attach_test_task(async move {
        let template = frames::BeaconTemplate::new(AP_ADDRESS);
        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);

        // Drain the full responder sweep in our slot
        for _ in 0..8 {
            air.next_transmission().await;
        }

        // The AP reports our best sector
        air.inject(
            frames::ssw_fbck(AP_ADDRESS, STA_ADDRESS, 5, 1, Duration::from_micros(300)),
            14.0,
        );

        loop {
            match commander.next_event().await {
                StaEvent::SlsCompleted {
                    peer,
                    access_period,
                    tx_sector,
                    tx_antenna,
                } => {
                    assert_eq!(peer, AP_ADDRESS);
                    assert_eq!(access_period, AccessPeriod::Bti);
                    assert_eq!(tx_sector, 5);
                    assert_eq!(tx_antenna, 1);
                    break;
                }
                _ => {}
            }
        }

        // The fallback was cancelled: no second sweep happens
        air.sleep_until(template.dti_start(t0)).await;
        air.sleep(Duration::from_micros(50)).await;
        assert!(air.try_next_transmission().is_none());

        // The association request sent at DTI start steers the trained sector
        let queued = air.next_queued().await;
        assert!(matches!(queued.frame.body, FrameBody::AssocRequest(_)));
        assert_eq!(air.antenna().tx_sector, 5);
    });

    runner.run();
}
