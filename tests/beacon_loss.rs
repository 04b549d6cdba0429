use dmg_sta_rs::{
    sap::{StaEvent, StatusRequest},
    test_helpers::{
        frames::{self, AP_ADDRESS},
        run_sta, STA_ADDRESS, TEST_SSID,
    },
    time::Duration,
    wire::{FrameBody, StatusCode},
    AssociationState,
};

/// With maxMissedBeacons = 3 and a 100 ms beacon interval, silence on the
/// air trips the watchdog 300 ms after the probe response, dropping the
/// association and restarting the probe cycle.
#[test_log::test]
fn beacon_loss_restarts_association() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
        config.max_missed_beacons = 3;
    });

    runner.attach_test_task(async move {
        let _probe = air.next_queued().await;

        let response_at = air.now();
        air.inject(
            frames::probe_response(
                AP_ADDRESS,
                STA_ADDRESS,
                TEST_SSID,
                Duration::from_millis(100),
            ),
            10.0,
        );

        let assoc = air.next_queued().await;
        assert!(matches!(assoc.frame.body, FrameBody::AssocRequest(_)));
        air.inject(
            frames::assoc_response(AP_ADDRESS, STA_ADDRESS, StatusCode::Success, 7),
            10.0,
        );

        loop {
            if let StaEvent::Assoc { .. } = commander.next_event().await {
                break;
            }
        }

        // Four beacon intervals pass without a single beacon. The watchdog
        // fires at probe-response time + 3 * 100 ms.
        loop {
            match commander.next_event().await {
                StaEvent::DeAssoc { bssid } => {
                    assert_eq!(bssid, AP_ADDRESS);
                    break;
                }
                StaEvent::SlsCompleted { .. } => panic!("unexpected sweep completion"),
                _ => {}
            }
        }

        // The loss immediately re-enters the probe cycle
        let probe = air.next_queued().await;
        assert!(matches!(probe.frame.body, FrameBody::ProbeRequest(_)));
        assert_eq!(probe.at - response_at, Duration::from_millis(300));

        let status = commander.request(StatusRequest).await;
        assert_eq!(status.state, AssociationState::WaitProbeResp);
        assert_eq!(status.aid, 7, "the stale AID survives until re-association");
    });

    runner.run();
}
