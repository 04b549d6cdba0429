use dmg_sta_rs::{
    consts::MBIFS,
    sap::{EnqueueRequest, EnsureAssociatedRequest, StaEvent, Status, StatusRequest},
    test_helpers::{
        frames::{self, AP_ADDRESS},
        run_sta, QueueKind, STA_ADDRESS, TEST_SSID,
    },
    time::Duration,
    wire::{FrameBody, MacAddress, StatusCode},
    AssociationState,
};

#[test_log::test]
fn active_probing_associates() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        // With nothing on the air, a probe request goes out every 50 ms
        let first = air.next_queued().await;
        assert!(matches!(first.frame.body, FrameBody::ProbeRequest(_)));
        assert!(matches!(first.queue, QueueKind::Contention(_)));

        let second = air.next_queued().await;
        assert!(matches!(second.frame.body, FrameBody::ProbeRequest(_)));
        assert_eq!(second.at - first.at, Duration::from_millis(50));

        let third = air.next_queued().await;
        assert_eq!(third.at - second.at, Duration::from_millis(50));

        // The AP answers our probe
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

        // An association request follows within MBIFS
        let assoc = air.next_queued().await;
        let FrameBody::AssocRequest(ref request) = assoc.frame.body else {
            panic!("expected an association request, got {:?}", assoc.frame.body);
        };
        assert_eq!(assoc.frame.header.addr1, AP_ADDRESS);
        assert_eq!(request.capabilities.sta_address, STA_ADDRESS);
        assert!(assoc.at - response_at <= MBIFS);

        air.inject(
            frames::assoc_response(AP_ADDRESS, STA_ADDRESS, StatusCode::Success, 5),
            10.0,
        );

        // The association edge fires; no sweep has completed yet
        loop {
            match commander.next_event().await {
                StaEvent::Assoc { bssid } => {
                    assert_eq!(bssid, AP_ADDRESS);
                    break;
                }
                StaEvent::SlsCompleted { .. } => panic!("SLS completed before association"),
                _ => {}
            }
        }

        let status = commander.request(StatusRequest).await;
        assert_eq!(status.state, AssociationState::Associated);
        assert_eq!(status.aid, 5);
        assert_eq!(status.bssid, Some(AP_ADDRESS));
    });

    runner.run();
}

#[test_log::test]
fn probe_response_for_wrong_ssid_is_ignored() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        let _first = air.next_queued().await;

        air.inject(
            frames::probe_response(AP_ADDRESS, STA_ADDRESS, b"other-net", Duration::from_millis(100)),
            10.0,
        );

        // The next management frame is another probe request, not an
        // association request
        let next = air.next_queued().await;
        assert!(matches!(next.frame.body, FrameBody::ProbeRequest(_)));

        let status = commander.request(StatusRequest).await;
        assert_eq!(status.state, AssociationState::WaitProbeResp);
    });

    runner.run();
}

#[test_log::test]
fn refused_association_is_sticky() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        let _probe = air.next_queued().await;
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
            frames::assoc_response(AP_ADDRESS, STA_ADDRESS, StatusCode::Refused, 0),
            10.0,
        );

        let status = commander.request(StatusRequest).await;
        assert_eq!(status.state, AssociationState::Refused);

        // A refusal is terminal: ensuring association changes nothing and
        // nothing further goes on air
        commander.request(EnsureAssociatedRequest).await;
        air.sleep(Duration::from_millis(200)).await;
        assert!(air.try_next_queued().is_none());

        let status = commander.request(StatusRequest).await;
        assert_eq!(status.state, AssociationState::Refused);
    });

    runner.run();
}

#[test_log::test]
fn enqueue_while_unassociated_drops_and_probes() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        // Startup probing is running; drain its first request
        let _probe = air.next_queued().await;

        let destination = MacAddress([0x02, 0, 0, 0, 0, 0x42]);
        let confirm = commander
            .request(EnqueueRequest {
                destination,
                tid: 0,
                payload: heapless::Vec::from_slice(b"payload").unwrap(),
            })
            .await;

        assert_eq!(confirm.status, Status::NotAssociated);

        // The MSDU was dropped, not queued
        while let Some(queued) = air.try_next_queued() {
            assert!(
                !matches!(queued.frame.body, FrameBody::QosData(_)),
                "dropped MSDU reached a queue"
            );
        }
    });

    runner.run();
}
