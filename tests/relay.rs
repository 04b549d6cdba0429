use dmg_sta_rs::{
    mac::StaCommander,
    sap::{RelayDiscoveryRequest, StaEvent, StatusRequest},
    test_helpers::{
        frames::{self, AP_ADDRESS},
        run_sta, TestAir, STA_ADDRESS, TEST_SSID,
    },
    time::Duration,
    wire::{ChannelMeasurement, DmgAction, FrameBody, MacAddress, RelayCapableSta, StatusCode},
    MacError,
};

const DEST: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x90]);
const RDS_A: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x30]);
const RDS_B: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x40]);
const SRC: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x50]);

async fn associate(air: &TestAir, commander: &StaCommander, aid: u8) {
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
    let _assoc = air.next_queued().await;
    air.inject(
        frames::assoc_response(AP_ADDRESS, STA_ADDRESS, StatusCode::Success, aid),
        10.0,
    );

    loop {
        if let StaEvent::Assoc { .. } = commander.next_event().await {
            break;
        }
    }
}

fn expect_dmg(frame: &FrameBody) -> &DmgAction {
    match frame {
        FrameBody::Action(dmg_sta_rs::wire::ActionFrame::Dmg(action)) => action,
        other => panic!("expected a DMG action frame, got {other:?}"),
    }
}

/// The full source-REDS path, from relay discovery through channel
/// measurements to the RLS announcement.
#[test_log::test]
fn rls_happy_path_as_source() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        // Capabilities of the destination and both relay candidates are
        // primed through Information Responses
        air.inject(frames::information_response(AP_ADDRESS, STA_ADDRESS, DEST, 9), 10.0);
        air.inject(frames::information_response(AP_ADDRESS, STA_ADDRESS, RDS_A, 3), 10.0);
        air.inject(frames::information_response(AP_ADDRESS, STA_ADDRESS, RDS_B, 4), 10.0);

        commander
            .request(RelayDiscoveryRequest { destination: DEST })
            .await;

        // With cached capabilities, discovery goes straight to the relay
        // search
        let search = air.next_queued().await;
        assert_eq!(search.frame.header.addr1, AP_ADDRESS);
        let DmgAction::RelaySearchRequest {
            destination_aid, ..
        } = expect_dmg(&search.frame.body)
        else {
            panic!("expected a relay search request");
        };
        assert_eq!(*destination_aid, 9);

        let mut candidates = heapless::Vec::new();
        candidates.push(RelayCapableSta { aid: 3 }).unwrap();
        candidates.push(RelayCapableSta { aid: 4 }).unwrap();
        air.inject(
            frames::dmg_action(
                AP_ADDRESS,
                STA_ADDRESS,
                DmgAction::RelaySearchResponse {
                    dialog_token: 0,
                    relay_capable_list: candidates,
                },
            ),
            10.0,
        );

        // A measurement request reaches each candidate RDS
        let request_a = air.next_queued().await;
        assert_eq!(request_a.frame.header.addr1, RDS_A);
        assert!(matches!(
            expect_dmg(&request_a.frame.body),
            DmgAction::MultiRelayChannelMeasurementRequest { .. }
        ));
        let request_b = air.next_queued().await;
        assert_eq!(request_b.frame.header.addr1, RDS_B);

        // The first report flips the procedure towards the destination
        let mut report = heapless::Vec::new();
        report.push(ChannelMeasurement { peer_aid: 0, snr: 40 }).unwrap();
        air.inject(
            frames::dmg_action(
                RDS_A,
                STA_ADDRESS,
                DmgAction::MultiRelayChannelMeasurementReport {
                    dialog_token: 1,
                    measurements: report,
                },
            ),
            10.0,
        );

        let request_dest = air.next_queued().await;
        assert_eq!(request_dest.frame.header.addr1, DEST);
        assert!(matches!(
            expect_dmg(&request_dest.frame.body),
            DmgAction::MultiRelayChannelMeasurementRequest { .. }
        ));

        // The destination's report selects the last listed RDS (aid 4)
        let mut report = heapless::Vec::new();
        report.push(ChannelMeasurement { peer_aid: 3, snr: 50 }).unwrap();
        report.push(ChannelMeasurement { peer_aid: 4, snr: 60 }).unwrap();
        air.inject(
            frames::dmg_action(
                DEST,
                STA_ADDRESS,
                DmgAction::MultiRelayChannelMeasurementReport {
                    dialog_token: 1,
                    measurements: report,
                },
            ),
            10.0,
        );

        let rls = air.next_queued().await;
        assert_eq!(rls.frame.header.addr1, RDS_B);
        let DmgAction::RlsRequest {
            source_aid,
            relay_aid,
            destination_aid,
            ..
        } = expect_dmg(&rls.frame.body)
        else {
            panic!("expected an RLS request");
        };
        assert_eq!((*source_aid, *relay_aid, *destination_aid), (5, 4, 9));

        // Both status codes zero: the link stands, announce it
        air.inject(
            frames::dmg_action(
                RDS_B,
                STA_ADDRESS,
                DmgAction::RlsResponse {
                    dialog_token: 10,
                    relay_status: 0,
                    destination_status: 0,
                },
            ),
            10.0,
        );

        let announcement = air.next_queued().await;
        assert_eq!(announcement.frame.header.addr1, AP_ADDRESS);
        let DmgAction::RlsAnnouncement {
            destination_aid,
            relay_aid,
            source_aid,
        } = expect_dmg(&announcement.frame.body)
        else {
            panic!("expected an RLS announcement");
        };
        assert_eq!((*destination_aid, *relay_aid, *source_aid), (9, 4, 5));

        // Both reports were traced
        let mut reports = 0;
        while reports < 2 {
            if let StaEvent::ChannelReportReceived { .. } = commander.next_event().await {
                reports += 1;
            }
        }

        let status = commander.request(StatusRequest).await;
        assert!(status.relay_mode);
    });

    runner.run();
}

/// The RDS leg: forward the RLS request to the destination REDS and the
/// response back to the source REDS.
#[test_log::test]
fn rds_forwards_rls_exchange() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.rds_activated = true;
    });

    runner.attach_test_task(async move {
        // The RDS knows the destination's address from an earlier
        // Information Response
        air.inject(frames::information_response(AP_ADDRESS, STA_ADDRESS, DEST, 9), 10.0);

        air.inject(
            frames::dmg_action(
                SRC,
                STA_ADDRESS,
                DmgAction::RlsRequest {
                    dialog_token: 10,
                    source_aid: 5,
                    relay_aid: 4,
                    destination_aid: 9,
                },
            ),
            10.0,
        );

        let forwarded = air.next_queued().await;
        assert_eq!(forwarded.frame.header.addr1, DEST);
        let DmgAction::RlsRequest {
            source_aid,
            relay_aid,
            destination_aid,
            ..
        } = expect_dmg(&forwarded.frame.body)
        else {
            panic!("expected a forwarded RLS request");
        };
        assert_eq!((*source_aid, *relay_aid, *destination_aid), (5, 4, 9));

        air.inject(
            frames::dmg_action(
                DEST,
                STA_ADDRESS,
                DmgAction::RlsResponse {
                    dialog_token: 10,
                    relay_status: 0,
                    destination_status: 0,
                },
            ),
            10.0,
        );

        let returned = air.next_queued().await;
        assert_eq!(returned.frame.header.addr1, SRC);
        assert!(matches!(
            expect_dmg(&returned.frame.body),
            DmgAction::RlsResponse { .. }
        ));

        let status = commander.request(StatusRequest).await;
        assert!(status.relay_mode);
    });

    runner.run();
}

/// The destination REDS answers the relayed RLS request and enters relay
/// mode.
#[test_log::test]
fn destination_answers_rls_request() {
    let (commander, air, mut runner) = run_sta(|_| {});

    runner.attach_test_task(async move {
        air.inject(
            frames::dmg_action(
                RDS_B,
                STA_ADDRESS,
                DmgAction::RlsRequest {
                    dialog_token: 10,
                    source_aid: 5,
                    relay_aid: 4,
                    destination_aid: 9,
                },
            ),
            10.0,
        );

        let response = air.next_queued().await;
        assert_eq!(response.frame.header.addr1, RDS_B);
        let DmgAction::RlsResponse {
            dialog_token,
            relay_status,
            destination_status,
        } = expect_dmg(&response.frame.body)
        else {
            panic!("expected an RLS response");
        };
        assert_eq!((*dialog_token, *relay_status, *destination_status), (10, 0, 0));

        let status = commander.request(StatusRequest).await;
        assert!(status.relay_mode);
    });

    runner.run();
}

/// Discovery towards a peer with unknown capabilities suspends on an
/// Information Request and resumes when the response arrives.
#[test_log::test]
fn discovery_suspends_until_information_response() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        commander
            .request(RelayDiscoveryRequest { destination: DEST })
            .await;

        // Nothing cached: the station asks the PCP/AP first
        let info = air.next_queued().await;
        assert_eq!(info.frame.header.addr1, AP_ADDRESS);
        let DmgAction::InformationRequest { subject_address } = expect_dmg(&info.frame.body)
        else {
            panic!("expected an information request");
        };
        assert_eq!(*subject_address, DEST);

        // The response resumes the procedure with the relay search
        air.inject(frames::information_response(AP_ADDRESS, STA_ADDRESS, DEST, 9), 10.0);

        let search = air.next_queued().await;
        let DmgAction::RelaySearchRequest {
            destination_aid, ..
        } = expect_dmg(&search.frame.body)
        else {
            panic!("expected a relay search request");
        };
        assert_eq!(*destination_aid, 9);
    });

    runner.run();
}

/// An action subtype outside the modelled protocol is fatal by design.
#[test_log::test]
fn unknown_dmg_action_is_fatal() {
    let (_commander, air, mut runner) = run_sta(|_| {});
    let exit = runner.engine_exit();

    runner.attach_test_task(async move {
        air.inject(
            frames::dmg_action(SRC, STA_ADDRESS, DmgAction::Unsupported { action: 42 }),
            10.0,
        );

        let error = exit.recv().await.unwrap();
        assert_eq!(error, MacError::UnsupportedDmgAction { action: 42 });
    });

    runner.run();
}
