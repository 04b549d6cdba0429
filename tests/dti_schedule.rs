use dmg_sta_rs::{
    mac::StaCommander,
    sap::StaEvent,
    test_helpers::{
        frames::{self, AP_ADDRESS},
        run_sta, TestAir, STA_ADDRESS, TEST_SSID,
    },
    time::Duration,
    wire::{
        beacon::{AllocationField, AllocationType, BfControl},
        MacAddress, StatusCode,
    },
};

const PEER: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x77]);

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

fn service_period(
    source_aid: u8,
    destination_aid: u8,
    start: Duration,
    duration: Duration,
) -> AllocationField {
    AllocationField {
        allocation_type: AllocationType::ServicePeriod,
        source_aid,
        destination_aid,
        allocation_start: start,
        allocation_block_duration: duration,
        bf_control: BfControl::default(),
    }
}

fn cbap(
    source_aid: u8,
    destination_aid: u8,
    start: Duration,
    duration: Duration,
) -> AllocationField {
    AllocationField {
        allocation_type: AllocationType::Cbap,
        source_aid,
        destination_aid,
        allocation_start: start,
        allocation_block_duration: duration,
        bf_control: BfControl::default(),
    }
}

/// A quiet period keeps the air silent and a CBAP opens the contention gate
/// exactly over its span.
#[test_log::test]
fn quiet_period_and_cbap_gating() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        let mut template = frames::BeaconTemplate::new(AP_ADDRESS);
        template
            .schedule
            .push(service_period(
                255,
                0xFF,
                Duration::ZERO,
                Duration::from_micros(200),
            ))
            .unwrap();
        template
            .schedule
            .push(cbap(
                0xFF,
                0,
                Duration::from_micros(300),
                Duration::from_micros(400),
            ))
            .unwrap();

        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);
        let dti = template.dti_start(t0);

        air.sleep_until(dti).await;
        while air.try_next_transmission().is_some() {}
        assert!(!air.gates().contention_enabled);

        // Inside the quiet window nothing is transmitted or queued
        air.sleep_until(dti + Duration::from_micros(150)).await;
        assert!(air.try_next_transmission().is_none());
        assert!(air.try_next_queued().is_none());
        assert!(!air.gates().contention_enabled);

        // The CBAP opens the contention gate for its 400 us
        air.sleep_until(dti + Duration::from_micros(350)).await;
        let gates = air.gates();
        assert!(gates.contention_enabled);
        assert_eq!(gates.contention_enable_count, 1);

        air.sleep_until(dti + Duration::from_micros(750)).await;
        assert!(!air.gates().contention_enabled);
    });

    runner.run();
}

/// A second beacon within the same BI must not re-install the schedule.
#[test_log::test]
fn duplicate_beacon_does_not_double_install() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        let mut template = frames::BeaconTemplate::new(AP_ADDRESS);
        template
            .schedule
            .push(cbap(
                0xFF,
                0,
                Duration::from_micros(100),
                Duration::from_micros(100),
            ))
            .unwrap();

        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);

        // The AP keeps sweeping its beacon over further sectors; within a
        // BI only the SNR map is updated
        air.sleep(Duration::from_micros(50)).await;
        air.inject(template.frame(t0), 13.5);

        let dti = template.dti_start(t0);
        air.sleep_until(dti + Duration::from_micros(150)).await;
        while air.try_next_transmission().is_some() {}

        let gates = air.gates();
        assert!(gates.contention_enabled);
        assert_eq!(gates.contention_enable_count, 1, "schedule installed twice");
    });

    runner.run();
}

/// A service period sourced at this station opens the SP gate for its span.
#[test_log::test]
fn source_service_period_gates() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;
        air.inject(
            frames::information_response(AP_ADDRESS, STA_ADDRESS, PEER, 9),
            10.0,
        );

        let mut template = frames::BeaconTemplate::new(AP_ADDRESS);
        template
            .schedule
            .push(service_period(
                5,
                9,
                Duration::from_micros(100),
                Duration::from_micros(200),
            ))
            .unwrap();

        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);
        let dti = template.dti_start(t0);

        air.sleep_until(dti + Duration::from_micros(150)).await;
        assert!(air.gates().service_period_enabled);

        air.sleep_until(dti + Duration::from_micros(350)).await;
        assert!(!air.gates().service_period_enabled);
    });

    runner.run();
}

/// A beacon announcing an ATI hands the window to the ATI handler before
/// the DTI begins.
#[test_log::test]
fn ati_window_is_handed_over() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        let mut template = frames::BeaconTemplate::new(AP_ADDRESS);
        template.ati_present = true;
        template.ati_duration = Duration::from_micros(150);

        let t0 = air.now();
        air.inject(template.frame(t0), 12.0);

        air.sleep_until(template.dti_start(t0)).await;

        let gates = air.gates();
        assert_eq!(gates.ati_periods, vec![Duration::from_micros(150)]);
        assert!(air.antenna().omni_rx);
    });

    runner.run();
}

/// Received QoS data is forwarded up, with the A-MSDU case deaggregated.
#[test_log::test]
fn qos_data_is_forwarded_up() {
    let (commander, air, mut runner) = run_sta(|config| {
        config.active_probing = true;
    });

    runner.attach_test_task(async move {
        associate(&air, commander, 5).await;

        let source = MacAddress([0x02, 0, 0, 0, 0, 0x55]);
        let other_sta = MacAddress([0x02, 0, 0, 0, 0, 0x66]);

        // A frame for another station and an echo of our own transmission
        // are both dropped before classification
        air.inject(frames::qos_data(AP_ADDRESS, other_sta, source, b"not ours"), 10.0);
        air.inject(frames::qos_data(AP_ADDRESS, STA_ADDRESS, STA_ADDRESS, b"echo"), 10.0);

        air.inject(frames::qos_data(AP_ADDRESS, STA_ADDRESS, source, b"hello"), 10.0);

        loop {
            match commander.next_event().await {
                StaEvent::Data {
                    source: from,
                    destination,
                    payload,
                } => {
                    // The first data event must be the frame addressed to us
                    assert_eq!(from, source);
                    assert_eq!(destination, STA_ADDRESS);
                    assert_eq!(&payload[..], b"hello");
                    break;
                }
                _ => {}
            }
        }
    });

    runner.run();
}
