//! A scripted radio standing in for the lower layers.
//!
//! The MAC side implements [Phy]; the test side drives a [TestAir]: inject
//! frames with a chosen SNR, observe control-frame transmissions and queued
//! frames with their timestamps, and read back the antenna and gate state
//! the MAC left behind.

use std::sync::{Arc, Mutex, MutexGuard};

use async_channel::{Receiver, Sender};

use super::time::SimulationTime;
use crate::{
    phy::{AccessCategory, DirectionalAntenna, Phy, ReceivedFrame, TxParams},
    time::{Duration, Instant},
    wire::Frame,
};

/// Snapshot of the directional antenna settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntennaState {
    pub tx_sector: u8,
    pub tx_antenna: u8,
    pub rx_sector: u8,
    pub rx_antenna: u8,
    pub omni_rx: bool,
}

/// Snapshot of the channel-access gates and adapter calls.
#[derive(Debug, Clone, Default)]
pub struct GateState {
    pub contention_enabled: bool,
    pub contention_enable_count: u32,
    pub service_period_enabled: bool,
    pub rds_suspended: bool,
    pub ati_periods: Vec<Duration>,
}

/// A control frame sent through [Phy::start_transmission].
#[derive(Debug, Clone)]
pub struct Transmission {
    pub frame: Frame,
    pub params: TxParams,
    pub at: Instant,
    /// Antenna state at the moment of transmission.
    pub antenna: AntennaState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Contention(AccessCategory),
    ServicePeriod,
    Ati,
}

/// A frame handed to one of the data-path queues.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub frame: Frame,
    pub queue: QueueKind,
    pub at: Instant,
}

struct Shared {
    antenna: AntennaState,
    num_sectors: u8,
    num_antennas: u8,
    gates: GateState,
}

/// The MAC-facing half of the virtual radio.
pub struct TestRadio {
    time: &'static SimulationTime,
    shared: Arc<Mutex<Shared>>,
    antenna: TestAntenna,
    inbox: Receiver<(Frame, f32)>,
    transmissions: Sender<Transmission>,
    queued: Sender<QueuedFrame>,
}

/// The test-facing half of the virtual radio.
#[derive(Clone)]
pub struct TestAir {
    time: &'static SimulationTime,
    shared: Arc<Mutex<Shared>>,
    inject: Sender<(Frame, f32)>,
    transmissions: Receiver<Transmission>,
    queued: Receiver<QueuedFrame>,
}

/// Create a connected radio/air pair with the given antenna dimensions.
pub fn radio_pair(
    time: &'static SimulationTime,
    num_sectors: u8,
    num_antennas: u8,
) -> (TestRadio, TestAir) {
    let shared = Arc::new(Mutex::new(Shared {
        antenna: AntennaState {
            tx_sector: 0,
            tx_antenna: 0,
            rx_sector: 0,
            rx_antenna: 0,
            omni_rx: false,
        },
        num_sectors,
        num_antennas,
        gates: GateState::default(),
    }));

    let (inject, inbox) = async_channel::unbounded();
    let (transmissions_tx, transmissions_rx) = async_channel::unbounded();
    let (queued_tx, queued_rx) = async_channel::unbounded();

    let radio = TestRadio {
        time,
        shared: Arc::clone(&shared),
        antenna: TestAntenna {
            shared: Arc::clone(&shared),
        },
        inbox,
        transmissions: transmissions_tx,
        queued: queued_tx,
    };
    let air = TestAir {
        time,
        shared,
        inject,
        transmissions: transmissions_rx,
        queued: queued_rx,
    };

    (radio, air)
}

impl TestRadio {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap()
    }
}

/// The antenna half, handed out by [Phy::antenna].
pub struct TestAntenna {
    shared: Arc<Mutex<Shared>>,
}

impl DirectionalAntenna for TestAntenna {
    fn num_sectors(&self) -> u8 {
        self.shared.lock().unwrap().num_sectors
    }

    fn num_antennas(&self) -> u8 {
        self.shared.lock().unwrap().num_antennas
    }

    fn set_tx_sector(&mut self, sector: u8) {
        self.shared.lock().unwrap().antenna.tx_sector = sector;
    }

    fn set_tx_antenna(&mut self, antenna: u8) {
        self.shared.lock().unwrap().antenna.tx_antenna = antenna;
    }

    fn set_rx_sector(&mut self, sector: u8) {
        let mut shared = self.shared.lock().unwrap();
        shared.antenna.rx_sector = sector;
        shared.antenna.omni_rx = false;
    }

    fn set_rx_antenna(&mut self, antenna: u8) {
        let mut shared = self.shared.lock().unwrap();
        shared.antenna.rx_antenna = antenna;
        shared.antenna.omni_rx = false;
    }

    fn set_omni_rx(&mut self) {
        self.shared.lock().unwrap().antenna.omni_rx = true;
    }
}

impl Phy for TestRadio {
    type Error = core::convert::Infallible;
    type Antenna = TestAntenna;

    fn antenna(&mut self) -> &mut Self::Antenna {
        &mut self.antenna
    }

    async fn now(&mut self) -> Instant {
        self.time.now()
    }

    async fn wait(&mut self) -> Result<ReceivedFrame, Self::Error> {
        match self.inbox.recv().await {
            Ok((frame, rx_snr)) => Ok(ReceivedFrame {
                frame,
                rx_snr,
                timestamp: self.time.now(),
            }),
            // Test script finished, nothing more will arrive
            Err(_) => core::future::pending().await,
        }
    }

    async fn start_transmission(
        &mut self,
        frame: Frame,
        params: TxParams,
    ) -> Result<Instant, Self::Error> {
        let now = self.time.now();
        let antenna = self.shared().antenna;
        let _ = self.transmissions.try_send(Transmission {
            frame,
            params,
            at: now,
            antenna,
        });
        Ok(now)
    }

    async fn queue_contention(
        &mut self,
        frame: Frame,
        ac: AccessCategory,
    ) -> Result<(), Self::Error> {
        let now = self.time.now();
        let _ = self.queued.try_send(QueuedFrame {
            frame,
            queue: QueueKind::Contention(ac),
            at: now,
        });
        Ok(())
    }

    async fn queue_service_period(&mut self, frame: Frame) -> Result<(), Self::Error> {
        let now = self.time.now();
        let _ = self.queued.try_send(QueuedFrame {
            frame,
            queue: QueueKind::ServicePeriod,
            at: now,
        });
        Ok(())
    }

    async fn queue_ati(&mut self, frame: Frame) -> Result<(), Self::Error> {
        let now = self.time.now();
        let _ = self.queued.try_send(QueuedFrame {
            frame,
            queue: QueueKind::Ati,
            at: now,
        });
        Ok(())
    }

    fn enable_contention_access(&mut self) {
        let mut shared = self.shared();
        shared.gates.contention_enabled = true;
        shared.gates.contention_enable_count += 1;
    }

    fn disable_contention_access(&mut self) {
        self.shared().gates.contention_enabled = false;
    }

    fn enable_service_period_access(&mut self) {
        self.shared().gates.service_period_enabled = true;
    }

    fn disable_service_period_access(&mut self) {
        self.shared().gates.service_period_enabled = false;
    }

    fn start_ati(&mut self, duration: Duration) {
        self.shared().gates.ati_periods.push(duration);
    }

    fn suspend_rds_operation(&mut self) {
        self.shared().gates.rds_suspended = true;
    }

    fn resume_rds_operation(&mut self) {
        self.shared().gates.rds_suspended = false;
    }
}

impl TestAir {
    pub fn now(&self) -> Instant {
        self.time.now()
    }

    /// Deliver a frame to the station at the given reception SNR.
    pub fn inject(&self, frame: Frame, rx_snr: f32) {
        self.inject
            .try_send((frame, rx_snr))
            .expect("radio inbox never closes during a test");
    }

    /// Wait for the next control-frame transmission.
    pub async fn next_transmission(&self) -> Transmission {
        self.transmissions
            .recv()
            .await
            .expect("radio outbox never closes during a test")
    }

    pub fn try_next_transmission(&self) -> Option<Transmission> {
        self.transmissions.try_recv().ok()
    }

    /// Wait for the next frame handed to a data-path queue.
    pub async fn next_queued(&self) -> QueuedFrame {
        self.queued
            .recv()
            .await
            .expect("radio outbox never closes during a test")
    }

    pub fn try_next_queued(&self) -> Option<QueuedFrame> {
        self.queued.try_recv().ok()
    }

    pub fn antenna(&self) -> AntennaState {
        self.shared.lock().unwrap().antenna
    }

    pub fn gates(&self) -> GateState {
        self.shared.lock().unwrap().gates.clone()
    }

    /// Sleep on the simulated clock.
    pub async fn sleep(&self, duration: Duration) {
        use crate::time::DelayNsExt;
        let mut delay = super::time::Delay(self.time);
        delay.delay_duration(duration).await;
    }

    /// Sleep until the given simulated instant.
    pub async fn sleep_until(&self, deadline: Instant) {
        use crate::time::DelayNsExt;
        let mut delay = super::time::Delay(self.time);
        delay.delay_until(self.now(), deadline).await;
    }
}
