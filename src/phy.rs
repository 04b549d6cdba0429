use crate::{
    time::{Duration, Instant},
    wire::Frame,
};

/// The directional antenna of the DMG PHY.
///
/// Transmit and receive steering are independent; `set_omni_rx` drops the
/// receive side out of directional mode entirely. Sector and antenna ids are
/// 1-based; the MAC never writes 0.
pub trait DirectionalAntenna {
    /// Number of sectors per antenna.
    fn num_sectors(&self) -> u8;
    /// Number of phased-array antennas.
    fn num_antennas(&self) -> u8;

    fn set_tx_sector(&mut self, sector: u8);
    fn set_tx_antenna(&mut self, antenna: u8);
    fn set_rx_sector(&mut self, sector: u8);
    fn set_rx_antenna(&mut self, antenna: u8);
    /// Quasi-omni receive pattern, used whenever the peer's sweep direction
    /// is unknown (BTI, ATI, awaiting an RSS).
    fn set_omni_rx(&mut self);
}

/// Per-frame overrides for a control-frame transmission that bypasses the
/// contention machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TxParams {
    /// Use this value for the duration/ID field instead of the computed one.
    pub override_duration: Option<Duration>,
    pub disable_rts: bool,
    pub disable_ack: bool,
    pub disable_next_data: bool,
}

impl TxParams {
    /// The parameter block every swept control frame is sent with: duration
    /// overridden, no RTS/CTS, no ack, nothing appended.
    pub fn swept_control(duration: Duration) -> Self {
        Self {
            override_duration: Some(duration),
            disable_rts: true,
            disable_ack: true,
            disable_next_data: true,
        }
    }
}

/// The contention queues of the data path, one per access class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AccessCategory {
    BestEffort,
    Background,
    Video,
    Voice,
}

impl AccessCategory {
    /// Map a TID to its access class. Anything above 7 indicates an untagged
    /// MSDU and falls back to best effort.
    pub fn from_tid(tid: u8) -> Self {
        match tid {
            1 | 2 => AccessCategory::Background,
            4 | 5 => AccessCategory::Video,
            6 | 7 => AccessCategory::Voice,
            _ => AccessCategory::BestEffort,
        }
    }
}

/// A frame handed up by the receive chain, with the measured SNR of the
/// reception.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ReceivedFrame {
    pub frame: Frame,
    /// SNR of this reception in dB.
    pub rx_snr: f32,
    pub timestamp: Instant,
}

/// The lower layers as seen by the station MAC: the low-level transmitter,
/// the data-path queues and their gates, and the antenna.
///
/// All mutation of the shared medium goes through this trait, which keeps the
/// MAC itself free of hardware concerns and lets the tests substitute a
/// scripted radio.
pub trait Phy {
    #[cfg(not(feature = "defmt-03"))]
    type Error: core::fmt::Debug;
    #[cfg(feature = "defmt-03")]
    type Error: core::fmt::Debug + defmt::Format;

    type Antenna: DirectionalAntenna;

    fn antenna(&mut self) -> &mut Self::Antenna;

    /// The current time of the MAC clock.
    async fn now(&mut self) -> Instant;

    /// Wait for the next received frame. Cancel-safe: the MAC selects over
    /// this and its timer futures.
    async fn wait(&mut self) -> Result<ReceivedFrame, Self::Error>;

    /// Transmit a control frame immediately, bypassing contention, with the
    /// given parameter overrides. Resolves when the transmission completed
    /// (the tx-ok point), returning that time.
    async fn start_transmission(
        &mut self,
        frame: Frame,
        params: TxParams,
    ) -> Result<Instant, Self::Error>;

    /// Queue a frame on a contention (EDCA) queue.
    async fn queue_contention(
        &mut self,
        frame: Frame,
        ac: AccessCategory,
    ) -> Result<(), Self::Error>;

    /// Queue a frame on the service-period queue.
    async fn queue_service_period(&mut self, frame: Frame) -> Result<(), Self::Error>;

    /// Queue a frame on the ATI queue.
    async fn queue_ati(&mut self, frame: Frame) -> Result<(), Self::Error>;

    /// Open the contention gate for a contention-based access period.
    fn enable_contention_access(&mut self);

    /// Close the contention gate.
    fn disable_contention_access(&mut self);

    /// Open the service-period gate.
    fn enable_service_period_access(&mut self);

    /// Close the service-period gate.
    fn disable_service_period_access(&mut self);

    /// Hand an ATI of the given length to the ATI contention handler.
    fn start_ati(&mut self, duration: Duration);

    /// Pause relay (RDS) forwarding for the beacon header interval.
    fn suspend_rds_operation(&mut self);

    /// Resume relay (RDS) forwarding for the data transmission interval.
    fn resume_rds_operation(&mut self);
}
