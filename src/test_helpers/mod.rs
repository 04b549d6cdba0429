//! In-crate simulation infrastructure.
//!
//! A [TestRadio] stands in for the lower layers while the test script plays
//! the PCP/AP (or a peer station) through the matching [TestAir]. Time is
//! simulated: the [run::Runner] advances the clock to the earliest pending
//! deadline whenever the executor goes idle, so microsecond MAC timing stays
//! exact and every run is deterministic.

pub mod frames;
mod radio;
mod run;
mod time;

pub use radio::{
    radio_pair, AntennaState, GateState, QueueKind, QueuedFrame, TestAir, TestAntenna, TestRadio,
    Transmission,
};
pub use run::{run_sta, EngineError, FixedRng, Runner, STA_ADDRESS, TEST_SSID};
pub use time::{Delay, SimulationTime};
