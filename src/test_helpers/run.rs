//! Deterministic single-threaded runner for MAC simulations.
//!
//! The engine and the test script run on one executor; whenever neither has
//! a ready task the simulated clock jumps to the earliest pending deadline.

use std::{future::Future, sync::Arc};

use async_channel::Receiver;
use async_executor::{Executor, Task};
use rand_core::RngCore;

use super::{
    radio::{radio_pair, TestAir},
    time::{Delay, SimulationTime},
};
use crate::{
    mac::{run_sta_engine, StaCommander, StaConfig},
    wire::{MacAddress, Ssid},
    MacError,
};

/// The error a simulated engine can end with.
pub type EngineError = MacError<core::convert::Infallible>;

pub const STA_ADDRESS: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x01]);
pub const TEST_SSID: &[u8] = b"dmg-net";

/// An RNG with a constant output, making A-BFT slot draws predictable.
#[derive(Debug, Clone)]
pub struct FixedRng(pub u32);

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        self.0
    }

    fn next_u64(&mut self) -> u64 {
        self.0 as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(self.0 as u8);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Spawn a station engine on a fresh simulation. The returned commander and
/// air drive it; attach the test script to the [Runner] and call
/// [Runner::run].
pub fn run_sta(
    configure: impl FnOnce(&mut StaConfig<FixedRng, Delay>),
) -> (&'static StaCommander, TestAir, Runner) {
    let time: &'static SimulationTime = Box::leak(Box::new(SimulationTime::new()));
    let commander: &'static StaCommander = Box::leak(Box::new(StaCommander::new()));

    let (radio, air) = radio_pair(time, 8, 1);

    let mut config = StaConfig::new(STA_ADDRESS, Ssid::new(TEST_SSID), FixedRng(1), Delay(time));
    configure(&mut config);

    let executor = Arc::new(Executor::new());
    let (exit_sender, exit) = async_channel::bounded(1);

    let engine = executor.spawn(async move {
        let error = run_sta_engine(radio, commander, config).await;
        let _ = exit_sender.send(error).await;
    });

    let runner = Runner {
        executor,
        time,
        _engine: engine,
        task_handles: Vec::new(),
        exit,
    };

    (commander, air, runner)
}

pub struct Runner {
    executor: Arc<Executor<'static>>,
    time: &'static SimulationTime,
    _engine: Task<()>,
    task_handles: Vec<Task<()>>,
    exit: Receiver<EngineError>,
}

impl Runner {
    pub fn attach_test_task(&mut self, task: impl Future<Output = ()> + Send + 'static) {
        self.task_handles.push(self.executor.spawn(task));
    }

    /// A receiver that yields the engine's fatal error, should it die.
    pub fn engine_exit(&self) -> Receiver<EngineError> {
        self.exit.clone()
    }

    /// Drive the simulation until every test task finished. Panics from the
    /// tasks unwind through the executor; a simulation where nothing can run
    /// and no timer is pending panics as stalled.
    pub fn run(mut self) {
        loop {
            // A finished task has nothing left to cancel, dropping the
            // handle just releases it
            self.task_handles.retain(|task| !task.is_finished());

            if self.task_handles.is_empty() {
                break;
            }

            if self.executor.try_tick() {
                continue;
            }

            if !self.time.advance() {
                panic!("simulation stalled: tasks pending but nothing to run and no timers armed");
            }
        }
    }
}
