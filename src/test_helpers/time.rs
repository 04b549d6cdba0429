//! Discrete simulated time for the test harness.
//!
//! Delays register themselves with the [SimulationTime]; the runner advances
//! the clock to the earliest pending deadline whenever the executor runs out
//! of ready tasks. This keeps microsecond-level MAC timing exact and the
//! execution fully deterministic.

use std::{
    sync::Mutex,
    task::{Poll, Waker},
};

use embedded_hal_async::delay::DelayNs;

use crate::time::Instant;

/// The clock starts one simulated second in, so that beacon timestamp
/// arithmetic never underflows around the epoch.
const START_OFFSET: u64 = 1_000_000_000;

pub struct SimulationTime {
    inner: Mutex<TimeInner>,
}

struct TimeInner {
    now_ticks: u64,
    sleepers: Vec<(u64, Waker)>,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TimeInner {
                now_ticks: START_OFFSET,
                sleepers: Vec::new(),
            }),
        }
    }

    pub fn now(&self) -> Instant {
        Instant::from_ticks(self.inner.lock().unwrap().now_ticks)
    }

    /// Jump to the earliest pending deadline and wake everything due there.
    /// Returns false when nothing is sleeping.
    pub fn advance(&self) -> bool {
        let woken = {
            let mut inner = self.inner.lock().unwrap();
            let Some(next) = inner.sleepers.iter().map(|(at, _)| *at).min() else {
                return false;
            };

            inner.now_ticks = inner.now_ticks.max(next);
            let now = inner.now_ticks;

            let mut due = Vec::new();
            inner.sleepers.retain_mut(|(at, waker)| {
                if *at <= now {
                    due.push(waker.clone());
                    false
                } else {
                    true
                }
            });
            due
        };

        for waker in woken {
            waker.wake();
        }
        true
    }

    fn delay_until(&self, deadline: u64, waker: &Waker) -> Poll<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.now_ticks >= deadline {
            Poll::Ready(())
        } else {
            inner.sleepers.push((deadline, waker.clone()));
            Poll::Pending
        }
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new()
    }
}

/// A [DelayNs] running on the simulated clock.
#[derive(Clone, Copy)]
pub struct Delay(pub &'static SimulationTime);

impl DelayNs for Delay {
    async fn delay_ns(&mut self, ns: u32) {
        let deadline = self.0.now().ticks() + ns as u64;
        core::future::poll_fn(|cx| self.0.delay_until(deadline, cx.waker())).await
    }
}
