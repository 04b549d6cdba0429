use core::{
    fmt::Display,
    ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign},
};

use embedded_hal_async::delay::DelayNs;

pub const TICKS_PER_SECOND: u64 = 1_000_000_000;
pub const TICKS_PER_MILLI: u64 = TICKS_PER_SECOND / 1_000;
pub const TICKS_PER_MICRO: u64 = TICKS_PER_SECOND / 1_000_000;

/// An instant of time.
///
/// One tick is a nanosecond. DMG inter-frame spacings are single-digit
/// microseconds, so the MAC keeps all deadlines at this resolution.
///
/// Wraps after ~584 years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Instant {
    ticks: u64,
}

impl Instant {
    pub const EPOCH: Self = Self::from_ticks(0);

    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self::from_ticks(micros * TICKS_PER_MICRO)
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        let negative = other.ticks > self.ticks;
        let diff = self.ticks.abs_diff(other.ticks);

        if diff > i64::MAX as u64 {
            return None;
        }

        Some(Duration {
            ticks: diff as i64 * if negative { -1 } else { 1 },
        })
    }

    #[must_use]
    pub fn duration_since(&self, other: Self) -> Duration {
        unwrap!(self.checked_duration_since(other))
    }

    #[must_use]
    pub const fn checked_add_duration(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add_signed(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub_duration(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add_signed(-duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.ticks <= other.ticks {
            self
        } else {
            other
        }
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if self.ticks >= other.ticks {
            self
        } else {
            other
        }
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_add_duration(rhs))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_sub_duration(rhs))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

/// A span of time, signed, in nanosecond ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Duration {
    ticks: i64,
}

impl Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let neg = self.ticks < 0;
        let value = self.abs();
        let us = value.micros();
        let sub_us = value.ticks() - us * TICKS_PER_MICRO as i64;

        if neg {
            write!(f, "-{us}.{sub_us:03} us")
        } else {
            write!(f, "{us}.{sub_us:03} us")
        }
    }
}

impl Duration {
    pub const ZERO: Self = Self::from_ticks(0);

    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    pub const fn from_nanos(nanos: i64) -> Self {
        Self::from_ticks(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self::from_ticks(micros * TICKS_PER_MICRO as i64)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self::from_ticks(millis * TICKS_PER_MILLI as i64)
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self::from_ticks(seconds * TICKS_PER_SECOND as i64)
    }

    pub const fn ticks(&self) -> i64 {
        self.ticks
    }

    /// The amount of *full* microseconds in this duration.
    /// Rounds towards zero.
    pub const fn micros(&self) -> i64 {
        self.ticks / TICKS_PER_MICRO as i64
    }

    /// The amount of *full* milliseconds in this duration.
    /// Rounds towards zero.
    pub const fn millis(&self) -> i64 {
        self.ticks / TICKS_PER_MILLI as i64
    }

    pub const fn is_positive(&self) -> bool {
        self.ticks > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.ticks < 0
    }

    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_add(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub(self, duration: Duration) -> Option<Self> {
        match self.ticks.checked_sub(duration.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self {
            ticks: self.ticks.abs(),
        }
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            ticks: self.ticks.max(other.ticks),
        }
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_add(rhs))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Self::Output {
        unwrap!(self.checked_sub(rhs))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Self::Output {
        Self {
            ticks: unwrap!(self.ticks.checked_mul(rhs)),
        }
    }
}

impl Mul<Duration> for i64 {
    type Output = Duration;

    fn mul(self, rhs: Duration) -> Self::Output {
        rhs * self
    }
}

impl MulAssign<i64> for Duration {
    fn mul_assign(&mut self, rhs: i64) {
        *self = *self * rhs;
    }
}

pub trait DelayNsExt: DelayNs + Clone {
    /// Delay for the duration, with nanosecond granularity.
    /// A zero or negative duration returns without waiting.
    async fn delay_duration(&mut self, duration: Duration) {
        if !duration.is_positive() {
            return;
        }

        let mut remaining = duration.ticks() as u64;
        while remaining > 0 {
            let step = remaining.min(u32::MAX as u64);
            self.delay_ns(step as u32).await;
            remaining -= step;
        }
    }

    /// Delay until the deadline, measured against the given current time.
    async fn delay_until(&mut self, now: Instant, deadline: Instant) {
        self.delay_duration(deadline - now).await;
    }
}

impl<T: DelayNs + Clone> DelayNsExt for T {}
