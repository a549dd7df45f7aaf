// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading the clock, abstractly.
//!
//! The delay and sleep operations don't care where timestamps come from, only
//! that they're wrapping `u32` counts that move forward. [`Clock`] captures
//! that. [`Uptime`][crate::Uptime] is the real implementation; tests use
//! simulated ones that advance time each time they're polled.
//!
//! # Wrapping
//!
//! Both timestamps are `u32` and wrap: milliseconds after about 49.7 days,
//! microseconds after about 71.6 minutes. Intervals are always computed with
//! wrapping subtraction, which gives the right answer across a wrap as long as
//! the interval itself is shorter than about half the range (`2^31` units).

/// A source of wrapping millisecond and microsecond timestamps.
pub trait Clock {
    /// Milliseconds since some fixed point.
    fn milliseconds(&self) -> u32;

    /// Microseconds since the same fixed point.
    fn microseconds(&self) -> u32;

    /// Called between polls by anything that waits on this clock.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

/// Which of the two timestamps an interval is measured in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Unit {
    Millis,
    Micros,
}

impl Unit {
    pub(crate) fn read<C: Clock + ?Sized>(self, clock: &C) -> u32 {
        match self {
            Unit::Millis => clock.milliseconds(),
            Unit::Micros => clock.microseconds(),
        }
    }
}

/// Time from `start` to `now`, modulo `2^32`.
#[inline(always)]
pub(crate) fn since(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_survives_a_wrap() {
        assert_eq!(since(10, 3), 7);
        assert_eq!(since(4, u32::MAX - 5), 10);
        assert_eq!(since(0, u32::MAX), 1);
        assert_eq!(since(7, 7), 0);
    }
}
