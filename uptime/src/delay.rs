// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Busy-waiting.
//!
//! These spin the calling context until enough time has passed on a
//! [`Clock`]. They don't sleep, don't yield, and can't be cancelled; the CPU
//! does nothing else (except take interrupts) for the duration. If you have an
//! executor, the futures in [`sleep`][crate::sleep] are kinder.
//!
//! Both delays measure with wrapping subtraction, so they're correct across a
//! counter wrap as long as the requested duration is under about half the
//! counter's range.
//!
//! `delay_us` inherits the imprecision of
//! [`Uptime::microseconds`][crate::Uptime::microseconds]: a read that lands on
//! a rollover can be a period stale, which can make the delay up to one period
//! (1000 µs) short or long.

use crate::time::{since, Clock, Unit};

/// Spins until `ms` milliseconds have elapsed on `clock`.
///
/// Returns as soon as the clock's millisecond count has advanced by `ms`, so
/// the actual delay is somewhere in `ms - 1 .. ms` milliseconds plus however
/// long the final poll takes, depending on where in the current millisecond
/// the call started.
pub fn delay_ms<C: Clock + ?Sized>(clock: &C, ms: u32) {
    wait(clock, Unit::Millis, ms)
}

/// Spins until `us` microseconds have elapsed on `clock`.
pub fn delay_us<C: Clock + ?Sized>(clock: &C, us: u32) {
    wait(clock, Unit::Micros, us)
}

fn wait<C: Clock + ?Sized>(clock: &C, unit: Unit, duration: u32) {
    let start = unit.read(clock);
    while since(unit.read(clock), start) < duration {
        clock.relax();
    }
}

/// Adapts a [`Clock`] to `embedded_hal::delay::DelayNs`, so drivers written
/// against `embedded-hal` can borrow the uptime clock for their delays.
///
/// Nanosecond requests are rounded up to whole microseconds.
///
/// Unlike the bare functions, long requests are split into chunks that fit
/// comfortably in the wrapping window, so any `u32` duration works.
#[derive(Debug)]
pub struct Delay<'a, C: ?Sized> {
    clock: &'a C,
}

impl<'a, C: Clock + ?Sized> Delay<'a, C> {
    /// Wraps `clock`.
    pub fn new(clock: &'a C) -> Self {
        Self { clock }
    }
}

/// Largest single wait the adapter hands to the bare functions.
#[cfg_attr(not(feature = "embedded-hal"), allow(dead_code))]
const CHUNK: u32 = 1 << 30;

#[cfg_attr(not(feature = "embedded-hal"), allow(dead_code))]
fn wait_chunked<C: Clock + ?Sized>(clock: &C, unit: Unit, mut duration: u32) {
    while duration > CHUNK {
        wait(clock, unit, CHUNK);
        duration -= CHUNK;
    }
    wait(clock, unit, duration);
}

#[cfg(feature = "embedded-hal")]
impl<C: Clock + ?Sized> embedded_hal::delay::DelayNs for Delay<'_, C> {
    fn delay_ns(&mut self, ns: u32) {
        if ns == 0 {
            return;
        }
        wait_chunked(self.clock, Unit::Micros, ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        wait_chunked(self.clock, Unit::Micros, us);
    }

    fn delay_ms(&mut self, ms: u32) {
        wait_chunked(self.clock, Unit::Millis, ms);
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::config::PERIOD_TICKS;
    use crate::hal::UptimeHardware;
    use crate::sim::SimClock;

    /// A clock that reads `now` and moves it forward by `step` every relax.
    struct FakeClock {
        now: Cell<u32>,
        step: u32,
        polls: Cell<u32>,
    }

    impl FakeClock {
        fn starting_at(now: u32) -> Self {
            Self { now: Cell::new(now), step: 1, polls: Cell::new(0) }
        }
    }

    impl Clock for FakeClock {
        fn milliseconds(&self) -> u32 {
            self.now.get()
        }
        fn microseconds(&self) -> u32 {
            self.now.get()
        }
        fn relax(&self) {
            self.polls.set(self.polls.get() + 1);
            self.now.set(self.now.get().wrapping_add(self.step));
        }
    }

    fn running() -> SimClock {
        let clock = SimClock::new();
        clock.uptime().initialize();
        clock
    }

    #[test]
    fn delay_ms_returns_on_the_tick_boundary() {
        let clock = running();
        clock.advance(PERIOD_TICKS * 3 + 400);

        delay_ms(&clock, 50);
        assert_eq!(clock.uptime().milliseconds(), 53);
        // We must have stopped right on the interrupt, not a tick later.
        assert_eq!(clock.uptime().hardware().count(), 0);
        assert_eq!(clock.ticks(), u64::from(PERIOD_TICKS) * 53);
    }

    #[test]
    fn delay_ms_from_boundary_takes_whole_periods() {
        let clock = running();
        delay_ms(&clock, 50);
        assert_eq!(clock.ticks(), 50_000);
        assert_eq!(clock.uptime().milliseconds(), 50);
    }

    #[test]
    fn delay_us_counts_ticks() {
        let clock = running();
        clock.advance(900);

        delay_us(&clock, 250);
        assert_eq!(clock.uptime().microseconds(), 1150);
        assert_eq!(clock.uptime().milliseconds(), 1);
        assert_eq!(clock.ticks(), 1150);
    }

    #[test]
    fn zero_delays_return_immediately() {
        let clock = running();
        delay_ms(&clock, 0);
        delay_us(&clock, 0);
        assert_eq!(clock.ticks(), 0);

        let fake = FakeClock::starting_at(7);
        delay_ms(&fake, 0);
        assert_eq!(fake.polls.get(), 0);
    }

    #[test]
    fn delay_ms_across_counter_wrap() {
        let clock = running();
        clock.uptime().set_milliseconds(u32::MAX - 10);

        delay_ms(&clock, 25);
        assert_eq!(clock.uptime().milliseconds(), 14);
        assert_eq!(clock.ticks(), 25_000);
    }

    #[test]
    fn fake_clock_wrap() {
        let fake = FakeClock::starting_at(u32::MAX - 2);
        delay_us(&fake, 10);
        assert_eq!(fake.now.get(), 7);
        assert_eq!(fake.polls.get(), 10);
    }

    #[test]
    fn inherent_delays_use_the_clock() {
        let clock = running();
        clock.uptime().delay_ms(0);
        clock.uptime().delay_us(0);
        assert_eq!(clock.uptime().milliseconds(), 0);
    }

    #[cfg(feature = "embedded-hal")]
    #[test]
    fn delay_ns_rounds_up() {
        use embedded_hal::delay::DelayNs;

        let clock = running();
        let mut delay = Delay::new(&clock);
        delay.delay_ns(1);
        assert_eq!(clock.ticks(), 1);
        delay.delay_ns(1500);
        assert_eq!(clock.ticks(), 3);
        delay.delay_ns(0);
        assert_eq!(clock.ticks(), 3);

        delay.delay_us(997);
        assert_eq!(clock.uptime().milliseconds(), 1);
        delay.delay_ms(2);
        assert_eq!(clock.uptime().milliseconds(), 3);
    }

    #[cfg(feature = "embedded-hal")]
    #[test]
    fn long_requests_are_chunked() {
        use embedded_hal::delay::DelayNs;

        let fake = FakeClock { now: Cell::new(0), step: 1 << 20, polls: Cell::new(0) };
        let mut delay = Delay::new(&fake);
        delay.delay_us(u32::MAX);
        assert!(fake.polls.get() >= (u32::MAX >> 20));
    }
}
