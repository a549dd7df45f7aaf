// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The time base itself: lifecycle, interrupt handler, and queries.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};
use scopeguard::ScopeGuard;

use crate::config::{Config, PERIOD_TICKS};
use crate::hal::UptimeHardware;
use crate::time::Clock;
use crate::Error;

/// Where the time base is in its lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    /// Never initialized, or reset/deinitialized since. Queries return
    /// meaningless values.
    Uninitialized = 0,
    /// Counting.
    Running = 1,
    /// Frozen by [`Uptime::suspend`].
    Suspended = 2,
}

impl State {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Running,
            2 => Self::Suspended,
            _ => Self::Uninitialized,
        }
    }
}

/// A millisecond/microsecond uptime clock driven by a low-power timer.
///
/// The millisecond counter lives here rather than in a global, so you can have
/// as many independent instances as you have timers (or simulations). In
/// firmware you'll usually still want one in a `static`, since the interrupt
/// handler has to reach it; [`Uptime::new`] is `const` for that reason.
///
/// # Concurrency
///
/// There is exactly one writer of the counter: [`Uptime::on_interrupt`], which
/// runs in interrupt context. Everything else reads. The lifecycle operations
/// are meant for thread mode only; calling them from the interrupt handler is
/// not supported.
#[derive(Debug)]
pub struct Uptime<H> {
    hw: H,
    config: Config,
    /// Milliseconds since reset. Written only by `on_interrupt`.
    millis: AtomicU32,
    /// `State` as its discriminant.
    state: AtomicU8,
}

impl<H: UptimeHardware> Uptime<H> {
    /// Wraps `hw`. Nothing happens to the hardware until you call
    /// [`initialize`][Self::initialize].
    pub const fn new(hw: H, config: Config) -> Self {
        Self {
            hw,
            config,
            millis: AtomicU32::new(0),
            state: AtomicU8::new(State::Uninitialized as u8),
        }
    }

    /// Borrows the hardware backend.
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Configuration this clock was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        State::from_bits(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Resets the timer and starts it counting from zero, with its interrupt
    /// unmasked.
    ///
    /// If the oscillator was off, this turns it on and waits for it to report
    /// ready, with no timeout: broken hardware hangs here. See
    /// [`initialize_with_timeout`][Self::initialize_with_timeout] for a
    /// version that gives up.
    ///
    /// Because this begins with a [`reset`][Self::reset], calling it on a
    /// clock that's already running simply starts over from zero.
    pub fn initialize(&self) {
        self.reset();
        if self.enable_oscillator() {
            while !self.hw.oscillator_ready() {
                self.hw.relax();
            }
        }
        self.start();
    }

    /// Like [`initialize`][Self::initialize], but polls the oscillator's ready
    /// flag at most `polls` times before giving up.
    ///
    /// On timeout, returns [`Error::OscillatorTimeout`] and leaves the timer
    /// in reset. The oscillator itself stays enabled, since it may still come
    /// up later.
    pub fn initialize_with_timeout(&self, polls: u32) -> Result<(), Error> {
        self.reset();
        if self.enable_oscillator() {
            self.await_oscillator(polls)?;
        }
        self.start();
        Ok(())
    }

    /// Turns the oscillator on if it isn't already. Returns `true` if it had
    /// to, meaning the caller must wait for it to settle.
    fn enable_oscillator(&self) -> bool {
        if self.hw.oscillator_enabled() {
            return false;
        }
        self.hw.enable_oscillator();
        true
    }

    /// Polls the oscillator's ready flag up to `limit` times.
    fn await_oscillator(&self, limit: u32) -> Result<(), Error> {
        let mut polls = 0u32;
        while !self.hw.oscillator_ready() {
            polls += 1;
            if polls >= limit {
                warn!("oscillator not ready after {} polls", polls);
                return Err(Error::OscillatorTimeout);
            }
            self.hw.relax();
        }
        Ok(())
    }

    /// Programs and starts the timer. Assumes it has just been reset and its
    /// oscillator is running.
    fn start(&self) {
        let hw = &self.hw;
        hw.select_kernel_clock();
        hw.set_bus_clock(true);

        // Prescaler and interrupt sources can only be written while the timer
        // is disabled, the reload value and start command only while enabled.
        hw.set_prescaler(self.config.prescaler());
        hw.enable_reload_interrupt();
        hw.set_enabled(true);
        hw.set_reload(self.config.reload());
        hw.start_counter();

        hw.set_interrupt_unmasked(true);
        self.set_state(State::Running);
        debug!(
            "uptime running: {} Hz source, /{}",
            self.config.source_hz(),
            self.config.prescaler().divisor()
        );
    }

    /// Masks the interrupt, gates off the timer's bus clock, and resets
    /// everything. Afterwards it's as if the clock had never been initialized.
    pub fn deinitialize(&self) {
        self.hw.set_interrupt_unmasked(false);
        self.hw.set_bus_clock(false);
        self.reset();
        debug!("uptime deinitialized");
    }

    /// Zeroes the millisecond counter and pulses the timer's reset line,
    /// returning its registers to their defaults.
    ///
    /// The timer is left unconfigured, so the clock stops until the next
    /// [`initialize`][Self::initialize].
    pub fn reset(&self) {
        self.millis.store(0, Ordering::Release);
        self.hw.pulse_reset();
        self.set_state(State::Uninitialized);
    }

    /// Freezes the timer without zeroing anything. No interrupts fire until
    /// [`resume`][Self::resume].
    ///
    /// Does nothing unless the clock is running.
    pub fn suspend(&self) {
        if self.state() != State::Running {
            return;
        }
        self.hw.set_enabled(false);
        self.set_state(State::Suspended);
        debug!("uptime suspended at {} ms", self.milliseconds());
    }

    /// Restarts a suspended timer.
    ///
    /// The start command makes the hardware count restart at zero, so the
    /// partial millisecond that was in progress at [`suspend`][Self::suspend]
    /// is lost. The millisecond counter is preserved. Treat time measured
    /// across a suspend as approximate.
    ///
    /// Does nothing unless the clock is suspended.
    pub fn resume(&self) {
        if self.state() != State::Suspended {
            return;
        }
        self.hw.set_enabled(true);
        self.hw.start_counter();
        self.set_state(State::Running);
        debug!("uptime resumed at {} ms", self.milliseconds());
    }

    /// Suspends the clock until the returned guard is dropped.
    ///
    /// ```ignore
    /// {
    ///     let _frozen = UPTIME.suspended();
    ///     reconfigure_something_timing_sensitive();
    /// } // resumes here
    /// ```
    ///
    /// Only the call that actually suspended the clock resumes it. If the
    /// clock was already suspended (or not running at all), dropping the guard
    /// leaves it as it was.
    pub fn suspended<'a>(&'a self) -> ScopeGuard<&'a Self, impl FnOnce(&'a Self) + 'a> {
        let was_running = self.state() == State::Running;
        self.suspend();
        scopeguard::guard(self, move |uptime| {
            if was_running {
                uptime.resume();
            }
        })
    }

    /// Timer interrupt body. Install this as the handler for the timer's
    /// interrupt vector.
    ///
    /// Acknowledges the interrupt and advances the millisecond counter by one.
    pub fn on_interrupt(&self) {
        self.hw.acknowledge();
        // Single writer, so a plain load/store is enough, and it doesn't need
        // read-modify-write atomics (which ARMv6-M lacks).
        let next = self.millis.load(Ordering::Relaxed).wrapping_add(1);
        self.millis.store(next, Ordering::Release);
    }

    /// Milliseconds since the last reset.
    ///
    /// Never goes backwards between resets, except by wrapping from
    /// `u32::MAX` to zero.
    pub fn milliseconds(&self) -> u32 {
        self.millis.load(Ordering::Acquire)
    }

    /// Microseconds since the last reset: the millisecond count times 1000,
    /// plus the live hardware count.
    ///
    /// The two reads aren't atomic with respect to the timer. If it rolls over
    /// between them, the result is off by up to one period (1000 µs), and may
    /// briefly appear to go backwards. Use
    /// [`microseconds_monotonic`][Self::microseconds_monotonic] if that
    /// matters to you.
    pub fn microseconds(&self) -> u32 {
        compose_unguarded(|| self.milliseconds(), || self.hw.count())
    }

    /// Microseconds since the last reset, retrying the read if the timer
    /// rolled over in the middle of it.
    ///
    /// This relies on the interrupt being serviced promptly after the
    /// rollover. If interrupts are masked at the time, the result can still be
    /// one period stale, exactly as with [`microseconds`][Self::microseconds].
    pub fn microseconds_monotonic(&self) -> u32 {
        compose_guarded(|| self.milliseconds(), || self.hw.count())
    }

    /// [`milliseconds`][Self::milliseconds], but fails unless the clock has
    /// been initialized.
    ///
    /// A suspended clock still answers; its value is just not moving.
    pub fn try_milliseconds(&self) -> Result<u32, Error> {
        self.check_initialized()?;
        Ok(self.milliseconds())
    }

    /// [`microseconds`][Self::microseconds], but fails unless the clock has
    /// been initialized.
    pub fn try_microseconds(&self) -> Result<u32, Error> {
        self.check_initialized()?;
        Ok(self.microseconds())
    }

    fn check_initialized(&self) -> Result<(), Error> {
        match self.state() {
            State::Uninitialized => Err(Error::NotInitialized),
            State::Running | State::Suspended => Ok(()),
        }
    }

    /// Spins until `ms` milliseconds have passed. See
    /// [`delay::delay_ms`][crate::delay::delay_ms].
    pub fn delay_ms(&self, ms: u32) {
        crate::delay::delay_ms(self, ms)
    }

    /// Spins until `us` microseconds have passed. See
    /// [`delay::delay_us`][crate::delay::delay_us].
    pub fn delay_us(&self, us: u32) {
        crate::delay::delay_us(self, us)
    }

    /// Overwrites the millisecond counter, for tests that need to start near
    /// a wrap.
    #[cfg(test)]
    pub(crate) fn set_milliseconds(&self, ms: u32) {
        self.millis.store(ms, Ordering::Release);
    }
}

impl<H: UptimeHardware> Clock for Uptime<H> {
    fn milliseconds(&self) -> u32 {
        Uptime::milliseconds(self)
    }

    fn microseconds(&self) -> u32 {
        Uptime::microseconds(self)
    }

    fn relax(&self) {
        self.hw.relax();
    }
}

fn compose(millis: u32, count: u16) -> u32 {
    millis.wrapping_mul(PERIOD_TICKS).wrapping_add(u32::from(count))
}

/// Reads the counter, then the hardware count, once each.
fn compose_unguarded(
    millis: impl FnOnce() -> u32,
    count: impl FnOnce() -> u16,
) -> u32 {
    let ms = millis();
    compose(ms, count())
}

/// Reads hardware, counter, hardware, and starts over if the hardware count
/// went down, which means a rollover happened somewhere in between.
fn compose_guarded(
    millis: impl Fn() -> u32,
    count: impl Fn() -> u16,
) -> u32 {
    loop {
        let before = count();
        let ms = millis();
        let after = count();
        if after >= before {
            break compose(ms, after);
        }
    }
}
