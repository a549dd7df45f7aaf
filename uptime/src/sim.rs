// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated hardware, for running the time base without a chip.
//!
//! [`SimTimer`] models the oscillator, the timer's registers, and its line at
//! the interrupt controller, including the rules about which registers can be
//! written in which state. It never advances on its own. [`SimClock`] wraps an
//! [`Uptime`] around one and plays interrupt controller: each call to
//! [`SimClock::advance`] steps the timer one tick at a time and calls
//! [`Uptime::on_interrupt`] whenever the interrupt would fire. With the default
//! configuration, one tick is one microsecond.
//!
//! `SimClock` also implements [`Clock`], advancing time by a fixed step every
//! time a waiter relaxes, so busy-waits terminate deterministically:
//!
//! ```
//! use lptim_uptime::sim::SimClock;
//!
//! let clock = SimClock::new();
//! clock.uptime().initialize();
//! lptim_uptime::delay::delay_ms(&clock, 50);
//! assert_eq!(clock.uptime().milliseconds(), 50);
//! assert_eq!(clock.ticks(), 50_000);
//! ```
//!
//! Everything here uses `Cell`, so none of it is `Sync`. That's fine for a
//! single-threaded test driver, which is the point.

use core::cell::Cell;

use crate::config::{Config, Prescaler};
use crate::hal::UptimeHardware;
use crate::time::Clock;
use crate::Uptime;

/// Reset value of the reload register.
const RELOAD_RESET: u16 = 1;

/// A simulated oscillator plus low-power timer.
#[derive(Debug)]
pub struct SimTimer {
    // Oscillator.
    osc_on: Cell<bool>,
    /// Polls of the ready flag that still answer "not ready" once the
    /// oscillator is on; `None` if it never comes up.
    osc_settle: Cell<Option<u32>>,
    osc_enables: Cell<u32>,
    ready_polls: Cell<u32>,

    // Clock controller.
    kernel_clock: Cell<bool>,
    bus_clock: Cell<bool>,
    reset_pulses: Cell<u32>,

    // Timer registers.
    prescaler: Cell<Prescaler>,
    reload_irq: Cell<bool>,
    enabled: Cell<bool>,
    counting: Cell<bool>,
    reload: Cell<u16>,
    count: Cell<u16>,
    reload_flag: Cell<bool>,
    acks: Cell<u32>,

    // Interrupt controller.
    unmasked: Cell<bool>,
}

impl SimTimer {
    /// An oscillator that's off but comes up on the first poll after it's
    /// enabled, and a timer in its reset state.
    pub fn new() -> Self {
        Self {
            osc_on: Cell::new(false),
            osc_settle: Cell::new(Some(0)),
            osc_enables: Cell::new(0),
            ready_polls: Cell::new(0),
            kernel_clock: Cell::new(false),
            bus_clock: Cell::new(false),
            reset_pulses: Cell::new(0),
            prescaler: Cell::new(Prescaler::default()),
            reload_irq: Cell::new(false),
            enabled: Cell::new(false),
            counting: Cell::new(false),
            reload: Cell::new(RELOAD_RESET),
            count: Cell::new(0),
            reload_flag: Cell::new(false),
            acks: Cell::new(0),
            unmasked: Cell::new(false),
        }
    }

    /// Like [`new`][Self::new], but the oscillator reports "not ready" for
    /// `polls` polls after being enabled.
    pub fn with_oscillator_delay(polls: u32) -> Self {
        let hw = Self::new();
        hw.osc_settle.set(Some(polls));
        hw
    }

    /// Like [`new`][Self::new], but the oscillator never becomes ready.
    pub fn with_dead_oscillator() -> Self {
        let hw = Self::new();
        hw.osc_settle.set(None);
        hw
    }

    /// Turns the oscillator on and settles it, as board bring-up code would.
    pub fn power_oscillator(&self) {
        self.osc_on.set(true);
        self.osc_settle.set(Some(0));
    }

    /// Number of times software turned the oscillator on.
    pub fn oscillator_enables(&self) -> u32 {
        self.osc_enables.get()
    }

    /// Number of times software polled the ready flag.
    pub fn ready_polls(&self) -> u32 {
        self.ready_polls.get()
    }

    /// Whether the oscillator drives the timer.
    pub fn kernel_clock_selected(&self) -> bool {
        self.kernel_clock.get()
    }

    /// Whether the bus clock gate is open.
    pub fn bus_clock(&self) -> bool {
        self.bus_clock.get()
    }

    /// Number of reset pulses seen.
    pub fn reset_pulses(&self) -> u32 {
        self.reset_pulses.get()
    }

    /// Prescaler register.
    pub fn prescaler(&self) -> Prescaler {
        self.prescaler.get()
    }

    /// Reload-match interrupt enable.
    pub fn reload_interrupt_enabled(&self) -> bool {
        self.reload_irq.get()
    }

    /// Timer enable bit.
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Whether a start command is in effect.
    pub fn counting(&self) -> bool {
        self.counting.get()
    }

    /// Reload register.
    pub fn reload(&self) -> u16 {
        self.reload.get()
    }

    /// Reload-match flag.
    pub fn reload_pending(&self) -> bool {
        self.reload_flag.get()
    }

    /// Number of interrupt acknowledgements.
    pub fn acknowledgements(&self) -> u32 {
        self.acks.get()
    }

    /// Whether the interrupt controller lets the timer's line through.
    pub fn interrupt_unmasked(&self) -> bool {
        self.unmasked.get()
    }

    fn oscillator_running(&self) -> bool {
        self.osc_on.get() && self.osc_settle.get() == Some(0)
    }

    fn writable(&self) -> bool {
        self.bus_clock.get()
    }

    /// Advances the counter by one tick, if it's running. Rolling over sets
    /// the reload-match flag.
    pub fn tick(&self) {
        let running = self.oscillator_running()
            && self.kernel_clock.get()
            && self.bus_clock.get()
            && self.enabled.get()
            && self.counting.get();
        if !running {
            return;
        }
        let count = self.count.get();
        if count >= self.reload.get() {
            self.count.set(0);
            self.reload_flag.set(true);
        } else {
            self.count.set(count + 1);
        }
    }

    /// Whether the interrupt would be taken right now.
    pub fn interrupt_asserted(&self) -> bool {
        self.reload_flag.get() && self.reload_irq.get() && self.unmasked.get()
    }
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeHardware for SimTimer {
    fn pulse_reset(&self) {
        self.reset_pulses.set(self.reset_pulses.get() + 1);
        self.prescaler.set(Prescaler::default());
        self.reload_irq.set(false);
        self.enabled.set(false);
        self.counting.set(false);
        self.reload.set(RELOAD_RESET);
        self.count.set(0);
        self.reload_flag.set(false);
    }

    fn oscillator_enabled(&self) -> bool {
        self.osc_on.get()
    }

    fn enable_oscillator(&self) {
        self.osc_enables.set(self.osc_enables.get() + 1);
        self.osc_on.set(true);
    }

    fn oscillator_ready(&self) -> bool {
        self.ready_polls.set(self.ready_polls.get() + 1);
        if !self.osc_on.get() {
            return false;
        }
        match self.osc_settle.get() {
            Some(0) => true,
            Some(n) => {
                self.osc_settle.set(Some(n - 1));
                false
            }
            None => false,
        }
    }

    fn select_kernel_clock(&self) {
        self.kernel_clock.set(true);
    }

    fn set_bus_clock(&self, enabled: bool) {
        self.bus_clock.set(enabled);
    }

    fn set_prescaler(&self, prescaler: Prescaler) {
        if self.writable() && !self.enabled.get() {
            self.prescaler.set(prescaler);
        }
    }

    fn enable_reload_interrupt(&self) {
        if self.writable() && !self.enabled.get() {
            self.reload_irq.set(true);
        }
    }

    fn set_enabled(&self, enabled: bool) {
        if !self.writable() {
            return;
        }
        self.enabled.set(enabled);
        if !enabled {
            // The count freezes where it is; a start command is needed to get
            // going again.
            self.counting.set(false);
        }
    }

    fn set_reload(&self, reload: u16) {
        if self.writable() && self.enabled.get() {
            self.reload.set(reload);
        }
    }

    fn start_counter(&self) {
        if self.writable() && self.enabled.get() {
            self.count.set(0);
            self.counting.set(true);
        }
    }

    fn set_interrupt_unmasked(&self, unmasked: bool) {
        self.unmasked.set(unmasked);
    }

    fn acknowledge(&self) {
        self.acks.set(self.acks.get() + 1);
        if self.writable() {
            self.reload_flag.set(false);
        }
    }

    fn count(&self) -> u16 {
        self.count.get()
    }
}

/// An [`Uptime`] over a [`SimTimer`], plus the interrupt controller that
/// connects them.
#[derive(Debug)]
pub struct SimClock {
    uptime: Uptime<SimTimer>,
    poll_step: Cell<u32>,
    ticks: Cell<u64>,
}

impl SimClock {
    /// A clock over a fresh [`SimTimer`], with the default configuration. It
    /// still needs to be initialized.
    pub fn new() -> Self {
        Self::with_timer(SimTimer::new())
    }

    /// A clock over `hw`, with the default configuration.
    pub fn with_timer(hw: SimTimer) -> Self {
        Self {
            uptime: Uptime::new(hw, Config::DEFAULT),
            poll_step: Cell::new(1),
            ticks: Cell::new(0),
        }
    }

    /// The clock under test.
    pub fn uptime(&self) -> &Uptime<SimTimer> {
        &self.uptime
    }

    /// Sets how many ticks pass each time a waiter relaxes. The default is 1.
    pub fn set_poll_step(&self, ticks: u32) {
        self.poll_step.set(ticks);
    }

    /// Ticks simulated so far, whether or not the timer was running.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Lets `ticks` ticks of time pass, delivering interrupts as they occur.
    pub fn advance(&self, ticks: u32) {
        self.service();
        for _ in 0..ticks {
            self.uptime.hardware().tick();
            self.ticks.set(self.ticks.get() + 1);
            self.service();
        }
    }

    /// Delivers the timer interrupt if it's asserted.
    fn service(&self) {
        if self.uptime.hardware().interrupt_asserted() {
            self.uptime.on_interrupt();
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn milliseconds(&self) -> u32 {
        self.uptime.milliseconds()
    }

    fn microseconds(&self) -> u32 {
        self.uptime.microseconds()
    }

    fn relax(&self) {
        self.advance(self.poll_step.get());
    }
}
