// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hardware seam.
//!
//! [`Uptime`][crate::Uptime] never touches registers itself. Everything it
//! needs from the chip is listed in [`UptimeHardware`], which is small enough
//! to implement for other low-power timers, or for a simulation (see
//! [`sim`][crate::sim]).
//!
//! All methods take `&self`, because the same backend is used from thread mode
//! and from the timer interrupt. Implementations are expected to behave like
//! memory-mapped registers: each call is a single volatile access (or a short
//! read-modify-write of bits nobody else owns).

use crate::config::Prescaler;

/// Register-level capabilities of an oscillator plus a low-power timer.
///
/// The methods are listed in the order [`Uptime::initialize`] uses them.
///
/// [`Uptime::initialize`]: crate::Uptime::initialize
pub trait UptimeHardware {
    /// Asserts and then releases the timer's reset line, returning all of its
    /// registers to power-on defaults. Does not affect the bus clock gate or
    /// the interrupt controller.
    fn pulse_reset(&self);

    /// Checks whether the oscillator's enable bit is set.
    fn oscillator_enabled(&self) -> bool;

    /// Sets the oscillator's enable bit.
    fn enable_oscillator(&self);

    /// Checks the oscillator's ready flag.
    fn oscillator_ready(&self) -> bool;

    /// Selects the oscillator as the timer's kernel clock.
    fn select_kernel_clock(&self);

    /// Opens or closes the timer's bus clock gate.
    fn set_bus_clock(&self, enabled: bool);

    /// Programs the input prescaler. Only effective while the timer is
    /// disabled.
    fn set_prescaler(&self, prescaler: Prescaler);

    /// Enables the reload-match interrupt source. Only effective while the
    /// timer is disabled.
    fn enable_reload_interrupt(&self);

    /// Sets or clears the timer's enable bit. Clearing it freezes the counter.
    fn set_enabled(&self, enabled: bool);

    /// Programs the reload value. Only effective while the timer is enabled.
    fn set_reload(&self, reload: u16);

    /// Issues the continuous-mode start command, which restarts counting from
    /// zero. Only effective while the timer is enabled.
    fn start_counter(&self);

    /// Unmasks or masks the timer's line at the interrupt controller.
    fn set_interrupt_unmasked(&self, unmasked: bool);

    /// Clears the reload-match and compare-match flags, so the interrupt
    /// doesn't immediately fire again.
    fn acknowledge(&self);

    /// Reads the live counter, in `0..=reload`.
    fn count(&self) -> u16;

    /// Called once per iteration of every polling loop in this crate. The
    /// default is a spin-loop hint.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}
