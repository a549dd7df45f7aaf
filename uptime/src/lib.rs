// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An Arduino-style uptime clock (`millis`, `micros`, `delay`) built on a
//! single low-power timer.
//!
//! The timer is clocked from an internal oscillator that doesn't depend on the
//! CPU clock tree, so reconfiguring the core clock doesn't disturb the time
//! base. On the reference target (STM32G4) this is `LPTIM1` running from the
//! 16 MHz `HSI16` oscillator, divided by 16 to give a 1 µs tick, reloading
//! every 1000 ticks. Each reload raises an interrupt, and the interrupt handler
//! advances a millisecond counter by one.
//!
//! # Using the clock
//!
//! Create an [`Uptime`] around a hardware backend, usually in a `static` so
//! that the interrupt handler can reach it, and install its
//! [`on_interrupt`][Uptime::on_interrupt] as the handler for the timer's
//! interrupt vector:
//!
//! ```ignore
//! use lptim_uptime::{config::Config, stm32g4::Lptim1, Uptime};
//! use stm32g4::stm32g474::interrupt;
//!
//! static UPTIME: Uptime<Lptim1> =
//!     Uptime::new(unsafe { Lptim1::conjure() }, Config::DEFAULT);
//!
//! #[interrupt]
//! fn LPTIM1() {
//!     UPTIME.on_interrupt();
//! }
//!
//! fn main() -> ! {
//!     UPTIME.initialize();
//!     loop {
//!         toggle_led();
//!         UPTIME.delay_ms(500);
//!     }
//! }
//! ```
//!
//! Installing the handler is the application's job. This crate doesn't use
//! `cortex-m-rt` itself, and won't fight you over vector table entries.
//!
//! # What you get
//!
//! - [`Uptime::milliseconds`]: milliseconds since the last reset, as a `u32`
//!   that wraps after about 49.7 days.
//! - [`Uptime::microseconds`]: microseconds since the last reset, wrapping
//!   after about 71.6 minutes. This one has a caveat; see below.
//! - [`delay::delay_ms`] and [`delay::delay_us`]: busy-waits. They spin the
//!   CPU for the whole duration and can't be cancelled.
//! - [`sleep`]: cooperative versions of the delays, as `Future`s, for when
//!   you have an executor and would rather not spin.
//! - Lifecycle control: [`initialize`][Uptime::initialize],
//!   [`deinitialize`][Uptime::deinitialize], [`reset`][Uptime::reset],
//!   [`suspend`][Uptime::suspend], and [`resume`][Uptime::resume].
//!
//! # Microsecond precision
//!
//! `microseconds()` is computed as `milliseconds * 1000 + hardware count`.
//! Those are two separate reads, and the timer can roll over between them.
//! When it does, the result can be off by up to one full period (1000 µs) and
//! can even appear to go backwards for an instant. This is kept on purpose,
//! because code written against the plain version may depend on its exact
//! timing. If you need a result that never goes backwards, use
//! [`Uptime::microseconds_monotonic`], which rereads the hardware count and
//! retries if a rollover happened in the middle.
//!
//! # Errors, or the lack thereof
//!
//! The core operations report nothing. An oscillator that never becomes ready
//! makes [`Uptime::initialize`] hang, and queries made before initialization
//! return meaningless numbers. If you'd rather find out, use
//! [`Uptime::initialize_with_timeout`], [`Uptime::try_milliseconds`], and
//! [`Uptime::try_microseconds`], which return [`Error`]s.
//!
//! # Features
//!
//! - `stm32g4`: the [`stm32g4`] backend for `LPTIM1`.
//! - `sim`: the [`sim`] backend, a register model that you can drive tick by
//!   tick from tests.
//! - `embedded-hal` (default): [`delay::Delay`] implements
//!   `embedded_hal::delay::DelayNs`.
//! - `defmt` / `log`: log lifecycle transitions. The interrupt handler and the
//!   queries never log.

#![no_std]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod delay;
pub mod error;
pub mod hal;
pub mod sleep;
pub mod time;
mod uptime;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[cfg(feature = "stm32g4")]
pub mod stm32g4;

pub use error::Error;
pub use time::Clock;
pub use uptime::{State, Uptime};
