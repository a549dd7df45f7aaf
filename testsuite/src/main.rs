// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-target test suite, STM32G474.
//!
//! Runs the uptime clock against the real `LPTIM1` and reports over
//! semihosting. Build it for `thumbv7em-none-eabihf` with a linker script for
//! your board, and run it under a debugger with semihosting enabled.
//!
//! Semihosting calls stop the CPU but not `LPTIM1`, so these tests only check
//! relations that hold no matter how long a print takes.

#![no_std]
#![no_main]

// get the panic handler
use panic_semihosting as _;

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll};

use cortex_m_semihosting::{hprint, hprintln};
use lptim_uptime::config::Config;
use lptim_uptime::stm32g4::Lptim1;
use lptim_uptime::{sleep, State, Uptime};
use stm32g4::stm32g474::interrupt;

static UPTIME: Uptime<Lptim1> =
    // Safety: nothing else in this program touches LPTIM1.
    Uptime::new(unsafe { Lptim1::conjure() }, Config::DEFAULT);

#[interrupt]
fn LPTIM1() {
    UPTIME.on_interrupt();
}

macro_rules! tests {
    ($($name:path,)*) => {
        $(
            hprint!(concat!(stringify!($name), "... "));
            $name();
            hprintln!("OK");
        )*
    };
}

#[cortex_m_rt::entry]
fn main() -> ! {
    tests! {
        test_initialize,
        test_clock_advancing,
        test_microseconds_track_milliseconds,
        test_monotonic_microseconds,
        test_delay_ms,
        test_delay_us,
        test_suspend_resume,
        test_reset,
        test_sleep,
        test_deinit_reinit,
    }

    hprintln!("tests complete.");
    cortex_m_semihosting::debug::exit(cortex_m_semihosting::debug::EXIT_SUCCESS);
    loop {
        cortex_m::asm::wfi();
    }
}

fn test_initialize() {
    UPTIME
        .initialize_with_timeout(1_000_000)
        .unwrap_or_else(|e| panic!("{}", e));
    assert_eq!(UPTIME.state(), State::Running);
}

fn test_clock_advancing() {
    let t1 = UPTIME.milliseconds();
    while UPTIME.milliseconds() == t1 {}
    let t2 = UPTIME.milliseconds();
    assert!(t2 > t1);
}

fn test_microseconds_track_milliseconds() {
    for _ in 0..10_000 {
        let ms = UPTIME.milliseconds();
        let us = UPTIME.microseconds();
        let ms2 = UPTIME.milliseconds();
        assert!(us >= (ms * 1000).saturating_sub(1000));
        assert!(us <= ms2 * 1000 + 1000);
    }
}

fn test_monotonic_microseconds() {
    let mut last = UPTIME.microseconds_monotonic();
    for _ in 0..10_000 {
        let now = UPTIME.microseconds_monotonic();
        assert!(now >= last, "went backwards: {} -> {}", last, now);
        last = now;
    }
}

fn test_delay_ms() {
    let start = UPTIME.milliseconds();
    UPTIME.delay_ms(20);
    assert!(UPTIME.milliseconds().wrapping_sub(start) >= 20);
}

fn test_delay_us() {
    let start = UPTIME.microseconds_monotonic();
    UPTIME.delay_us(2500);
    // delay_us uses the unguarded read, so allow it a period of slack.
    assert!(UPTIME.microseconds_monotonic().wrapping_sub(start) >= 1500);
}

fn test_suspend_resume() {
    UPTIME.suspend();
    let frozen = UPTIME.milliseconds();
    cortex_m::asm::delay(1_000_000);
    assert_eq!(UPTIME.milliseconds(), frozen);

    UPTIME.resume();
    let us = UPTIME.microseconds();
    let base = UPTIME.milliseconds() * 1000;
    assert!(us >= base && us < base + 1000);
    UPTIME.delay_ms(2);
    assert!(UPTIME.milliseconds() > frozen);
}

fn test_reset() {
    UPTIME.delay_ms(3);
    UPTIME.reset();
    assert_eq!(UPTIME.milliseconds(), 0);
    assert_eq!(UPTIME.state(), State::Uninitialized);
    UPTIME.initialize();
    UPTIME.delay_ms(1);
    assert!(UPTIME.milliseconds() >= 1);
}

fn test_sleep() {
    let start = UPTIME.milliseconds();
    block_on(sleep::sleep_ms(&UPTIME, 5));
    assert!(UPTIME.milliseconds().wrapping_sub(start) >= 5);

    let r = block_on(sleep::with_timeout_ms(
        &UPTIME,
        2,
        sleep::sleep_ms(&UPTIME, 50),
    ));
    assert_eq!(r, None);
}

fn test_deinit_reinit() {
    UPTIME.deinitialize();
    assert_eq!(UPTIME.milliseconds(), 0);
    assert!(UPTIME.try_milliseconds().is_err());
    UPTIME.initialize();
    UPTIME.delay_ms(2);
    assert!(UPTIME.milliseconds() >= 2);
}

/// Polls `fut` until it resolves. The sleep futures wake themselves, so there's
/// no point in waiting for a wakeup.
fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let mut ctx = Context::from_waker(futures::task::noop_waker_ref());
    loop {
        if let Poll::Ready(v) = fut.as_mut().poll(&mut ctx) {
            break v;
        }
    }
}
