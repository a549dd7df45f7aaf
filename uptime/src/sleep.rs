// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative delays, as futures.
//!
//! These wait for the same thresholds as the busy-waits in
//! [`delay`][crate::delay], but instead of spinning they return `Pending` and
//! ask to be polled again, so an executor can run other tasks in between.
//! The uptime clock has no way to wake a task at a particular time, so a
//! sleeping task wakes itself on every poll. That keeps the executor busy;
//! it's a substitute for busy-waiting, not a low-power sleep.
//!
//! The start time is captured when the future is _created,_ not when it's
//! first polled, so
//!
//! ```ignore
//! let nap = sleep_ms(&UPTIME, 10);
//! do_something_slow();
//! nap.await;
//! ```
//!
//! waits only for whatever is left of the 10 ms.
//!
//! # Cancellation
//!
//! **Cancel safety:** Strict.
//!
//! Dropping any of these futures does nothing in particular.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use pin_project::pin_project;

use crate::time::{since, Clock, Unit};

/// Returns a future that resolves once `ms` milliseconds have elapsed on
/// `clock`.
pub fn sleep_ms<C: Clock + ?Sized>(clock: &C, ms: u32) -> Sleep<'_, C> {
    Sleep::new(clock, Unit::Millis, ms)
}

/// Returns a future that resolves once `us` microseconds have elapsed on
/// `clock`.
pub fn sleep_us<C: Clock + ?Sized>(clock: &C, us: u32) -> Sleep<'_, C> {
    Sleep::new(clock, Unit::Micros, us)
}

/// Future returned by [`sleep_ms`] and [`sleep_us`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
pub struct Sleep<'a, C: ?Sized> {
    clock: &'a C,
    unit: Unit,
    start: u32,
    duration: u32,
}

impl<'a, C: Clock + ?Sized> Sleep<'a, C> {
    fn new(clock: &'a C, unit: Unit, duration: u32) -> Self {
        Self {
            clock,
            unit,
            start: unit.read(clock),
            duration,
        }
    }

    /// Checks whether the interval has passed, without polling.
    pub fn is_elapsed(&self) -> bool {
        since(self.unit.read(self.clock), self.start) >= self.duration
    }
}

impl<C: Clock + ?Sized> Future for Sleep<'_, C> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_elapsed() {
            Poll::Ready(())
        } else {
            // Nothing else will wake us.
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Alters a future to impose a timeout on its completion.
///
/// Concretely,
/// - The output type is changed from `T` to `Option<T>`.
/// - If the future resolves on any poll that starts before `ms` milliseconds
///   have elapsed, its result is produced, wrapped in `Some`.
/// - If poll is called once the time is up, the future resolves to `None`.
///
/// As with [`sleep_ms`], the clock starts when this is called.
///
/// The wrapped future is _not_ immediately dropped if the timeout expires. It
/// will be dropped when you drop the wrapped version.
pub fn with_timeout_ms<'a, C, F>(clock: &'a C, ms: u32, code: F) -> TimeLimited<Sleep<'a, C>, F>
    where C: Clock + ?Sized,
          F: Future,
{
    TimeLimited {
        limiter: sleep_ms(clock, ms),
        process: code,
    }
}

/// Microsecond version of [`with_timeout_ms`].
pub fn with_timeout_us<'a, C, F>(clock: &'a C, us: u32, code: F) -> TimeLimited<Sleep<'a, C>, F>
    where C: Clock + ?Sized,
          F: Future,
{
    TimeLimited {
        limiter: sleep_us(clock, us),
        process: code,
    }
}

/// A future-wrapper that gates polling a future `B` on whether another
/// future `A` has resolved.
///
/// Once `A` resolved, `B` is no longer polled and the combined future
/// resolves to `None`. If `B` resolves first, its result is produced
/// wrapped in `Some`.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
#[pin_project]
pub struct TimeLimited<A, B> {
    #[pin]
    limiter: A,
    #[pin]
    process: B,
}

impl<A, B> Future for TimeLimited<A, B>
    where A: Future<Output = ()>,
          B: Future,
{
    type Output = Option<B::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let p = self.project();
        // We always check the limiter first. If the limiter's condition has
        // occurred, we bail, even if the limited process is also ready.
        if let Poll::Ready(()) = p.limiter.poll(cx) {
            return Poll::Ready(None);
        }
        p.process.poll(cx).map(Some)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::undocumented_unsafe_blocks)]

    use core::{
        cell::Cell,
        future::Future,
        mem::forget,
        pin::pin,
        sync::atomic::{AtomicUsize, Ordering},
        task::{Context, Poll, RawWaker, RawWakerVTable, Waker},
    };
    use std::sync::Arc;

    use super::*;
    use crate::config::PERIOD_TICKS;
    use crate::sim::SimClock;

    /// VTable for the spy waker.
    static VTABLE: RawWakerVTable = RawWakerVTable::new(
        // clone
        |p| {
            let arc = unsafe { Arc::from_raw(p as *const AtomicUsize) };
            let second_arc = Arc::clone(&arc);
            forget(arc);
            RawWaker::new(Arc::into_raw(second_arc) as *const (), &VTABLE)
        },
        // wake
        |p| {
            let arc = unsafe { Arc::from_raw(p as *const AtomicUsize) };
            arc.fetch_add(1, Ordering::Relaxed);
            // drop it to release our count.
        },
        // wake_by_ref
        |p| {
            let arc = unsafe { Arc::from_raw(p as *const AtomicUsize) };
            arc.fetch_add(1, Ordering::Relaxed);
            forget(arc);
        },
        // drop
        |p| {
            let _arc = unsafe { Arc::from_raw(p as *const AtomicUsize) };
        },
    );

    /// Produces a `Waker` and also a shared `AtomicUsize` that counts how many
    /// times the waker is actually used.
    fn spy_waker() -> (Arc<AtomicUsize>, Waker) {
        let count = Arc::new(AtomicUsize::new(0));
        let second_count = Arc::clone(&count);
        (count, unsafe {
            Waker::from_raw(RawWaker::new(
                Arc::into_raw(second_count) as *const (),
                &VTABLE,
            ))
        })
    }

    fn running() -> SimClock {
        let clock = SimClock::new();
        clock.uptime().initialize();
        clock
    }

    #[test]
    fn sleep_pends_and_self_wakes() {
        let clock = running();
        let (wake_count, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let mut nap = pin!(sleep_ms(&clock, 3));
        assert!(nap.as_mut().poll(&mut ctx).is_pending());
        assert_eq!(wake_count.load(Ordering::Relaxed), 1);

        clock.advance(PERIOD_TICKS * 2);
        assert!(nap.as_mut().poll(&mut ctx).is_pending());
        assert_eq!(wake_count.load(Ordering::Relaxed), 2);

        clock.advance(PERIOD_TICKS);
        assert!(nap.as_mut().poll(&mut ctx).is_ready());
        assert_eq!(wake_count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn sleep_clock_starts_at_creation() {
        let clock = running();
        let (_, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let nap = sleep_us(&clock, 500);
        clock.advance(500);
        assert!(nap.is_elapsed());
        let mut nap = pin!(nap);
        assert_eq!(nap.as_mut().poll(&mut ctx), Poll::Ready(()));
    }

    #[test]
    fn zero_sleep_is_ready_at_once() {
        let clock = running();
        let (wake_count, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let nap = pin!(sleep_ms(&clock, 0));
        assert!(nap.poll(&mut ctx).is_ready());
        assert_eq!(wake_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn block_on_sleep_with_advancing_clock() {
        // Every read of the clock moves it forward, so an executor that
        // just re-polls will eventually get there.
        struct Ticking(Cell<u32>);
        impl Clock for Ticking {
            fn milliseconds(&self) -> u32 {
                self.microseconds() / 1000
            }
            fn microseconds(&self) -> u32 {
                let now = self.0.get();
                self.0.set(now + 7);
                now
            }
        }

        let clock = Ticking(Cell::new(0));
        futures::executor::block_on(sleep_us(&clock, 1000));
        assert!(clock.0.get() >= 1000);
        futures::executor::block_on(sleep_ms(&clock, 2));
        assert!(clock.0.get() >= 3000);
    }

    #[test]
    fn timeout_lets_fast_futures_through() {
        let clock = running();
        let (_, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let fut = pin!(with_timeout_ms(&clock, 5, async { 42 }));
        assert_eq!(fut.poll(&mut ctx), Poll::Ready(Some(42)));
    }

    #[test]
    fn timeout_cuts_off_slow_futures() {
        let clock = running();
        let (_, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let mut fut = pin!(with_timeout_us(
            &clock,
            1500,
            sleep_ms(&clock, 10),
        ));
        assert!(fut.as_mut().poll(&mut ctx).is_pending());
        clock.advance(1499);
        assert!(fut.as_mut().poll(&mut ctx).is_pending());
        clock.advance(1);
        assert_eq!(fut.as_mut().poll(&mut ctx), Poll::Ready(None));
    }

    #[test]
    fn timeout_wins_ties() {
        let clock = running();
        let (_, waker) = spy_waker();
        let mut ctx = Context::from_waker(&waker);

        let mut fut = pin!(with_timeout_ms(&clock, 2, sleep_ms(&clock, 2)));
        clock.advance(PERIOD_TICKS * 2);
        assert_eq!(fut.as_mut().poll(&mut ctx), Poll::Ready(None));
    }
}
