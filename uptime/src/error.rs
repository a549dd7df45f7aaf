// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors reported by the checked operations.
//!
//! The plain operations on [`Uptime`][crate::Uptime] never fail -- they hang or
//! return garbage instead. These errors come from their checked counterparts.

use core::fmt;

/// Things that can go wrong when you ask to be told about it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The oscillator didn't report ready within the allowed number of polls.
    /// The timer has been left in reset.
    OscillatorTimeout,
    /// The clock was queried while not initialized (never initialized, or
    /// reset/deinitialized since).
    NotInitialized,
    /// The source clock can't be divided down to a 1 MHz tick by any of the
    /// timer's prescaler settings.
    UnsupportedClock,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OscillatorTimeout => f.write_str("oscillator never became ready"),
            Self::NotInitialized => f.write_str("uptime clock is not initialized"),
            Self::UnsupportedClock => {
                f.write_str("source clock cannot produce a 1 MHz tick")
            }
        }
    }
}
