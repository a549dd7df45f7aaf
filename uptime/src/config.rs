// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timer configuration.
//!
//! The time base always runs with a 1 µs tick and a 1000-tick (1 ms) reload
//! period; everything else in the crate assumes it. What varies is how you get
//! a 1 MHz tick out of the source oscillator, which is the prescaler's job.

use crate::Error;

/// Frequency of the STM32 `HSI16` internal oscillator.
pub const HSI16_HZ: u32 = 16_000_000;

/// Timer tick rate after the prescaler. One tick is one microsecond.
pub const TICK_HZ: u32 = 1_000_000;

/// Ticks per reload period. One period is one millisecond.
pub const PERIOD_TICKS: u32 = 1000;

/// Value programmed into the reload register: the counter runs `0..=RELOAD`.
pub const RELOAD: u16 = (PERIOD_TICKS - 1) as u16;

/// Input clock divider of the low-power timer.
///
/// The discriminants are the register encoding of the `PRESC` field.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Prescaler {
    /// Undivided. This is the hardware reset value.
    #[default]
    Div1 = 0b000,
    #[allow(missing_docs)]
    Div2 = 0b001,
    #[allow(missing_docs)]
    Div4 = 0b010,
    #[allow(missing_docs)]
    Div8 = 0b011,
    #[allow(missing_docs)]
    Div16 = 0b100,
    #[allow(missing_docs)]
    Div32 = 0b101,
    #[allow(missing_docs)]
    Div64 = 0b110,
    #[allow(missing_docs)]
    Div128 = 0b111,
}

impl Prescaler {
    /// Value of the register field.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// How many input cycles make one tick.
    pub const fn divisor(self) -> u32 {
        1 << self.bits()
    }

    /// Finds the prescaler that divides by exactly `ratio`, if there is one.
    pub const fn from_divisor(ratio: u32) -> Option<Self> {
        match ratio {
            1 => Some(Self::Div1),
            2 => Some(Self::Div2),
            4 => Some(Self::Div4),
            8 => Some(Self::Div8),
            16 => Some(Self::Div16),
            32 => Some(Self::Div32),
            64 => Some(Self::Div64),
            128 => Some(Self::Div128),
            _ => None,
        }
    }
}

/// Static configuration of the time base, chosen once before
/// [`initialize`][crate::Uptime::initialize].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    source_hz: u32,
    prescaler: Prescaler,
}

impl Config {
    /// `HSI16` divided by 16.
    pub const DEFAULT: Self = Self {
        source_hz: HSI16_HZ,
        prescaler: Prescaler::Div16,
    };

    /// Builds a configuration for a source oscillator running at `source_hz`
    /// and an explicit `prescaler`.
    ///
    /// Fails with [`Error::UnsupportedClock`] unless the pair produces exactly
    /// [`TICK_HZ`].
    pub const fn new(source_hz: u32, prescaler: Prescaler) -> Result<Self, Error> {
        if source_hz / prescaler.divisor() != TICK_HZ
            || source_hz % prescaler.divisor() != 0
        {
            return Err(Error::UnsupportedClock);
        }
        Ok(Self { source_hz, prescaler })
    }

    /// Builds a configuration for a source oscillator running at `source_hz`,
    /// picking whichever prescaler produces a 1 MHz tick.
    pub const fn for_source(source_hz: u32) -> Result<Self, Error> {
        if source_hz % TICK_HZ != 0 {
            return Err(Error::UnsupportedClock);
        }
        match Prescaler::from_divisor(source_hz / TICK_HZ) {
            Some(prescaler) => Ok(Self { source_hz, prescaler }),
            None => Err(Error::UnsupportedClock),
        }
    }

    /// Frequency of the oscillator feeding the timer.
    pub const fn source_hz(&self) -> u32 {
        self.source_hz
    }

    /// Prescaler that turns the source frequency into [`TICK_HZ`].
    pub const fn prescaler(&self) -> Prescaler {
        self.prescaler
    }

    /// Value for the timer's reload register.
    pub const fn reload(&self) -> u16 {
        RELOAD
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_hsi16_over_16() {
        assert_eq!(Config::new(HSI16_HZ, Prescaler::Div16), Ok(Config::DEFAULT));
        assert_eq!(Config::for_source(HSI16_HZ), Ok(Config::DEFAULT));
        assert_eq!(Config::DEFAULT.reload(), 999);
    }

    #[test]
    fn prescaler_encoding() {
        assert_eq!(Prescaler::Div16.bits(), 0b100);
        assert_eq!(Prescaler::Div128.divisor(), 128);
        assert_eq!(Prescaler::default(), Prescaler::Div1);
        assert_eq!(Prescaler::from_divisor(3), None);
    }

    #[test]
    fn rejects_clocks_that_miss_one_megahertz() {
        assert_eq!(
            Config::new(HSI16_HZ, Prescaler::Div8),
            Err(Error::UnsupportedClock),
        );
        assert_eq!(Config::for_source(12_000_000), Err(Error::UnsupportedClock));
        assert_eq!(Config::for_source(16_500_000), Err(Error::UnsupportedClock));

        let msi = Config::for_source(4_000_000).unwrap();
        assert_eq!(msi.prescaler(), Prescaler::Div4);
        assert_eq!(msi.source_hz(), 4_000_000);
    }
}
