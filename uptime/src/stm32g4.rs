// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STM32G4 backend: `LPTIM1` clocked from `HSI16`.
//!
//! **Note:** this module is only available with the `stm32g4` feature.
//!
//! `HSI16` is divided by 16 to give a 1 MHz tick; `LPTIM1` reloads every 1000
//! ticks and raises `LPTIM1` at the NVIC on each reload. Accuracy is that of
//! `HSI16`, within about ±2%.
//!
//! This backend touches four RCC registers (`CR`, `CCIPR`, `APB1ENR1`,
//! `APB1RSTR1`) with read-modify-write sequences that only change the bits
//! belonging to `HSI16` and `LPTIM1`. Those sequences are not atomic, so don't
//! initialize the uptime clock while an interrupt handler might be
//! reconfiguring the RCC.

use core::ops::Deref;

use cortex_m::peripheral::NVIC;
use stm32g4::stm32g474 as device;

use device::{Interrupt, LPTIMER1 as LPTIM1, RCC};

use crate::config::Prescaler;
use crate::hal::UptimeHardware;

type LptimRegs = <LPTIM1 as Deref>::Target;
type RccRegs = <RCC as Deref>::Target;

/// `CCIPR.LPTIM1SEL` value selecting `HSI16`.
const LPTIM1SEL_HSI16: u8 = 0b10;

/// Ownership token for `LPTIM1`.
///
/// Zero-sized; registers are reached through the PAC's fixed addresses.
#[derive(Debug)]
pub struct Lptim1 {
    _private: (),
}

impl Lptim1 {
    /// Takes ownership of the timer.
    pub fn new(_lptim: LPTIM1) -> Self {
        Self { _private: () }
    }

    /// Produces a token without proof of ownership, so that one can be built
    /// in a `static` initializer.
    ///
    /// # Safety
    ///
    /// Nothing else in the program may use `LPTIM1`, its RCC enable/reset
    /// bits, or its NVIC line, and there must be only one `Lptim1`.
    pub const unsafe fn conjure() -> Self {
        Self { _private: () }
    }

    fn lptim(&self) -> &'static LptimRegs {
        // Safety: we own LPTIM1 (see `new`/`conjure`), and every access below
        // is a single volatile register operation.
        unsafe { &*LPTIM1::ptr() }
    }

    fn rcc(&self) -> &'static RccRegs {
        // Safety: we only touch the HSI16 and LPTIM1 bits; see module docs
        // about the read-modify-write caveat.
        unsafe { &*RCC::ptr() }
    }
}

impl UptimeHardware for Lptim1 {
    fn pulse_reset(&self) {
        let rcc = self.rcc();
        rcc.apb1rstr1.modify(|_, w| w.lptim1rst().set_bit());
        rcc.apb1rstr1.modify(|_, w| w.lptim1rst().clear_bit());
    }

    fn oscillator_enabled(&self) -> bool {
        self.rcc().cr.read().hsion().bit_is_set()
    }

    fn enable_oscillator(&self) {
        self.rcc().cr.modify(|_, w| w.hsion().set_bit());
    }

    fn oscillator_ready(&self) -> bool {
        self.rcc().cr.read().hsirdy().bit_is_set()
    }

    fn select_kernel_clock(&self) {
        self.rcc()
            .ccipr
            .modify(|_, w| unsafe { w.lptim1sel().bits(LPTIM1SEL_HSI16) });
    }

    fn set_bus_clock(&self, enabled: bool) {
        self.rcc().apb1enr1.modify(|_, w| w.lptim1en().bit(enabled));
    }

    fn set_prescaler(&self, prescaler: Prescaler) {
        self.lptim()
            .cfgr
            .write(|w| unsafe { w.presc().bits(prescaler.bits()) });
    }

    fn enable_reload_interrupt(&self) {
        self.lptim().ier.write(|w| w.arrmie().set_bit());
    }

    fn set_enabled(&self, enabled: bool) {
        self.lptim().cr.modify(|_, w| w.enable().bit(enabled));
    }

    fn set_reload(&self, reload: u16) {
        self.lptim().arr.write(|w| unsafe { w.arr().bits(reload) });
    }

    fn start_counter(&self) {
        self.lptim().cr.modify(|_, w| w.cntstrt().set_bit());
    }

    fn set_interrupt_unmasked(&self, unmasked: bool) {
        if unmasked {
            // Safety: the handler only touches the atomics in `Uptime`, so
            // unmasking can't break a critical section elsewhere.
            unsafe { NVIC::unmask(Interrupt::LPTIM1) }
        } else {
            NVIC::mask(Interrupt::LPTIM1);
        }
    }

    fn acknowledge(&self) {
        self.lptim()
            .icr
            .write(|w| w.arrmcf().set_bit().cmpmcf().set_bit());
    }

    fn count(&self) -> u16 {
        self.lptim().cnt.read().cnt().bits()
    }
}
