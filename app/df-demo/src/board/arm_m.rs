// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STM32F407 Discovery: shell on USART1 (PA9/PA10, 115200 8N1), LED on PD12.

use core::convert::Infallible;

use cortex_m::peripheral::{NVIC, SCB};
use cortex_m_rt::exception;
use df_hal::{OutputPin, Uart};
use df_init::InitError;
use stm32f4::stm32f407 as device;
use stm32f4::stm32f407::{interrupt, Interrupt};

use crate::config;

const BAUDRATE: u32 = 115_200;

pub struct ArmUart {
    usart: &'static device::usart1::RegisterBlock,
}

impl ArmUart {
    pub fn new() -> Self {
        Self {
            usart: unsafe { &*device::USART1::ptr() },
        }
    }
}

impl Uart for ArmUart {
    fn send(&mut self, bytes: &[u8]) -> usize {
        let Some(&byte) = bytes.first() else { return 0 };
        while !self.usart.sr.read().txe().bit() {}
        self.usart.dr.write(|w| w.dr().bits(u16::from(byte)));
        1
    }

    fn available(&self) -> bool {
        self.usart.sr.read().rxne().bit()
    }

    fn receive_byte(&mut self) -> nb::Result<u8, Infallible> {
        if self.available() {
            Ok(self.usart.dr.read().bits() as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

pub type BoardUart = ArmUart;

/// Starts SysTick and brings up USART1 with its receiver still quiet.
pub fn init() {
    let mut cp = unsafe { cortex_m::Peripherals::steal() };
    df_tick::start_systick(
        &mut cp.SYST,
        config::CORE_CLOCK_HZ,
        config::TICK_HZ,
    );

    let rcc = unsafe { &*device::RCC::ptr() };
    rcc.ahb1enr.modify(|_, w| w.gpioaen().set_bit());
    rcc.apb2enr.modify(|_, w| w.usart1en().set_bit());

    let gpioa = unsafe { &*device::GPIOA::ptr() };
    gpioa
        .moder
        .modify(|_, w| w.moder9().alternate().moder10().alternate());
    gpioa.afrh.modify(|_, w| w.afrh9().af7().afrh10().af7());

    let usart = unsafe { &*device::USART1::ptr() };
    usart.cr1.write(|w| w.ue().enabled());
    const CYCLES_PER_BIT: u32 =
        (config::CORE_CLOCK_HZ + (BAUDRATE / 2)) / BAUDRATE;
    usart.brr.write(|w| {
        w.div_mantissa()
            .bits((CYCLES_PER_BIT >> 4) as u16)
            .div_fraction()
            .bits(CYCLES_PER_BIT as u8 & 0xF)
    });
    usart.cr1.modify(|_, w| w.te().enabled().re().enabled());
}

/// Unmasks the receive interrupt. Call once the shell is ready to take
/// bytes.
pub fn enable_rx() {
    let usart = unsafe { &*device::USART1::ptr() };
    usart.cr1.modify(|_, w| w.rxneie().enabled());
    unsafe { NVIC::unmask(Interrupt::USART1) };
}

#[interrupt]
fn USART1() {
    let usart = unsafe { &*device::USART1::ptr() };
    let sr = usart.sr.read();
    if sr.rxne().bit() || sr.ore().bit() {
        // Reading DR clears both flags.
        let byte = usart.dr.read().bits() as u8;
        // A byte arriving while the previous one is still pending is lost.
        let _ = crate::IRQS.load(config::irq::USART1, byte);
    }
}

#[exception]
fn SysTick() {
    df_tick::on_tick();
}

/// Never true on hardware; the UART does not close.
pub fn input_closed() -> bool {
    false
}

pub fn idle() {
    cortex_m::asm::wfi();
}

pub fn reset() -> ! {
    SCB::sys_reset()
}

pub fn poweroff() -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}

/// Green LED on PD12.
pub struct Led;

impl Led {
    pub fn is_on(&self) -> bool {
        let gpiod = unsafe { &*device::GPIOD::ptr() };
        gpiod.odr.read().odr12().bit()
    }
}

impl OutputPin for Led {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        let gpiod = unsafe { &*device::GPIOD::ptr() };
        gpiod.bsrr.write(|w| w.br12().set_bit());
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let gpiod = unsafe { &*device::GPIOD::ptr() };
        gpiod.bsrr.write(|w| w.bs12().set_bit());
        Ok(())
    }
}

pub fn led_init() -> Result<(), InitError> {
    let rcc = unsafe { &*device::RCC::ptr() };
    rcc.ahb1enr.modify(|_, w| w.gpioden().set_bit());
    let gpiod = unsafe { &*device::GPIOD::ptr() };
    gpiod.moder.modify(|_, w| w.moder12().output());
    Led.set_low().map_err(|_| InitError(-1))
}
