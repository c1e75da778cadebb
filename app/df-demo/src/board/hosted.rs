// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host stand-in for the board: stdout is the UART transmitter, a thread
//! reading stdin plays the receive interrupt, and another thread plays
//! SysTick.

use core::convert::Infallible;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use df_hal::{OutputPin, Uart};
use df_init::InitError;
use df_irq::LoadError;

use crate::config;

static INPUT_CLOSED: AtomicBool = AtomicBool::new(false);
static LED: AtomicBool = AtomicBool::new(false);

pub struct HostUart;

impl HostUart {
    pub fn new() -> Self {
        Self
    }
}

impl Uart for HostUart {
    fn send(&mut self, bytes: &[u8]) -> usize {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(bytes);
        let _ = out.flush();
        bytes.len()
    }

    fn available(&self) -> bool {
        false
    }

    fn receive_byte(&mut self) -> nb::Result<u8, Infallible> {
        Err(nb::Error::WouldBlock)
    }
}

pub type BoardUart = HostUart;

pub fn init() {
    let period = Duration::from_micros(1_000_000 / u64::from(config::TICK_HZ));
    std::thread::spawn(move || loop {
        std::thread::sleep(period);
        df_tick::on_tick();
    });
}

/// Starts feeding stdin to the deferred USART1 handler.
///
/// This thread simulates a receive data register that stays full until
/// software takes the byte, so it waits out `Busy` instead of losing input.
/// A real interrupt handler must not do this: it loads once and moves on,
/// as `arm_m`'s `USART1` handler does.
pub fn enable_rx() {
    std::thread::spawn(|| {
        for byte in std::io::stdin().lock().bytes() {
            let Ok(byte) = byte else { break };
            // Register still full: retry. Hosted simulation only.
            while let Err(LoadError::Busy) =
                crate::IRQS.load(config::irq::USART1, byte)
            {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        INPUT_CLOSED.store(true, Ordering::Release);
    });
}

/// True once stdin has hit end of file and every byte has been handed off.
pub fn input_closed() -> bool {
    INPUT_CLOSED.load(Ordering::Acquire)
}

pub fn idle() {
    std::thread::sleep(Duration::from_millis(1));
}

pub fn reset() -> ! {
    std::process::exit(0)
}

pub fn poweroff() -> ! {
    std::process::exit(0)
}

/// The board LED, kept in memory.
pub struct Led;

impl Led {
    pub fn is_on(&self) -> bool {
        LED.load(Ordering::Relaxed)
    }
}

impl OutputPin for Led {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        LED.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        LED.store(true, Ordering::Relaxed);
        Ok(())
    }
}

pub fn led_init() -> Result<(), InitError> {
    Led.set_low().map_err(|_| InitError(-1))
}
