// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Millisecond tick source.
//!
//! The board's periodic timer interrupt (SysTick on Cortex-M, a thread on
//! hosted builds) calls [`on_tick`] once per period. Everything else reads the
//! counter with [`get_tick`]. The counter starts at zero, is never reset, and
//! wraps at `u32::MAX`; use [`elapsed_since`] rather than plain subtraction
//! when comparing two readings.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU32, Ordering};

/// Tick rate assumed when a board doesn't say otherwise.
pub const DEFAULT_TICK_HZ: u32 = 1000;

/// A monotonic, wrapping tick counter with a single writer.
///
/// The counter is advanced with a separate load and store rather than a
/// read-modify-write, since ARMv6-M has no atomic RMW instructions. This is
/// only sound because exactly one context (the tick interrupt) ever calls
/// [`TickCounter::advance`]; readers may run anywhere.
pub struct TickCounter(AtomicU32);

impl TickCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Advances the counter by one tick and returns the new value.
    pub fn advance(&self) -> u32 {
        let t = self.0.load(Ordering::Relaxed).wrapping_add(1);
        self.0.store(t, Ordering::Relaxed);
        t
    }

    pub fn now(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide tick counter.
static SYSTEM_TICK: TickCounter = TickCounter::new();

/// Returns the current tick count.
pub fn get_tick() -> u32 {
    SYSTEM_TICK.now()
}

/// Called from the periodic timer interrupt. Must not be called from more than
/// one context.
pub fn on_tick() -> u32 {
    SYSTEM_TICK.advance()
}

/// Ticks elapsed between `start` and now, correct across one wraparound.
pub fn elapsed_since(start: u32) -> u32 {
    elapsed(start, get_tick())
}

/// Ticks elapsed between two readings, correct across one wraparound.
pub const fn elapsed(start: u32, end: u32) -> u32 {
    end.wrapping_sub(start)
}

/// Largest value the 24-bit SysTick reload register holds.
pub const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

/// Computes the SysTick reload value for a core clock and tick rate.
///
/// SysTick counts from the reload value down to zero inclusive, so the period
/// is `reload + 1` cycles. The inputs must satisfy
/// [`checked_reload_value`].
pub const fn reload_value(core_clock_hz: u32, tick_hz: u32) -> u32 {
    core_clock_hz / tick_hz - 1
}

/// [`reload_value`], or `None` if `tick_hz` is zero, faster than the core
/// clock, or too slow for the reload register.
pub const fn checked_reload_value(
    core_clock_hz: u32,
    tick_hz: u32,
) -> Option<u32> {
    if tick_hz == 0 || tick_hz > core_clock_hz {
        return None;
    }
    let reload = core_clock_hz / tick_hz - 1;
    if reload > SYST_RELOAD_MAX {
        None
    } else {
        Some(reload)
    }
}

/// Programs SysTick to fire at `tick_hz` from the processor clock and enables
/// its interrupt. The exception handler is expected to call [`on_tick`].
#[cfg(target_os = "none")]
pub fn start_systick(
    syst: &mut cortex_m::peripheral::SYST,
    core_clock_hz: u32,
    tick_hz: u32,
) {
    use cortex_m::peripheral::syst::SystClkSource;

    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(reload_value(core_clock_hz, tick_hz));
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}
