// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board collaborator interfaces.
//!
//! The framework core never touches peripheral registers. It talks to the
//! board through the [`Uart`] trait here, and to pins through the
//! `embedded-hal` digital traits re-exported below.

#![cfg_attr(not(any(test, feature = "fake")), no_std)]

use core::convert::Infallible;
use core::fmt;

pub use embedded_hal::digital::v2::OutputPin;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

/// A byte-oriented serial port.
pub trait Uart {
    /// Queues as many bytes of `bytes` as the port will take right now,
    /// returning how many that was.
    fn send(&mut self, bytes: &[u8]) -> usize;

    /// True if a received byte is waiting.
    fn available(&self) -> bool;

    /// Takes the next received byte, or `WouldBlock` if none is waiting.
    fn receive_byte(&mut self) -> nb::Result<u8, Infallible>;

    /// Sends all of `bytes`, spinning while the port is busy.
    fn send_all(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let n = self.send(bytes);
            bytes = &bytes[n.min(bytes.len())..];
        }
    }
}

/// Lets `write!` target a [`Uart`].
pub struct UartWriter<'a, U: ?Sized>(pub &'a mut U);

impl<U: Uart + ?Sized> fmt::Write for UartWriter<'_, U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.send_all(s.as_bytes());
        Ok(())
    }
}
