// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A UART backed by memory, for tests.

use crate::Uart;
use core::convert::Infallible;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct BufferUart {
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    tx_limit: Option<usize>,
}

impl BufferUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// A port that accepts at most `limit` bytes per `send`.
    pub fn with_tx_limit(limit: usize) -> Self {
        Self {
            tx_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    /// Transmitted bytes as text, with invalid UTF-8 replaced.
    pub fn tx_str(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

impl Uart for BufferUart {
    fn send(&mut self, bytes: &[u8]) -> usize {
        let n = self.tx_limit.map_or(bytes.len(), |l| l.min(bytes.len()));
        self.tx.extend_from_slice(&bytes[..n]);
        n
    }

    fn available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive_byte(&mut self) -> nb::Result<u8, Infallible> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}
