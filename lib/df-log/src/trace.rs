// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-size event trace for interrupt context.
//!
//! Formatting text is too slow to do inside an interrupt handler, so code that
//! runs there records small `Copy` payloads into a [`Trace`] instead. Entries
//! can be inspected from a debugger or dumped later from the main loop.
//!
//! When an event is recorded with the same `line` and payload as the most
//! recent entry, that entry's `count` is bumped instead of taking a new slot,
//! so a storm of identical events doesn't wipe out the history.

use core::cell::RefCell;
use critical_section::Mutex;

/// Declares a static trace buffer.
///
/// `trace_buf!(NAME, Type, N, expr)` makes a [`Trace`] named `NAME` holding up
/// to `N` entries of `Type`, with every slot initialized to `expr`.
#[macro_export]
macro_rules! trace_buf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        static $name: $crate::trace::Trace<$t, $n> =
            $crate::trace::Trace::new($init);
    };
}

/// Records `payload` into a trace buffer declared with [`trace_buf!`],
/// tagging it with the current source line.
#[macro_export]
macro_rules! trace {
    ($buf:expr, $payload:expr) => {{
        let (p, buf) = ($payload, &$buf);
        $crate::trace::Trace::record(buf, line!() as u16, p);
    }};
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    /// Tick at which this entry was first recorded.
    pub tick: u32,
    pub payload: T,
}

struct Ring<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [TraceEntry<T>; N],
}

pub struct Trace<T: Copy + PartialEq, const N: usize> {
    ring: Mutex<RefCell<Ring<T, N>>>,
}

impl<T: Copy + PartialEq, const N: usize> Trace<T, N> {
    pub const fn new(init: T) -> Self {
        let blank = TraceEntry {
            line: 0,
            generation: 0,
            count: 0,
            tick: 0,
            payload: init,
        };
        Self {
            ring: Mutex::new(RefCell::new(Ring {
                last: None,
                buffer: [blank; N],
            })),
        }
    }

    pub fn record(&self, line: u16, payload: T) {
        let tick = df_tick::get_tick();
        critical_section::with(|cs| {
            self.ring.borrow_ref_mut(cs).entry(line, tick, payload)
        });
    }

    /// Returns the most recently recorded entry, if any.
    pub fn last(&self) -> Option<TraceEntry<T>> {
        critical_section::with(|cs| {
            let ring = self.ring.borrow_ref(cs);
            ring.last.and_then(|i| ring.buffer.get(i).copied())
        })
    }

    /// Copies out every slot along with the index of the newest one.
    pub fn snapshot(&self) -> (Option<usize>, [TraceEntry<T>; N]) {
        critical_section::with(|cs| {
            let ring = self.ring.borrow_ref(cs);
            (ring.last, ring.buffer)
        })
    }

    /// Counts recorded occurrences of events matching `pred`, including
    /// repeats folded into a single slot. Only entries still in the ring are
    /// counted.
    pub fn count_matching(&self, pred: impl Fn(&T) -> bool) -> u32 {
        critical_section::with(|cs| {
            self.ring
                .borrow_ref(cs)
                .buffer
                .iter()
                .filter(|e| e.count > 0 && pred(&e.payload))
                .map(|e| e.count)
                .sum()
        })
    }
}

impl<T: Copy + PartialEq, const N: usize> Ring<T, N> {
    fn entry(&mut self, line: u16, tick: u32, payload: T) {
        // Treat "never written" as an out-of-range index so the first entry
        // lands in slot 0 and nothing gets folded into a blank slot.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        let ndx = {
            let next = last.wrapping_add(1);
            if next >= N {
                0
            } else {
                next
            }
        };

        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Only reachable for a zero-sized trace.
            return;
        };
        *ent = TraceEntry {
            line,
            generation: ent.generation.wrapping_add(1),
            count: 1,
            tick,
            payload,
        };
        self.last = Some(ndx);
    }
}
