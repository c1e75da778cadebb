// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deferred interrupt dispatch.
//!
//! Interrupt handlers do as little as possible: they read whatever the
//! hardware has for them and hand it to [`IrqTable::load`], which marks the
//! source's slot pending and stashes the argument. The main loop then calls
//! [`IrqTable::run`], which runs the handler for the highest-priority pending
//! source (lowest priority number) in thread context.
//!
//! # Buffering
//!
//! Each source buffers at most one event. A `load` for a source that is
//! already pending returns [`LoadError::Busy`] and the new argument is
//! dropped; the interrupt handler should still acknowledge the hardware and
//! return. Every call to `run` resets *all* slots to disabled, even the ones
//! it didn't execute: the events it passes over are dropped, not deferred.
//! Callers typically loop on `run` until it returns [`RunOutcome::Idle`].
//! Sustained high-priority interrupts can starve lower-priority sources under
//! that loop; whether that matters is up to the caller.
//!
//! # Priorities
//!
//! Priorities index a scratch array of [`PRIORITY_LEVELS`] entries, so two
//! sources sharing a priority collide. That is a configuration mistake that
//! is not detected; the one later in the table wins.
//!
//! # Faults
//!
//! Handlers run with no isolation. A panicking handler takes the system down
//! with it.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use critical_section::Mutex;
use df_init::{df_prev_init, InitEntry, InitError};
use df_log::trace::Trace;
use df_log::{log_i, trace, trace_buf};

/// Number of distinct priority levels; the STM32F4 NVIC implements four
/// priority bits.
pub const PRIORITY_LEVELS: usize = 16;

static_assertions::const_assert!(PRIORITY_LEVELS <= u8::MAX as usize + 1);

const TAG: &str = "IRQ";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqState {
    Disabled,
    Pending,
    /// Picked up by `run` and waiting in its scratch array. Never visible in
    /// the table itself.
    Ready,
}

pub type IrqHandler<C, A> = fn(&mut C, A);

struct Slot<C, A> {
    irq: u16,
    priority: u8,
    handler: IrqHandler<C, A>,
    state: IrqState,
    arg: Option<A>,
}

// Written out by hand so that `C` needn't be `Copy`.
impl<C, A: Copy> Clone for Slot<C, A> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C, A: Copy> Copy for Slot<C, A> {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterError {
    TableFull,
    DuplicateIrq,
    PriorityOutOfRange,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// The source already has an event pending; this one was dropped.
    Busy,
    /// No slot is registered for this interrupt number.
    NotFound,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The handler for this interrupt number ran.
    Executed(u16),
    Idle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqEvent {
    None,
    Loaded(u16),
    Busy(u16),
    NotFound(u16),
    Executed(u16),
    Dropped(u16),
}

trace_buf!(IRQ_TRACE, IrqEvent, 32, IrqEvent::None);

/// Recent dispatcher events, newest last.
pub fn trace() -> &'static Trace<IrqEvent, 32> {
    &IRQ_TRACE
}

/// A fixed-capacity table of deferred interrupt sources.
///
/// `C` is the context handed to every handler by [`IrqTable::run`], and `A`
/// is the argument type carried from the interrupt handler.
pub struct IrqTable<C, A, const N: usize> {
    slots: Mutex<RefCell<heapless::Vec<Slot<C, A>, N>>>,
}

impl<C, A, const N: usize> IrqTable<C, A, N> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }
}

impl<C, A, const N: usize> Default for IrqTable<C, A, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, A: Copy, const N: usize> IrqTable<C, A, N> {
    /// Adds a source. Normally done once at startup, before interrupts are
    /// enabled.
    pub fn register(
        &self,
        irq: u16,
        priority: u8,
        handler: IrqHandler<C, A>,
    ) -> Result<(), RegisterError> {
        if usize::from(priority) >= PRIORITY_LEVELS {
            return Err(RegisterError::PriorityOutOfRange);
        }
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            if slots.iter().any(|s| s.irq == irq) {
                return Err(RegisterError::DuplicateIrq);
            }
            slots
                .push(Slot {
                    irq,
                    priority,
                    handler,
                    state: IrqState::Disabled,
                    arg: None,
                })
                .map_err(|_| RegisterError::TableFull)
        })
    }

    /// Returns the table index of `irq`'s slot.
    pub fn find(&self, irq: u16) -> Option<usize> {
        critical_section::with(|cs| {
            self.slots.borrow_ref(cs).iter().position(|s| s.irq == irq)
        })
    }

    /// Marks `irq` pending with `arg`. Safe to call from interrupt context.
    pub fn load(&self, irq: u16, arg: A) -> Result<(), LoadError> {
        let r = critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let slot = slots
                .iter_mut()
                .find(|s| s.irq == irq)
                .ok_or(LoadError::NotFound)?;
            if slot.state == IrqState::Pending {
                return Err(LoadError::Busy);
            }
            slot.state = IrqState::Pending;
            slot.arg = Some(arg);
            Ok(())
        });

        match r {
            Ok(()) => trace!(IRQ_TRACE, IrqEvent::Loaded(irq)),
            Err(LoadError::Busy) => trace!(IRQ_TRACE, IrqEvent::Busy(irq)),
            // No text logging here: the sink may block, and this runs in
            // interrupt context.
            Err(LoadError::NotFound) => {
                trace!(IRQ_TRACE, IrqEvent::NotFound(irq))
            }
        }
        r
    }

    /// Runs at most one pending handler, passing it `ctx`.
    ///
    /// Must only be called from the main loop.
    pub fn run(&self, ctx: &mut C) -> RunOutcome {
        let mut scratch: [Option<Slot<C, A>>; PRIORITY_LEVELS] =
            [None; PRIORITY_LEVELS];

        critical_section::with(|cs| {
            for slot in self.slots.borrow_ref_mut(cs).iter_mut() {
                if slot.state == IrqState::Pending {
                    if let Some(s) = scratch.get_mut(usize::from(slot.priority))
                    {
                        *s = Some(Slot {
                            state: IrqState::Ready,
                            ..*slot
                        });
                    }
                }
                slot.state = IrqState::Disabled;
                slot.arg = None;
            }
        });

        let mut chosen = None;
        for ready in scratch.iter_mut().filter_map(Option::take) {
            if chosen.is_none() {
                chosen = Some(ready);
            } else {
                trace!(IRQ_TRACE, IrqEvent::Dropped(ready.irq));
            }
        }

        match chosen {
            Some(Slot {
                irq,
                handler,
                state: IrqState::Ready,
                arg: Some(arg),
                ..
            }) => {
                trace!(IRQ_TRACE, IrqEvent::Executed(irq));
                handler(ctx, arg);
                RunOutcome::Executed(irq)
            }
            _ => RunOutcome::Idle,
        }
    }

    /// Current state of `irq`'s slot.
    pub fn state(&self, irq: u16) -> Option<IrqState> {
        critical_section::with(|cs| {
            self.slots
                .borrow_ref(cs)
                .iter()
                .find(|s| s.irq == irq)
                .map(|s| s.state)
        })
    }

    /// The argument stored by the accepted `load`, if `irq` is pending.
    pub fn pending_arg(&self, irq: u16) -> Option<A> {
        critical_section::with(|cs| {
            self.slots
                .borrow_ref(cs)
                .iter()
                .find(|s| s.irq == irq)
                .and_then(|s| s.arg)
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.slots.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn irq_framework_init() -> Result<(), InitError> {
    df_log::LOGGER.set_timestamp_source(Some(df_tick::get_tick));
    df_log::LOGGER.enable_timestamp(true);
    log_i!(TAG, "Interrupt framework initialized");
    Ok(())
}

/// Stamps log lines with the system tick from here on.
pub const INIT: InitEntry = df_prev_init!(irq_framework_init);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Seen(Vec<(char, u8)>);

    fn on_a(seen: &mut Seen, arg: u8) {
        seen.0.push(('a', arg));
    }

    fn on_b(seen: &mut Seen, arg: u8) {
        seen.0.push(('b', arg));
    }

    fn on_c(seen: &mut Seen, arg: u8) {
        seen.0.push(('c', arg));
    }

    fn table() -> IrqTable<Seen, u8, 4> {
        let t = IrqTable::new();
        t.register(37, 5, on_a).unwrap();
        t.register(28, 2, on_b).unwrap();
        t.register(6, 9, on_c).unwrap();
        t
    }

    #[test]
    fn find_by_irq_number() {
        let t = table();
        assert_eq!(t.find(37), Some(0));
        assert_eq!(t.find(6), Some(2));
        assert_eq!(t.find(99), None);
    }

    #[test]
    fn load_marks_pending() {
        let t = table();
        assert_eq!(t.state(37), Some(IrqState::Disabled));
        assert_eq!(t.load(37, b'x'), Ok(()));
        assert_eq!(t.state(37), Some(IrqState::Pending));
        assert_eq!(t.pending_arg(37), Some(b'x'));
    }

    #[test]
    fn second_load_is_busy_and_keeps_first_arg() {
        let t = table();
        assert_eq!(t.load(37, 1), Ok(()));
        assert_eq!(t.load(37, 2), Err(LoadError::Busy));
        assert_eq!(t.pending_arg(37), Some(1));

        let mut seen = Seen::default();
        assert_eq!(t.run(&mut seen), RunOutcome::Executed(37));
        assert_eq!(seen.0, [('a', 1)]);
    }

    thread_local! {
        static LOGGED: std::cell::Cell<usize> =
            const { std::cell::Cell::new(0) };
    }

    fn count_log(bytes: &[u8]) {
        LOGGED.with(|n| n.set(n.get() + bytes.len()));
    }

    #[test]
    fn load_unknown_irq_only_traces() {
        df_log::LOGGER.set_output(Some(count_log));
        df_log::LOGGER.set_level(df_log::Level::Verbose);
        let t = table();
        assert_eq!(t.load(1000, 0), Err(LoadError::NotFound));
        assert!(
            trace().count_matching(|e| *e == IrqEvent::NotFound(1000)) >= 1
        );
        assert_eq!(LOGGED.with(|n| n.get()), 0);
    }

    #[test]
    fn run_takes_lowest_priority_number_and_drops_the_rest() {
        let t = table();
        let mut seen = Seen::default();
        t.load(37, 50).unwrap(); // priority 5
        t.load(28, 20).unwrap(); // priority 2

        assert_eq!(t.run(&mut seen), RunOutcome::Executed(28));
        assert_eq!(seen.0, [('b', 20)]);
        assert_eq!(t.state(37), Some(IrqState::Disabled));
        assert_eq!(t.state(28), Some(IrqState::Disabled));
        assert_eq!(t.pending_arg(37), None);

        // The priority-5 event is gone; it takes a fresh load to fire.
        assert_eq!(t.run(&mut seen), RunOutcome::Idle);
        t.load(37, 51).unwrap();
        assert_eq!(t.run(&mut seen), RunOutcome::Executed(37));
        assert_eq!(seen.0, [('b', 20), ('a', 51)]);
    }

    #[test]
    fn idle_when_nothing_pending() {
        let t = table();
        let mut seen = Seen::default();
        assert_eq!(t.run(&mut seen), RunOutcome::Idle);
        assert!(seen.0.is_empty());
    }

    #[test]
    fn load_accepted_again_after_run() {
        let t = table();
        let mut seen = Seen::default();
        t.load(6, 1).unwrap();
        t.run(&mut seen);
        assert_eq!(t.load(6, 2), Ok(()));
    }

    #[test]
    fn registration_errors() {
        let t: IrqTable<Seen, u8, 2> = IrqTable::new();
        assert_eq!(
            t.register(1, PRIORITY_LEVELS as u8, on_a),
            Err(RegisterError::PriorityOutOfRange)
        );
        t.register(1, 0, on_a).unwrap();
        assert_eq!(t.register(1, 1, on_b), Err(RegisterError::DuplicateIrq));
        t.register(2, 1, on_b).unwrap();
        assert_eq!(t.register(3, 2, on_c), Err(RegisterError::TableFull));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn shared_priority_later_slot_wins() {
        let t: IrqTable<Seen, u8, 2> = IrqTable::new();
        t.register(1, 3, on_a).unwrap();
        t.register(2, 3, on_b).unwrap();
        t.load(1, 1).unwrap();
        t.load(2, 2).unwrap();
        let mut seen = Seen::default();
        assert_eq!(t.run(&mut seen), RunOutcome::Executed(2));
        assert_eq!(t.run(&mut seen), RunOutcome::Idle);
    }

    static REARM: IrqTable<u32, u8, 1> = IrqTable::new();

    fn rearm(count: &mut u32, arg: u8) {
        *count += 1;
        if arg > 0 {
            let _ = REARM.load(1, arg - 1);
        }
    }

    #[test]
    fn handler_may_load_again() {
        REARM.register(1, 0, rearm).unwrap();
        REARM.load(1, 2).unwrap();
        let mut count = 0;
        while REARM.run(&mut count) != RunOutcome::Idle {}
        assert_eq!(count, 3);
        assert_eq!(REARM.state(1), Some(IrqState::Disabled));
    }
}
