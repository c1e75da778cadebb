// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment commands and the task switch that runs them.
//!
//! An environment command matched by the shell is only *armed*. On a later
//! main-loop tick, [`TaskSwitch::arm_next`] promotes the first armed entry
//! into the single current-task slot, and [`TaskSwitch::run_current_task`]
//! calls it and empties the slot. Environment commands therefore never run
//! on the stack of the code that dispatched them.

use crate::line::Argv;
use crate::CommandFn;
use core::fmt;

/// A named command supplied by the application.
#[derive(Clone)]
pub struct EnvVar {
    name: &'static str,
    armed: bool,
    argv: Argv,
    callback: CommandFn,
}

impl EnvVar {
    pub const fn new(name: &'static str, callback: CommandFn) -> Self {
        Self {
            name,
            armed: false,
            argv: Argv::new(),
            callback,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

/// The application's environment commands, in match order.
#[derive(Clone, Default)]
pub struct EnvTable<const N: usize> {
    vars: heapless::Vec<EnvVar, N>,
}

impl<const N: usize> EnvTable<N> {
    pub const fn new() -> Self {
        Self {
            vars: heapless::Vec::new(),
        }
    }

    /// Adds `var`, handing it back if the table is full.
    pub fn push(&mut self, var: EnvVar) -> Result<(), EnvVar> {
        self.vars.push(var)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    /// Marks entry `i` to run on a later tick with `argv`.
    pub fn arm(&mut self, i: usize, argv: Argv) -> bool {
        match self.vars.get_mut(i) {
            Some(var) => {
                var.armed = true;
                var.argv = argv;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<const N: usize> FromIterator<EnvVar> for EnvTable<N> {
    /// Collects up to `N` entries; any beyond that are dropped.
    fn from_iter<I: IntoIterator<Item = EnvVar>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().take(N).collect(),
        }
    }
}

#[derive(Clone)]
struct Task {
    name: &'static str,
    argv: Argv,
    callback: CommandFn,
}

/// Single-slot holder for the next environment command to run.
#[derive(Clone, Default)]
pub struct TaskSwitch {
    current: Option<Task>,
}

impl TaskSwitch {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Promotes the first armed entry of `env`, clearing its armed flag.
    ///
    /// Does nothing if a task is already waiting in the slot; armed entries
    /// then stay armed for a later call. Returns true if an entry was
    /// promoted.
    pub fn arm_next<const N: usize>(&mut self, env: &mut EnvTable<N>) -> bool {
        if self.current.is_some() {
            return false;
        }
        let Some(var) = env.vars.iter_mut().find(|v| v.armed) else {
            return false;
        };
        var.armed = false;
        self.current = Some(Task {
            name: var.name,
            argv: core::mem::take(&mut var.argv),
            callback: var.callback,
        });
        true
    }

    /// Runs and clears the current task. Returns true if there was one.
    pub fn run_current_task(&mut self, out: &mut dyn fmt::Write) -> bool {
        match self.current.take() {
            Some(task) => {
                (task.callback)(out, &task.argv);
                true
            }
            None => false,
        }
    }

    /// Name of the task waiting in the slot.
    pub fn current(&self) -> Option<&'static str> {
        self.current.as_ref().map(|t| t.name)
    }
}
