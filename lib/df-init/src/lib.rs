// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Staged system bring-up.
//!
//! Drivers and subsystems describe their initialization as an [`InitEntry`]:
//! a function plus the [`Stage`] it belongs to. Entries are collected into an
//! [`InitRegistry`] before `main` does anything else (normally from a table
//! generated at build time from `app.toml`, see the `df-demo` build script),
//! and [`InitRegistry::run_all`] then calls each one exactly once, in stage
//! order.
//!
//! Startup is best-effort: an entry returning `Err` is logged and counted, and
//! the remaining entries still run. There is no ordering within a stage beyond
//! registration order, and nothing should depend on even that.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use critical_section::Mutex;
use df_log::{log_e, log_i};

/// How many entries the global [`REGISTRY`] can hold.
pub const MAX_INIT_ENTRIES: usize = 32;

const TAG: &str = "DF_INIT";

/// Bring-up stages, in execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Board,
    Prev,
    Device,
    Component,
    Env,
    App,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Board,
        Stage::Prev,
        Stage::Device,
        Stage::Component,
        Stage::Env,
        Stage::App,
    ];

    // Older level names, still accepted by existing driver code.
    pub const CORE: Stage = Stage::Board;
    pub const PLATFORM: Stage = Stage::Prev;
    pub const APPLICATION: Stage = Stage::App;

    /// Single-character tag whose lexical order matches stage order.
    pub const fn tag(self) -> &'static str {
        match self {
            Stage::Board => "0",
            Stage::Prev => "1",
            Stage::Device => "2",
            Stage::Component => "3",
            Stage::Env => "4",
            Stage::App => "5",
        }
    }
}

/// Non-zero status code reported by a failed initializer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InitError(pub i32);

pub type InitFn = fn() -> Result<(), InitError>;

#[derive(Copy, Clone, Debug)]
pub struct InitEntry {
    pub name: &'static str,
    pub stage: Stage,
    pub func: InitFn,
}

impl InitEntry {
    pub const fn new(name: &'static str, stage: Stage, func: InitFn) -> Self {
        Self { name, stage, func }
    }
}

/// Builds an [`InitEntry`] for `f` at `stage`, named after `f`.
///
/// ```ignore
/// const UART: InitEntry = df_init_export!(uart_init, Stage::Device);
/// ```
#[macro_export]
macro_rules! df_init_export {
    ($f:path, $stage:expr) => {
        $crate::InitEntry::new(stringify!($f), $stage, $f)
    };
}

#[macro_export]
macro_rules! df_board_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::Board)
    };
}

#[macro_export]
macro_rules! df_prev_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::Prev)
    };
}

#[macro_export]
macro_rules! df_device_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::Device)
    };
}

#[macro_export]
macro_rules! df_component_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::Component)
    };
}

#[macro_export]
macro_rules! df_env_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::Env)
    };
}

#[macro_export]
macro_rules! df_app_init {
    ($f:path) => {
        $crate::df_init_export!($f, $crate::Stage::App)
    };
}

/// Outcome of a completed [`InitRegistry::run_all`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Returned by a second call to [`InitRegistry::run_all`]; nothing was run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlreadyInitialized;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterError {
    /// The registry is at capacity.
    Full,
    /// `run_all` has already happened; late entries would never run.
    Sealed,
}

struct Inner<const N: usize> {
    entries: heapless::Vec<InitEntry, N>,
    done: bool,
}

pub struct InitRegistry<const N: usize> {
    inner: Mutex<RefCell<Inner<N>>>,
}

/// The registry walked by [`run_all`].
pub static REGISTRY: InitRegistry<MAX_INIT_ENTRIES> = InitRegistry::new();

impl<const N: usize> InitRegistry<N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                entries: heapless::Vec::new(),
                done: false,
            })),
        }
    }

    pub fn register(&self, entry: InitEntry) -> Result<(), RegisterError> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.done {
                return Err(RegisterError::Sealed);
            }
            inner.entries.push(entry).map_err(|_| RegisterError::Full)
        })
    }

    /// Registers every entry in `table`, stopping at the first failure.
    pub fn extend(&self, table: &[InitEntry]) -> Result<(), RegisterError> {
        table.iter().try_for_each(|e| self.register(*e))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).done)
    }

    /// Calls every registered entry once, in stage order.
    ///
    /// The registry is latched before the first entry runs, so this returns
    /// `Err(AlreadyInitialized)` on every later call, including one made from
    /// inside an initializer.
    pub fn run_all(&self) -> Result<InitReport, AlreadyInitialized> {
        let mut order: heapless::Vec<(usize, InitEntry), N> =
            critical_section::with(|cs| {
                let mut inner = self.inner.borrow_ref_mut(cs);
                if inner.done {
                    return Err(AlreadyInitialized);
                }
                inner.done = true;
                Ok(inner.entries.iter().copied().enumerate().collect())
            })?;
        order.sort_unstable_by_key(|&(i, e)| (e.stage, i));

        log_i!(TAG, "Driver Framework Initialization");

        let mut report = InitReport::default();
        for (_, entry) in &order {
            match (entry.func)() {
                Ok(()) => report.succeeded += 1,
                Err(InitError(code)) => {
                    report.failed += 1;
                    log_e!(
                        TAG,
                        "{} (stage {}) failed (ret={})",
                        entry.name,
                        entry.stage.tag(),
                        code
                    );
                }
            }
        }

        if report.failed > 0 {
            log_e!(
                TAG,
                "{} components initialized, {} failed",
                report.succeeded,
                report.failed
            );
        } else {
            log_i!(TAG, "{} components initialized", report.succeeded);
        }
        Ok(report)
    }
}

impl<const N: usize> Default for InitRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn register(entry: InitEntry) -> Result<(), RegisterError> {
    REGISTRY.register(entry)
}

pub fn run_all() -> Result<InitReport, AlreadyInitialized> {
    REGISTRY.run_all()
}

pub fn is_initialized() -> bool {
    REGISTRY.is_initialized()
}

fn log_bring_up() -> Result<(), InitError> {
    df_log::LOGGER.init(df_log::Level::Info);
    log_i!("LOG", "Log system initialized");
    Ok(())
}

/// Brings up the global logger at `Info`. Registered at [`Stage::Board`] so
/// that every later stage can log.
pub const LOG_INIT: InitEntry = df_board_init!(log_bring_up);
