// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demo application: brings the framework up from `app.toml` and serves a
//! shell on USART1.
//!
//! The same code builds for the STM32F407 and, with a stdin/stdout console
//! standing in for the UART, for the host.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

mod board;
mod commands;
mod config;

use df_init::InitError;
use df_irq::{IrqTable, RunOutcome};
use df_log::{log_e, log_i, LOGGER};
use df_shell::Shell;

const TAG: &str = "app";

/// Environment command slots.
pub const ENV_CAPACITY: usize = 8;
/// Deferred interrupt sources.
pub const MAX_IRQS: usize = 4;

pub type DemoShell = Shell<board::BoardUart, ENV_CAPACITY>;

/// Interrupt handlers park received bytes here; the main loop delivers them
/// to the shell.
pub static IRQS: IrqTable<DemoShell, u8, MAX_IRQS> = IrqTable::new();

/// Deferred half of the UART receive interrupt.
pub fn uart_rx(shell: &mut DemoShell, byte: u8) {
    shell.feed(byte);
}

fn configure_log() -> Result<(), InitError> {
    LOGGER.set_buffer_size(config::LOG_BUFFER_SIZE);
    LOGGER.set_config(config::LOG_CONFIG);
    Ok(())
}

fn bring_up() -> DemoShell {
    board::init();

    if df_init::REGISTRY.extend(&config::INIT_TABLE).is_err() {
        // Nothing is logging yet, so this cannot be reported.
        board::poweroff();
    }
    match df_init::run_all() {
        Ok(report) if report.failed != 0 => {
            log_e!(TAG, "{} initializer(s) failed", report.failed);
        }
        Ok(_) => {}
        Err(_) => log_e!(TAG, "initializers already ran"),
    }

    for (irq, priority, handler) in config::IRQ_TABLE {
        if let Err(e) = IRQS.register(irq, priority, handler) {
            log_e!(TAG, "irq {}: {:?}", irq, e);
        }
    }

    let mut shell = Shell::new(
        board::BoardUart::new(),
        config::DEVICE_INFO,
        commands::HOOKS,
        commands::env_table(),
    );
    log_i!(TAG, "{} on {}", config::APP_NAME, config::BOARD);
    LOGGER.flush();
    shell.start();
    board::enable_rx();
    shell
}

/// One pass of the main loop. Returns true if anything ran.
fn service(shell: &mut DemoShell) -> bool {
    let mut busy = false;
    while let RunOutcome::Executed(_) = IRQS.run(shell) {
        busy = true;
    }
    busy |= shell.tick();
    busy |= LOGGER.flush() != 0;
    busy
}

#[cfg(not(target_os = "none"))]
fn main() {
    use df_shell::RunState;

    let mut shell = bring_up();
    loop {
        let closing = board::input_closed();
        if !service(&mut shell) {
            board::idle();
        }
        if shell.run_state() == RunState::Exited {
            break;
        }
        // Once input has closed every byte was loaded before `service` ran.
        if closing {
            while shell.tick() {}
            LOGGER.flush();
            break;
        }
    }
}

#[cfg(target_os = "none")]
use panic_halt as _;

#[cfg(target_os = "none")]
#[cortex_m_rt::entry]
fn main() -> ! {
    let mut shell = bring_up();
    loop {
        if !service(&mut shell) {
            board::idle();
        }
    }
}
