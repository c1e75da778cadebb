// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment commands and built-in hooks for the demo shell.

use core::fmt;

use df_hal::OutputPin;
use df_log::{Level, LOGGER};
use df_shell::terminal::{CLEAR_SCREEN, CURSOR_HOME};
use df_shell::{Argv, BuiltinHooks, CommandFn, EnvTable, EnvVar};

use crate::board;

pub const HOOKS: BuiltinHooks = BuiltinHooks {
    reset: Some(reset),
    poweroff: Some(poweroff),
    clear: Some(clear),
    test: Some(test),
    ls: Some(ls),
};

/// Commands run through the task switch, in lookup order.
pub const ENV: [(&str, CommandFn); 4] =
    [("led", led), ("tick", tick), ("echo", echo), ("log", log)];

pub fn env_table<const N: usize>() -> EnvTable<N> {
    ENV.iter().map(|&(name, f)| EnvVar::new(name, f)).collect()
}

fn reset(_out: &mut dyn fmt::Write, _argv: &Argv) {
    LOGGER.flush();
    board::reset()
}

fn poweroff(_out: &mut dyn fmt::Write, _argv: &Argv) {
    LOGGER.flush();
    board::poweroff()
}

fn clear(out: &mut dyn fmt::Write, _argv: &Argv) {
    let _ = out.write_str(CLEAR_SCREEN);
    let _ = out.write_str(CURSOR_HOME);
}

fn test(out: &mut dyn fmt::Write, argv: &Argv) {
    let _ = writeln!(out, "argc: {}", argv.argc());
    for (i, arg) in argv.iter().enumerate() {
        let _ = writeln!(out, "argv[{i}]: {arg}");
    }
}

fn ls(out: &mut dyn fmt::Write, _argv: &Argv) {
    for (name, _) in ENV {
        let _ = writeln!(out, "{name}");
    }
}

fn led(out: &mut dyn fmt::Write, argv: &Argv) {
    let mut led = board::Led;
    let r = match argv.get(1) {
        None => Ok(()),
        Some("on") => led.set_high(),
        Some("off") => led.set_low(),
        Some("toggle") if led.is_on() => led.set_low(),
        Some("toggle") => led.set_high(),
        Some(_) => {
            let _ = writeln!(out, "usage: led [on|off|toggle]");
            return;
        }
    };
    if r.is_ok() {
        let state = if led.is_on() { "on" } else { "off" };
        let _ = writeln!(out, "LED {state}");
    }
}

fn tick(out: &mut dyn fmt::Write, _argv: &Argv) {
    let _ = writeln!(out, "tick: {}", df_tick::get_tick());
}

fn echo(out: &mut dyn fmt::Write, argv: &Argv) {
    for (i, arg) in argv.args().enumerate() {
        if i != 0 {
            let _ = out.write_char(' ');
        }
        let _ = out.write_str(arg);
    }
    let _ = out.write_char('\n');
}

fn log(out: &mut dyn fmt::Write, argv: &Argv) {
    match argv.get(1) {
        None | Some("status") => {
            let _ = writeln!(
                out,
                "level: {:?}, buffered: {} bytes",
                LOGGER.level(),
                LOGGER.buffer_usage()
            );
        }
        Some("flush") => {
            let n = LOGGER.flush();
            let _ = writeln!(out, "flushed {n} bytes");
        }
        Some(name) => match Level::from_name(name) {
            Some(level) => {
                LOGGER.set_level(level);
                let _ = writeln!(out, "level: {level:?}");
            }
            None => {
                let _ = writeln!(
                    out,
                    "usage: log [status|flush|{}]",
                    "none|error|warn|info|debug|verbose"
                );
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(f: CommandFn, line: &str) -> String {
        let argv = Argv::parse(line).unwrap();
        let mut out = String::new();
        f(&mut out, &argv);
        out
    }

    #[test]
    fn table_holds_every_command() {
        let env: EnvTable<8> = env_table();
        assert_eq!(env.len(), ENV.len());
        assert_eq!(env.find("echo"), Some(2));
        assert_eq!(env.find("hello"), None);
    }

    #[test]
    fn echo_joins_arguments() {
        assert_eq!(run(echo, "echo  a   b c"), "a b c\n");
        assert_eq!(run(echo, "echo"), "\n");
    }

    #[test]
    fn led_follows_commands() {
        assert_eq!(run(led, "led on"), "LED on\n");
        assert_eq!(run(led, "led toggle"), "LED off\n");
        assert_eq!(run(led, "led toggle"), "LED on\n");
        assert_eq!(run(led, "led off"), "LED off\n");
        assert_eq!(run(led, "led"), "LED off\n");
        assert!(run(led, "led blink").starts_with("usage"));
    }

    #[test]
    fn test_hook_lists_arguments() {
        assert_eq!(run(test, "test x"), "argc: 2\nargv[0]: test\nargv[1]: x\n");
    }

    #[test]
    fn ls_lists_environment() {
        assert_eq!(run(ls, "ls"), "led\ntick\necho\nlog\n");
    }

    #[test]
    fn clear_homes_cursor() {
        assert_eq!(run(clear, "clear"), format!("{CLEAR_SCREEN}{CURSOR_HOME}"));
    }

    #[test]
    fn log_rejects_unknown_level() {
        assert!(run(log, "log loud").starts_with("usage"));
        assert!(run(log, "log").starts_with("level: "));
    }
}
