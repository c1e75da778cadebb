// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small line-oriented command shell over a UART.
//!
//! Received bytes are fed to [`Shell::feed`] one at a time, normally from the
//! deferred handler for the UART's receive interrupt. A completed line is
//! tokenized and its first token looked up, first among the fixed
//! [`Builtin`] commands and then in the application's [`EnvTable`]. Built-ins
//! run immediately. Environment commands are handed to the [`TaskSwitch`]
//! and run from [`Shell::tick`] on a later pass of the main loop.
//!
//! Terminal output is plain VT100; see [`terminal`].

#![cfg_attr(not(test), no_std)]

pub mod line;
pub mod task;
pub mod terminal;

use core::fmt::{self, Write};
use df_hal::{Uart, UartWriter};
use df_log::{log_d, log_e};

pub use line::{Argv, LineBuffer, LineTooLong, LINE_CAPACITY, MAX_ARGS};
pub use task::{EnvTable, EnvVar, TaskSwitch};

use terminal::{CLEAR_SCREEN, ERASE_BACK, FG_GREEN, FG_RED, RESET_ALL};

pub const VERSION: (u8, u8, u8) = (1, 0, 2);

const TAG: &str = "SHELL";
const UNKNOWN: &str = "Unknown";

/// Signature shared by built-in hooks and environment commands. Output
/// written to `out` goes to the shell's terminal.
pub type CommandFn = fn(out: &mut dyn fmt::Write, argv: &Argv);

/// The built-in commands, in the order `help` lists them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Hello,
    Reset,
    Poweroff,
    Help,
    Exit,
    Clear,
    Test,
    Ls,
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Hello,
        Builtin::Reset,
        Builtin::Poweroff,
        Builtin::Help,
        Builtin::Exit,
        Builtin::Clear,
        Builtin::Test,
        Builtin::Ls,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Hello => "hello",
            Builtin::Reset => "reset",
            Builtin::Poweroff => "poweroff",
            Builtin::Help => "help",
            Builtin::Exit => "exit",
            Builtin::Clear => "clear",
            Builtin::Test => "test",
            Builtin::Ls => "ls",
        }
    }

    /// Case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// Application-supplied behavior for the built-ins that need it. Each hook is
/// optional.
#[derive(Copy, Clone, Default)]
pub struct BuiltinHooks {
    pub reset: Option<CommandFn>,
    pub poweroff: Option<CommandFn>,
    pub clear: Option<CommandFn>,
    pub test: Option<CommandFn>,
    pub ls: Option<CommandFn>,
}

impl BuiltinHooks {
    pub const NONE: Self = Self {
        reset: None,
        poweroff: None,
        clear: None,
        test: None,
        ls: None,
    };
}

/// Identity shown in the banner and prompt. Missing fields print as
/// unknown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub architecture: Option<&'static str>,
    pub user: Option<&'static str>,
    pub password: Option<&'static str>,
    pub device_name: Option<&'static str>,
    pub os: Option<&'static str>,
    pub device: Option<&'static str>,
    pub version: Option<&'static str>,
}

/// Advisory state set by the `exit` built-in. The shell keeps working after
/// `Exited`; it's up to the application to notice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Exited,
}

/// What [`Shell::dispatch`] did with a line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// No tokens.
    Empty,
    /// [`Shell::start`] hasn't been called.
    NotReady,
    Builtin(Builtin),
    /// Armed the named environment command for a later tick.
    Deferred(&'static str),
    NotFound,
    /// Longer than the line buffer allows.
    Rejected,
}

pub struct Shell<U: Uart, const ENV: usize> {
    uart: U,
    info: DeviceInfo,
    hooks: BuiltinHooks,
    env: EnvTable<ENV>,
    tasks: TaskSwitch,
    line: LineBuffer<LINE_CAPACITY>,
    initialized: bool,
    run_state: RunState,
}

impl<U: Uart, const ENV: usize> Shell<U, ENV> {
    pub fn new(
        uart: U,
        info: DeviceInfo,
        hooks: BuiltinHooks,
        env: EnvTable<ENV>,
    ) -> Self {
        Self {
            uart,
            info,
            hooks,
            env,
            tasks: TaskSwitch::new(),
            line: LineBuffer::new(),
            initialized: false,
            run_state: RunState::Running,
        }
    }

    fn out(&mut self) -> UartWriter<'_, U> {
        UartWriter(&mut self.uart)
    }

    fn puts(&mut self, s: &str) {
        self.uart.send_all(s.as_bytes());
    }

    /// Prints the banner and the first prompt, and starts accepting
    /// commands.
    pub fn start(&mut self) {
        self.initialized = true;
        self.run_state = RunState::Running;
        self.line.clear();

        let info = self.info;
        let (major, minor, patch) = VERSION;
        let mut out = self.out();
        let _ = writeln!(out, "SHELL_VERSION: {}.{}.{}", major, minor, patch);
        let fields = [
            ("Architecture", info.architecture, UNKNOWN),
            ("Device Name", info.device_name, UNKNOWN),
            ("Operating System", info.os, "No OS"),
            ("Device Model", info.device, UNKNOWN),
            ("Version", info.version, UNKNOWN),
            ("User", info.user, UNKNOWN),
            ("Password", info.password, UNKNOWN),
        ];
        for (label, value, missing) in fields {
            let _ = match value {
                Some(v) => writeln!(out, "{}: {}", label, v),
                None => writeln!(
                    out,
                    "{}: {}{}{}",
                    label, FG_RED, missing, RESET_ALL
                ),
            };
        }
        let _ = out.write_str("The MCU Shell is started\n");
        let _ = out.write_str("Type 'help' for a list of commands.\n\n\n");
        self.prompt();
    }

    pub fn prompt(&mut self) {
        let user = self.info.user.unwrap_or(UNKNOWN);
        let device = self.info.device.unwrap_or(UNKNOWN);
        let _ = write!(
            self.out(),
            "{}{}{}@{}> ",
            FG_GREEN,
            user,
            RESET_ALL,
            device
        );
    }

    /// Handles one received byte.
    ///
    /// CR or LF completes the line: a newline is echoed, the line is
    /// dispatched, and the prompt is printed again. Backspace and DEL erase
    /// one character. Anything else is stored and echoed, unless the buffer
    /// is full, in which case it is silently dropped.
    pub fn feed(&mut self, byte: u8) {
        match byte {
            b'\r' | b'\n' => {
                self.puts("\n");
                let mut line = [0u8; LINE_CAPACITY];
                let len = self.line.len();
                line[..len].copy_from_slice(self.line.as_bytes());
                self.line.clear();
                match core::str::from_utf8(&line[..len]) {
                    Ok(text) => {
                        self.dispatch(text);
                    }
                    Err(_) => self.not_found(None),
                }
                self.prompt();
            }
            0x08 | 0x7f => {
                if self.line.pop().is_some() {
                    self.puts(ERASE_BACK);
                }
            }
            b => {
                if self.line.push(b) {
                    self.uart.send_all(&[b]);
                }
            }
        }
    }

    /// Tokenizes `line` and runs or arms the command it names.
    pub fn dispatch(&mut self, line: &str) -> Dispatched {
        if !self.initialized {
            log_e!(TAG, "Shell not initialized.");
            return Dispatched::NotReady;
        }
        let Ok(argv) = Argv::parse(line) else {
            let _ =
                writeln!(self.out(), "{}Line too long{}", FG_RED, RESET_ALL);
            return Dispatched::Rejected;
        };
        let Some(cmd) = argv.command() else {
            return Dispatched::Empty;
        };

        if let Some(b) = Builtin::from_name(cmd) {
            log_d!(TAG, "Executing command: {}", cmd);
            self.run_builtin(b, &argv);
            return Dispatched::Builtin(b);
        }

        if let Some(i) = self.env.find(cmd) {
            log_d!(TAG, "Executing environment variable command: {}", cmd);
            self.env.arm(i, argv.clone());
            self.tasks.arm_next(&mut self.env);
            if let Some(var) = self.env.iter().nth(i) {
                return Dispatched::Deferred(var.name());
            }
        }

        self.not_found(Some(cmd));
        Dispatched::NotFound
    }

    fn not_found(&mut self, cmd: Option<&str>) {
        let _ = write!(
            self.out(),
            "{}Command not found: {}\n{}",
            FG_RED,
            cmd.unwrap_or("?"),
            RESET_ALL
        );
    }

    fn run_builtin(&mut self, b: Builtin, argv: &Argv) {
        let hooks = self.hooks;
        let hook = match b {
            Builtin::Hello => {
                self.puts("Hello, World!\n");
                return;
            }
            Builtin::Help => {
                self.puts("Available commands:\n");
                for c in Builtin::ALL {
                    let _ = writeln!(self.out(), "- {}", c.name());
                }
                return;
            }
            Builtin::Exit => {
                self.puts("Exiting...\n");
                self.run_state = RunState::Exited;
                self.puts(CLEAR_SCREEN);
                return;
            }
            Builtin::Clear => {
                // Without a hook there's nothing to do.
                if let Some(f) = hooks.clear {
                    f(&mut self.out(), argv);
                }
                return;
            }
            Builtin::Reset => {
                self.puts("Rebooting...\n");
                hooks.reset
            }
            Builtin::Poweroff => {
                self.puts("Powering off...\n");
                hooks.poweroff
            }
            Builtin::Test => hooks.test,
            Builtin::Ls => hooks.ls,
        };

        match hook {
            Some(f) => f(&mut self.out(), argv),
            None => {
                let _ = write!(
                    self.out(),
                    "{}{} command not implemented\n{}",
                    FG_RED,
                    b.name(),
                    RESET_ALL
                );
            }
        }
    }

    /// Promotes the first armed environment command, if the task slot is
    /// free.
    pub fn arm_next(&mut self) -> bool {
        self.tasks.arm_next(&mut self.env)
    }

    /// Runs and clears the current environment command, if any.
    pub fn run_current_task(&mut self) -> bool {
        self.tasks.run_current_task(&mut UartWriter(&mut self.uart))
    }

    /// One main-loop tick of the task switch: promote, then run.
    pub fn tick(&mut self) -> bool {
        self.arm_next();
        self.run_current_task()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_started(&self) -> bool {
        self.initialized
    }

    /// Bytes typed on the current, incomplete line.
    pub fn pending_line(&self) -> &[u8] {
        self.line.as_bytes()
    }

    pub fn env(&self) -> &EnvTable<ENV> {
        &self.env
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_hal::fake::BufferUart;
    use std::cell::Cell;
    use std::string::String;

    thread_local! {
        static RAN: Cell<u32> = const { Cell::new(0) };
    }

    fn ran() -> u32 {
        RAN.with(|r| r.replace(0))
    }

    fn counted(out: &mut dyn fmt::Write, argv: &Argv) {
        RAN.with(|r| r.set(r.get() + 1));
        let _ = write!(out, "<{}>", argv.argc());
    }

    fn wipe(out: &mut dyn fmt::Write, _argv: &Argv) {
        let _ = out.write_str(CLEAR_SCREEN);
    }

    const INFO: DeviceInfo = DeviceInfo {
        architecture: Some("Cortex-M4"),
        user: Some("root"),
        password: None,
        device_name: Some("df"),
        os: None,
        device: Some("stm32f407"),
        version: Some("v1"),
    };

    const PROMPT: &str = "\x1b[32mroot\x1b[0m@stm32f407> ";

    fn shell_with(
        env: &[&'static str],
        hooks: BuiltinHooks,
    ) -> Shell<BufferUart, 4> {
        let env = env.iter().map(|&n| EnvVar::new(n, counted)).collect();
        let mut sh = Shell::new(BufferUart::new(), INFO, hooks, env);
        sh.start();
        sh.uart_mut().take_tx();
        ran();
        sh
    }

    fn shell() -> Shell<BufferUart, 4> {
        shell_with(&["led"], BuiltinHooks::NONE)
    }

    fn feed_str(sh: &mut Shell<BufferUart, 4>, s: &str) {
        for b in s.bytes() {
            sh.feed(b);
        }
    }

    fn take(sh: &mut Shell<BufferUart, 4>) -> String {
        String::from_utf8(sh.uart_mut().take_tx()).unwrap()
    }

    #[test]
    fn hello_end_to_end() {
        let mut sh = shell();
        feed_str(&mut sh, "hello\r");
        let expected = format!("hello\nHello, World!\n{}", PROMPT);
        assert_eq!(take(&mut sh), expected);
    }

    #[test]
    fn buffer_keeps_nineteen_characters() {
        let mut sh = shell();
        feed_str(&mut sh, "abcdefghijklmnopqrstuvwxy");
        assert_eq!(sh.pending_line(), b"abcdefghijklmnopqrs");
        assert_eq!(take(&mut sh), "abcdefghijklmnopqrs");

        // Still usable after hitting the limit.
        for _ in 0..19 {
            sh.feed(0x7f);
        }
        feed_str(&mut sh, "hello\n");
        assert!(take(&mut sh).contains("Hello, World!\n"));
    }

    #[test]
    fn backspace_erases() {
        let mut sh = shell();
        feed_str(&mut sh, "hx");
        sh.feed(0x08);
        assert_eq!(sh.pending_line(), b"h");
        assert_eq!(take(&mut sh), "hx\x08 \x08");

        // The last character goes, then there is nothing left to erase.
        sh.feed(0x08);
        assert_eq!(take(&mut sh), "\x08 \x08");
        assert!(sh.pending_line().is_empty());
        sh.feed(0x08);
        sh.feed(0x7f);
        assert_eq!(take(&mut sh), "");
        assert!(sh.pending_line().is_empty());
    }

    #[test]
    fn empty_line_just_reprompts() {
        let mut sh = shell();
        sh.feed(b'\n');
        assert_eq!(take(&mut sh), format!("\n{}", PROMPT));
        assert_eq!(sh.dispatch("   "), Dispatched::Empty);
    }

    #[test]
    fn builtin_wins_over_env() {
        let mut sh = shell_with(&["hello"], BuiltinHooks::NONE);
        assert_eq!(sh.dispatch("hello"), Dispatched::Builtin(Builtin::Hello));
        assert!(!sh.env().iter().any(|v| v.is_armed()));
        assert!(!sh.tick());
        assert_eq!(ran(), 0);
    }

    #[test]
    fn env_command_is_deferred() {
        let mut sh = shell();
        assert_eq!(sh.dispatch("led on"), Dispatched::Deferred("led"));
        assert_eq!(ran(), 0);

        assert!(sh.run_current_task());
        assert_eq!(ran(), 1);
        assert!(take(&mut sh).ends_with("<2>"));

        assert!(!sh.run_current_task());
        assert!(!sh.tick());
        assert_eq!(ran(), 0);
    }

    #[test]
    fn env_commands_queue_behind_current_task() {
        let mut sh = shell_with(&["a", "b"], BuiltinHooks::NONE);
        sh.dispatch("b");
        sh.dispatch("a");
        // b holds the slot; a stays armed.
        assert!(sh.env().iter().next().unwrap().is_armed());
        assert!(sh.tick());
        assert!(sh.tick());
        assert!(!sh.tick());
        assert_eq!(ran(), 2);
    }

    #[test]
    fn unknown_command() {
        let mut sh = shell();
        assert_eq!(sh.dispatch("frob 1"), Dispatched::NotFound);
        assert_eq!(take(&mut sh), "\x1b[31mCommand not found: frob\n\x1b[0m");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let mut sh = shell();
        assert_eq!(sh.dispatch("HELLO"), Dispatched::NotFound);
        assert_eq!(sh.dispatch("LED"), Dispatched::NotFound);
    }

    #[test]
    fn missing_hook_reports_not_implemented() {
        let mut sh = shell();
        sh.dispatch("reset");
        assert_eq!(
            take(&mut sh),
            "Rebooting...\n\x1b[31mreset command not implemented\n\x1b[0m"
        );
        sh.dispatch("ls");
        assert_eq!(
            take(&mut sh),
            "\x1b[31mls command not implemented\n\x1b[0m"
        );
    }

    #[test]
    fn hooks_get_the_argv() {
        let hooks = BuiltinHooks {
            test: Some(counted),
            poweroff: Some(counted),
            ..BuiltinHooks::NONE
        };
        let mut sh = shell_with(&[], hooks);
        sh.dispatch("test 1 2 3");
        assert_eq!(take(&mut sh), "<4>");
        sh.dispatch("poweroff");
        assert_eq!(take(&mut sh), "Powering off...\n<1>");
        assert_eq!(ran(), 2);
    }

    #[test]
    fn clear_without_hook_is_silent() {
        let mut sh = shell();
        assert_eq!(sh.dispatch("clear"), Dispatched::Builtin(Builtin::Clear));
        assert_eq!(take(&mut sh), "");

        let mut sh = shell_with(
            &[],
            BuiltinHooks {
                clear: Some(wipe),
                ..BuiltinHooks::NONE
            },
        );
        sh.dispatch("clear");
        assert_eq!(take(&mut sh), "\x1b[2J");
    }

    #[test]
    fn help_lists_builtins() {
        let mut sh = shell();
        sh.dispatch("help");
        assert_eq!(
            take(&mut sh),
            "Available commands:\n- hello\n- reset\n- poweroff\n- help\n\
             - exit\n- clear\n- test\n- ls\n"
        );
    }

    #[test]
    fn exit_is_advisory() {
        let mut sh = shell();
        assert_eq!(sh.run_state(), RunState::Running);
        sh.dispatch("exit");
        assert_eq!(sh.run_state(), RunState::Exited);
        assert_eq!(take(&mut sh), "Exiting...\n\x1b[2J");
        assert_eq!(sh.dispatch("hello"), Dispatched::Builtin(Builtin::Hello));
    }

    #[test]
    fn dispatch_before_start_does_nothing() {
        let env = [EnvVar::new("led", counted)].into_iter().collect();
        let mut sh: Shell<BufferUart, 4> =
            Shell::new(BufferUart::new(), INFO, BuiltinHooks::NONE, env);
        assert_eq!(sh.dispatch("hello"), Dispatched::NotReady);
        assert!(sh.uart().tx().is_empty());
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut sh = shell();
        assert_eq!(
            sh.dispatch("abcdefghijklmnopqrstuvwxyz"),
            Dispatched::Rejected
        );
    }

    #[test]
    fn invalid_utf8_is_not_found() {
        let mut sh = shell();
        sh.feed(0xff);
        sh.feed(b'\r');
        assert!(sh.uart().tx_str().contains("Command not found"));
    }

    #[test]
    fn banner() {
        let mut sh: Shell<BufferUart, 4> = Shell::new(
            BufferUart::new(),
            INFO,
            BuiltinHooks::NONE,
            EnvTable::new(),
        );
        sh.start();
        let text = sh.uart().tx_str();
        assert!(text.starts_with("SHELL_VERSION: 1.0.2\n"));
        assert!(text.contains("Architecture: Cortex-M4\n"));
        assert!(text.contains("Operating System: \x1b[31mNo OS\x1b[0m\n"));
        assert!(text.contains("Password: \x1b[31mUnknown\x1b[0m\n"));
        assert!(text.ends_with(&format!("commands.\n\n\n{}", PROMPT)));
    }

    #[test]
    fn prompt_defaults() {
        let mut sh: Shell<BufferUart, 1> = Shell::new(
            BufferUart::new(),
            DeviceInfo::default(),
            BuiltinHooks::default(),
            EnvTable::new(),
        );
        sh.prompt();
        assert_eq!(sh.uart().tx_str(), "\x1b[32mUnknown\x1b[0m@Unknown> ");
    }
}
