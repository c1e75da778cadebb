// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Leveled text logging and interrupt-safe event tracing.
//!
//! The [`Logger`] formats one line per message:
//!
//! ```text
//! [<tick>] [<tag>] <color>[L] message<reset>
//! ```
//!
//! The timestamp appears only when timestamps are enabled and a tick source
//! is installed, the tag only when it is non-empty, and the color codes only
//! when color is enabled. Lines either go straight to the output sink or, in
//! buffered mode, into a byte ring that [`Logger::flush`] drains later.
//!
//! All logger state sits behind a `critical_section::Mutex`, so the macros
//! may be used from interrupt handlers. The sink is always called with the
//! critical section released. For events in hot interrupt paths, prefer the
//! formatting-free [`trace`] module.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod trace;

use core::cell::RefCell;
use core::fmt::{self, Write};
use critical_section::Mutex;
use heapless::{Deque, String};

/// Capacity of the global logger's buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Longest line the logger will format; longer messages are truncated.
pub const LINE_MAX: usize = 384;

/// Largest chunk handed to the sink by a single call during a flush.
pub const FLUSH_CHUNK: usize = 256;

const RESET: &str = "\x1b[0m";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    None = 0,
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl Level {
    fn marker(self) -> &'static str {
        match self {
            Level::None => "",
            Level::Error => "[E] ",
            Level::Warn => "[W] ",
            Level::Info => "[I] ",
            Level::Debug => "[D] ",
            Level::Verbose => "[V] ",
        }
    }

    fn color(self) -> Option<&'static str> {
        match self {
            Level::Error => Some("\x1b[31m"),
            Level::Warn => Some("\x1b[33m"),
            Level::Info => Some("\x1b[32m"),
            Level::Debug => Some("\x1b[36m"),
            Level::None | Level::Verbose => None,
        }
    }

    /// Parses a lowercase level name such as `"info"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Level::None),
            "error" => Some(Level::Error),
            "warn" => Some(Level::Warn),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            "verbose" => Some(Level::Verbose),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferMode {
    /// Each line goes to the sink as soon as it is formatted.
    Direct,
    /// Lines accumulate until [`Logger::flush`].
    Buffered,
}

/// What buffered mode does when a line doesn't fit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Overflow {
    /// Drop the oldest buffered bytes to make room.
    Overwrite,
    /// Drop the new line.
    Discard,
}

/// Receives finished log output. May be handed a partial line when flushing.
pub type OutputFn = fn(&[u8]);

pub type TimestampFn = fn() -> u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub timestamp: bool,
    pub color: bool,
    pub mode: BufferMode,
    pub overflow: Overflow,
}

impl LogConfig {
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            timestamp: false,
            color: false,
            mode: BufferMode::Direct,
            overflow: Overflow::Overwrite,
        }
    }
}

struct State<const N: usize> {
    config: LogConfig,
    output: Option<OutputFn>,
    timestamp: Option<TimestampFn>,
    limit: usize,
    buffer: Deque<u8, N>,
}

pub struct Logger<const N: usize> {
    state: Mutex<RefCell<State<N>>>,
}

/// The process-wide logger used by the `log_*!` macros.
pub static LOGGER: Logger<DEFAULT_BUFFER_SIZE> = Logger::new();

impl<const N: usize> Logger<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                config: LogConfig::new(Level::Info),
                output: None,
                timestamp: None,
                limit: N,
                buffer: Deque::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State<N>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Resets the configuration to its defaults at `level`. The sink, the
    /// timestamp source, and any buffered bytes are left alone.
    pub fn init(&self, level: Level) {
        self.with(|s| s.config = LogConfig::new(level));
    }

    pub fn config(&self) -> LogConfig {
        self.with(|s| s.config)
    }

    pub fn set_config(&self, config: LogConfig) {
        self.with(|s| s.config = config);
    }

    pub fn set_level(&self, level: Level) {
        self.with(|s| s.config.level = level);
    }

    pub fn level(&self) -> Level {
        self.with(|s| s.config.level)
    }

    /// Installs the sink. `None` restores the default sink.
    pub fn set_output(&self, output: Option<OutputFn>) {
        self.with(|s| s.output = output);
    }

    pub fn set_timestamp_source(&self, source: Option<TimestampFn>) {
        self.with(|s| s.timestamp = source);
    }

    pub fn enable_timestamp(&self, on: bool) {
        self.with(|s| s.config.timestamp = on);
    }

    pub fn enable_color(&self, on: bool) {
        self.with(|s| s.config.color = on);
    }

    pub fn set_buffer_mode(&self, mode: BufferMode) {
        self.with(|s| s.config.mode = mode);
    }

    pub fn set_overflow_policy(&self, policy: Overflow) {
        self.with(|s| s.config.overflow = policy);
    }

    /// Limits the buffer to `size` bytes (at most its capacity `N`) and
    /// discards anything buffered.
    pub fn set_buffer_size(&self, size: usize) {
        self.with(|s| {
            s.limit = size.min(N);
            s.buffer.clear();
        });
    }

    pub fn clear_buffer(&self) {
        self.with(|s| s.buffer.clear());
    }

    /// Bytes currently buffered.
    pub fn buffer_usage(&self) -> usize {
        self.with(|s| s.buffer.len())
    }

    pub fn buffer_is_full(&self) -> bool {
        self.with(|s| s.buffer.len() >= s.limit)
    }

    pub fn enabled(&self, level: Level) -> bool {
        level != Level::None && level <= self.level()
    }

    /// Formats and emits one line.
    pub fn log(&self, level: Level, tag: &str, args: fmt::Arguments<'_>) {
        let Some((config, stamp)) = self.with(|s| {
            if level == Level::None || level > s.config.level {
                None
            } else {
                Some((s.config, s.timestamp))
            }
        }) else {
            return;
        };

        let mut line: String<LINE_MAX> = String::new();
        format_line(&mut line, level, tag, &config, stamp, args);

        self.emit(&config, line.as_bytes());
    }

    fn emit(&self, config: &LogConfig, bytes: &[u8]) {
        match config.mode {
            BufferMode::Direct => {
                let sink = self.with(|s| s.output);
                write_to(sink, bytes);
            }
            BufferMode::Buffered => {
                self.with(|s| s.push(bytes));
            }
        }
    }

    /// Drains the buffer to the sink in chunks of at most [`FLUSH_CHUNK`]
    /// bytes, returning the number of bytes written.
    pub fn flush(&self) -> usize {
        let mut total = 0;
        loop {
            let mut chunk = [0u8; FLUSH_CHUNK];
            let (n, sink) = self.with(|s| {
                let mut n = 0;
                while n < FLUSH_CHUNK {
                    match s.buffer.pop_front() {
                        Some(b) => {
                            chunk[n] = b;
                            n += 1;
                        }
                        None => break,
                    }
                }
                (n, s.output)
            });
            if n == 0 {
                return total;
            }
            write_to(sink, &chunk[..n]);
            total += n;
        }
    }

    /// Logs `data` as a header line followed by rows of 16 hex bytes.
    pub fn hex_dump(&self, level: Level, tag: &str, data: &[u8]) {
        if data.is_empty() || !self.enabled(level) {
            return;
        }
        self.log(
            level,
            tag,
            format_args!("HEX Dump ({} bytes):", data.len()),
        );
        for (row, bytes) in data.chunks(16).enumerate() {
            let mut hex: String<48> = String::new();
            for b in bytes {
                let _ = write!(hex, "{:02X} ", b);
            }
            self.log(level, tag, format_args!("  {:04X}: {}", row * 16, hex));
        }
    }
}

impl<const N: usize> Default for Logger<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> State<N> {
    fn push(&mut self, bytes: &[u8]) {
        let limit = self.limit;
        if self.buffer.len() + bytes.len() > limit {
            if self.config.overflow == Overflow::Discard {
                return;
            }
            // Overwriting: a line longer than the whole buffer keeps only
            // its tail.
            let keep = bytes.len().min(limit);
            while self.buffer.len() + keep > limit {
                self.buffer.pop_front();
            }
            for &b in &bytes[bytes.len() - keep..] {
                let _ = self.buffer.push_back(b);
            }
            return;
        }
        for &b in bytes {
            let _ = self.buffer.push_back(b);
        }
    }
}

/// Formats one log line into `line`. An over-long message is cut short, but
/// the line always ends with the color reset (if any) and a newline.
fn format_line<const L: usize>(
    line: &mut String<L>,
    level: Level,
    tag: &str,
    config: &LogConfig,
    stamp: Option<TimestampFn>,
    args: fmt::Arguments<'_>,
) {
    let color = if config.color { level.color() } else { None };
    let _ = format_body(
        &mut Filling(line),
        level,
        tag,
        config,
        stamp,
        color,
        args,
    );

    let reset = if color.is_some() { RESET } else { "" };
    let room = L.saturating_sub(reset.len() + 1);
    while line.len() > room {
        line.pop();
    }
    let _ = line.push_str(reset);
    let _ = line.push('\n');
}

/// Writes as much as fits, one character at a time, then reports an error so
/// formatting stops.
struct Filling<'a, const L: usize>(&'a mut String<L>);

impl<const L: usize> fmt::Write for Filling<'_, L> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

fn format_body(
    line: &mut dyn fmt::Write,
    level: Level,
    tag: &str,
    config: &LogConfig,
    stamp: Option<TimestampFn>,
    color: Option<&str>,
    args: fmt::Arguments<'_>,
) -> fmt::Result {
    if config.timestamp {
        if let Some(now) = stamp {
            write!(line, "[{}] ", now())?;
        }
    }
    if !tag.is_empty() {
        write!(line, "[{}] ", tag)?;
    }
    if let Some(c) = color {
        line.write_str(c)?;
    }
    line.write_str(level.marker())?;
    line.write_fmt(args)
}

fn write_to(sink: Option<OutputFn>, bytes: &[u8]) {
    match sink {
        Some(f) => f(bytes),
        None => default_sink(bytes),
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "std"))] {
        fn default_sink(bytes: &[u8]) {
            use std::io::Write as _;
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(bytes);
            let _ = out.flush();
        }
    } else if #[cfg(feature = "semihosting")] {
        fn default_sink(bytes: &[u8]) {
            if let Ok(mut out) = cortex_m_semihosting::hio::hstdout() {
                let _ = out.write_all(bytes);
            }
        }
    } else {
        fn default_sink(_bytes: &[u8]) {}
    }
}

#[doc(hidden)]
pub fn __log(level: Level, tag: &str, args: fmt::Arguments<'_>) {
    LOGGER.log(level, tag, args);
}

#[macro_export]
macro_rules! log_e {
    ($tag:expr, $($arg:tt)+) => {
        $crate::__log($crate::Level::Error, $tag, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_w {
    ($tag:expr, $($arg:tt)+) => {
        $crate::__log($crate::Level::Warn, $tag, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_i {
    ($tag:expr, $($arg:tt)+) => {
        $crate::__log($crate::Level::Info, $tag, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_d {
    ($tag:expr, $($arg:tt)+) => {
        $crate::__log($crate::Level::Debug, $tag, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_v {
    ($tag:expr, $($arg:tt)+) => {
        $crate::__log($crate::Level::Verbose, $tag, format_args!($($arg)+))
    };
}

/// `log_hex!(Level::Debug, "TAG", &bytes)`
#[macro_export]
macro_rules! log_hex {
    ($level:expr, $tag:expr, $data:expr) => {
        $crate::LOGGER.hex_dump($level, $tag, $data)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    thread_local! {
        static CAPTURED: StdRefCell<Vec<u8>> =
            const { StdRefCell::new(Vec::new()) };
        static CALLS: StdRefCell<usize> = const { StdRefCell::new(0) };
    }

    fn capture(bytes: &[u8]) {
        CAPTURED.with(|c| c.borrow_mut().extend_from_slice(bytes));
        CALLS.with(|c| *c.borrow_mut() += 1);
    }

    fn take() -> std::string::String {
        let v = CAPTURED.with(|c| std::mem::take(&mut *c.borrow_mut()));
        std::string::String::from_utf8(v).unwrap()
    }

    fn calls() -> usize {
        CALLS.with(|c| std::mem::take(&mut *c.borrow_mut()))
    }

    fn fixed_tick() -> u32 {
        42
    }

    fn logger<const N: usize>() -> Logger<N> {
        let l = Logger::new();
        l.set_output(Some(capture));
        take();
        calls();
        l
    }

    #[test]
    fn plain_line() {
        let l = logger::<64>();
        l.log(Level::Info, "IRQ", format_args!("ready {}", 3));
        assert_eq!(take(), "[IRQ] [I] ready 3\n");
    }

    #[test]
    fn empty_tag_is_omitted() {
        let l = logger::<64>();
        l.log(Level::Warn, "", format_args!("x"));
        assert_eq!(take(), "[W] x\n");
    }

    #[test]
    fn level_filter() {
        let l = logger::<64>();
        l.log(Level::Debug, "T", format_args!("hidden"));
        assert_eq!(take(), "");
        l.set_level(Level::Verbose);
        l.log(Level::Debug, "T", format_args!("shown"));
        assert_eq!(take(), "[T] [D] shown\n");
        l.set_level(Level::None);
        l.log(Level::Error, "T", format_args!("hidden"));
        assert_eq!(take(), "");
    }

    #[test]
    fn timestamp_needs_source_and_flag() {
        let l = logger::<64>();
        l.enable_timestamp(true);
        l.log(Level::Info, "T", format_args!("a"));
        assert_eq!(take(), "[T] [I] a\n");
        l.set_timestamp_source(Some(fixed_tick));
        l.log(Level::Info, "T", format_args!("b"));
        assert_eq!(take(), "[42] [T] [I] b\n");
        l.enable_timestamp(false);
        l.log(Level::Info, "T", format_args!("c"));
        assert_eq!(take(), "[T] [I] c\n");
    }

    #[test]
    fn color_wraps_marker_and_message() {
        let l = logger::<64>();
        l.enable_color(true);
        l.log(Level::Error, "T", format_args!("bad"));
        assert_eq!(take(), "[T] \x1b[31m[E] bad\x1b[0m\n");
        l.set_level(Level::Verbose);
        l.log(Level::Verbose, "T", format_args!("v"));
        assert_eq!(take(), "[T] [V] v\n");
    }

    #[test]
    fn buffered_then_flush() {
        let l = logger::<64>();
        l.set_buffer_mode(BufferMode::Buffered);
        l.log(Level::Info, "", format_args!("one"));
        l.log(Level::Info, "", format_args!("two"));
        assert_eq!(take(), "");
        assert_eq!(l.buffer_usage(), 16);
        assert_eq!(l.flush(), 16);
        assert_eq!(take(), "[I] one\n[I] two\n");
        assert_eq!(l.buffer_usage(), 0);
        assert_eq!(l.flush(), 0);
    }

    #[test]
    fn flush_is_chunked() {
        let l = logger::<1024>();
        l.set_buffer_mode(BufferMode::Buffered);
        for _ in 0..40 {
            l.log(Level::Info, "", format_args!("0123456789"));
        }
        assert_eq!(l.buffer_usage(), 40 * 15);
        assert_eq!(l.flush(), 600);
        assert_eq!(calls(), 3);
        assert_eq!(take().len(), 600);
    }

    #[test]
    fn overwrite_keeps_newest() {
        let l = logger::<16>();
        l.set_buffer_mode(BufferMode::Buffered);
        l.log(Level::Info, "", format_args!("aaaa"));
        l.log(Level::Info, "", format_args!("bbbb"));
        l.log(Level::Info, "", format_args!("cccc"));
        assert!(l.buffer_is_full());
        l.flush();
        assert_eq!(take(), "[I] bbbb\n[I] cccc\n"[2..].to_string());
    }

    #[test]
    fn discard_drops_new_line() {
        let l = logger::<16>();
        l.set_buffer_mode(BufferMode::Buffered);
        l.set_overflow_policy(Overflow::Discard);
        l.log(Level::Info, "", format_args!("aaaa"));
        l.log(Level::Info, "", format_args!("bbbb"));
        assert_eq!(l.buffer_usage(), 9);
        l.flush();
        assert_eq!(take(), "[I] aaaa\n");
    }

    #[test]
    fn buffer_size_limit() {
        let l = logger::<64>();
        l.set_buffer_mode(BufferMode::Buffered);
        l.set_buffer_size(9);
        l.log(Level::Info, "", format_args!("aaaa"));
        assert!(l.buffer_is_full());
        l.clear_buffer();
        assert_eq!(l.buffer_usage(), 0);
        assert!(!l.buffer_is_full());
    }

    #[test]
    fn init_restores_defaults() {
        let l = logger::<64>();
        l.enable_color(true);
        l.set_buffer_mode(BufferMode::Buffered);
        l.init(Level::Warn);
        assert_eq!(l.config(), LogConfig::new(Level::Warn));
    }

    #[test]
    fn hex_dump_rows() {
        let l = logger::<64>();
        let data: Vec<u8> = (0u8..18).collect();
        l.hex_dump(Level::Info, "HX", &data);
        assert_eq!(
            take(),
            concat!(
                "[HX] [I] HEX Dump (18 bytes):\n",
                "[HX] [I]   0000: ",
                "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F \n",
                "[HX] [I]   0010: 10 11 \n",
            )
        );
        l.hex_dump(Level::Info, "HX", &[]);
        assert_eq!(take(), "");
    }

    #[test]
    fn long_line_still_ends_cleanly() {
        let l = logger::<64>();
        l.enable_color(true);
        let long = "x".repeat(LINE_MAX * 2);
        l.log(Level::Warn, "T", format_args!("{}", long));
        let out = take();
        assert_eq!(out.len(), LINE_MAX);
        assert!(out.starts_with("[T] \x1b[33m[W] xxx"));
        assert!(out.ends_with("x\x1b[0m\n"));

        l.enable_color(false);
        l.log(Level::Warn, "T", format_args!("{}{}", long, "tail"));
        let out = take();
        assert_eq!(out.len(), LINE_MAX);
        assert!(out.ends_with("x\n"));
    }

    #[test]
    fn level_names() {
        assert_eq!(Level::from_name("debug"), Some(Level::Debug));
        assert_eq!(Level::from_name("DEBUG"), None);
        assert!(Level::Error < Level::Verbose);
    }
}
