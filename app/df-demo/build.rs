// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;

/// Must match `df_irq::PRIORITY_LEVELS`.
const PRIORITY_LEVELS: u8 = 16;

fn main() -> Result<()> {
    let cfg: AppConfig = build_util::config()?;
    check_tick(cfg.core_clock_hz, cfg.tick_hz)?;
    check_irqs(&cfg.irq)?;

    let out_dir = build_util::out_dir()?;
    let dest_path = out_dir.join("df_config.rs");
    let mut out =
        File::create(&dest_path).context("creating df_config.rs")?;

    writeln!(out, "pub const APP_NAME: &str = {:?};", cfg.name)?;
    writeln!(out, "pub const BOARD: &str = {:?};", cfg.board)?;
    // Only the SysTick setup on target reads the core clock.
    writeln!(out, "#[allow(dead_code)]")?;
    writeln!(out, "pub const CORE_CLOCK_HZ: u32 = {};", cfg.core_clock_hz)?;
    writeln!(out, "pub const TICK_HZ: u32 = {};", cfg.tick_hz)?;

    {
        let s = &cfg.shell;
        writeln!(
            out,
            "pub const DEVICE_INFO: df_shell::DeviceInfo = \
             df_shell::DeviceInfo {{"
        )?;
        for (field, value) in [
            ("architecture", &s.architecture),
            ("user", &s.user),
            ("password", &s.password),
            ("device_name", &s.device_name),
            ("os", &s.os),
            ("device", &s.device),
            ("version", &s.version),
        ] {
            match value {
                Some(v) => writeln!(out, "    {field}: Some({v:?}),")?,
                None => writeln!(out, "    {field}: None,")?,
            }
        }
        writeln!(out, "}};")?;
    }

    {
        let l = &cfg.log;
        let level = log_level(&l.level)?;
        let mode = if l.buffered { "Buffered" } else { "Direct" };
        let overflow = match l.overflow.as_str() {
            "overwrite" => "Overwrite",
            "discard" => "Discard",
            other => bail!("unknown log overflow policy {other:?}"),
        };
        writeln!(
            out,
            "pub const LOG_CONFIG: df_log::LogConfig = df_log::LogConfig {{"
        )?;
        writeln!(out, "    level: df_log::Level::{level},")?;
        writeln!(out, "    timestamp: {},", l.timestamp)?;
        writeln!(out, "    color: {},", l.color)?;
        writeln!(out, "    mode: df_log::BufferMode::{mode},")?;
        writeln!(out, "    overflow: df_log::Overflow::{overflow},")?;
        writeln!(out, "}};")?;
        writeln!(
            out,
            "pub const LOG_BUFFER_SIZE: usize = {};",
            l.buffer_size
        )?;
    }

    {
        writeln!(out, "pub mod irq {{")?;
        for i in &cfg.irq {
            writeln!(out, "    pub const {}: u16 = {};", i.name, i.irq)?;
        }
        writeln!(out, "}}")?;

        let count = cfg.irq.len();
        writeln!(
            out,
            "pub const IRQ_TABLE: [(u16, u8, \
             df_irq::IrqHandler<crate::DemoShell, u8>); {count}] = ["
        )?;
        for i in &cfg.irq {
            writeln!(
                out,
                "    (irq::{}, {}, {}),",
                i.name, i.priority, i.handler
            )?;
        }
        writeln!(out, "];")?;
    }

    {
        let count = cfg.init.len();
        writeln!(
            out,
            "pub const INIT_TABLE: [df_init::InitEntry; {count}] = ["
        )?;
        for i in &cfg.init {
            writeln!(out, "    {},", init_entry(i)?)?;
        }
        writeln!(out, "];")?;
    }

    if build_util::is_embedded_target() {
        // cortex-m-rt looks for memory.x on the linker search path.
        std::fs::copy("memory.x", out_dir.join("memory.x"))
            .context("copying memory.x")?;
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rerun-if-changed=memory.x");
    }

    Ok(())
}

fn check_tick(core_clock_hz: u32, tick_hz: u32) -> Result<()> {
    if df_tick::checked_reload_value(core_clock_hz, tick_hz).is_none() {
        bail!(
            "tick-hz {tick_hz} is unusable with core-clock-hz \
             {core_clock_hz}: it must be non-zero, at most the core clock, \
             and give a reload of at most {:#x}",
            df_tick::SYST_RELOAD_MAX
        );
    }
    Ok(())
}

fn check_irqs(irqs: &[IrqConfig]) -> Result<()> {
    let mut numbers = BTreeSet::new();
    let mut priorities = BTreeSet::new();
    for i in irqs {
        if i.priority >= PRIORITY_LEVELS {
            bail!(
                "irq {} has priority {}, must be below {PRIORITY_LEVELS}",
                i.name,
                i.priority
            );
        }
        if !numbers.insert(i.irq) {
            bail!("irq number {} is listed twice", i.irq);
        }
        if !priorities.insert(i.priority) {
            // The dispatcher would silently let one source shadow the other.
            println!(
                "cargo:warning=irq {} shares priority {} with another source",
                i.name, i.priority
            );
        }
    }
    Ok(())
}

fn log_level(name: &str) -> Result<&'static str> {
    Ok(match name {
        "none" => "None",
        "error" => "Error",
        "warn" => "Warn",
        "info" => "Info",
        "debug" => "Debug",
        "verbose" => "Verbose",
        other => bail!("unknown log level {other:?}"),
    })
}

fn stage(name: &str) -> Result<&'static str> {
    Ok(match name {
        "board" | "core" => "Board",
        "prev" | "platform" => "Prev",
        "device" => "Device",
        "component" => "Component",
        "env" => "Env",
        "app" | "application" => "App",
        other => bail!("unknown init stage {other:?}"),
    })
}

fn init_entry(i: &InitConfig) -> Result<String> {
    match (&i.entry, &i.function) {
        (Some(entry), None) => {
            if i.stage.is_some() || i.name.is_some() {
                bail!(
                    "init entry {entry} takes its name and stage from code"
                );
            }
            Ok(entry.clone())
        }
        (None, Some(function)) => {
            let stage = stage(i.stage.as_deref().with_context(|| {
                format!("init function {function} needs a stage")
            })?)?;
            let name = i.name.as_deref().unwrap_or(function);
            Ok(format!(
                "df_init::InitEntry::new({name:?}, \
                 df_init::Stage::{stage}, {function})"
            ))
        }
        _ => {
            bail!("each [[init]] needs exactly one of `entry` or `function`")
        }
    }
}

/// Application configuration, from `app.toml`.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AppConfig {
    name: String,
    board: String,
    core_clock_hz: u32,
    #[serde(default = "default_tick_hz")]
    tick_hz: u32,
    #[serde(default)]
    shell: ShellConfig,
    #[serde(default)]
    log: LogConfig,
    #[serde(default)]
    irq: Vec<IrqConfig>,
    #[serde(default)]
    init: Vec<InitConfig>,
}

fn default_tick_hz() -> u32 {
    1000
}

/// Identity shown by the shell banner and prompt.
#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ShellConfig {
    user: Option<String>,
    password: Option<String>,
    device: Option<String>,
    device_name: Option<String>,
    architecture: Option<String>,
    os: Option<String>,
    version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct LogConfig {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default)]
    timestamp: bool,
    #[serde(default)]
    color: bool,
    #[serde(default)]
    buffered: bool,
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
    #[serde(default = "default_overflow")]
    overflow: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamp: false,
            color: false,
            buffered: false,
            buffer_size: default_buffer_size(),
            overflow: default_overflow(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_buffer_size() -> usize {
    1024
}

fn default_overflow() -> String {
    "overwrite".into()
}

/// A deferred interrupt source.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct IrqConfig {
    /// Name of the generated `irq::NAME` constant.
    name: String,
    irq: u16,
    priority: u8,
    /// Path to a `fn(&mut DemoShell, u8)`.
    handler: String,
}

/// One staged initializer: either a ready-made `InitEntry` constant, or a
/// function plus its stage.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct InitConfig {
    entry: Option<String>,
    function: Option<String>,
    stage: Option<String>,
    name: Option<String>,
}
