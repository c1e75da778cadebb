// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by the build scripts of application images.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that, when set, holds the full text of the
/// application configuration. This takes precedence over `app.toml`.
pub const APP_CONFIG_VAR: &str = "DF_APP_CONFIG";

/// Name of the configuration file looked up next to the package manifest
/// when `DF_APP_CONFIG` is unset.
pub const APP_CONFIG_FILE: &str = "app.toml";

/// Returns the `OUT_DIR` set by Cargo for the running build script.
pub fn out_dir() -> Result<PathBuf> {
    let dir = env::var_os("OUT_DIR").context("OUT_DIR not set")?;
    Ok(PathBuf::from(dir))
}

/// Returns true if the build is for a bare-metal Cortex-M target.
pub fn is_embedded_target() -> bool {
    env::var("TARGET")
        .map(|t| t.starts_with("thumbv"))
        .unwrap_or(false)
}

///
/// Pulls the application configuration for purposes of a build script.
///
/// The configuration text comes from `DF_APP_CONFIG` if that is set, and from
/// `app.toml` in the package directory otherwise. As with any Serde type, `T`
/// only needs to describe the parts of the file the caller cares about, but
/// the application's own config type is expected to `deny_unknown_fields` so
/// that typos in `app.toml` fail the build.
///
pub fn config<T: DeserializeOwned>() -> Result<T> {
    println!("cargo:rerun-if-env-changed={}", APP_CONFIG_VAR);
    if let Ok(text) = env::var(APP_CONFIG_VAR) {
        println!("--- toml for ${} ---", APP_CONFIG_VAR);
        println!("{}", text);
        return config_from_str(&text)
            .with_context(|| format!("parsing ${}", APP_CONFIG_VAR));
    }

    let manifest = env::var_os("CARGO_MANIFEST_DIR")
        .context("CARGO_MANIFEST_DIR not set")?;
    config_from_file(&Path::new(&manifest).join(APP_CONFIG_FILE))
}

/// Reads and parses a configuration file, asking Cargo to rerun the build
/// script when it changes.
pub fn config_from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    println!("cargo:rerun-if-changed={}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    config_from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))
}

/// Parses configuration text.
pub fn config_from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(toml::from_str(text)?)
}
