// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Platform data-directory resolution for session recordings and exports.
//!
//! - macOS: `~/Library/Application Support/<AppName>`
//! - Windows: `%APPDATA%/<AppName>`
//! - Linux: `~/.<appname>`
//! - Anywhere the home directory cannot be resolved (dev containers, CI):
//!   `./temp_exports`

use std::path::PathBuf;

const DEV_FALLBACK_DIR: &str = "./temp_exports";

/// Root directory for persisted application data.
pub fn app_data_root(app_name: &str) -> PathBuf {
  if cfg!(target_os = "linux") {
    match dirs::home_dir() {
      Some(home) => home.join(format!(".{}", app_name.to_lowercase())),
      None => PathBuf::from(DEV_FALLBACK_DIR),
    }
  } else {
    match dirs::data_dir() {
      Some(data) => data.join(app_name),
      None => PathBuf::from(DEV_FALLBACK_DIR),
    }
  }
}

/// Staging directory for export archives, under the app data root.
pub fn temp_exports_dir(app_name: &str) -> PathBuf {
  let root = app_data_root(app_name);
  if root == PathBuf::from(DEV_FALLBACK_DIR) {
    root
  } else {
    root.join("temp_exports")
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_data_root_uses_app_name() {
    let root = app_data_root("LinkBand");
    let rendered = root.to_string_lossy();
    assert!(rendered.contains("LinkBand") || rendered.contains("linkband") || rendered.contains("temp_exports"));
  }
}
