// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use getset::{CopyGetters, Getters};

#[derive(CopyGetters, Getters, Debug, Clone)]
pub struct EngineOptions {
  /// Application name, used for the platform data directory.
  #[getset(get = "pub")]
  app_name: String,
  #[getset(get_copy = "pub")]
  websocket_port: u16,
  #[getset(get_copy = "pub")]
  websocket_use_all_interfaces: bool,
  /// Overrides the platform data directory when set.
  #[getset(get = "pub")]
  data_root: Option<String>,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self {
      app_name: "LinkBand".to_owned(),
      websocket_port: 18765,
      websocket_use_all_interfaces: false,
      data_root: None,
    }
  }
}

#[derive(Default)]
pub struct EngineOptionsBuilder {
  options: EngineOptions,
}

impl EngineOptionsBuilder {
  pub fn app_name(&mut self, app_name: &str) -> &mut Self {
    self.options.app_name = app_name.to_owned();
    self
  }

  pub fn websocket_port(&mut self, port: u16) -> &mut Self {
    self.options.websocket_port = port;
    self
  }

  pub fn websocket_use_all_interfaces(&mut self, use_all: bool) -> &mut Self {
    self.options.websocket_use_all_interfaces = use_all;
    self
  }

  pub fn data_root(&mut self, data_root: &str) -> &mut Self {
    self.options.data_root = Some(data_root.to_owned());
    self
  }

  pub fn finish(&self) -> EngineOptions {
    self.options.clone()
  }
}
