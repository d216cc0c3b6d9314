// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use lxband_core::errors::{ConnectError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LxbandEngineError {
  #[error("Bluetooth bring-up failed: {0}")]
  BluetoothError(#[from] ConnectError),
  #[error("Subscriber transport failed: {0}")]
  TransportError(#[from] TransportError),
  #[error("Data directory unavailable: {0}")]
  DataDirectoryError(String),
}
