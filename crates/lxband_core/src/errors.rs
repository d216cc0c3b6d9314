// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Error structs/enums for the streaming engine, one enum per failure class.
//!
//! Propagation rules: decode and DSP errors stay local to their pipeline,
//! connection errors bubble to the session supervisor, transport errors stay
//! local to the hub, and recording errors are counted but never abort
//! acquisition. Only [`LxbError::Fatal`] crosses a streaming-loop boundary.

use crate::SensorType;
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type LxbResult<T = ()> = Result<T, LxbError>;

/// Connection errors occur while scanning for or connecting to a headband.
/// They bubble up to the session supervisor, which transitions the device
/// state machine and updates the auto-connect cooldown.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectError {
  /// BLE scan failed: {0}
  ScanFailed(String),
  /// Device {0} not found
  DeviceNotFound(String),
  /// Service discovery failed for {0}: {1}
  ServiceDiscoveryFailed(String, String),
  /// Required characteristic {0} missing on device
  MissingCharacteristic(String),
  /// Connection attempt to {0} timed out
  ConnectTimeout(String),
  /// Bluetooth adapter unavailable: {0}
  AdapterUnavailable(String),
  /// No device currently connected
  NotConnected,
  /// Device connection error: {0}
  DeviceConnectionError(String),
}

/// Decode errors occur when a notification packet cannot be turned into
/// samples. The offending packet is logged and dropped; the buffer is never
/// poisoned with partial samples.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeError {
  /// {sensor} packet too short: {len} bytes, need at least {min}
  ShortPacket {
    sensor: SensorType,
    len: usize,
    min: usize,
  },
  /// Malformed {0} field: {1}
  MalformedField(SensorType, String),
}

/// DSP errors occur inside the per-sensor processing workers. Insufficient
/// data is the quiet steady state during buffer warm-up; filter and numeric
/// failures are logged and the worker carries on with the next window.
#[derive(Debug, Error, Display, Clone, PartialEq, Serialize, Deserialize)]
pub enum DspError {
  /// Insufficient {sensor} data: {have} samples buffered, {need} required
  InsufficientData {
    sensor: SensorType,
    have: usize,
    need: usize,
  },
  /// Filter failure: {0}
  FilterFailure(String),
  /// Numerical error: {0}
  NumericalError(String),
}

/// Transport errors occur while fanning frames out to subscribers. They are
/// always local to the hub: a slow or broken subscriber is dropped (or
/// tolerated, on the priority path) without disturbing the emitters.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
  /// Send to subscriber {0} timed out
  SendTimeout(String),
  /// Send to subscriber {0} failed: {1}
  SendFailed(String, String),
  /// Subscriber {0} connection closed
  ConnectionClosed(String),
  /// Transport listener failed: {0}
  ListenFailed(String),
}

/// Recording errors occur while persisting a session to disk. A file-open
/// failure disables recording for that stream only; write failures are
/// counted into the session manifest and acquisition continues.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordError {
  /// A recording session is already active
  SessionAlreadyActive,
  /// No recording session is active
  NoActiveSession,
  /// Could not open {0}: {1}
  FileOpen(String, String),
  /// Write to {0} failed: {1}
  WriteFailed(String, String),
  /// Could not create session directory {0}: {1}
  SessionDirectory(String, String),
}

/// Aggregation enum for the full error taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum LxbError {
  #[error(transparent)]
  Connect(#[from] ConnectError),
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Dsp(#[from] DspError),
  #[error(transparent)]
  Transport(#[from] TransportError),
  #[error(transparent)]
  Record(#[from] RecordError),
  /// Unrecoverable failures (executor panic, resource exhaustion). These stop
  /// all pipelines and surface an `error` event before exit.
  #[error("Fatal error: {0}")]
  Fatal(String),
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_error_display() {
    let err = DecodeError::ShortPacket {
      sensor: SensorType::Eeg,
      len: 3,
      min: 8,
    };
    assert_eq!(
      err.to_string(),
      "eeg packet too short: 3 bytes, need at least 8"
    );
    let err: LxbError = ConnectError::DeviceNotFound("AA:BB".to_owned()).into();
    assert_eq!(err.to_string(), "Device AA:BB not found");
  }
}
