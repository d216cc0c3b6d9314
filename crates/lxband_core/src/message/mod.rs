// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Wire protocol types: raw samples, processed frames, subscriber control
//! messages and the server frame vocabulary.
//!
//! Everything here round-trips through `serde_json` with the exact field
//! names used in recorded session files, so changing a field name is a
//! data-format break, not a refactor.

mod client;
mod processed;
mod sample;
mod server;

pub use client::ClientMessage;
pub use processed::{
  ActivityState,
  BandPowers,
  BatteryStatus,
  ProcessedAcc,
  ProcessedBattery,
  ProcessedEeg,
  ProcessedPpg,
  SignalQuality,
};
pub use sample::{AccSample, BatterySample, EegSample, PpgSample};
pub use server::{
  DataFlowHealth,
  MonitoringMetrics,
  ProcessedBatch,
  RawBatch,
  ServerFrame,
  ServerStatusKind,
  StreamingReason,
  StreamingStatus,
};

use crate::SensorType;
use serde::{Deserialize, Serialize};

/// Named topics a subscriber can opt into. Raw and processed sensor streams
/// are per-sensor channels; the remainder are monitoring channels. A
/// subscriber with an empty subscription set receives no data frames.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum_macros::Display,
  strum_macros::EnumString,
  strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
  EegRaw,
  EegProcessed,
  PpgRaw,
  PpgProcessed,
  AccRaw,
  AccProcessed,
  BatRaw,
  MonitoringMetrics,
  HealthUpdates,
  BufferStatus,
  SystemAlerts,
  BatchStatus,
}

impl Channel {
  /// Raw-data channel for a sensor.
  pub fn raw(sensor: SensorType) -> Channel {
    match sensor {
      SensorType::Eeg => Channel::EegRaw,
      SensorType::Ppg => Channel::PpgRaw,
      SensorType::Acc => Channel::AccRaw,
      SensorType::Bat => Channel::BatRaw,
    }
  }

  /// Processed-data channel for a sensor. Battery has no processed stream.
  pub fn processed(sensor: SensorType) -> Option<Channel> {
    match sensor {
      SensorType::Eeg => Some(Channel::EegProcessed),
      SensorType::Ppg => Some(Channel::PpgProcessed),
      SensorType::Acc => Some(Channel::AccProcessed),
      SensorType::Bat => None,
    }
  }
}

/// Event vocabulary for `event` frames pushed to subscribers.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum_macros::Display,
  strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
  DeviceConnected,
  DeviceDisconnected,
  DeviceConnectionFailed,
  DeviceInfo,
  StreamStarted,
  StreamStopped,
  ScanResult,
  RegisteredDevices,
  BluetoothStatus,
  Error,
}

#[cfg(test)]
mod test {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn test_channel_names_roundtrip() {
    assert_eq!(Channel::EegRaw.to_string(), "eeg_raw");
    assert_eq!(
      Channel::from_str("monitoring_metrics").expect("Known channel"),
      Channel::MonitoringMetrics
    );
    assert!(Channel::from_str("not_a_channel").is_err());
  }

  #[test]
  fn test_battery_has_no_processed_channel() {
    assert_eq!(Channel::processed(SensorType::Bat), None);
    assert_eq!(Channel::raw(SensorType::Bat), Channel::BatRaw);
  }

  #[test]
  fn test_event_type_wire_names() {
    assert_eq!(
      serde_json::to_string(&EventType::DeviceDisconnected).expect("Serializable"),
      "\"device_disconnected\""
    );
  }
}
