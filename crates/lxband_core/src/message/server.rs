// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Frames the server pushes to subscribers, tagged by `type`.

use super::{
  AccSample,
  BatterySample,
  EegSample,
  EventType,
  PpgSample,
  ProcessedAcc,
  ProcessedBattery,
  ProcessedEeg,
  ProcessedPpg,
};
use crate::SensorType;
use serde::{Deserialize, Serialize};

/// A batch of raw samples for one sensor, as carried in a `raw_data` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBatch {
  Eeg(Vec<EegSample>),
  Ppg(Vec<PpgSample>),
  Acc(Vec<AccSample>),
  Bat(Vec<BatterySample>),
}

impl RawBatch {
  pub fn len(&self) -> usize {
    match self {
      RawBatch::Eeg(samples) => samples.len(),
      RawBatch::Ppg(samples) => samples.len(),
      RawBatch::Acc(samples) => samples.len(),
      RawBatch::Bat(samples) => samples.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Per-sample timestamps, used for monitor pings and rate logging.
  pub fn timestamps(&self) -> Vec<f64> {
    match self {
      RawBatch::Eeg(samples) => samples.iter().map(|s| s.timestamp).collect(),
      RawBatch::Ppg(samples) => samples.iter().map(|s| s.timestamp).collect(),
      RawBatch::Acc(samples) => samples.iter().map(|s| s.timestamp).collect(),
      RawBatch::Bat(samples) => samples.iter().map(|s| s.timestamp).collect(),
    }
  }
}

/// A batch of processed frames for one sensor, as carried in a
/// `processed_data` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessedBatch {
  Eeg(Vec<ProcessedEeg>),
  Ppg(Vec<ProcessedPpg>),
  Acc(Vec<ProcessedAcc>),
  Bat(Vec<ProcessedBattery>),
}

impl ProcessedBatch {
  pub fn len(&self) -> usize {
    match self {
      ProcessedBatch::Eeg(frames) => frames.len(),
      ProcessedBatch::Ppg(frames) => frames.len(),
      ProcessedBatch::Acc(frames) => frames.len(),
      ProcessedBatch::Bat(frames) => frames.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Server admission states reported in `server_status` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServerStatusKind {
  Initializing,
  Ready,
  Error,
}

/// Observed streaming state, as decided by the streaming monitor from actual
/// data flow rather than control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StreamingStatus {
  Running,
  Stopped,
  Error,
}

/// Why the monitor reports the streaming state it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamingReason {
  Active,
  DeviceNotConnected,
  ManuallyStopped,
  CollectionError,
  Unknown,
}

/// Aggregate data-flow quality: `good` when EEG plus at least three sensors
/// are active, `fair` when only EEG is active, `none` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataFlowHealth {
  Good,
  Fair,
  None,
}

/// Snapshot pushed on the `monitoring_metrics` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringMetrics {
  pub timestamp: f64,
  pub eeg_sampling_rate: f64,
  pub ppg_sampling_rate: f64,
  pub acc_sampling_rate: f64,
  pub bat_sampling_rate: f64,
  pub battery_level: u8,
  pub streaming_status: StreamingStatus,
  pub device_connected: bool,
  pub streaming_reason: StreamingReason,
  pub data_flow_health: DataFlowHealth,
  pub active_sensors: Vec<SensorType>,
  pub clients_connected: usize,
}

/// Server-to-subscriber frames. `raw_data`/`processed_data` carry sensor
/// batches; `event` frames carry lifecycle notifications; the remainder are
/// control replies and monitoring pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
  RawData {
    sensor_type: SensorType,
    device_id: String,
    timestamp: f64,
    data: RawBatch,
  },
  ProcessedData {
    sensor_type: SensorType,
    device_id: String,
    timestamp: f64,
    data: ProcessedBatch,
  },
  SensorData {
    sensor_type: SensorType,
    device_id: String,
    timestamp: f64,
    data: serde_json::Value,
  },
  Event {
    event_type: EventType,
    data: serde_json::Value,
  },
  ServerStatus {
    status: ServerStatusKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u32>,
  },
  MonitoringMetrics(MonitoringMetrics),
  HealthUpdates {
    timestamp: f64,
    data: serde_json::Value,
  },
  BufferStatus {
    timestamp: f64,
    data: serde_json::Value,
  },
  SystemAlerts {
    timestamp: f64,
    data: serde_json::Value,
  },
  SubscriptionConfirmed {
    channel: String,
    timestamp: f64,
  },
  UnsubscriptionConfirmed {
    channel: String,
    timestamp: f64,
  },
  PingResponse {
    timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_timestamp: Option<f64>,
  },
  HeartbeatResponse {
    timestamp: f64,
  },
  HandshakeResponse {
    status: String,
    message: String,
  },
  Error {
    message: String,
  },
}

impl ServerFrame {
  /// Serialize for the wire. Frame types are all serializable by
  /// construction; a failure here would be a programming error in the frame
  /// definitions themselves.
  pub fn to_json(&self) -> String {
    serde_json::to_string(self).expect("Server frames always serialize")
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_raw_data_frame_shape() {
    let frame = ServerFrame::RawData {
      sensor_type: SensorType::Eeg,
      device_id: "AA:BB:CC:DD:EE:01".to_owned(),
      timestamp: 123.5,
      data: RawBatch::Eeg(vec![EegSample {
        timestamp: 2.0,
        ch1: 1.5,
        ch2: -1.5,
        leadoff_ch1: false,
        leadoff_ch2: false,
      }]),
    };
    let value: serde_json::Value =
      serde_json::from_str(&frame.to_json()).expect("Valid JSON");
    assert_eq!(value["type"], "raw_data");
    assert_eq!(value["sensor_type"], "eeg");
    assert_eq!(value["data"][0]["ch1"], 1.5);
  }

  #[test]
  fn test_monitoring_metrics_fields_inline() {
    let frame = ServerFrame::MonitoringMetrics(MonitoringMetrics {
      timestamp: 1.0,
      eeg_sampling_rate: 250.0,
      ppg_sampling_rate: 50.0,
      acc_sampling_rate: 30.0,
      bat_sampling_rate: 0.5,
      battery_level: 88,
      streaming_status: StreamingStatus::Running,
      device_connected: true,
      streaming_reason: StreamingReason::Active,
      data_flow_health: DataFlowHealth::Good,
      active_sensors: vec![SensorType::Eeg, SensorType::Ppg, SensorType::Acc],
      clients_connected: 2,
    });
    let value: serde_json::Value =
      serde_json::from_str(&frame.to_json()).expect("Valid JSON");
    assert_eq!(value["type"], "monitoring_metrics");
    assert_eq!(value["eeg_sampling_rate"], 250.0);
    assert_eq!(value["data_flow_health"], "good");
  }

  #[test]
  fn test_server_status_omits_empty_retry() {
    let frame = ServerFrame::ServerStatus {
      status: ServerStatusKind::Ready,
      message: "Server is now ready for connections".to_owned(),
      retry_after: None,
    };
    assert!(!frame.to_json().contains("retry_after"));
  }
}
