// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Streaming health inferred from actual data flow.
//!
//! Emitters ping the monitor with their per-tick sample counts; the monitor
//! keeps a rolling samples/second estimate per sensor and answers "is
//! streaming healthy?" from observation alone. Control flags are never
//! consulted, so a wedged pipeline shows up here even when everything
//! believes it is streaming.

use lxband_core::{SensorType, message::DataFlowHealth, util};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Rolling-rate window. Rate tuples older than this are pruned and a sensor
/// with no ping for this long is forced inactive.
const RATE_WINDOW_SECS: f64 = 5.0;
/// Aggregate status queries are answered from cache for this long.
const STATUS_CACHE_SECS: f64 = 0.5;
/// Activity thresholds in samples/second. Only EEG gates the aggregate
/// streaming verdict; the rest are informational.
const EEG_ACTIVE_THRESHOLD: f64 = 8.0;
const INFORMATIONAL_THRESHOLD: f64 = 0.1;
const BAT_ACTIVE_THRESHOLD: f64 = 0.01;

fn threshold_for(sensor: SensorType) -> f64 {
  match sensor {
    SensorType::Eeg => EEG_ACTIVE_THRESHOLD,
    SensorType::Ppg | SensorType::Acc => INFORMATIONAL_THRESHOLD,
    SensorType::Bat => BAT_ACTIVE_THRESHOLD,
  }
}

#[derive(Debug, Default)]
struct SensorFlow {
  total_samples: u64,
  samples_per_second: f64,
  last_update: f64,
  rate_window: VecDeque<(f64, f64)>,
  is_active: bool,
}

/// Per-sensor detail inside an aggregate snapshot.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SensorFlowSnapshot {
  pub sampling_rate: f64,
  pub total_samples: u64,
  pub is_active: bool,
  pub last_update: f64,
}

/// Aggregate streaming status, the authoritative streaming-state read for
/// external consumers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StreamingSnapshot {
  pub is_active: bool,
  pub active_sensors: Vec<SensorType>,
  pub sensor_details: HashMap<SensorType, SensorFlowSnapshot>,
  pub data_flow_health: DataFlowHealth,
  pub total_active_sensors: usize,
  pub last_data_received: f64,
  pub calculated_at: f64,
}

pub struct StreamingMonitor {
  flows: Mutex<HashMap<SensorType, SensorFlow>>,
  cache: Mutex<Option<(f64, StreamingSnapshot)>>,
}

impl Default for StreamingMonitor {
  fn default() -> Self {
    Self::new()
  }
}

impl StreamingMonitor {
  pub fn new() -> Self {
    let flows = [
      SensorType::Eeg,
      SensorType::Ppg,
      SensorType::Acc,
      SensorType::Bat,
    ]
    .into_iter()
    .map(|sensor| (sensor, SensorFlow::default()))
    .collect();
    Self {
      flows: Mutex::new(flows),
      cache: Mutex::new(None),
    }
  }

  /// Record one emitter ping. `timestamps` are the device timestamps of the
  /// counted samples; only their count participates in the rate estimate.
  pub fn track_data_flow(&self, sensor: SensorType, count: usize, timestamps: &[f64]) {
    self.track_data_flow_at(sensor, count, timestamps, util::unix_now());
  }

  fn track_data_flow_at(&self, sensor: SensorType, count: usize, timestamps: &[f64], now: f64) {
    trace!(
      "{} flow ping: {} samples, first ts {:?}",
      sensor,
      count,
      timestamps.first()
    );
    let mut flows = self.flows.lock().expect("Monitor lock poisoned");
    let flow = flows.entry(sensor).or_default();
    flow.total_samples += count as u64;

    let delta = now - flow.last_update;
    if delta > 0.0 && flow.last_update > 0.0 {
      flow.rate_window.push_back((now, count as f64 / delta));
      while flow
        .rate_window
        .front()
        .is_some_and(|(t, _)| now - t > RATE_WINDOW_SECS)
      {
        flow.rate_window.pop_front();
      }
      flow.samples_per_second = if flow.rate_window.is_empty() {
        0.0
      } else {
        flow.rate_window.iter().map(|(_, r)| r).sum::<f64>() / flow.rate_window.len() as f64
      };
      flow.is_active = flow.samples_per_second >= threshold_for(sensor);
    }
    flow.last_update = now;
    *self.cache.lock().expect("Cache lock poisoned") = None;
  }

  /// Aggregate status, cached for half a second.
  pub fn streaming_status(&self) -> StreamingSnapshot {
    self.streaming_status_at(util::unix_now())
  }

  fn streaming_status_at(&self, now: f64) -> StreamingSnapshot {
    {
      let cache = self.cache.lock().expect("Cache lock poisoned");
      if let Some((calculated_at, snapshot)) = cache.as_ref() {
        if now - calculated_at < STATUS_CACHE_SECS {
          return snapshot.clone();
        }
      }
    }

    let mut flows = self.flows.lock().expect("Monitor lock poisoned");
    let mut active_sensors = Vec::new();
    let mut sensor_details = HashMap::new();
    let mut last_data_received: f64 = 0.0;
    for (sensor, flow) in flows.iter_mut() {
      if now - flow.last_update > RATE_WINDOW_SECS {
        flow.is_active = false;
        flow.samples_per_second = 0.0;
      }
      sensor_details.insert(
        *sensor,
        SensorFlowSnapshot {
          sampling_rate: flow.samples_per_second,
          total_samples: flow.total_samples,
          is_active: flow.is_active,
          last_update: flow.last_update,
        },
      );
      if flow.is_active {
        active_sensors.push(*sensor);
      }
      last_data_received = last_data_received.max(flow.last_update);
    }

    // EEG-only gate: the aggregate verdict follows the EEG stream.
    let eeg_active = active_sensors.contains(&SensorType::Eeg);
    let data_flow_health = if eeg_active && active_sensors.len() >= 3 {
      DataFlowHealth::Good
    } else if eeg_active {
      DataFlowHealth::Fair
    } else {
      DataFlowHealth::None
    };

    let snapshot = StreamingSnapshot {
      is_active: eeg_active,
      total_active_sensors: active_sensors.len(),
      active_sensors,
      sensor_details,
      data_flow_health,
      last_data_received,
      calculated_at: now,
    };
    *self.cache.lock().expect("Cache lock poisoned") = Some((now, snapshot.clone()));
    snapshot
  }

  /// Detail for one sensor, bypassing the aggregate cache.
  pub fn sensor_status(&self, sensor: SensorType) -> Option<SensorFlowSnapshot> {
    let flows = self.flows.lock().expect("Monitor lock poisoned");
    flows.get(&sensor).map(|flow| SensorFlowSnapshot {
      sampling_rate: flow.samples_per_second,
      total_samples: flow.total_samples,
      is_active: flow.is_active,
      last_update: flow.last_update,
    })
  }

  /// Clear all tracking, used on stream stop and disconnect.
  pub fn reset(&self) {
    let mut flows = self.flows.lock().expect("Monitor lock poisoned");
    for flow in flows.values_mut() {
      *flow = SensorFlow::default();
    }
    *self.cache.lock().expect("Cache lock poisoned") = None;
    info!("Streaming monitor tracking reset.");
  }
}
