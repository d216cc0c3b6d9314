// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Per-sensor acquisition pipelines: raw broadcast buffer, sliding analysis
//! buffer and processed-frame buffer, plus the DSP worker tasks that connect
//! them.
//!
//! The notification path writes each decoded sample into both the raw and
//! the analysis buffer. Emitters drain the raw and processed buffers; DSP
//! workers snapshot the analysis buffer (it slides, it is not drained) on a
//! fixed cadence and push one frame per tick into the processed buffer.
//! Battery is the exception: its worker keeps only a latest-state summary
//! for the monitor, there is no processed battery stream.

use crate::buffer::{BufferStats, RingBuffer};
use crate::device::decoder;
use lxband_core::{
  SensorType,
  errors::DspError,
  message::{
    AccSample,
    BatterySample,
    EegSample,
    PpgSample,
    ProcessedAcc,
    ProcessedBattery,
    ProcessedEeg,
    ProcessedPpg,
  },
  util::{self, async_manager},
};
use lxband_dsp::{AccProcessor, BatteryProcessor, EegProcessor, PpgProcessor};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const EEG_RAW_CAPACITY: usize = 2000;
const PPG_RAW_CAPACITY: usize = 1000;
const ACC_RAW_CAPACITY: usize = 1000;
const BAT_RAW_CAPACITY: usize = 100;

const EEG_ANALYSIS_CAPACITY: usize = 2000;
const PPG_ANALYSIS_CAPACITY: usize = 3000;
const ACC_ANALYSIS_CAPACITY: usize = 150;
const BAT_ANALYSIS_CAPACITY: usize = 50;

const PROCESSED_CAPACITY: usize = 1000;

/// DSP cadence per sensor.
const PROCESS_INTERVAL: Duration = Duration::from_millis(500);
const BAT_PROCESS_INTERVAL: Duration = Duration::from_millis(1000);

/// Notification handlers drop packets shorter than these before decoding;
/// a header plus at least a partial record is required.
const EEG_MIN_PACKET: usize = 8;
const PPG_MIN_PACKET: usize = 8;
const ACC_MIN_PACKET: usize = 10;

/// The three buffers of one sensor's pipeline.
pub struct Pipeline<Raw: Clone, Frame: Clone> {
  pub raw: RingBuffer<Raw>,
  pub analysis: RingBuffer<Raw>,
  pub processed: RingBuffer<Frame>,
}

impl<Raw: Clone, Frame: Clone> Pipeline<Raw, Frame> {
  fn new(raw_capacity: usize, analysis_capacity: usize) -> Self {
    Self {
      raw: RingBuffer::new(raw_capacity),
      analysis: RingBuffer::new(analysis_capacity),
      processed: RingBuffer::new(PROCESSED_CAPACITY),
    }
  }

  fn clear(&self) {
    self.raw.clear();
    self.analysis.clear();
    self.processed.clear();
  }
}

/// All four sensor pipelines for one device connection, created on connect
/// and torn down on disconnect.
pub struct SensorPipelines {
  pub eeg: Pipeline<EegSample, ProcessedEeg>,
  pub ppg: Pipeline<PpgSample, ProcessedPpg>,
  pub acc: Pipeline<AccSample, ProcessedAcc>,
  pub bat: Pipeline<BatterySample, ProcessedBattery>,
  /// Latest battery summary for the monitor; battery has no processed
  /// stream.
  battery_state: Mutex<Option<ProcessedBattery>>,
  /// Latest raw battery level, broadcast and reported even between
  /// notifications.
  battery_level: Mutex<Option<u8>>,
}

impl Default for SensorPipelines {
  fn default() -> Self {
    Self::new()
  }
}

impl SensorPipelines {
  pub fn new() -> Self {
    Self {
      eeg: Pipeline::new(EEG_RAW_CAPACITY, EEG_ANALYSIS_CAPACITY),
      ppg: Pipeline::new(PPG_RAW_CAPACITY, PPG_ANALYSIS_CAPACITY),
      acc: Pipeline::new(ACC_RAW_CAPACITY, ACC_ANALYSIS_CAPACITY),
      bat: Pipeline::new(BAT_RAW_CAPACITY, BAT_ANALYSIS_CAPACITY),
      battery_state: Mutex::new(None),
      battery_level: Mutex::new(None),
    }
  }

  /// Decode one notification packet and push every sample into the raw and
  /// analysis buffers. Short or malformed packets are logged and dropped
  /// whole; a decodable packet never partially commits.
  pub fn ingest_packet(&self, sensor: SensorType, packet: &[u8], arrival_time: f64) {
    match sensor {
      SensorType::Eeg => {
        if packet.len() < EEG_MIN_PACKET {
          warn!("EEG packet too short: {} bytes", packet.len());
          return;
        }
        match decoder::decode_eeg(packet) {
          Ok(samples) => {
            for sample in samples {
              self.eeg.raw.write(sample.clone());
              self.eeg.analysis.write(sample);
            }
          }
          Err(e) => warn!("Dropping EEG packet: {}", e),
        }
      }
      SensorType::Ppg => {
        if packet.len() < PPG_MIN_PACKET {
          warn!("PPG packet too short: {} bytes", packet.len());
          return;
        }
        match decoder::decode_ppg(packet) {
          Ok(samples) => {
            for sample in samples {
              self.ppg.raw.write(sample.clone());
              self.ppg.analysis.write(sample);
            }
          }
          Err(e) => warn!("Dropping PPG packet: {}", e),
        }
      }
      SensorType::Acc => {
        if packet.len() < ACC_MIN_PACKET {
          warn!("ACC packet too short: {} bytes", packet.len());
          return;
        }
        match decoder::decode_acc(packet) {
          Ok(samples) => {
            for sample in samples {
              self.acc.raw.write(sample.clone());
              self.acc.analysis.write(sample);
            }
          }
          Err(e) => warn!("Dropping ACC packet: {}", e),
        }
      }
      SensorType::Bat => match decoder::decode_battery(packet, arrival_time) {
        Ok(sample) => {
          self.record_battery_level(sample.level);
          self.bat.raw.write(sample.clone());
          self.bat.analysis.write(sample);
        }
        Err(e) => warn!("Dropping battery packet: {}", e),
      },
    }
  }

  /// Push a battery reading obtained by explicit GATT read (the initial
  /// read during battery bring-up).
  pub fn ingest_battery_reading(&self, level: u8, arrival_time: f64) {
    self.record_battery_level(level);
    let sample = BatterySample {
      timestamp: arrival_time,
      level,
    };
    self.bat.raw.write(sample.clone());
    self.bat.analysis.write(sample);
  }

  fn record_battery_level(&self, level: u8) {
    *self.battery_level.lock().expect("Battery lock poisoned") = Some(level);
  }

  pub fn battery_level(&self) -> Option<u8> {
    *self.battery_level.lock().expect("Battery lock poisoned")
  }

  pub fn battery_state(&self) -> Option<ProcessedBattery> {
    self
      .battery_state
      .lock()
      .expect("Battery lock poisoned")
      .clone()
  }

  /// Buffer statistics per sensor for the `buffer_status` channel.
  pub fn buffer_stats(&self) -> HashMap<SensorType, BufferStats> {
    HashMap::from([
      (SensorType::Eeg, self.eeg.raw.stats()),
      (SensorType::Ppg, self.ppg.raw.stats()),
      (SensorType::Acc, self.acc.raw.stats()),
      (SensorType::Bat, self.bat.raw.stats()),
    ])
  }

  /// Discard all buffered data, used during disconnect cleanup.
  pub fn clear(&self) {
    self.eeg.clear();
    self.ppg.clear();
    self.acc.clear();
    self.bat.clear();
    *self.battery_state.lock().expect("Battery lock poisoned") = None;
    *self.battery_level.lock().expect("Battery lock poisoned") = None;
  }
}

/// Spawn the four DSP worker tasks. Compute-heavy stages run on the blocking
/// pool; insufficient-data windows are quiet no-ops. Workers stop when the
/// token cancels.
pub fn spawn_dsp_workers(pipelines: Arc<SensorPipelines>, cancel: CancellationToken) {
  spawn_eeg_worker(pipelines.clone(), cancel.clone());
  spawn_ppg_worker(pipelines.clone(), cancel.clone());
  spawn_acc_worker(pipelines.clone(), cancel.clone());
  spawn_battery_worker(pipelines, cancel);
}

fn log_dsp_error(sensor: SensorType, error: &DspError) {
  match error {
    DspError::InsufficientData { have, need, .. } => {
      debug!("{} processing skipped: {}/{} samples buffered", sensor, have, need);
    }
    other => warn!("{} processing failed: {}", sensor, other),
  }
}

fn spawn_eeg_worker(pipelines: Arc<SensorPipelines>, cancel: CancellationToken) {
  async_manager::spawn(async move {
    let processor = match EegProcessor::new() {
      Ok(processor) => Arc::new(processor),
      Err(e) => {
        error!("EEG filter design failed, worker not starting: {}", e);
        return;
      }
    };
    let mut ticker = tokio::time::interval(PROCESS_INTERVAL);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let window = pipelines.eeg.analysis.snapshot();
          let processor = processor.clone();
          let now = util::unix_now();
          let result = tokio::task::spawn_blocking(move || processor.process(&window, now)).await;
          match result {
            Ok(Ok(frame)) => {
              pipelines.eeg.processed.write(frame);
            }
            Ok(Err(e)) => log_dsp_error(SensorType::Eeg, &e),
            Err(e) => error!("EEG worker join error: {}", e),
          }
        }
      }
    }
    debug!("EEG DSP worker exiting.");
  });
}

fn spawn_ppg_worker(pipelines: Arc<SensorPipelines>, cancel: CancellationToken) {
  async_manager::spawn(async move {
    let processor = match PpgProcessor::new() {
      Ok(processor) => Arc::new(Mutex::new(processor)),
      Err(e) => {
        error!("PPG filter design failed, worker not starting: {}", e);
        return;
      }
    };
    let mut ticker = tokio::time::interval(PROCESS_INTERVAL);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let window = pipelines.ppg.analysis.snapshot();
          let processor = processor.clone();
          let now = util::unix_now();
          let result = tokio::task::spawn_blocking(move || {
            processor
              .lock()
              .expect("Processor lock poisoned")
              .process(&window, now)
          })
          .await;
          match result {
            Ok(Ok(frame)) => {
              pipelines.ppg.processed.write(frame);
            }
            Ok(Err(e)) => log_dsp_error(SensorType::Ppg, &e),
            Err(e) => error!("PPG worker join error: {}", e),
          }
        }
      }
    }
    debug!("PPG DSP worker exiting.");
  });
}

fn spawn_acc_worker(pipelines: Arc<SensorPipelines>, cancel: CancellationToken) {
  async_manager::spawn(async move {
    let processor = AccProcessor::default();
    let mut ticker = tokio::time::interval(PROCESS_INTERVAL);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let window = pipelines.acc.analysis.snapshot();
          match processor.process(&window, util::unix_now()) {
            Ok(frame) => {
              pipelines.acc.processed.write(frame);
            }
            Err(e) => log_dsp_error(SensorType::Acc, &e),
          }
        }
      }
    }
    debug!("ACC DSP worker exiting.");
  });
}

fn spawn_battery_worker(pipelines: Arc<SensorPipelines>, cancel: CancellationToken) {
  async_manager::spawn(async move {
    let processor = BatteryProcessor::default();
    let mut ticker = tokio::time::interval(BAT_PROCESS_INTERVAL);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let window = pipelines.bat.analysis.snapshot();
          match processor.process(&window, util::unix_now()) {
            Ok(state) => {
              *pipelines
                .battery_state
                .lock()
                .expect("Battery lock poisoned") = Some(state);
            }
            Err(e) => log_dsp_error(SensorType::Bat, &e),
          }
        }
      }
    }
    debug!("Battery DSP worker exiting.");
  });
}

#[cfg(test)]
mod test {
  use super::*;

  fn eeg_packet(tick: u32, records: usize) -> Vec<u8> {
    let mut packet = tick.to_le_bytes().to_vec();
    for _ in 0..records {
      packet.extend_from_slice(&[0x00, 0, 0, 1, 0, 0, 1]);
    }
    packet
  }

  #[test]
  fn test_ingest_writes_raw_and_analysis() {
    let pipelines = SensorPipelines::new();
    pipelines.ingest_packet(SensorType::Eeg, &eeg_packet(0, 4), 0.0);
    assert_eq!(pipelines.eeg.raw.size(), 4);
    assert_eq!(pipelines.eeg.analysis.size(), 4);
  }

  #[test]
  fn test_short_packet_dropped_whole() {
    let pipelines = SensorPipelines::new();
    pipelines.ingest_packet(SensorType::Eeg, &[0, 0, 0, 0, 1], 0.0);
    assert_eq!(pipelines.eeg.raw.size(), 0);
    pipelines.ingest_packet(SensorType::Acc, &[0; 9], 0.0);
    assert_eq!(pipelines.acc.raw.size(), 0);
  }

  #[test]
  fn test_battery_notification_updates_level() {
    let pipelines = SensorPipelines::new();
    pipelines.ingest_packet(SensorType::Bat, &[91], 10.0);
    assert_eq!(pipelines.battery_level(), Some(91));
    assert_eq!(pipelines.bat.raw.size(), 1);
  }

  #[test]
  fn test_clear_resets_everything() {
    let pipelines = SensorPipelines::new();
    pipelines.ingest_packet(SensorType::Eeg, &eeg_packet(0, 4), 0.0);
    pipelines.ingest_battery_reading(50, 1.0);
    pipelines.clear();
    assert_eq!(pipelines.eeg.raw.size(), 0);
    assert_eq!(pipelines.bat.analysis.size(), 0);
    assert_eq!(pipelines.battery_level(), None);
  }

  #[tokio::test]
  async fn test_acc_worker_produces_frames() {
    let pipelines = Arc::new(SensorPipelines::new());
    // One second of flat accelerometer data.
    let mut packet = 0u32.to_le_bytes().to_vec();
    for _ in 0..40 {
      packet.extend_from_slice(&[10, 0, 10, 0, 10, 0]);
    }
    pipelines.ingest_packet(SensorType::Acc, &packet, 0.0);

    let cancel = CancellationToken::new();
    spawn_dsp_workers(pipelines.clone(), cancel.clone());
    tokio::time::sleep(Duration::from_millis(700)).await;
    cancel.cancel();

    let frames = pipelines.acc.processed.drain();
    assert!(!frames.is_empty());
    assert_eq!(
      frames[0].activity_state,
      lxband_core::message::ActivityState::Stationary
    );
  }
}
