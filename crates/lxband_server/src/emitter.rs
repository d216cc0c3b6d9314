// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Emitter tasks: one fixed-cadence loop per sensor that drains the raw and
//! processed buffers, offers everything to the recorder, publishes frames to
//! the hub and pings the streaming monitor.
//!
//! Ordering is the core invariant here: every drained sample is offered to
//! the recorder before any subscriber fan-out, and neither step is
//! conditioned on subscriber count. A parsed sample reaches the recorder
//! even when nobody is listening, and a slow hub can never push back into
//! acquisition.

use crate::device::sanitize_for_filename;
use crate::hub::Broadcaster;
use crate::monitor::StreamingMonitor;
use crate::pipeline::SensorPipelines;
use crate::recorder::DataRecorder;
use lxband_core::{
  SensorType,
  message::{BatterySample, Channel, ProcessedBatch, RawBatch, ServerFrame},
  util,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Emitter cadence per sensor.
fn emit_interval(sensor: SensorType) -> Duration {
  match sensor {
    SensorType::Eeg => Duration::from_millis(40),
    SensorType::Ppg => Duration::from_millis(20),
    SensorType::Acc => Duration::from_millis(33),
    SensorType::Bat => Duration::from_millis(100),
  }
}

/// How long an emitter tolerates an empty drain before giving up. The
/// supervisor does not restart it until the next stream start.
fn no_data_timeout(sensor: SensorType) -> Duration {
  match sensor {
    SensorType::Bat => Duration::from_secs(10),
    _ => Duration::from_secs(5),
  }
}

/// Window for the periodic actual-rate log line. Monitoring decisions use
/// the monitor's own 5 s window; this longer one only feeds a log message.
const RATE_LOG_WINDOW_SECS: f64 = 60.0;
const RATE_LOG_INTERVAL_SECS: f64 = 5.0;

/// Everything an emitter needs, shared across the four tasks.
pub struct EmitterContext {
  pub pipelines: Arc<SensorPipelines>,
  pub broadcaster: Arc<dyn Broadcaster>,
  pub monitor: Arc<StreamingMonitor>,
  pub recorder: Arc<DataRecorder>,
  /// Device address as broadcast in frames.
  pub device_id: String,
}

impl EmitterContext {
  fn file_stem(&self, sensor: SensorType) -> String {
    let device = sanitize_for_filename(&self.device_id);
    match sensor {
      // Battery has a single raw-only file with a bare stem.
      SensorType::Bat => format!("{}_bat", device),
      other => format!("{}_{}", device, other),
    }
  }
}

impl SensorPipelines {
  fn drain_raw_batch(&self, sensor: SensorType) -> RawBatch {
    match sensor {
      SensorType::Eeg => RawBatch::Eeg(self.eeg.raw.drain()),
      SensorType::Ppg => RawBatch::Ppg(self.ppg.raw.drain()),
      SensorType::Acc => RawBatch::Acc(self.acc.raw.drain()),
      SensorType::Bat => RawBatch::Bat(self.bat.raw.drain()),
    }
  }

  fn drain_processed_batch(&self, sensor: SensorType) -> ProcessedBatch {
    match sensor {
      SensorType::Eeg => ProcessedBatch::Eeg(self.eeg.processed.drain()),
      SensorType::Ppg => ProcessedBatch::Ppg(self.ppg.processed.drain()),
      SensorType::Acc => ProcessedBatch::Acc(self.acc.processed.drain()),
      // No processed battery stream.
      SensorType::Bat => ProcessedBatch::Bat(Vec::new()),
    }
  }
}

async fn record_raw_batch(recorder: &DataRecorder, data_type: &str, batch: &RawBatch) {
  match batch {
    RawBatch::Eeg(samples) => {
      for sample in samples {
        recorder.add_data(data_type, sample).await;
      }
    }
    RawBatch::Ppg(samples) => {
      for sample in samples {
        recorder.add_data(data_type, sample).await;
      }
    }
    RawBatch::Acc(samples) => {
      for sample in samples {
        recorder.add_data(data_type, sample).await;
      }
    }
    RawBatch::Bat(samples) => {
      for sample in samples {
        recorder.add_data(data_type, sample).await;
      }
    }
  }
}

async fn record_processed_batch(recorder: &DataRecorder, data_type: &str, batch: &ProcessedBatch) {
  match batch {
    ProcessedBatch::Eeg(frames) => {
      for frame in frames {
        recorder.add_data(data_type, frame).await;
      }
    }
    ProcessedBatch::Ppg(frames) => {
      for frame in frames {
        recorder.add_data(data_type, frame).await;
      }
    }
    ProcessedBatch::Acc(frames) => {
      for frame in frames {
        recorder.add_data(data_type, frame).await;
      }
    }
    ProcessedBatch::Bat(frames) => {
      for frame in frames {
        recorder.add_data(data_type, frame).await;
      }
    }
  }
}

/// Spawn one emitter per sensor. The returned handles are awaited by the
/// supervisor on stream stop with a short cap before detaching.
pub fn spawn_emitters(context: Arc<EmitterContext>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
  [
    SensorType::Eeg,
    SensorType::Ppg,
    SensorType::Acc,
    SensorType::Bat,
  ]
  .into_iter()
  .map(|sensor| {
    let context = context.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
      run_emitter(sensor, context, cancel).await;
    })
  })
  .collect()
}

async fn run_emitter(sensor: SensorType, context: Arc<EmitterContext>, cancel: CancellationToken) {
  info!("{} emitter started.", sensor);
  let mut ticker = tokio::time::interval(emit_interval(sensor));
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  let timeout = no_data_timeout(sensor);
  // Tracked on the tokio clock so tests can drive it deterministically.
  let mut last_data_time = tokio::time::Instant::now();
  let mut total_samples: u64 = 0;
  let mut samples_since_log: u64 = 0;
  let mut last_log_time = util::unix_now();
  let mut last_rate_log_time = util::unix_now();
  let mut timestamp_window: VecDeque<f64> = VecDeque::new();
  let mut last_battery_level: Option<u8> = None;

  loop {
    tokio::select! {
      _ = cancel.cancelled() => {
        debug!("{} emitter cancelled.", sensor);
        break;
      }
      _ = ticker.tick() => {}
    }
    let now = util::unix_now();
    let mut raw = context.pipelines.drain_raw_batch(sensor);
    let processed = context.pipelines.drain_processed_batch(sensor);

    // Recorder first, independent of subscribers. Estimated battery fills
    // are broadcast-only and never recorded.
    if context.recorder.is_recording().await {
      if !raw.is_empty() {
        let stem = context.file_stem(sensor);
        let raw_name = match sensor {
          SensorType::Bat => stem.clone(),
          _ => format!("{}_raw", stem),
        };
        record_raw_batch(&context.recorder, &raw_name, &raw).await;
      }
      if !processed.is_empty() {
        let name = format!("{}_processed", context.file_stem(sensor));
        record_processed_batch(&context.recorder, &name, &processed).await;
      }
    }

    let had_data = !raw.is_empty() || !processed.is_empty();

    if sensor == SensorType::Bat {
      if let RawBatch::Bat(samples) = &raw {
        if let Some(sample) = samples.last() {
          last_battery_level = Some(sample.level);
        }
      }
      // Keep subscribers fed with the last known level between device
      // notifications.
      if raw.is_empty() {
        if let Some(level) = last_battery_level.or(context.pipelines.battery_level()) {
          raw = RawBatch::Bat(vec![BatterySample {
            timestamp: now,
            level,
          }]);
        }
      }
    }

    if !raw.is_empty() {
      let count = raw.len();
      let timestamps = raw.timestamps();
      let frame = ServerFrame::RawData {
        sensor_type: sensor,
        device_id: context.device_id.clone(),
        timestamp: now,
        data: raw,
      };
      context.broadcaster.broadcast(Channel::raw(sensor), frame).await;
      context.monitor.track_data_flow(sensor, count, &timestamps);
      total_samples += count as u64;
      samples_since_log += count as u64;
      timestamp_window.extend(&timestamps);
      while timestamp_window
        .front()
        .is_some_and(|t| now - t > RATE_LOG_WINDOW_SECS)
      {
        timestamp_window.pop_front();
      }
    }

    if !processed.is_empty() {
      if let Some(channel) = Channel::processed(sensor) {
        let frame = ServerFrame::ProcessedData {
          sensor_type: sensor,
          device_id: context.device_id.clone(),
          timestamp: now,
          data: processed,
        };
        context.broadcaster.broadcast(channel, frame).await;
      }
    }

    if had_data {
      last_data_time = tokio::time::Instant::now();
      if now - last_log_time >= 1.0 {
        info!(
          "[{}] samples/sec: {} | total: {}",
          sensor, samples_since_log, total_samples
        );
        samples_since_log = 0;
        last_log_time = now;
      }
      if now - last_rate_log_time >= RATE_LOG_INTERVAL_SECS {
        if timestamp_window.len() > 1 {
          let span = timestamp_window.back().expect("Non-empty window")
            - timestamp_window.front().expect("Non-empty window");
          if span > 0.0 {
            info!(
              "[{}] actual sampling rate: {:.2} Hz over last {:.0}s",
              sensor,
              (timestamp_window.len() - 1) as f64 / span,
              RATE_LOG_WINDOW_SECS
            );
          }
        }
        last_rate_log_time = now;
      }
    } else if last_data_time.elapsed() > timeout {
      warn!(
        "No {} data for {:.0}s, stopping {} emitter.",
        sensor,
        timeout.as_secs_f64(),
        sensor
      );
      break;
    }
  }
  info!("{} emitter finished. Total samples sent: {}", sensor, total_samples);
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::recorder::RecordingFormat;
  use futures::future::BoxFuture;
  use lxband_core::message::EventType;
  use std::sync::Mutex;

  /// Broadcaster double that counts frames per channel.
  #[derive(Default)]
  struct CountingBroadcaster {
    frames: Mutex<Vec<(Channel, String)>>,
  }

  impl Broadcaster for CountingBroadcaster {
    fn broadcast(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()> {
      self
        .frames
        .lock()
        .expect("Lock poisoned")
        .push((channel, frame.to_json()));
      Box::pin(async {})
    }

    fn broadcast_priority(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()> {
      self.broadcast(channel, frame)
    }

    fn broadcast_event(
      &self,
      _event_type: EventType,
      _data: serde_json::Value,
    ) -> BoxFuture<'static, ()> {
      Box::pin(async {})
    }

    fn client_count(&self) -> usize {
      0
    }
  }

  fn eeg_packet(tick: u32, records: usize) -> Vec<u8> {
    let mut packet = tick.to_le_bytes().to_vec();
    for _ in 0..records {
      packet.extend_from_slice(&[0x00, 0, 0, 1, 0, 0, 1]);
    }
    packet
  }

  async fn run_context() -> (Arc<EmitterContext>, Arc<CountingBroadcaster>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Temp dir");
    let broadcaster = Arc::new(CountingBroadcaster::default());
    let context = Arc::new(EmitterContext {
      pipelines: Arc::new(SensorPipelines::new()),
      broadcaster: broadcaster.clone(),
      monitor: Arc::new(StreamingMonitor::new()),
      recorder: Arc::new(DataRecorder::new(dir.path().to_path_buf())),
      device_id: "01:23:45:67:89:AB".to_owned(),
    });
    (context, broadcaster, dir)
  }

  #[tokio::test]
  async fn test_recorder_fed_with_zero_subscribers() {
    let (context, broadcaster, dir) = run_context().await;
    context
      .recorder
      .start_recording(Some("t1".to_owned()), RecordingFormat::Json, None)
      .await
      .expect("Starts");

    // 2 seconds of EEG at 250 Hz, in 25-sample packets. 500 samples fit the
    // 2000-capacity raw buffer without overflow.
    for packet_index in 0..20u32 {
      context.pipelines.ingest_packet(
        SensorType::Eeg,
        &eeg_packet(packet_index * 3277, 25),
        0.0,
      );
    }
    let cancel = CancellationToken::new();
    let handle = {
      let context = context.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move { run_emitter(SensorType::Eeg, context, cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    cancel.cancel();
    let _ = handle.await;

    let manifest = context.recorder.stop_recording().await.expect("Stops");
    let entry = &manifest.files["01-23-45-67-89-AB_eeg_raw.json"];
    assert_eq!(entry.samples, 500);

    // The hub saw frames too, but nothing depended on it having takers.
    let frames = broadcaster.frames.lock().expect("Lock poisoned");
    let recorded: u64 = entry.samples;
    assert!(frames.iter().all(|(c, _)| *c == Channel::EegRaw));
    assert_eq!(recorded, 500);
    drop(frames);
    drop(dir);
  }

  #[tokio::test]
  async fn test_battery_file_uses_bare_stem() {
    let (context, _broadcaster, dir) = run_context().await;
    context
      .recorder
      .start_recording(Some("bat".to_owned()), RecordingFormat::Json, None)
      .await
      .expect("Starts");
    context.pipelines.ingest_packet(SensorType::Bat, &[77], 5.0);

    let cancel = CancellationToken::new();
    let handles = spawn_emitters(context.clone(), cancel.clone());
    tokio::time::sleep(Duration::from_millis(250)).await;
    cancel.cancel();
    for handle in handles {
      let _ = handle.await;
    }

    let manifest = context.recorder.stop_recording().await.expect("Stops");
    assert!(manifest.files.contains_key("01-23-45-67-89-AB_bat.json"));
    assert!(
      !manifest
        .files
        .keys()
        .any(|k| k.contains("bat_raw") || k.contains("bat_processed"))
    );
    drop(dir);
  }

  #[tokio::test]
  async fn test_battery_estimated_level_broadcast_but_not_recorded() {
    let (context, broadcaster, dir) = run_context().await;
    context
      .recorder
      .start_recording(Some("est".to_owned()), RecordingFormat::Json, None)
      .await
      .expect("Starts");
    // One real notification, then silence: the emitter keeps broadcasting
    // the last level but records only the real sample.
    context.pipelines.ingest_packet(SensorType::Bat, &[64], 5.0);

    let cancel = CancellationToken::new();
    let context_clone = context.clone();
    let cancel_clone = cancel.clone();
    let handle =
      tokio::spawn(async move { run_emitter(SensorType::Bat, context_clone, cancel_clone).await });
    tokio::time::sleep(Duration::from_millis(450)).await;
    cancel.cancel();
    let _ = handle.await;

    let manifest = context.recorder.stop_recording().await.expect("Stops");
    assert_eq!(manifest.files["01-23-45-67-89-AB_bat.json"].samples, 1);
    let frames = broadcaster.frames.lock().expect("Lock poisoned");
    assert!(frames.len() > 1, "estimated levels keep flowing");
    drop(frames);
    drop(dir);
  }

  #[tokio::test]
  async fn test_no_data_timeout_exits_task() {
    tokio::time::pause();
    let (context, _broadcaster, _dir) = run_context().await;
    let cancel = CancellationToken::new();
    let context_clone = context.clone();
    let cancel_clone = cancel.clone();
    let handle =
      tokio::spawn(async move { run_emitter(SensorType::Eeg, context_clone, cancel_clone).await });
    // Advance well past the 5 s no-data timeout.
    for _ in 0..200 {
      tokio::time::advance(Duration::from_millis(40)).await;
    }
    tokio::time::resume();
    tokio::time::timeout(Duration::from_secs(2), handle)
      .await
      .expect("Emitter exits by itself")
      .expect("No panic");
  }
}
