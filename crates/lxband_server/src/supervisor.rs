// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Session supervisor: the event loop that ties the BLE session, pipelines,
//! emitters, monitor and recorder together.
//!
//! One loop owns all connection state. Commands arrive from the hub through
//! a channel, hardware events arrive from the session's event pump, and two
//! tickers drive the auto-connect scan and the periodic status/metrics
//! broadcasts. Decode errors die in the pipelines, connect errors die here
//! (state machine plus cooldown); nothing short of cancellation stops the
//! loop itself.

use crate::device::{
  DeviceInfo,
  DeviceStatus,
  hardware::{BleCentral, BleSession, HardwareEvent},
  registry::{DeviceRegistry, RegisteredDevice},
};
use crate::emitter::{EmitterContext, spawn_emitters};
use crate::hub::Broadcaster;
use crate::monitor::StreamingMonitor;
use crate::pipeline::{SensorPipelines, spawn_dsp_workers};
use crate::recorder::{DataRecorder, RecordingFormat, SessionManifest};
use lxband_core::{
  errors::{ConnectError, RecordError},
  message::{EventType, MonitoringMetrics, StreamingReason, StreamingStatus},
  util,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Auto-connect loop cadence.
const AUTO_CONNECT_INTERVAL: Duration = Duration::from_secs(15);
/// Scan cache refresh cadence inside the auto-connect loop.
const AUTO_CONNECT_SCAN_REFRESH_SECS: f64 = 30.0;
/// Consecutive failures before a device goes into cooldown.
const MAX_CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_COOLDOWN_SECS: f64 = 60.0;
/// Minimum spacing between attempts for the same device.
const ATTEMPT_SPACING_SECS: f64 = 15.0;

const STATUS_BROADCAST_INTERVAL: Duration = Duration::from_secs(10);
const METRICS_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Emitters are awaited this long on stream stop before being detached.
const EMITTER_JOIN_CAP: Duration = Duration::from_secs(2);

/// Post-acquisition stabilization waits, matching device firmware timing.
const ACQUISITION_SETTLE: Duration = Duration::from_secs(1);
const BATTERY_SETTLE: Duration = Duration::from_millis(500);

/// Commands the hub (or the engine frontend) sends to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorCommand {
  ScanDevices,
  ConnectDevice { address: String },
  DisconnectDevice,
  StartStreaming,
  StopStreaming,
  StartRecording {
    session_name: Option<String>,
    format: RecordingFormat,
  },
  StopRecording,
  CheckBluetoothStatus,
  RegisterDevice { name: String, address: String },
  UnregisterDevice { address: String },
}

/// Internal events from the per-session hardware pump.
enum InternalEvent {
  DeviceDisconnected(String),
}

struct AttemptInfo {
  count: u32,
  last_attempt: f64,
}

/// State held only while a device is connected.
struct ActiveConnection {
  session: Arc<dyn BleSession>,
  pipelines: Arc<SensorPipelines>,
  dsp_cancel: CancellationToken,
  pump_handle: JoinHandle<()>,
  stream_cancel: Option<CancellationToken>,
  emitter_handles: Vec<JoinHandle<()>>,
}

pub struct SessionSupervisor {
  central: Arc<dyn BleCentral>,
  registry: Arc<DeviceRegistry>,
  monitor: Arc<StreamingMonitor>,
  recorder: Arc<DataRecorder>,
  broadcaster: Arc<dyn Broadcaster>,
  command_receiver: mpsc::Receiver<SupervisorCommand>,
  internal_sender: mpsc::Sender<InternalEvent>,
  internal_receiver: mpsc::Receiver<InternalEvent>,
  cancel: CancellationToken,
  status: DeviceStatus,
  connection: Option<ActiveConnection>,
  connection_attempts: HashMap<String, AttemptInfo>,
  last_scan_time: f64,
}

impl SessionSupervisor {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    central: Arc<dyn BleCentral>,
    registry: Arc<DeviceRegistry>,
    monitor: Arc<StreamingMonitor>,
    recorder: Arc<DataRecorder>,
    broadcaster: Arc<dyn Broadcaster>,
    command_receiver: mpsc::Receiver<SupervisorCommand>,
    cancel: CancellationToken,
  ) -> Self {
    let (internal_sender, internal_receiver) = mpsc::channel(16);
    Self {
      central,
      registry,
      monitor,
      recorder,
      broadcaster,
      command_receiver,
      internal_sender,
      internal_receiver,
      cancel,
      status: DeviceStatus::Disconnected,
      connection: None,
      connection_attempts: HashMap::new(),
      last_scan_time: 0.0,
    }
  }

  pub fn device_status(&self) -> DeviceStatus {
    self.status
  }

  fn device_info(&self) -> Option<DeviceInfo> {
    self.connection.as_ref().map(|c| c.session.device_info())
  }

  fn transition(&mut self, next: DeviceStatus) {
    if !self.status.can_transition_to(next) {
      warn!("Illegal device state transition {} -> {}", self.status, next);
    }
    debug!("Device state {} -> {}", self.status, next);
    self.status = next;
  }

  pub async fn run(mut self) {
    info!("Session supervisor started.");
    let mut auto_connect = tokio::time::interval(AUTO_CONNECT_INTERVAL);
    auto_connect.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut status_tick = tokio::time::interval(STATUS_BROADCAST_INTERVAL);
    status_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut metrics_tick = tokio::time::interval(METRICS_BROADCAST_INTERVAL);
    metrics_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = self.cancel.cancelled() => {
          info!("Supervisor cancellation requested, shutting down.");
          break;
        }
        command = self.command_receiver.recv() => {
          match command {
            Some(command) => self.handle_command(command).await,
            None => {
              info!("All command senders dropped, supervisor exiting.");
              break;
            }
          }
        }
        event = self.internal_receiver.recv() => {
          if let Some(InternalEvent::DeviceDisconnected(address)) = event {
            self.handle_unexpected_disconnect(&address).await;
          }
        }
        _ = auto_connect.tick() => {
          self.auto_connect_tick().await;
        }
        _ = status_tick.tick() => {
          self.broadcast_device_status().await;
          self.broadcast_health_update().await;
        }
        _ = metrics_tick.tick() => {
          self.broadcast_monitoring_metrics().await;
          self.broadcast_buffer_status().await;
        }
      }
    }
    self.shutdown().await;
  }

  async fn handle_command(&mut self, command: SupervisorCommand) {
    trace!("Supervisor command: {:?}", command);
    match command {
      SupervisorCommand::ScanDevices => {
        self.scan_and_notify().await;
      }
      SupervisorCommand::ConnectDevice { address } => {
        if let Err(e) = self.connect(&address, false).await {
          error!("Connect to {} failed: {}", address, e);
        }
      }
      SupervisorCommand::DisconnectDevice => {
        self.disconnect_device().await;
      }
      SupervisorCommand::StartStreaming => {
        self.start_streaming().await;
      }
      SupervisorCommand::StopStreaming => {
        self.stop_streaming().await;
      }
      SupervisorCommand::StartRecording {
        session_name,
        format,
      } => {
        match self
          .recorder
          .start_recording(session_name, format, self.device_info())
          .await
        {
          Ok(name) => info!("Recording session {} active.", name),
          Err(e) => {
            error!("Could not start recording: {}", e);
            self
              .broadcaster
              .broadcast_event(
                EventType::Error,
                serde_json::json!({ "error": e.to_string() }),
              )
              .await;
          }
        }
      }
      SupervisorCommand::StopRecording => {
        if let Err(e) = self.stop_recording().await {
          error!("Could not stop recording: {}", e);
        }
      }
      SupervisorCommand::CheckBluetoothStatus => {
        let available = self.central.adapter_available().await;
        self
          .broadcaster
          .broadcast_event(
            EventType::BluetoothStatus,
            serde_json::json!({ "available": available }),
          )
          .await;
      }
      SupervisorCommand::RegisterDevice { name, address } => {
        self.registry.register(RegisteredDevice { name, address });
        self.broadcast_registered_devices().await;
      }
      SupervisorCommand::UnregisterDevice { address } => {
        self.registry.unregister(&address);
        self.broadcast_registered_devices().await;
      }
    }
  }

  async fn scan_and_notify(&mut self) {
    match self.central.scan().await {
      Ok(results) => {
        self.last_scan_time = util::unix_now();
        self
          .broadcaster
          .broadcast_event(
            EventType::ScanResult,
            serde_json::json!({ "devices": results }),
          )
          .await;
      }
      Err(e) => {
        error!("Scan failed: {}", e);
        self
          .broadcaster
          .broadcast_event(
            EventType::Error,
            serde_json::json!({ "error": e.to_string() }),
          )
          .await;
      }
    }
  }

  /// Full connect bring-up: GATT connection, battery monitoring (non-fatal),
  /// data acquisition (fatal), pipelines and DSP workers.
  async fn connect(&mut self, address: &str, use_cached: bool) -> Result<(), ConnectError> {
    if self.connection.is_some() {
      info!("Already connected, ignoring connect request for {}", address);
      return Ok(());
    }
    self.transition(DeviceStatus::Connecting);
    let session = match self.central.connect(address, use_cached).await {
      Ok(session) => session,
      Err(e) => {
        self.transition(DeviceStatus::Error);
        self.transition(DeviceStatus::Disconnected);
        self
          .broadcaster
          .broadcast_event(
            EventType::DeviceConnectionFailed,
            serde_json::json!({ "address": address, "error": e.to_string() }),
          )
          .await;
        return Err(e);
      }
    };

    let pipelines = Arc::new(SensorPipelines::new());

    // Battery first; its failure is logged and tolerated.
    match session.start_battery_monitoring().await {
      Ok(initial) => {
        if let Some(level) = initial {
          pipelines.ingest_battery_reading(level, util::unix_now());
          info!("Initial battery level: {}%", level);
        }
        util::sleep(BATTERY_SETTLE).await;
      }
      Err(e) => warn!("Battery monitoring failed, continuing without it: {}", e),
    }

    // Acquisition failure is fatal for the bring-up.
    if let Err(e) = session.start_acquisition().await {
      error!("Data acquisition bring-up failed: {}", e);
      let _ = session.disconnect().await;
      self.transition(DeviceStatus::Error);
      self.transition(DeviceStatus::Disconnected);
      self
        .broadcaster
        .broadcast_event(
          EventType::DeviceConnectionFailed,
          serde_json::json!({ "address": address, "error": e.to_string() }),
        )
        .await;
      return Err(e);
    }
    util::sleep(ACQUISITION_SETTLE).await;

    let dsp_cancel = CancellationToken::new();
    spawn_dsp_workers(pipelines.clone(), dsp_cancel.clone());
    let pump_handle = spawn_event_pump(
      session.clone(),
      pipelines.clone(),
      self.internal_sender.clone(),
    );

    let info = session.device_info();
    self.connection = Some(ActiveConnection {
      session,
      pipelines,
      dsp_cancel,
      pump_handle,
      stream_cancel: None,
      emitter_handles: Vec::new(),
    });
    self.transition(DeviceStatus::Connected);
    info!("Connected to {} ({})", info.name, info.address);
    self
      .broadcaster
      .broadcast_event(
        EventType::DeviceConnected,
        serde_json::json!({ "address": info.address, "name": info.name }),
      )
      .await;
    Ok(())
  }

  async fn start_streaming(&mut self) {
    let Some(connection) = &mut self.connection else {
      warn!("Cannot start streaming: device not connected.");
      self
        .broadcaster
        .broadcast_event(
          EventType::Error,
          serde_json::json!({ "error": "Cannot start streaming: device not connected" }),
        )
        .await;
      return;
    };
    let already_running = connection
      .stream_cancel
      .as_ref()
      .is_some_and(|token| !token.is_cancelled())
      && connection.emitter_handles.iter().any(|h| !h.is_finished());
    if already_running {
      info!("Streaming already active.");
      return;
    }
    let stream_cancel = CancellationToken::new();
    let context = Arc::new(EmitterContext {
      pipelines: connection.pipelines.clone(),
      broadcaster: self.broadcaster.clone(),
      monitor: self.monitor.clone(),
      recorder: self.recorder.clone(),
      device_id: connection.session.device_info().address,
    });
    connection.emitter_handles = spawn_emitters(context, stream_cancel.clone());
    connection.stream_cancel = Some(stream_cancel);
    info!("Streaming started.");
    self
      .broadcaster
      .broadcast_event(
        EventType::StreamStarted,
        serde_json::json!({ "status": "streaming_started" }),
      )
      .await;
  }

  async fn stop_streaming(&mut self) {
    let Some(connection) = &mut self.connection else {
      return;
    };
    if connection.stream_cancel.is_none() {
      info!("No streaming tasks were active.");
      return;
    }
    if let Some(token) = connection.stream_cancel.take() {
      token.cancel();
    }
    join_with_cap(std::mem::take(&mut connection.emitter_handles)).await;
    self.monitor.reset();
    info!("Streaming stopped.");
    self
      .broadcaster
      .broadcast_event(
        EventType::StreamStopped,
        serde_json::json!({ "status": "streaming_stopped" }),
      )
      .await;
  }

  async fn stop_recording(&mut self) -> Result<SessionManifest, RecordError> {
    let manifest = self.recorder.stop_recording().await?;
    self
      .broadcaster
      .broadcast_event(
        EventType::DeviceInfo,
        serde_json::json!({ "recording_stopped": manifest.session_name }),
      )
      .await;
    Ok(manifest)
  }

  /// User-requested disconnect: orderly teardown through `Disconnecting`.
  async fn disconnect_device(&mut self) {
    if self.connection.is_none() {
      warn!("No device connected to disconnect.");
      return;
    }
    self.transition(DeviceStatus::Disconnecting);
    self.stop_streaming().await;
    if let Some(connection) = &self.connection {
      if let Err(e) = connection.session.stop_acquisition().await {
        warn!("Error stopping acquisition: {}", e);
      }
      if let Err(e) = connection.session.stop_battery_monitoring().await {
        warn!("Error stopping battery monitoring: {}", e);
      }
      if let Err(e) = connection.session.disconnect().await {
        warn!("Error disconnecting device: {}", e);
      }
    }
    self.teardown_connection().await;
    self.transition(DeviceStatus::Disconnected);
    self
      .broadcaster
      .broadcast_event(EventType::DeviceDisconnected, serde_json::json!({}))
      .await;
  }

  /// The radio dropped: cancel emitters, flush the recorder, surface the
  /// event and let the auto-connect loop take over.
  async fn handle_unexpected_disconnect(&mut self, address: &str) {
    warn!("Device {} disconnected unexpectedly.", address);
    if self.connection.is_none() {
      return;
    }
    self.stop_streaming().await;
    if self.recorder.is_recording().await {
      match self.recorder.stop_recording().await {
        Ok(manifest) => info!(
          "Recording session {} closed on disconnect.",
          manifest.session_name
        ),
        Err(e) => error!("Could not close recording session: {}", e),
      }
    }
    self.teardown_connection().await;
    self.transition(DeviceStatus::Disconnected);
    self
      .broadcaster
      .broadcast_event(
        EventType::DeviceDisconnected,
        serde_json::json!({ "address": address, "unexpected": true }),
      )
      .await;
    // Give the auto-connect loop a clean slate for this device.
    self.connection_attempts.remove(address);
  }

  async fn teardown_connection(&mut self) {
    if let Some(connection) = self.connection.take() {
      connection.dsp_cancel.cancel();
      connection.pump_handle.abort();
      connection.pipelines.clear();
    }
    self.monitor.reset();
  }

  /// One pass of the auto-connect loop.
  async fn auto_connect_tick(&mut self) {
    if self.connection.is_some() {
      return;
    }
    let registered = self.registry.registered_devices();
    if registered.is_empty() {
      return;
    }
    let now = util::unix_now();
    if now - self.last_scan_time > AUTO_CONNECT_SCAN_REFRESH_SECS {
      debug!("Auto-connect: refreshing device cache via scan.");
      if let Err(e) = self.central.scan().await {
        warn!("Auto-connect scan failed: {}", e);
      } else {
        self.last_scan_time = now;
      }
    }
    let scanned = self.central.cached_scan_results();

    for device in registered {
      let attempt = self
        .connection_attempts
        .entry(device.address.clone())
        .or_insert(AttemptInfo {
          count: 0,
          last_attempt: 0.0,
        });
      if attempt.count >= MAX_CONNECT_ATTEMPTS {
        if now - attempt.last_attempt < CONNECT_COOLDOWN_SECS {
          continue;
        }
        attempt.count = 0;
      }
      if now - attempt.last_attempt < ATTEMPT_SPACING_SECS {
        continue;
      }
      // Only the registered name may auto-connect; a scanned name match can
      // re-bind the stored address in place.
      let target = self.registry.resolve_address(&device, &scanned);
      attempt.last_attempt = now;
      attempt.count += 1;
      info!(
        "Auto-connect attempt {}/{} for {} at {}",
        attempt.count, MAX_CONNECT_ATTEMPTS, device.name, target
      );
      match self.connect(&target, true).await {
        Ok(()) => {
          self
            .connection_attempts
            .get_mut(&device.address)
            .expect("Entry just used")
            .count = 0;
          break;
        }
        Err(e) => {
          warn!("Auto-connect to {} failed: {}", target, e);
        }
      }
    }
  }

  async fn broadcast_device_status(&self) {
    if self.broadcaster.client_count() == 0 {
      return;
    }
    let connected = self.status == DeviceStatus::Connected;
    let battery = self
      .connection
      .as_ref()
      .and_then(|c| c.pipelines.battery_level());
    let status = self.monitor.streaming_status();
    self
      .broadcaster
      .broadcast_event(
        EventType::DeviceInfo,
        serde_json::json!({
          "connected": connected,
          "device_info": self.device_info(),
          "is_streaming": status.is_active,
          "registered_devices": self.registry.registered_devices(),
          "clients_connected": self.broadcaster.client_count(),
          "battery": battery,
        }),
      )
      .await;
  }

  async fn broadcast_registered_devices(&self) {
    self
      .broadcaster
      .broadcast_event(
        EventType::RegisteredDevices,
        serde_json::json!({ "devices": self.registry.registered_devices() }),
      )
      .await;
  }

  /// Raw-buffer counters for `buffer_status` subscribers, sent on the
  /// metrics cadence while a device is connected.
  async fn broadcast_buffer_status(&self) {
    let Some(connection) = &self.connection else {
      return;
    };
    if self.broadcaster.client_count() == 0 {
      return;
    }
    let stats = connection.pipelines.buffer_stats();
    let data = serde_json::to_value(
      stats
        .iter()
        .map(|(sensor, stats)| (sensor.to_string(), *stats))
        .collect::<HashMap<String, crate::buffer::BufferStats>>(),
    )
    .expect("Buffer stats always serialize");
    self
      .broadcaster
      .broadcast(
        lxband_core::message::Channel::BufferStatus,
        lxband_core::message::ServerFrame::BufferStatus {
          timestamp: util::unix_now(),
          data,
        },
      )
      .await;
  }

  /// Aggregate flow snapshot for `health_updates` subscribers.
  async fn broadcast_health_update(&self) {
    if self.broadcaster.client_count() == 0 {
      return;
    }
    let status = self.monitor.streaming_status();
    let data = serde_json::to_value(&status).expect("Snapshot always serializes");
    self
      .broadcaster
      .broadcast(
        lxband_core::message::Channel::HealthUpdates,
        lxband_core::message::ServerFrame::HealthUpdates {
          timestamp: util::unix_now(),
          data,
        },
      )
      .await;
  }

  async fn broadcast_monitoring_metrics(&self) {
    if self.broadcaster.client_count() == 0 {
      return;
    }
    let metrics = self.build_monitoring_metrics();
    self
      .broadcaster
      .broadcast_priority(
        lxband_core::message::Channel::MonitoringMetrics,
        lxband_core::message::ServerFrame::MonitoringMetrics(metrics),
      )
      .await;
  }

  fn build_monitoring_metrics(&self) -> MonitoringMetrics {
    let status = self.monitor.streaming_status();
    let connected = self.status == DeviceStatus::Connected;
    let rate = |sensor| {
      status
        .sensor_details
        .get(&sensor)
        .map(|d| d.sampling_rate)
        .unwrap_or(0.0)
    };
    let streaming_status = if status.is_active {
      StreamingStatus::Running
    } else {
      StreamingStatus::Stopped
    };
    let streaming_reason = if !connected {
      StreamingReason::DeviceNotConnected
    } else if status.is_active {
      StreamingReason::Active
    } else {
      StreamingReason::ManuallyStopped
    };
    MonitoringMetrics {
      timestamp: util::unix_now(),
      eeg_sampling_rate: rate(lxband_core::SensorType::Eeg),
      ppg_sampling_rate: rate(lxband_core::SensorType::Ppg),
      acc_sampling_rate: rate(lxband_core::SensorType::Acc),
      bat_sampling_rate: rate(lxband_core::SensorType::Bat),
      battery_level: self
        .connection
        .as_ref()
        .and_then(|c| c.pipelines.battery_level())
        .unwrap_or(0),
      streaming_status,
      device_connected: connected,
      streaming_reason,
      data_flow_health: status.data_flow_health,
      active_sensors: status.active_sensors,
      clients_connected: self.broadcaster.client_count(),
    }
  }

  async fn shutdown(&mut self) {
    info!("Supervisor shutting down: stopping streams and closing session.");
    self.stop_streaming().await;
    if self.recorder.is_recording().await {
      let _ = self.recorder.stop_recording().await;
    }
    if let Some(connection) = &self.connection {
      let _ = connection.session.stop_acquisition().await;
      let _ = connection.session.disconnect().await;
    }
    self.teardown_connection().await;
    if self.status != DeviceStatus::Disconnected {
      self.status = DeviceStatus::Disconnected;
    }
  }
}

/// Forward hardware events into the pipelines. Runs until the session's
/// event stream closes; a disconnect event is relayed to the supervisor.
fn spawn_event_pump(
  session: Arc<dyn BleSession>,
  pipelines: Arc<SensorPipelines>,
  internal_sender: mpsc::Sender<InternalEvent>,
) -> JoinHandle<()> {
  let mut events = session.event_stream();
  tokio::spawn(async move {
    loop {
      match events.recv().await {
        Ok(HardwareEvent::Notification { sensor, data }) => {
          pipelines.ingest_packet(sensor, &data, util::unix_now());
        }
        Ok(HardwareEvent::Disconnected(address)) => {
          if internal_sender
            .send(InternalEvent::DeviceDisconnected(address))
            .await
            .is_err()
          {
            error!("Supervisor gone, dropping disconnect event.");
          }
          break;
        }
        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
          warn!("Hardware event pump lagged, {} packets dropped.", skipped);
        }
        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
          debug!("Hardware event stream closed, pump exiting.");
          break;
        }
      }
    }
  })
}

/// Await emitter handles with a cap, detaching any that overrun it.
async fn join_with_cap(handles: Vec<JoinHandle<()>>) {
  for handle in handles {
    if tokio::time::timeout(EMITTER_JOIN_CAP, handle).await.is_err() {
      warn!("Emitter did not exit within {:?}, detaching.", EMITTER_JOIN_CAP);
    }
  }
}
