// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Scripted hardware doubles for driving the streaming engine without a
//! radio.

use async_trait::async_trait;
use lxband_core::{SensorType, errors::ConnectError};
use lxband_server::device::{
  DeviceInfo,
  hardware::{BleCentral, BleSession, HardwareEvent, ScannedDevice},
};
use std::collections::HashMap;
use std::sync::{
  Arc,
  Mutex,
  atomic::{AtomicBool, Ordering},
};
use tokio::sync::broadcast;

pub struct MockSession {
  info: DeviceInfo,
  events: broadcast::Sender<HardwareEvent>,
  connected: AtomicBool,
  acquiring: AtomicBool,
  battery_level: Option<u8>,
  fail_acquisition: AtomicBool,
}

impl MockSession {
  pub fn new(name: &str, address: &str, battery_level: Option<u8>) -> Arc<Self> {
    let (events, _) = broadcast::channel(1024);
    Arc::new(Self {
      info: DeviceInfo {
        name: name.to_owned(),
        address: address.to_owned(),
      },
      events,
      connected: AtomicBool::new(true),
      acquiring: AtomicBool::new(false),
      battery_level,
      fail_acquisition: AtomicBool::new(false),
    })
  }

  pub fn set_fail_acquisition(&self, fail: bool) {
    self.fail_acquisition.store(fail, Ordering::SeqCst);
  }

  /// Push a notification packet as if the device sent it.
  pub fn feed_packet(&self, sensor: SensorType, data: Vec<u8>) {
    let _ = self.events.send(HardwareEvent::Notification { sensor, data });
  }

  /// Simulate the device dropping the connection.
  pub fn trigger_disconnect(&self) {
    self.connected.store(false, Ordering::SeqCst);
    let _ = self
      .events
      .send(HardwareEvent::Disconnected(self.info.address.clone()));
  }
}

#[async_trait]
impl BleSession for MockSession {
  fn device_info(&self) -> DeviceInfo {
    self.info.clone()
  }

  fn is_connected(&self) -> bool {
    self.connected.load(Ordering::SeqCst)
  }

  fn event_stream(&self) -> broadcast::Receiver<HardwareEvent> {
    self.events.subscribe()
  }

  async fn start_acquisition(&self) -> Result<(), ConnectError> {
    if self.fail_acquisition.load(Ordering::SeqCst) {
      return Err(ConnectError::DeviceConnectionError(
        "notification enable failed".to_owned(),
      ));
    }
    self.acquiring.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn stop_acquisition(&self) -> Result<(), ConnectError> {
    self.acquiring.store(false, Ordering::SeqCst);
    Ok(())
  }

  async fn start_battery_monitoring(&self) -> Result<Option<u8>, ConnectError> {
    Ok(self.battery_level)
  }

  async fn stop_battery_monitoring(&self) -> Result<(), ConnectError> {
    Ok(())
  }

  async fn disconnect(&self) -> Result<(), ConnectError> {
    self.connected.store(false, Ordering::SeqCst);
    Ok(())
  }
}

#[derive(Default)]
pub struct MockCentral {
  advertisements: Mutex<Vec<ScannedDevice>>,
  sessions: Mutex<HashMap<String, Arc<MockSession>>>,
}

impl MockCentral {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn advertise(&self, name: &str, address: &str) {
    self
      .advertisements
      .lock()
      .expect("Lock poisoned")
      .push(ScannedDevice {
        name: name.to_owned(),
        address: address.to_owned(),
      });
  }

  /// Arrange for a connect to `address` to yield this session.
  pub fn install_session(&self, address: &str, session: Arc<MockSession>) {
    self
      .sessions
      .lock()
      .expect("Lock poisoned")
      .insert(address.to_owned(), session);
  }
}

#[async_trait]
impl BleCentral for MockCentral {
  async fn scan(&self) -> Result<Vec<ScannedDevice>, ConnectError> {
    Ok(self.advertisements.lock().expect("Lock poisoned").clone())
  }

  fn cached_scan_results(&self) -> Vec<ScannedDevice> {
    self.advertisements.lock().expect("Lock poisoned").clone()
  }

  async fn connect(
    &self,
    address: &str,
    _use_cached: bool,
  ) -> Result<Arc<dyn BleSession>, ConnectError> {
    let sessions = self.sessions.lock().expect("Lock poisoned");
    match sessions.get(address) {
      Some(session) => {
        session.connected.store(true, Ordering::SeqCst);
        Ok(session.clone() as Arc<dyn BleSession>)
      }
      None => Err(ConnectError::DeviceNotFound(address.to_owned())),
    }
  }

  async fn adapter_available(&self) -> bool {
    true
  }
}

/// An EEG packet with `records` zeroed samples at the given device tick.
pub fn eeg_packet(tick: u32, records: usize) -> Vec<u8> {
  let mut packet = tick.to_le_bytes().to_vec();
  for _ in 0..records {
    packet.extend_from_slice(&[0x00, 0, 0, 1, 0, 0, 1]);
  }
  packet
}
