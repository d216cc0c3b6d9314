// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Hardware abstraction for the BLE headband.
//!
//! The session supervisor only ever talks to these traits; the btleplug
//! implementation lives in its own crate, and tests drive the supervisor
//! with scripted sessions. Notification callbacks must return quickly: the
//! event stream exists to push raw packets into buffers, nothing more.

use crate::device::DeviceInfo;
use async_trait::async_trait;
use lxband_core::{SensorType, errors::ConnectError};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScannedDevice {
  pub name: String,
  pub address: String,
}

/// Events a live session pushes while connected.
#[derive(Debug, Clone)]
pub enum HardwareEvent {
  /// A notification packet arrived on a sensor characteristic.
  Notification { sensor: SensorType, data: Vec<u8> },
  /// The device dropped the connection; the address identifies which one.
  Disconnected(String),
}

/// A Bluetooth central: scanning plus connection establishment. Scan results
/// are cached inside the implementation for 30 s so a connect that follows a
/// scan does not rescan.
#[async_trait]
pub trait BleCentral: Send + Sync {
  /// Scan for Link Band advertisements and refresh the scan cache.
  async fn scan(&self) -> Result<Vec<ScannedDevice>, ConnectError>;

  /// Results of the last scan if the cache is still fresh, empty otherwise.
  fn cached_scan_results(&self) -> Vec<ScannedDevice>;

  /// Resolve and connect to a device. With `use_cached` the implementation
  /// tries the scan cache before falling back to a directed discovery.
  /// Implementations perform service discovery, verify the EEG/PPG/ACC
  /// characteristics exist and wait for services to stabilize before
  /// returning; notification bring-up is the caller's job via
  /// [`BleSession::start_acquisition`] and battery bring-up is separate
  /// because its failure is non-fatal.
  async fn connect(
    &self,
    address: &str,
    use_cached: bool,
  ) -> Result<Arc<dyn BleSession>, ConnectError>;

  /// Whether a Bluetooth adapter is present and powered.
  async fn adapter_available(&self) -> bool;
}

/// One live GATT connection to a headband.
#[async_trait]
pub trait BleSession: Send + Sync {
  fn device_info(&self) -> DeviceInfo;

  fn is_connected(&self) -> bool;

  /// Subscribe to hardware events. Each receiver sees every event from
  /// subscription time onward.
  fn event_stream(&self) -> broadcast::Receiver<HardwareEvent>;

  /// Enable EEG/PPG/ACC notifications (in that order).
  async fn start_acquisition(&self) -> Result<(), ConnectError>;

  /// Disable sensor notifications.
  async fn stop_acquisition(&self) -> Result<(), ConnectError>;

  /// Read the current battery level and subscribe to battery notifications.
  /// Returns the initial level when the read succeeds.
  async fn start_battery_monitoring(&self) -> Result<Option<u8>, ConnectError>;

  async fn stop_battery_monitoring(&self) -> Result<(), ConnectError>;

  async fn disconnect(&self) -> Result<(), ConnectError>;
}
