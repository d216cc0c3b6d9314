// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Scanning and connection establishment over btleplug.
//!
//! Scan results are cached for 30 s so the connect that usually follows a
//! scan can resolve its peripheral without another radio sweep. Windows gets
//! longer scan and connect timeouts; its stack needs them.

use crate::session::BtleplugSession;
use async_trait::async_trait;
use btleplug::{
  api::{Central, Manager as _, Peripheral, ScanFilter},
  platform::{Adapter, Manager, PeripheralId},
};
use lxband_core::errors::ConnectError;
use lxband_server::device::{
  decoder::{
    ACCELEROMETER_CHAR_UUID,
    DEVICE_NAME_PREFIX,
    EEG_NOTIFY_CHAR_UUID,
    PPG_CHAR_UUID,
  },
  hardware::{BleCentral, BleSession, ScannedDevice},
};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

/// Scan cache freshness window.
const SCAN_CACHE_DURATION: Duration = Duration::from_secs(30);
/// Post-discovery stabilization wait before the session is usable.
const SERVICE_SETTLE: Duration = Duration::from_secs(2);

fn scan_timeout() -> Duration {
  if cfg!(target_os = "windows") {
    Duration::from_secs(12)
  } else {
    Duration::from_secs(8)
  }
}

fn connect_timeout() -> Duration {
  if cfg!(target_os = "windows") {
    Duration::from_secs(25)
  } else {
    Duration::from_secs(15)
  }
}

struct CachedScan {
  taken_at: Instant,
  devices: Vec<(ScannedDevice, PeripheralId)>,
}

pub struct BtleplugCentral {
  adapter: Adapter,
  cache: Mutex<Option<CachedScan>>,
}

impl BtleplugCentral {
  /// Grab the first available adapter.
  pub async fn new() -> Result<Self, ConnectError> {
    let manager = Manager::new()
      .await
      .map_err(|e| ConnectError::AdapterUnavailable(format!("{e:?}")))?;
    let adapter = manager
      .adapters()
      .await
      .map_err(|e| ConnectError::AdapterUnavailable(format!("{e:?}")))?
      .into_iter()
      .next()
      .ok_or_else(|| ConnectError::AdapterUnavailable("no Bluetooth LE adapter found".to_owned()))?;
    info!("Bluetooth LE adapter found.");
    Ok(Self {
      adapter,
      cache: Mutex::new(None),
    })
  }

  async fn resolve_peripheral(
    &self,
    address: &str,
    use_cached: bool,
  ) -> Result<PeripheralId, ConnectError> {
    if use_cached {
      let cache = self.cache.lock().expect("Cache lock poisoned");
      if let Some(cached) = cache.as_ref() {
        if cached.taken_at.elapsed() < SCAN_CACHE_DURATION {
          if let Some((device, id)) = cached
            .devices
            .iter()
            .find(|(device, _)| device.address == address)
          {
            debug!("Using cached device {} ({})", device.name, device.address);
            return Ok(id.clone());
          }
        }
      }
    }
    // Cache miss: one fresh sweep, then look again.
    self.scan().await?;
    let cache = self.cache.lock().expect("Cache lock poisoned");
    cache
      .as_ref()
      .and_then(|cached| {
        cached
          .devices
          .iter()
          .find(|(device, _)| device.address == address)
          .map(|(_, id)| id.clone())
      })
      .ok_or_else(|| ConnectError::DeviceNotFound(address.to_owned()))
  }
}

#[async_trait]
impl BleCentral for BtleplugCentral {
  async fn scan(&self) -> Result<Vec<ScannedDevice>, ConnectError> {
    let timeout = scan_timeout();
    info!("Scanning for Link Band devices ({:?} timeout)...", timeout);
    self
      .adapter
      .start_scan(ScanFilter::default())
      .await
      .map_err(|e| ConnectError::ScanFailed(format!("{e:?}")))?;
    sleep(timeout).await;
    if let Err(e) = self.adapter.stop_scan().await {
      warn!("Stop scanning request failed: {e:?}");
    }

    let peripherals = self
      .adapter
      .peripherals()
      .await
      .map_err(|e| ConnectError::ScanFailed(format!("{e:?}")))?;
    let mut devices = Vec::new();
    for peripheral in peripherals {
      let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        _ => continue,
      };
      let Some(name) = properties.local_name else {
        continue;
      };
      if !name.starts_with(DEVICE_NAME_PREFIX) {
        continue;
      }
      devices.push((
        ScannedDevice {
          name,
          address: format!("{:?}", peripheral.id()),
        },
        peripheral.id(),
      ));
    }
    info!("Scan found {} Link Band devices.", devices.len());
    let results: Vec<ScannedDevice> = devices.iter().map(|(d, _)| d.clone()).collect();
    *self.cache.lock().expect("Cache lock poisoned") = Some(CachedScan {
      taken_at: Instant::now(),
      devices,
    });
    Ok(results)
  }

  fn cached_scan_results(&self) -> Vec<ScannedDevice> {
    let cache = self.cache.lock().expect("Cache lock poisoned");
    match cache.as_ref() {
      Some(cached) if cached.taken_at.elapsed() < SCAN_CACHE_DURATION => {
        cached.devices.iter().map(|(d, _)| d.clone()).collect()
      }
      _ => Vec::new(),
    }
  }

  async fn connect(
    &self,
    address: &str,
    use_cached: bool,
  ) -> Result<Arc<dyn BleSession>, ConnectError> {
    let peripheral_id = self.resolve_peripheral(address, use_cached).await?;
    let peripheral = self
      .adapter
      .peripheral(&peripheral_id)
      .await
      .map_err(|_| ConnectError::DeviceNotFound(address.to_owned()))?;

    info!("Connecting to {}...", address);
    let connected = peripheral
      .is_connected()
      .await
      .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))?;
    if !connected {
      timeout(connect_timeout(), peripheral.connect())
        .await
        .map_err(|_| ConnectError::ConnectTimeout(address.to_owned()))?
        .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))?;
    }

    if let Err(e) = peripheral.discover_services().await {
      error!("Service discovery failed: {e:?}");
      let _ = peripheral.disconnect().await;
      return Err(ConnectError::ServiceDiscoveryFailed(
        address.to_owned(),
        format!("{e:?}"),
      ));
    }

    // The headband is unusable without all three sensor characteristics.
    let characteristics = peripheral.characteristics();
    for required in [EEG_NOTIFY_CHAR_UUID, PPG_CHAR_UUID, ACCELEROMETER_CHAR_UUID] {
      if !characteristics.iter().any(|c| c.uuid == required) {
        let _ = peripheral.disconnect().await;
        return Err(ConnectError::MissingCharacteristic(required.to_string()));
      }
    }
    debug!("All required characteristics found, waiting for services to stabilize.");
    sleep(SERVICE_SETTLE).await;

    let name = peripheral
      .properties()
      .await
      .ok()
      .flatten()
      .and_then(|p| p.local_name)
      .unwrap_or_else(|| address.to_owned());
    let session = BtleplugSession::create(
      peripheral,
      self
        .adapter
        .events()
        .await
        .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))?,
      name,
      address.to_owned(),
    )
    .await?;
    Ok(Arc::new(session))
  }

  async fn adapter_available(&self) -> bool {
    self.adapter.adapter_info().await.is_ok()
  }
}
