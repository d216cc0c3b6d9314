// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! One live GATT connection.
//!
//! A background loop turns btleplug value notifications into
//! [`HardwareEvent::Notification`]s keyed by characteristic UUID, and
//! watches the adapter event stream for this peripheral's disconnect. The
//! loop only pushes to a broadcast channel; all decoding happens downstream
//! in the pipelines.

use async_trait::async_trait;
use btleplug::api::{CentralEvent, Characteristic, Peripheral};
use btleplug::platform;
use futures::{Stream, StreamExt, future::FutureExt};
use lxband_core::{SensorType, errors::ConnectError, util::async_manager};
use lxband_server::device::{
  DeviceInfo,
  decoder::{
    ACCELEROMETER_CHAR_UUID,
    BATTERY_CHAR_UUID,
    EEG_NOTIFY_CHAR_UUID,
    PPG_CHAR_UUID,
  },
  hardware::{BleSession, HardwareEvent},
};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::select;
use tokio::sync::broadcast;
use uuid::Uuid;

fn sensor_for_uuid(uuid: Uuid) -> Option<SensorType> {
  if uuid == EEG_NOTIFY_CHAR_UUID {
    Some(SensorType::Eeg)
  } else if uuid == PPG_CHAR_UUID {
    Some(SensorType::Ppg)
  } else if uuid == ACCELEROMETER_CHAR_UUID {
    Some(SensorType::Acc)
  } else if uuid == BATTERY_CHAR_UUID {
    Some(SensorType::Bat)
  } else {
    None
  }
}

pub struct BtleplugSession {
  peripheral: platform::Peripheral,
  info: DeviceInfo,
  events: broadcast::Sender<HardwareEvent>,
  acquiring: AtomicBool,
  battery_running: AtomicBool,
}

impl BtleplugSession {
  pub(crate) async fn create(
    peripheral: platform::Peripheral,
    mut adapter_events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    name: String,
    address: String,
  ) -> Result<Self, ConnectError> {
    let (events, _) = broadcast::channel(1024);
    let mut notifications = peripheral
      .notifications()
      .await
      .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))?;

    let events_clone = events.clone();
    let peripheral_id = peripheral.id();
    let name_clone = name.clone();
    let address_clone = address.clone();
    async_manager::spawn(async move {
      loop {
        select! {
          notification = notifications.next().fuse() => {
            let Some(notification) = notification else {
              debug!("Notification stream ended for {}", name_clone);
              break;
            };
            let Some(sensor) = sensor_for_uuid(notification.uuid) else {
              trace!("Notification on unmapped characteristic {}", notification.uuid);
              continue;
            };
            if events_clone.receiver_count() == 0 {
              continue;
            }
            if events_clone
              .send(HardwareEvent::Notification {
                sensor,
                data: notification.value,
              })
              .is_err()
            {
              debug!("No hardware event receivers left, exiting loop.");
              break;
            }
          }
          adapter_event = adapter_events.next().fuse() => {
            if let Some(CentralEvent::DeviceDisconnected(id)) = adapter_event {
              if id == peripheral_id {
                info!("Device {} disconnected.", name_clone);
                let _ = events_clone.send(HardwareEvent::Disconnected(address_clone.clone()));
                break;
              }
            }
          }
        }
      }
      debug!("Exiting btleplug notification/event loop for {}", name_clone);
    });

    Ok(Self {
      peripheral,
      info: DeviceInfo { name, address },
      events,
      acquiring: AtomicBool::new(false),
      battery_running: AtomicBool::new(false),
    })
  }

  fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, ConnectError> {
    self
      .peripheral
      .characteristics()
      .into_iter()
      .find(|c| c.uuid == uuid)
      .ok_or_else(|| ConnectError::MissingCharacteristic(uuid.to_string()))
  }
}

#[async_trait]
impl BleSession for BtleplugSession {
  fn device_info(&self) -> DeviceInfo {
    self.info.clone()
  }

  fn is_connected(&self) -> bool {
    // Peripheral::is_connected is async in btleplug; the supervisor treats
    // the disconnect event as authoritative and this as a hint.
    self.acquiring.load(Ordering::SeqCst) || self.battery_running.load(Ordering::SeqCst)
  }

  fn event_stream(&self) -> broadcast::Receiver<HardwareEvent> {
    self.events.subscribe()
  }

  async fn start_acquisition(&self) -> Result<(), ConnectError> {
    if self.acquiring.load(Ordering::SeqCst) {
      debug!("Data acquisition already started.");
      return Ok(());
    }
    // Bring-up order matters to the firmware: EEG, then PPG, then ACC.
    for (label, uuid) in [
      ("EEG", EEG_NOTIFY_CHAR_UUID),
      ("PPG", PPG_CHAR_UUID),
      ("ACC", ACCELEROMETER_CHAR_UUID),
    ] {
      info!("Starting notify for {} ({})...", label, uuid);
      let characteristic = self.characteristic(uuid)?;
      if let Err(e) = self.peripheral.subscribe(&characteristic).await {
        error!("Error starting {} notifications: {e:?}", label);
        // Roll back whatever was partially enabled.
        let _ = self.stop_acquisition().await;
        return Err(ConnectError::DeviceConnectionError(format!("{e:?}")));
      }
    }
    self.acquiring.store(true, Ordering::SeqCst);
    info!("Data acquisition started successfully.");
    Ok(())
  }

  async fn stop_acquisition(&self) -> Result<(), ConnectError> {
    let mut failed = false;
    for uuid in [EEG_NOTIFY_CHAR_UUID, PPG_CHAR_UUID, ACCELEROMETER_CHAR_UUID] {
      match self.characteristic(uuid) {
        Ok(characteristic) => {
          if let Err(e) = self.peripheral.unsubscribe(&characteristic).await {
            warn!("Error stopping notifications on {}: {e:?}", uuid);
            failed = true;
          }
        }
        Err(_) => failed = true,
      }
    }
    self.acquiring.store(false, Ordering::SeqCst);
    if failed {
      warn!("Data acquisition stop completed with some errors.");
    }
    Ok(())
  }

  async fn start_battery_monitoring(&self) -> Result<Option<u8>, ConnectError> {
    if self.battery_running.load(Ordering::SeqCst) {
      return Ok(None);
    }
    let characteristic = self.characteristic(BATTERY_CHAR_UUID)?;
    let initial = match self.peripheral.read(&characteristic).await {
      Ok(data) => data.first().copied(),
      Err(e) => {
        // A failed initial read is not fatal; notifications may still work.
        warn!("Could not read initial battery level: {e:?}");
        None
      }
    };
    self
      .peripheral
      .subscribe(&characteristic)
      .await
      .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))?;
    self.battery_running.store(true, Ordering::SeqCst);
    Ok(initial)
  }

  async fn stop_battery_monitoring(&self) -> Result<(), ConnectError> {
    if !self.battery_running.load(Ordering::SeqCst) {
      return Ok(());
    }
    if let Ok(characteristic) = self.characteristic(BATTERY_CHAR_UUID) {
      if let Err(e) = self.peripheral.unsubscribe(&characteristic).await {
        warn!("Error stopping battery notifications: {e:?}");
      }
    }
    self.battery_running.store(false, Ordering::SeqCst);
    Ok(())
  }

  async fn disconnect(&self) -> Result<(), ConnectError> {
    self.acquiring.store(false, Ordering::SeqCst);
    self.battery_running.store(false, Ordering::SeqCst);
    self
      .peripheral
      .disconnect()
      .await
      .map_err(|e| ConnectError::DeviceConnectionError(format!("{e:?}")))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_uuid_to_sensor_mapping() {
    assert_eq!(sensor_for_uuid(EEG_NOTIFY_CHAR_UUID), Some(SensorType::Eeg));
    assert_eq!(sensor_for_uuid(PPG_CHAR_UUID), Some(SensorType::Ppg));
    assert_eq!(
      sensor_for_uuid(ACCELEROMETER_CHAR_UUID),
      Some(SensorType::Acc)
    );
    assert_eq!(sensor_for_uuid(BATTERY_CHAR_UUID), Some(SensorType::Bat));
    assert_eq!(sensor_for_uuid(Uuid::nil()), None);
  }
}
