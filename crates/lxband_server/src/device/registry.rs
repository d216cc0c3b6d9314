// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Persisted registry of known headbands.
//!
//! Only registered devices are eligible for auto-connect. Addresses are not
//! stable across platforms (macOS hands out per-host UUIDs where Windows and
//! Linux see the MAC), so a scanned device whose *name* matches a registered
//! entry re-binds that entry's address in place.

use crate::device::hardware::ScannedDevice;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDevice {
  pub name: String,
  pub address: String,
}

pub struct DeviceRegistry {
  devices: Mutex<Vec<RegisteredDevice>>,
  path: Option<PathBuf>,
}

impl DeviceRegistry {
  /// In-memory registry, used by tests and the ephemeral dev mode.
  pub fn new_in_memory() -> Self {
    Self {
      devices: Mutex::new(Vec::new()),
      path: None,
    }
  }

  /// Registry backed by a JSON file; loads existing entries if present.
  pub fn load(path: PathBuf) -> Self {
    let devices = match std::fs::read_to_string(&path) {
      Ok(contents) => match serde_json::from_str(&contents) {
        Ok(devices) => devices,
        Err(e) => {
          warn!("Device registry at {:?} unreadable, starting empty: {}", path, e);
          Vec::new()
        }
      },
      Err(_) => Vec::new(),
    };
    Self {
      devices: Mutex::new(devices),
      path: Some(path),
    }
  }

  fn persist(&self, devices: &[RegisteredDevice]) {
    if let Some(path) = &self.path {
      if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
      }
      match serde_json::to_string_pretty(devices) {
        Ok(contents) => {
          if let Err(e) = std::fs::write(path, contents) {
            error!("Could not persist device registry to {:?}: {}", path, e);
          }
        }
        Err(e) => error!("Could not serialize device registry: {}", e),
      }
    }
  }

  /// Register a device. Returns false if the address is already registered.
  pub fn register(&self, device: RegisteredDevice) -> bool {
    let mut devices = self.devices.lock().expect("Registry lock poisoned");
    if devices.iter().any(|d| d.address == device.address) {
      return false;
    }
    info!("Registering device {} ({})", device.name, device.address);
    devices.push(device);
    self.persist(&devices);
    true
  }

  /// Unregister by address. Returns false if the address was unknown.
  pub fn unregister(&self, address: &str) -> bool {
    let mut devices = self.devices.lock().expect("Registry lock poisoned");
    let before = devices.len();
    devices.retain(|d| d.address != address);
    let removed = devices.len() != before;
    if removed {
      self.persist(&devices);
    }
    removed
  }

  pub fn registered_devices(&self) -> Vec<RegisteredDevice> {
    self.devices.lock().expect("Registry lock poisoned").clone()
  }

  pub fn is_registered(&self, address: &str) -> bool {
    self
      .devices
      .lock()
      .expect("Registry lock poisoned")
      .iter()
      .any(|d| d.address == address)
  }

  /// Re-bind a registered entry to a new address, keyed by exact name match.
  pub fn update_device_address(&self, old_address: &str, new_address: &str, name: &str) {
    let mut devices = self.devices.lock().expect("Registry lock poisoned");
    let mut changed = false;
    for device in devices.iter_mut() {
      if device.address == old_address && device.name == name {
        info!(
          "Cross-platform address update for {}: {} -> {}",
          name, old_address, new_address
        );
        device.address = new_address.to_owned();
        changed = true;
      }
    }
    if changed {
      self.persist(&devices);
    }
  }

  /// Resolve the address to use for a registered device given the current
  /// scan results: an exact name match wins and re-binds the registry entry
  /// when the platform reports a different address.
  pub fn resolve_address(&self, device: &RegisteredDevice, scanned: &[ScannedDevice]) -> String {
    for result in scanned {
      if result.name == device.name {
        if result.address != device.address {
          self.update_device_address(&device.address, &result.address, &device.name);
        }
        return result.address.clone();
      }
    }
    device.address.clone()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_register_is_idempotent_per_address() {
    let registry = DeviceRegistry::new_in_memory();
    let device = RegisteredDevice {
      name: "LXB-01".to_owned(),
      address: "AA:BB:CC:DD:EE:01".to_owned(),
    };
    assert!(registry.register(device.clone()));
    assert!(!registry.register(device));
    assert_eq!(registry.registered_devices().len(), 1);
  }

  #[test]
  fn test_cross_platform_rebind_by_name() {
    let registry = DeviceRegistry::new_in_memory();
    let device = RegisteredDevice {
      name: "LXB-01".to_owned(),
      address: "AA:BB:CC:DD:EE:01".to_owned(),
    };
    registry.register(device.clone());

    let scanned = vec![ScannedDevice {
      name: "LXB-01".to_owned(),
      address: "02:11:22:33:44:55".to_owned(),
    }];
    let resolved = registry.resolve_address(&device, &scanned);
    assert_eq!(resolved, "02:11:22:33:44:55");
    assert_eq!(
      registry.registered_devices()[0].address,
      "02:11:22:33:44:55"
    );
  }

  #[test]
  fn test_resolve_keeps_address_when_name_absent() {
    let registry = DeviceRegistry::new_in_memory();
    let device = RegisteredDevice {
      name: "LXB-01".to_owned(),
      address: "AA:BB:CC:DD:EE:01".to_owned(),
    };
    registry.register(device.clone());
    let scanned = vec![ScannedDevice {
      name: "LXB-02".to_owned(),
      address: "02:11:22:33:44:55".to_owned(),
    }];
    assert_eq!(registry.resolve_address(&device, &scanned), device.address);
  }

  #[test]
  fn test_persisted_roundtrip() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let path = dir.path().join("registered_devices.json");
    {
      let registry = DeviceRegistry::load(path.clone());
      registry.register(RegisteredDevice {
        name: "LXB-07".to_owned(),
        address: "AA:00:00:00:00:07".to_owned(),
      });
    }
    let reloaded = DeviceRegistry::load(path);
    assert!(reloaded.is_registered("AA:00:00:00:00:07"));
  }
}
