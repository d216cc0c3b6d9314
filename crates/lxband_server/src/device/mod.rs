// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Device-side types: connection state machine, decoders, hardware traits
//! and the persisted device registry.

pub mod decoder;
pub mod hardware;
pub mod registry;

use serde::{Deserialize, Serialize};

/// Connection state machine. Legal transitions:
/// `Disconnected -> Connecting` on a connect request,
/// `Connecting -> Connected` once notifications are enabled,
/// `Connecting -> Error -> Disconnected` on any bring-up failure,
/// `Connected -> Disconnecting` on user stop,
/// `Connected -> Disconnected` on unexpected loss.
/// `Error` is reachable from any state.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
  Disconnected,
  Connecting,
  Connected,
  Disconnecting,
  Error,
}

impl DeviceStatus {
  /// Whether `self -> next` is a legal transition.
  pub fn can_transition_to(&self, next: DeviceStatus) -> bool {
    use DeviceStatus::*;
    if next == Error {
      return true;
    }
    matches!(
      (self, next),
      (Disconnected, Connecting)
        | (Connecting, Connected)
        | (Connecting, Disconnected)
        | (Connected, Disconnecting)
        | (Connected, Disconnected)
        | (Disconnecting, Disconnected)
        | (Error, Disconnected)
    )
  }
}

/// Identity of a connected headband, surfaced in events and used to key
/// recording file stems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
  pub name: String,
  pub address: String,
}

/// Replace anything outside `[A-Za-z0-9_-]` so device addresses and session
/// names are safe as file stems. Colons become dashes to keep addresses
/// readable, everything else becomes an underscore.
pub fn sanitize_for_filename(raw: &str) -> String {
  raw
    .chars()
    .map(|c| match c {
      'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' => c,
      ':' => '-',
      _ => '_',
    })
    .collect()
}
