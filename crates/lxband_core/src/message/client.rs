// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Messages subscribers send to the hub.

use serde::{Deserialize, Serialize};

/// Subscriber-to-server control messages, tagged by `type`. The channel in
/// subscribe/unsubscribe is carried as a string so that unknown channel names
/// can be answered with an `error` frame instead of a deserialization
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
  Subscribe {
    channel: String,
  },
  Unsubscribe {
    channel: String,
  },
  Ping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<f64>,
  },
  Heartbeat,
  Command {
    command: String,
    #[serde(default)]
    payload: serde_json::Value,
  },
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_subscribe_parse() {
    let msg: ClientMessage =
      serde_json::from_str(r#"{"type":"subscribe","channel":"monitoring_metrics"}"#)
        .expect("Valid message");
    assert_eq!(
      msg,
      ClientMessage::Subscribe {
        channel: "monitoring_metrics".to_owned()
      }
    );
  }

  #[test]
  fn test_command_without_payload() {
    let msg: ClientMessage =
      serde_json::from_str(r#"{"type":"command","command":"check_device_connection"}"#)
        .expect("Valid message");
    match msg {
      ClientMessage::Command { command, payload } => {
        assert_eq!(command, "check_device_connection");
        assert!(payload.is_null());
      }
      _ => panic!("Expected command message"),
    }
  }

  #[test]
  fn test_unknown_type_rejected() {
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"launch_missiles"}"#).is_err());
  }
}
