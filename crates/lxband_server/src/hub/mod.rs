// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Subscriber hub: owns the subscriber set and per-subscriber channel
//! subscriptions, fans out serialized frames with per-send deadlines, and
//! speaks the subscriber control protocol.
//!
//! The hub never blocks an emitter: sends are bounded-channel handoffs with
//! a deadline, and a subscriber that misses it is dropped (tolerated on the
//! priority path). Commands from subscribers go to the session supervisor
//! through a channel; the supervisor talks back only through the
//! [`Broadcaster`] trait, which keeps the two from holding each other.

use crate::supervisor::SupervisorCommand;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use lxband_core::{
  connector::{SubscriberConnection, TransportIncomingMessage, TransportOutgoingMessage},
  errors::TransportError,
  message::{Channel, ClientMessage, EventType, ServerFrame, ServerStatusKind},
  util::{self, async_manager, sleep},
};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Per-send deadline on normal channels; a subscriber that misses it is
/// disconnected.
const SEND_TIMEOUT: Duration = Duration::from_secs(1);
/// Priority deadline for monitoring traffic; a slow subscriber is tolerated,
/// only closed connections are removed.
const PRIORITY_SEND_TIMEOUT: Duration = Duration::from_secs(5);

const ADMISSION_MAX_WAIT: Duration = Duration::from_secs(10);
const ADMISSION_POLL: Duration = Duration::from_millis(500);
const ADMISSION_UPDATE_EVERY: Duration = Duration::from_secs(2);
/// Websocket "internal error" close code used on admission timeout.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Narrow fan-out interface handed to emitters and the supervisor.
pub trait Broadcaster: Send + Sync {
  /// Enqueue a frame for every subscriber of `channel`, each under the 1 s
  /// deadline. Never blocks on any single subscriber.
  fn broadcast(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()>;

  /// Priority variant with the 5 s deadline, used for monitoring metrics.
  fn broadcast_priority(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()>;

  /// Push an event frame to every connected subscriber, subscription sets
  /// notwithstanding.
  fn broadcast_event(
    &self,
    event_type: EventType,
    data: serde_json::Value,
  ) -> BoxFuture<'static, ()>;

  fn client_count(&self) -> usize;
}

struct Subscriber {
  remote_address: String,
  sender: mpsc::Sender<TransportOutgoingMessage>,
  channels: HashSet<Channel>,
}

pub struct Hub {
  subscribers: Arc<DashMap<u64, Subscriber>>,
  next_id: AtomicU64,
  ready: Arc<AtomicBool>,
  command_sender: mpsc::Sender<SupervisorCommand>,
}

impl Hub {
  pub fn new(command_sender: mpsc::Sender<SupervisorCommand>) -> Self {
    Self {
      subscribers: Arc::new(DashMap::new()),
      next_id: AtomicU64::new(1),
      ready: Arc::new(AtomicBool::new(false)),
      command_sender,
    }
  }

  /// Flip the admission gate once the rest of the system is initialized.
  pub fn set_ready(&self) {
    self.ready.store(true, Ordering::SeqCst);
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.len()
  }

  /// Accept loop: one subscriber task per connection delivered by the
  /// transport listener. Runs until the listener drops its sender.
  pub async fn run(
    self: Arc<Self>,
    mut connection_receiver: mpsc::Receiver<SubscriberConnection>,
  ) {
    while let Some(connection) = connection_receiver.recv().await {
      let hub = self.clone();
      async_manager::spawn(async move {
        hub.handle_connection(connection).await;
      });
    }
    debug!("Transport listener dropped, hub accept loop exiting.");
  }

  async fn handle_connection(self: &Arc<Self>, connection: SubscriberConnection) {
    let SubscriberConnection {
      remote_address,
      outgoing_sender,
      mut incoming_receiver,
    } = connection;
    info!("New subscriber connection from {}", remote_address);

    if !self.admit(&remote_address, &outgoing_sender).await {
      return;
    }

    // A reconnect from the same address replaces the stale subscriber.
    let stale: Vec<u64> = self
      .subscribers
      .iter()
      .filter(|entry| entry.value().remote_address == remote_address)
      .map(|entry| *entry.key())
      .collect();
    for id in stale {
      info!("Replacing existing connection from {}", remote_address);
      self.remove_subscriber(id, "New connection from same address").await;
    }

    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.subscribers.insert(
      id,
      Subscriber {
        remote_address: remote_address.clone(),
        sender: outgoing_sender.clone(),
        channels: HashSet::new(),
      },
    );
    debug!(
      "Subscriber {} admitted from {}. Total subscribers: {}",
      id,
      remote_address,
      self.subscribers.len()
    );

    loop {
      match incoming_receiver.recv().await {
        Some(TransportIncomingMessage::Message(text)) => {
          self.handle_client_message(id, &text, &outgoing_sender).await;
        }
        Some(TransportIncomingMessage::Close(reason)) => {
          info!("Subscriber {} closed: {}", id, reason);
          break;
        }
        Some(TransportIncomingMessage::Error(reason)) => {
          warn!("Subscriber {} transport error: {}", id, reason);
          break;
        }
        None => {
          debug!("Subscriber {} transport channel dropped.", id);
          break;
        }
      }
    }
    self.subscribers.remove(&id);
    info!(
      "Subscriber {} disconnected. Total subscribers: {}",
      id,
      self.subscribers.len()
    );
  }

  /// Admission: when the system is still initializing, tell the subscriber
  /// so every two seconds for up to ten seconds, then either greet or close
  /// with 1011.
  async fn admit(
    &self,
    remote_address: &str,
    sender: &mpsc::Sender<TransportOutgoingMessage>,
  ) -> bool {
    if !self.ready.load(Ordering::SeqCst) {
      let mut waited = Duration::ZERO;
      let mut since_update = ADMISSION_UPDATE_EVERY;
      while !self.ready.load(Ordering::SeqCst) && waited < ADMISSION_MAX_WAIT {
        if since_update >= ADMISSION_UPDATE_EVERY {
          since_update = Duration::ZERO;
          let frame = ServerFrame::ServerStatus {
            status: ServerStatusKind::Initializing,
            message: format!(
              "Server is still initializing, please wait... ({}s elapsed)",
              waited.as_secs()
            ),
            retry_after: Some(5),
          };
          if send_frame(sender, &frame).await.is_err() {
            return false;
          }
        }
        sleep(ADMISSION_POLL).await;
        waited += ADMISSION_POLL;
        since_update += ADMISSION_POLL;
      }
      if !self.ready.load(Ordering::SeqCst) {
        error!(
          "Server still initializing after {:?}, closing {}",
          ADMISSION_MAX_WAIT, remote_address
        );
        let frame = ServerFrame::ServerStatus {
          status: ServerStatusKind::Error,
          message: "Server initialization timeout".to_owned(),
          retry_after: Some(30),
        };
        let _ = send_frame(sender, &frame).await;
        let _ = sender
          .send(TransportOutgoingMessage::Close(
            CLOSE_INTERNAL_ERROR,
            "Server initialization timeout".to_owned(),
          ))
          .await;
        return false;
      }
    }
    let greeting = ServerFrame::ServerStatus {
      status: ServerStatusKind::Ready,
      message: "Server is now ready for connections".to_owned(),
      retry_after: None,
    };
    send_frame(sender, &greeting).await.is_ok()
  }

  async fn handle_client_message(
    &self,
    id: u64,
    text: &str,
    sender: &mpsc::Sender<TransportOutgoingMessage>,
  ) {
    // Bare-text ping predates the JSON protocol and is still answered.
    if text.trim() == "ping" {
      let _ = sender
        .send(TransportOutgoingMessage::Text("pong".to_owned()))
        .await;
      return;
    }
    let message: ClientMessage = match serde_json::from_str(text) {
      Ok(message) => message,
      Err(e) => {
        debug!("Malformed frame from subscriber {}: {}", id, e);
        let _ = send_frame(
          sender,
          &ServerFrame::Error {
            message: format!("Invalid message format: {}", e),
          },
        )
        .await;
        return;
      }
    };

    match message {
      ClientMessage::Subscribe { channel } => match Channel::from_str(&channel) {
        Ok(parsed) => {
          if let Some(mut entry) = self.subscribers.get_mut(&id) {
            entry.channels.insert(parsed);
            info!("Subscriber {} subscribed to {}", id, parsed);
          }
          let _ = send_frame(
            sender,
            &ServerFrame::SubscriptionConfirmed {
              channel,
              timestamp: util::unix_now(),
            },
          )
          .await;
        }
        Err(_) => {
          let _ = send_frame(
            sender,
            &ServerFrame::Error {
              message: format!("Unknown channel: {}", channel),
            },
          )
          .await;
        }
      },
      ClientMessage::Unsubscribe { channel } => {
        if let Ok(parsed) = Channel::from_str(&channel) {
          if let Some(mut entry) = self.subscribers.get_mut(&id) {
            entry.channels.remove(&parsed);
            info!("Subscriber {} unsubscribed from {}", id, parsed);
          }
        }
        let _ = send_frame(
          sender,
          &ServerFrame::UnsubscriptionConfirmed {
            channel,
            timestamp: util::unix_now(),
          },
        )
        .await;
      }
      ClientMessage::Ping { timestamp } => {
        let _ = send_frame(
          sender,
          &ServerFrame::PingResponse {
            timestamp: util::unix_now(),
            original_timestamp: timestamp,
          },
        )
        .await;
      }
      ClientMessage::Heartbeat => {
        let _ = send_frame(
          sender,
          &ServerFrame::HeartbeatResponse {
            timestamp: util::unix_now(),
          },
        )
        .await;
      }
      ClientMessage::Command { command, payload } => {
        self.handle_command(id, &command, payload, sender).await;
      }
    }
  }

  async fn handle_command(
    &self,
    id: u64,
    command: &str,
    payload: serde_json::Value,
    sender: &mpsc::Sender<TransportOutgoingMessage>,
  ) {
    debug!("Subscriber {} command: {}", id, command);
    let supervisor_command = match command {
      // Handshake probe kept for client compatibility; answered locally.
      "check_device_connection" => {
        let _ = send_frame(
          sender,
          &ServerFrame::HandshakeResponse {
            status: "connected".to_owned(),
            message: "Connection established".to_owned(),
          },
        )
        .await;
        return;
      }
      "scan_devices" => SupervisorCommand::ScanDevices,
      "connect_device" => match payload.get("address").and_then(|a| a.as_str()) {
        Some(address) => SupervisorCommand::ConnectDevice {
          address: address.to_owned(),
        },
        None => {
          let _ = send_frame(
            sender,
            &ServerFrame::Error {
              message: "Address is required for connect_device command".to_owned(),
            },
          )
          .await;
          return;
        }
      },
      "disconnect_device" => SupervisorCommand::DisconnectDevice,
      "start_streaming" => SupervisorCommand::StartStreaming,
      "stop_streaming" => SupervisorCommand::StopStreaming,
      "check_bluetooth_status" => SupervisorCommand::CheckBluetoothStatus,
      "register_device" => {
        let name = payload.get("name").and_then(|n| n.as_str()).unwrap_or("");
        match payload.get("address").and_then(|a| a.as_str()) {
          Some(address) => SupervisorCommand::RegisterDevice {
            name: name.to_owned(),
            address: address.to_owned(),
          },
          None => {
            let _ = send_frame(
              sender,
              &ServerFrame::Error {
                message: "Address is required for register_device command".to_owned(),
              },
            )
            .await;
            return;
          }
        }
      }
      "unregister_device" => match payload.get("address").and_then(|a| a.as_str()) {
        Some(address) => SupervisorCommand::UnregisterDevice {
          address: address.to_owned(),
        },
        None => {
          let _ = send_frame(
            sender,
            &ServerFrame::Error {
              message: "Address is required for unregister_device command".to_owned(),
            },
          )
          .await;
          return;
        }
      },
      unknown => {
        let _ = send_frame(
          sender,
          &ServerFrame::Error {
            message: format!("Unknown command: {}", unknown),
          },
        )
        .await;
        return;
      }
    };
    if self.command_sender.send(supervisor_command).await.is_err() {
      error!("Session supervisor unavailable, dropping command {}", command);
      let _ = send_frame(
        sender,
        &ServerFrame::Error {
          message: "Server not ready for commands".to_owned(),
        },
      )
      .await;
    }
  }

  async fn remove_subscriber(&self, id: u64, reason: &str) {
    if let Some((_, subscriber)) = self.subscribers.remove(&id) {
      let _ = subscriber
        .sender
        .try_send(TransportOutgoingMessage::Close(1000, reason.to_owned()));
    }
  }

  /// Snapshot of `(id, sender)` for subscribers of a channel, taken before
  /// each fan-out so subscription churn mid-broadcast cannot tear the set.
  fn channel_snapshot(&self, channel: Channel) -> Vec<(u64, mpsc::Sender<TransportOutgoingMessage>)> {
    self
      .subscribers
      .iter()
      .filter(|entry| entry.value().channels.contains(&channel))
      .map(|entry| (*entry.key(), entry.value().sender.clone()))
      .collect()
  }

  fn all_snapshot(&self) -> Vec<(u64, mpsc::Sender<TransportOutgoingMessage>)> {
    self
      .subscribers
      .iter()
      .map(|entry| (*entry.key(), entry.value().sender.clone()))
      .collect()
  }

  async fn fan_out(
    subscribers: Arc<DashMap<u64, Subscriber>>,
    targets: Vec<(u64, mpsc::Sender<TransportOutgoingMessage>)>,
    serialized: String,
    deadline: Duration,
    drop_on_timeout: bool,
  ) {
    for (id, sender) in targets {
      match timeout(
        deadline,
        sender.send(TransportOutgoingMessage::Text(serialized.clone())),
      )
      .await
      {
        Ok(Ok(())) => {}
        Ok(Err(_)) => {
          // Channel closed: the subscriber is gone on every path.
          if subscribers.remove(&id).is_some() {
            debug!("Subscriber {} channel closed during broadcast, removed.", id);
          }
        }
        Err(_) => {
          if drop_on_timeout {
            if let Some((_, subscriber)) = subscribers.remove(&id) {
              warn!("Subscriber {} missed the send deadline, removing.", id);
              let _ = subscriber.sender.try_send(TransportOutgoingMessage::Close(
                1000,
                "Send timeout".to_owned(),
              ));
            }
          } else {
            warn!("Priority send to subscriber {} timed out, tolerated.", id);
          }
        }
      }
    }
  }
}

async fn send_frame(
  sender: &mpsc::Sender<TransportOutgoingMessage>,
  frame: &ServerFrame,
) -> Result<(), TransportError> {
  sender
    .send(TransportOutgoingMessage::Text(frame.to_json()))
    .await
    .map_err(|_| TransportError::ConnectionClosed("outgoing channel closed".to_owned()))
}

impl Broadcaster for Hub {
  fn broadcast(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()> {
    let targets = self.channel_snapshot(channel);
    let subscribers = self.subscribers.clone();
    async move {
      if targets.is_empty() {
        return;
      }
      Hub::fan_out(subscribers, targets, frame.to_json(), SEND_TIMEOUT, true).await;
    }
    .boxed()
  }

  fn broadcast_priority(&self, channel: Channel, frame: ServerFrame) -> BoxFuture<'static, ()> {
    let targets = self.channel_snapshot(channel);
    let subscribers = self.subscribers.clone();
    async move {
      if targets.is_empty() {
        return;
      }
      Hub::fan_out(
        subscribers,
        targets,
        frame.to_json(),
        PRIORITY_SEND_TIMEOUT,
        false,
      )
      .await;
    }
    .boxed()
  }

  fn broadcast_event(
    &self,
    event_type: EventType,
    data: serde_json::Value,
  ) -> BoxFuture<'static, ()> {
    let targets = self.all_snapshot();
    let subscribers = self.subscribers.clone();
    let frame = ServerFrame::Event { event_type, data };
    async move {
      if targets.is_empty() {
        return;
      }
      Hub::fan_out(subscribers, targets, frame.to_json(), SEND_TIMEOUT, true).await;
    }
    .boxed()
  }

  fn client_count(&self) -> usize {
    self.subscribers.len()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use lxband_core::SensorType;
  use lxband_core::message::RawBatch;

  struct TestClient {
    outgoing_receiver: mpsc::Receiver<TransportOutgoingMessage>,
    incoming_sender: mpsc::Sender<TransportIncomingMessage>,
  }

  impl TestClient {
    async fn connect(hub: &Arc<Hub>, address: &str) -> TestClient {
      let (outgoing_sender, outgoing_receiver) = mpsc::channel(64);
      let (incoming_sender, incoming_receiver) = mpsc::channel(64);
      let connection = SubscriberConnection {
        remote_address: address.to_owned(),
        outgoing_sender,
        incoming_receiver,
      };
      let hub = hub.clone();
      async_manager::spawn(async move {
        hub.handle_connection(connection).await;
      });
      TestClient {
        outgoing_receiver,
        incoming_sender,
      }
    }

    async fn send(&self, text: &str) {
      self
        .incoming_sender
        .send(TransportIncomingMessage::Message(text.to_owned()))
        .await
        .expect("Hub alive");
    }

    async fn recv_json(&mut self) -> serde_json::Value {
      match timeout(Duration::from_secs(2), self.outgoing_receiver.recv())
        .await
        .expect("Frame within deadline")
        .expect("Channel open")
      {
        TransportOutgoingMessage::Text(text) => {
          serde_json::from_str(&text).expect("Valid JSON frame")
        }
        TransportOutgoingMessage::Close(code, reason) => {
          panic!("Unexpected close {code}: {reason}")
        }
      }
    }

    async fn recv_text(&mut self) -> String {
      match timeout(Duration::from_secs(2), self.outgoing_receiver.recv())
        .await
        .expect("Frame within deadline")
        .expect("Channel open")
      {
        TransportOutgoingMessage::Text(text) => text,
        other => panic!("Unexpected message {other:?}"),
      }
    }
  }

  fn ready_hub() -> (Arc<Hub>, mpsc::Receiver<SupervisorCommand>) {
    let (command_sender, command_receiver) = mpsc::channel(16);
    let hub = Arc::new(Hub::new(command_sender));
    hub.set_ready();
    (hub, command_receiver)
  }

  async fn greeted_client(hub: &Arc<Hub>, address: &str) -> TestClient {
    let mut client = TestClient::connect(hub, address).await;
    let greeting = client.recv_json().await;
    assert_eq!(greeting["type"], "server_status");
    assert_eq!(greeting["status"], "ready");
    client
  }

  fn eeg_frame() -> ServerFrame {
    ServerFrame::RawData {
      sensor_type: SensorType::Eeg,
      device_id: "AA:BB".to_owned(),
      timestamp: 1.0,
      data: RawBatch::Eeg(vec![]),
    }
  }

  #[tokio::test]
  async fn test_subscribe_confirms_and_receives() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1000").await;

    client
      .send(r#"{"type":"subscribe","channel":"eeg_raw"}"#)
      .await;
    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "subscription_confirmed");
    assert_eq!(reply["channel"], "eeg_raw");

    hub.broadcast(Channel::EegRaw, eeg_frame()).await;
    let frame = client.recv_json().await;
    assert_eq!(frame["type"], "raw_data");
    assert_eq!(frame["sensor_type"], "eeg");
  }

  #[tokio::test]
  async fn test_unsubscribed_receives_nothing() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1001").await;
    hub.broadcast(Channel::EegRaw, eeg_frame()).await;
    // Hub still owes no frames; a ping is the next thing that arrives.
    client.send(r#"{"type":"heartbeat"}"#).await;
    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "heartbeat_response");
  }

  #[tokio::test]
  async fn test_double_subscribe_is_idempotent() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1002").await;
    for _ in 0..2 {
      client
        .send(r#"{"type":"subscribe","channel":"monitoring_metrics"}"#)
        .await;
      let reply = client.recv_json().await;
      assert_eq!(reply["type"], "subscription_confirmed");
    }
    // A single broadcast yields a single frame.
    hub
      .broadcast(
        Channel::MonitoringMetrics,
        ServerFrame::Error {
          message: "test marker".to_owned(),
        },
      )
      .await;
    let first = client.recv_json().await;
    assert_eq!(first["message"], "test marker");
    client.send(r#"{"type":"heartbeat"}"#).await;
    let next = client.recv_json().await;
    assert_eq!(next["type"], "heartbeat_response");
  }

  #[tokio::test]
  async fn test_bare_ping_answered_with_pong() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1003").await;
    client.send("ping").await;
    assert_eq!(client.recv_text().await, "pong");
  }

  #[tokio::test]
  async fn test_malformed_frame_keeps_connection_open() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1004").await;
    client.send("{not json").await;
    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "error");
    // Still alive and serviced.
    client.send(r#"{"type":"heartbeat"}"#).await;
    assert_eq!(client.recv_json().await["type"], "heartbeat_response");
  }

  #[tokio::test]
  async fn test_unknown_channel_is_an_error() {
    let (hub, _commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1005").await;
    client
      .send(r#"{"type":"subscribe","channel":"astrology"}"#)
      .await;
    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "error");
  }

  #[tokio::test]
  async fn test_commands_forward_to_supervisor() {
    let (hub, mut commands) = ready_hub();
    let mut client = greeted_client(&hub, "127.0.0.1:1006").await;
    client
      .send(r#"{"type":"command","command":"connect_device","payload":{"address":"AA:BB"}}"#)
      .await;
    match timeout(Duration::from_secs(2), commands.recv())
      .await
      .expect("Command within deadline")
      .expect("Channel open")
    {
      SupervisorCommand::ConnectDevice { address } => assert_eq!(address, "AA:BB"),
      other => panic!("Unexpected command {other:?}"),
    }
    client
      .send(r#"{"type":"command","command":"check_device_connection"}"#)
      .await;
    assert_eq!(client.recv_json().await["type"], "handshake_response");
  }

  #[tokio::test]
  async fn test_disconnected_subscriber_removed_without_affecting_others() {
    let (hub, _commands) = ready_hub();
    let mut staying = greeted_client(&hub, "127.0.0.1:1007").await;
    let mut leaving = greeted_client(&hub, "127.0.0.1:1008").await;
    for client in [&staying, &leaving] {
      client
        .send(r#"{"type":"subscribe","channel":"eeg_raw"}"#)
        .await;
    }
    staying.recv_json().await;
    leaving.recv_json().await;
    assert_eq!(hub.subscriber_count(), 2);

    // Simulate a mid-broadcast death: the leaving client's outgoing channel
    // closes.
    drop(leaving.outgoing_receiver);
    hub.broadcast(Channel::EegRaw, eeg_frame()).await;
    assert_eq!(hub.subscriber_count(), 1);
    assert_eq!(staying.recv_json().await["type"], "raw_data");
  }

  #[tokio::test]
  async fn test_initializing_hub_sends_wait_frames() {
    let (command_sender, _command_receiver) = mpsc::channel(16);
    let hub = Arc::new(Hub::new(command_sender));
    let mut client = TestClient::connect(&hub, "127.0.0.1:1009").await;
    let first = client.recv_json().await;
    assert_eq!(first["status"], "initializing");
    hub.set_ready();
    // Within the next poll interval the ready greeting arrives.
    let ready = client.recv_json().await;
    assert_eq!(ready["status"], "ready");
  }
}
