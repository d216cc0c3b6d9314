// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Websocket subscriber transport over [tokio_tungstenite].
//!
//! The listener accepts websocket connections and hands each one to the hub
//! as a [`SubscriberConnection`]: a channel pair plus the remote address.
//! Each connection gets its own IO loop that bridges the channels and the
//! socket, answers protocol pings, and watches liveness with its own
//! ping/pong cycle.

#[macro_use]
extern crate tracing;

use futures::{FutureExt, SinkExt, StreamExt, future::BoxFuture};
use lxband_core::{
  connector::{
    SubscriberConnection,
    SubscriberListener,
    TransportIncomingMessage,
    TransportOutgoingMessage,
  },
  errors::TransportError,
  util::async_manager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
  net::{TcpListener, TcpStream},
  sync::{Notify, mpsc},
  time::sleep,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Outgoing-channel depth per subscriber; the hub's send deadline starts
/// biting once this backs up.
const OUTGOING_CHANNEL_CAPACITY: usize = 256;
const INCOMING_CHANNEL_CAPACITY: usize = 64;
/// Transport-level keepalive ping cadence.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct WebsocketListenerBuilder {
  /// If true, listens on all interfaces. Otherwise only on 127.0.0.1.
  listen_on_all_interfaces: bool,
  port: u16,
}

impl Default for WebsocketListenerBuilder {
  fn default() -> Self {
    Self {
      listen_on_all_interfaces: false,
      port: 18765,
    }
  }
}

impl WebsocketListenerBuilder {
  pub fn listen_on_all_interfaces(&mut self, listen_on_all_interfaces: bool) -> &mut Self {
    self.listen_on_all_interfaces = listen_on_all_interfaces;
    self
  }

  pub fn port(&mut self, port: u16) -> &mut Self {
    self.port = port;
    self
  }

  pub fn finish(&self) -> WebsocketSubscriberListener {
    WebsocketSubscriberListener {
      port: self.port,
      listen_on_all_interfaces: self.listen_on_all_interfaces,
      shutdown_notifier: Arc::new(Notify::new()),
    }
  }
}

pub struct WebsocketSubscriberListener {
  port: u16,
  listen_on_all_interfaces: bool,
  shutdown_notifier: Arc<Notify>,
}

impl SubscriberListener for WebsocketSubscriberListener {
  fn listen(
    &self,
    connection_sender: mpsc::Sender<SubscriberConnection>,
  ) -> BoxFuture<'static, Result<(), TransportError>> {
    let base_addr = if self.listen_on_all_interfaces {
      "0.0.0.0"
    } else {
      "127.0.0.1"
    };
    let addr = format!("{}:{}", base_addr, self.port);
    let shutdown_notifier = self.shutdown_notifier.clone();
    async move {
      debug!("Websocket: Trying to listen on {}", addr);
      let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| TransportError::ListenFailed(format!("{e:?}")))?;
      info!("Websocket: Listening on {}", addr);
      loop {
        tokio::select! {
          _ = shutdown_notifier.notified() => {
            info!("Websocket listener shutdown requested.");
            return Ok(());
          }
          accepted = listener.accept() => {
            let (stream, remote) = match accepted {
              Ok(pair) => pair,
              Err(e) => {
                warn!("Accept failed: {e:?}");
                continue;
              }
            };
            info!("Websocket: Got connection from {}", remote);
            let connection_sender = connection_sender.clone();
            async_manager::spawn(async move {
              handle_socket(stream, remote.to_string(), connection_sender).await;
            });
          }
        }
      }
    }
    .boxed()
  }

  fn shutdown(&self) -> BoxFuture<'static, Result<(), TransportError>> {
    let shutdown_notifier = self.shutdown_notifier.clone();
    async move {
      shutdown_notifier.notify_waiters();
      Ok(())
    }
    .boxed()
  }
}

async fn handle_socket(
  stream: TcpStream,
  remote_address: String,
  connection_sender: mpsc::Sender<SubscriberConnection>,
) {
  let ws_stream = match tokio_tungstenite::accept_async(stream).await {
    Ok(ws_stream) => ws_stream,
    Err(e) => {
      error!("Websocket handshake with {} failed: {e:?}", remote_address);
      return;
    }
  };
  let (outgoing_sender, outgoing_receiver) = mpsc::channel(OUTGOING_CHANNEL_CAPACITY);
  let (incoming_sender, incoming_receiver) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
  if connection_sender
    .send(SubscriberConnection {
      remote_address: remote_address.clone(),
      outgoing_sender,
      incoming_receiver,
    })
    .await
    .is_err()
  {
    warn!("Hub is gone, dropping connection from {}", remote_address);
    return;
  }
  run_connection_loop(ws_stream, remote_address, outgoing_receiver, incoming_sender).await;
}

async fn run_connection_loop(
  ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
  remote_address: String,
  mut outgoing_receiver: mpsc::Receiver<TransportOutgoingMessage>,
  incoming_sender: mpsc::Sender<TransportIncomingMessage>,
) {
  debug!("Starting websocket connection event loop for {}", remote_address);
  let (mut socket_sender, mut socket_receiver) = ws_stream.split();

  // Start pong count at 1 so the first keepalive tick does not trip it.
  let mut pong_count = 1u32;
  loop {
    tokio::select! {
      _ = sleep(KEEPALIVE_INTERVAL).fuse() => {
        if pong_count == 0 {
          warn!("No pongs from {}, considering connection closed.", remote_address);
          let _ = incoming_sender
            .send(TransportIncomingMessage::Close("keepalive timeout".to_owned()))
            .await;
          return;
        }
        pong_count = 0;
        if socket_sender.send(Message::Ping(vec![0].into())).await.is_err() {
          warn!("Cannot ping {}, considering connection closed.", remote_address);
          let _ = incoming_sender
            .send(TransportIncomingMessage::Close("ping failed".to_owned()))
            .await;
          return;
        }
      }
      outgoing = outgoing_receiver.recv().fuse() => {
        match outgoing {
          Some(TransportOutgoingMessage::Text(text)) => {
            trace!("Sending text message: {}", text);
            if socket_sender.send(Message::Text(text.into())).await.is_err() {
              warn!("Cannot send to {}, considering connection closed.", remote_address);
              let _ = incoming_sender
                .send(TransportIncomingMessage::Close("send failed".to_owned()))
                .await;
              return;
            }
          }
          Some(TransportOutgoingMessage::Close(code, reason)) => {
            let frame = CloseFrame {
              code: code.into(),
              reason: reason.into(),
            };
            let _ = socket_sender.send(Message::Close(Some(frame))).await;
            return;
          }
          None => {
            debug!("Hub dropped outgoing channel for {}, closing socket.", remote_address);
            let _ = socket_sender.close().await;
            return;
          }
        }
      }
      socket_msg = socket_receiver.next().fuse() => {
        let Some(socket_msg) = socket_msg else {
          warn!("Websocket stream for {} ended.", remote_address);
          let _ = incoming_sender
            .send(TransportIncomingMessage::Close("stream ended".to_owned()))
            .await;
          return;
        };
        match socket_msg {
          Ok(Message::Text(text)) => {
            trace!("Got text: {}", text);
            if incoming_sender
              .send(TransportIncomingMessage::Message(text.to_string()))
              .await
              .is_err()
            {
              warn!("Hub side for {} no longer available, exiting.", remote_address);
              return;
            }
          }
          Ok(Message::Close(_)) => {
            let _ = incoming_sender
              .send(TransportIncomingMessage::Close("client closed".to_owned()))
              .await;
            let _ = socket_sender.close().await;
            return;
          }
          Ok(Message::Ping(value)) => {
            if socket_sender.send(Message::Pong(value)).await.is_err() {
              warn!("Cannot pong {}, considering connection closed.", remote_address);
              return;
            }
          }
          Ok(Message::Pong(_)) => {
            pong_count += 1;
          }
          Ok(Message::Binary(_)) => {
            let _ = incoming_sender
              .send(TransportIncomingMessage::Error(
                "binary frames not supported".to_owned(),
              ))
              .await;
          }
          Ok(Message::Frame(_)) => {}
          Err(e) => {
            warn!("Error from websocket {}: {e:?}", remote_address);
            let _ = incoming_sender
              .send(TransportIncomingMessage::Close("socket error".to_owned()))
              .await;
            return;
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_listener_accepts_and_bridges_text() {
    // Find a free port first; the builder wants a concrete one.
    let tcp = TcpListener::bind("127.0.0.1:0").await.expect("Bindable");
    let addr = tcp.local_addr().expect("Has address");
    drop(tcp);
    let listener = {
      let mut builder = WebsocketListenerBuilder::default();
      builder.port(addr.port());
      builder.finish()
    };

    let (connection_sender, mut connection_receiver) = mpsc::channel(4);
    let listen_fut = listener.listen(connection_sender);
    async_manager::spawn(async move {
      let _ = listen_fut.await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{}/", addr.port()))
      .await
      .expect("Client connects");

    let mut connection = tokio::time::timeout(Duration::from_secs(2), connection_receiver.recv())
      .await
      .expect("Connection within deadline")
      .expect("Listener alive");

    client
      .send(Message::Text("hello".into()))
      .await
      .expect("Send works");
    match tokio::time::timeout(Duration::from_secs(2), connection.incoming_receiver.recv())
      .await
      .expect("Message within deadline")
      .expect("Channel open")
    {
      TransportIncomingMessage::Message(text) => assert_eq!(text, "hello"),
      other => panic!("Unexpected message {other:?}"),
    }

    connection
      .outgoing_sender
      .send(TransportOutgoingMessage::Text("world".to_owned()))
      .await
      .expect("Send works");
    let reply = tokio::time::timeout(Duration::from_secs(2), client.next())
      .await
      .expect("Reply within deadline")
      .expect("Stream open")
      .expect("No socket error");
    assert_eq!(reply, Message::Text("world".into()));

    listener.shutdown().await.expect("Shutdown works");
  }
}
