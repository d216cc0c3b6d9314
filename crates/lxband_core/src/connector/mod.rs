// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Transport seam between the subscriber hub and concrete socket
//! implementations.
//!
//! A listener accepts connections and hands each one to the hub as a pair of
//! channels; the hub never sees sockets and the transport never sees
//! subscription state. This is also what keeps the hub testable: tests drive
//! it with plain channel pairs.

use crate::errors::TransportError;
use futures::future::BoxFuture;
use tokio::sync::mpsc::{Receiver, Sender};

/// Messages arriving from a subscriber connection.
#[derive(Clone, Debug)]
pub enum TransportIncomingMessage {
  /// Text frame received from the subscriber.
  Message(String),
  /// The subscriber (or the socket) closed the connection.
  Close(String),
  /// Transport-level error; the hub treats this as a close.
  Error(String),
}

/// Messages the hub queues toward a subscriber connection.
#[derive(Clone, Debug)]
pub enum TransportOutgoingMessage {
  /// Text frame to send.
  Text(String),
  /// Close the connection with a status code and reason.
  Close(u16, String),
}

/// One accepted subscriber connection, delivered by a listener.
pub struct SubscriberConnection {
  /// Remote address, used for logging and same-address replacement.
  pub remote_address: String,
  /// The hub sends outgoing frames here.
  pub outgoing_sender: Sender<TransportOutgoingMessage>,
  /// The hub reads incoming control messages from here.
  pub incoming_receiver: Receiver<TransportIncomingMessage>,
}

/// A listening transport that produces subscriber connections until shut
/// down. Implementations spawn their own per-connection IO loops.
pub trait SubscriberListener: Send + Sync {
  /// Bind and start accepting. Each accepted connection is sent through
  /// `connection_sender`.
  fn listen(
    &self,
    connection_sender: Sender<SubscriberConnection>,
  ) -> BoxFuture<'static, Result<(), TransportError>>;

  /// Stop accepting and close the listening socket.
  fn shutdown(&self) -> BoxFuture<'static, Result<(), TransportError>>;
}
