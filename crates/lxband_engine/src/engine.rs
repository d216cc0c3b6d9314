// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Engine assembly: builds the hub, supervisor, hardware manager and
//! subscriber transport, wires them through their narrow seams and runs
//! until stopped.
//!
//! Construction order matters only at the end: the hub starts answering
//! `server_status: initializing` as soon as the listener is up, and flips to
//! ready once the supervisor loop is running.

use crate::{error::LxbandEngineError, options::EngineOptions};
use lxband_core::{
  connector::SubscriberListener,
  util::{async_manager, paths},
};
use lxband_server::{
  DataRecorder,
  Hub,
  SessionSupervisor,
  StreamingMonitor,
  device::{hardware::BleCentral, registry::DeviceRegistry},
};
use lxband_server_hwmgr_btleplug::BtleplugCentral;
use lxband_transport_websocket_tungstenite::WebsocketListenerBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const REGISTRY_FILE: &str = "registered_devices.json";
const SESSIONS_DIR: &str = "sessions";
const COMMAND_CHANNEL_CAPACITY: usize = 32;
const CONNECTION_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
pub struct LxbandEngine {
  stop_token: CancellationToken,
}

impl LxbandEngine {
  /// Run with the platform btleplug central.
  pub async fn run(&self, options: &EngineOptions) -> Result<(), LxbandEngineError> {
    let central = BtleplugCentral::new().await?;
    self.run_with_central(options, Arc::new(central)).await
  }

  /// Run with an injected hardware central (tests, simulators).
  pub async fn run_with_central(
    &self,
    options: &EngineOptions,
    central: Arc<dyn BleCentral>,
  ) -> Result<(), LxbandEngineError> {
    let data_root = match options.data_root() {
      Some(root) => PathBuf::from(root),
      None => paths::app_data_root(options.app_name()),
    };
    std::fs::create_dir_all(&data_root)
      .map_err(|e| LxbandEngineError::DataDirectoryError(e.to_string()))?;
    info!("Data root: {:?}", data_root);

    let registry = Arc::new(DeviceRegistry::load(data_root.join(REGISTRY_FILE)));
    let recorder = Arc::new(DataRecorder::new(data_root.join(SESSIONS_DIR)));
    let monitor = Arc::new(StreamingMonitor::new());

    let (command_sender, command_receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let hub = Arc::new(Hub::new(command_sender));

    // Subscriber transport: listener feeds accepted connections to the hub.
    let listener = WebsocketListenerBuilder::default()
      .port(options.websocket_port())
      .listen_on_all_interfaces(options.websocket_use_all_interfaces())
      .finish();
    let (connection_sender, connection_receiver) = mpsc::channel(CONNECTION_CHANNEL_CAPACITY);
    let listen_fut = listener.listen(connection_sender);
    async_manager::spawn(async move {
      if let Err(e) = listen_fut.await {
        error!("Subscriber listener failed: {}", e);
      }
    });
    {
      let hub = hub.clone();
      async_manager::spawn(async move {
        hub.run(connection_receiver).await;
      });
    }

    let supervisor_cancel = self.stop_token.child_token();
    let supervisor = SessionSupervisor::new(
      central,
      registry,
      monitor,
      recorder,
      hub.clone(),
      command_receiver,
      supervisor_cancel,
    );
    async_manager::spawn(async move {
      supervisor.run().await;
    });

    hub.set_ready();
    info!(
      "Engine running; websocket subscribers on port {}.",
      options.websocket_port()
    );

    self.stop_token.cancelled().await;
    info!("Engine stop requested, shutting down.");
    let _ = listener.shutdown().await;
    Ok(())
  }

  pub fn stop(&self) {
    info!("Engine stop called, cancelling token.");
    self.stop_token.cancel();
  }
}
