// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use argh::FromArgs;
use lxband_engine::{EngineOptionsBuilder, LxbandEngine};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Link Band acquisition and streaming engine.
struct CliArgs {
  /// websocket port for subscribers (default 18765)
  #[argh(option, default = "18765")]
  websocket_port: u16,

  /// listen on all interfaces instead of loopback only
  #[argh(switch)]
  websocket_use_all_interfaces: bool,

  /// data directory override (defaults to the platform app-data location)
  #[argh(option)]
  data_root: Option<String>,

  /// log level filter (default "info")
  #[argh(option, default = "String::from(\"info\")")]
  log: String,
}

#[tokio::main]
async fn main() {
  let args: CliArgs = argh::from_env();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log.clone())),
    )
    .init();

  let mut builder = EngineOptionsBuilder::default();
  builder
    .websocket_port(args.websocket_port)
    .websocket_use_all_interfaces(args.websocket_use_all_interfaces);
  if let Some(data_root) = &args.data_root {
    builder.data_root(data_root);
  }
  let options = builder.finish();

  let engine = Arc::new(LxbandEngine::default());
  {
    let engine = engine.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Ctrl-C received, stopping engine.");
        engine.stop();
      }
    });
  }

  if let Err(e) = engine.run(&options).await {
    tracing::error!("Engine exited with error: {}", e);
    std::process::exit(1);
  }
}
