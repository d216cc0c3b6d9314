// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! The Link Band acquisition server: streaming engine between the BLE
//! headband and real-time subscribers.
//!
//! ## Data path
//!
//! Notification packets from the hardware session are decoded into
//! timestamped samples and written into per-sensor ring buffers (a raw
//! broadcast buffer plus a sliding analysis buffer). DSP workers turn
//! analysis windows into processed frames on a fixed cadence. Emitters drain
//! raw and processed buffers on their own cadence, offer every sample to the
//! recorder, publish frames through the hub and ping the streaming monitor,
//! which answers health questions from observed flow alone.
//!
//! The one rule everything here bends around: a sample parsed from the radio
//! is never silently dropped. Recording is independent of subscriber count,
//! and subscriber backpressure stops at the hub.
//!
//! Hardware access is abstracted behind [`device::hardware::BleCentral`] /
//! [`device::hardware::BleSession`]; the btleplug implementation lives in
//! `lxband_server_hwmgr_btleplug`, and subscriber sockets live behind
//! [`lxband_core::connector::SubscriberListener`] implementations such as
//! `lxband_transport_websocket_tungstenite`.

#[macro_use]
extern crate tracing;

pub mod buffer;
pub mod device;
pub mod emitter;
pub mod export;
pub mod hub;
pub mod monitor;
pub mod pipeline;
pub mod recorder;
pub mod supervisor;

pub use hub::{Broadcaster, Hub};
pub use monitor::StreamingMonitor;
pub use recorder::{DataRecorder, RecordingFormat, SessionManifest};
pub use supervisor::{SessionSupervisor, SupervisorCommand};
