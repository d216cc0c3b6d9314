// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Core types for the Link Band streaming service.
//!
//! This crate holds everything shared between the acquisition server, the
//! hardware managers and the subscriber transports: the error taxonomy, the
//! sensor sample and processed-frame types, the subscriber wire protocol, and
//! a handful of async utilities. Nothing in here talks to hardware or opens
//! sockets; those concerns live in the `lxband_server*` and
//! `lxband_transport_*` crates.

#[macro_use]
extern crate tracing;

pub mod connector;
pub mod errors;
pub mod message;
pub mod util;

/// Sensor identifiers used throughout the system: buffer keys, wire frames,
/// recording file stems and monitor tracking all use these four values.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  serde::Serialize,
  serde::Deserialize,
  strum_macros::Display,
  strum_macros::EnumString,
  strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorType {
  Eeg,
  Ppg,
  Acc,
  Bat,
}

impl SensorType {
  /// Nominal device-side sampling rate in Hz. Battery has no fixed rate; the
  /// device notifies on level changes only.
  pub fn sample_rate(&self) -> f64 {
    match self {
      SensorType::Eeg => 250.0,
      SensorType::Ppg => 50.0,
      SensorType::Acc => 30.0,
      SensorType::Bat => 0.0,
    }
  }
}
