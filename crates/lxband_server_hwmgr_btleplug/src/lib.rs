// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! btleplug-backed implementation of the server's BLE hardware traits.

#[macro_use]
extern crate tracing;

mod central;
mod session;

pub use central::BtleplugCentral;
pub use session::BtleplugSession;
