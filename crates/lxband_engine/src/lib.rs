// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

#[macro_use]
extern crate tracing;

mod engine;
mod error;
mod options;

pub use engine::LxbandEngine;
pub use error::LxbandEngineError;
pub use options::{EngineOptions, EngineOptionsBuilder};
