// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

pub mod async_manager;
pub mod paths;
pub mod stream;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub async fn sleep(duration: Duration) {
  tokio::time::sleep(duration).await;
}

/// Wall-clock time as Unix seconds, the timestamp convention used in wire
/// frames and recording manifests.
pub fn unix_now() -> f64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .expect("System clock before Unix epoch")
    .as_secs_f64()
}
