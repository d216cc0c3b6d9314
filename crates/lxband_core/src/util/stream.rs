// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast;

/// Adapts a [`broadcast::Receiver`] into a [`Stream`]. Lagged receivers skip
/// the missed values and continue; the stream ends when the sender side is
/// dropped.
pub fn convert_broadcast_receiver_to_stream<T>(
  mut receiver: broadcast::Receiver<T>,
) -> impl Stream<Item = T>
where
  T: Clone + Send + 'static,
{
  stream! {
    loop {
      match receiver.recv().await {
        Ok(value) => yield value,
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          warn!("Broadcast receiver lagged, {} values skipped.", skipped);
          continue;
        }
        Err(broadcast::error::RecvError::Closed) => break,
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use futures::{StreamExt, pin_mut};

  #[tokio::test]
  async fn test_broadcast_stream_ends_on_sender_drop() {
    let (sender, receiver) = broadcast::channel(4);
    let stream = convert_broadcast_receiver_to_stream(receiver);
    pin_mut!(stream);
    sender.send(1u32).expect("Receiver alive");
    sender.send(2u32).expect("Receiver alive");
    drop(sender);
    assert_eq!(stream.next().await, Some(1));
    assert_eq!(stream.next().await, Some(2));
    assert_eq!(stream.next().await, None);
  }
}
