// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Bounded FIFO ring buffer with drop-oldest overflow.
//!
//! These sit between the notification callbacks and everything downstream,
//! so the write path must never block: on overflow the oldest element is
//! discarded and a counter bumped. `drain` hands the reader an atomic
//! snapshot; decoder order is preserved end to end.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Read-through counters for the `buffer_status` monitoring channel.
/// For any buffer, `writes == reads + size + overflows` at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BufferStats {
  pub writes: u64,
  pub reads: u64,
  pub overflows: u64,
  pub size: usize,
  pub capacity: usize,
}

struct BufferInner<T> {
  items: VecDeque<T>,
  capacity: usize,
  writes: u64,
  reads: u64,
  overflows: u64,
}

pub struct RingBuffer<T> {
  inner: Mutex<BufferInner<T>>,
}

impl<T: Clone> RingBuffer<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: Mutex::new(BufferInner {
        items: VecDeque::with_capacity(capacity),
        capacity,
        writes: 0,
        reads: 0,
        overflows: 0,
      }),
    }
  }

  /// Append an item, dropping the oldest entry when full. Returns false when
  /// an overflow occurred. Never blocks beyond the internal lock.
  pub fn write(&self, item: T) -> bool {
    let mut inner = self.inner.lock().expect("Buffer lock poisoned");
    inner.writes += 1;
    let overflowed = inner.items.len() >= inner.capacity;
    if overflowed {
      inner.items.pop_front();
      inner.overflows += 1;
    }
    inner.items.push_back(item);
    !overflowed
  }

  /// Transfer out everything currently buffered, oldest first.
  pub fn drain(&self) -> Vec<T> {
    let mut inner = self.inner.lock().expect("Buffer lock poisoned");
    let drained: Vec<T> = inner.items.drain(..).collect();
    inner.reads += drained.len() as u64;
    drained
  }

  /// Transfer out up to `n` oldest items.
  pub fn drain_n(&self, n: usize) -> Vec<T> {
    let mut inner = self.inner.lock().expect("Buffer lock poisoned");
    let take = n.min(inner.items.len());
    let drained: Vec<T> = inner.items.drain(..take).collect();
    inner.reads += drained.len() as u64;
    drained
  }

  /// Copy of the oldest item without consuming it.
  pub fn peek(&self) -> Option<T> {
    let inner = self.inner.lock().expect("Buffer lock poisoned");
    inner.items.front().cloned()
  }

  /// Copy of the entire contents without consuming them. The DSP workers
  /// read their sliding analysis windows this way.
  pub fn snapshot(&self) -> Vec<T> {
    let inner = self.inner.lock().expect("Buffer lock poisoned");
    inner.items.iter().cloned().collect()
  }

  pub fn size(&self) -> usize {
    self.inner.lock().expect("Buffer lock poisoned").items.len()
  }

  pub fn overflow_count(&self) -> u64 {
    self.inner.lock().expect("Buffer lock poisoned").overflows
  }

  pub fn stats(&self) -> BufferStats {
    let inner = self.inner.lock().expect("Buffer lock poisoned");
    BufferStats {
      writes: inner.writes,
      reads: inner.reads,
      overflows: inner.overflows,
      size: inner.items.len(),
      capacity: inner.capacity,
    }
  }

  /// Discard contents and reset nothing else; counters keep their history.
  pub fn clear(&self) {
    let mut inner = self.inner.lock().expect("Buffer lock poisoned");
    let len = inner.items.len() as u64;
    inner.items.clear();
    inner.reads += len;
  }

  /// Change capacity. Intended for use while no writer is active; excess
  /// oldest elements are dropped as overflow.
  pub fn resize(&self, capacity: usize) {
    let mut inner = self.inner.lock().expect("Buffer lock poisoned");
    inner.capacity = capacity;
    while inner.items.len() > capacity {
      inner.items.pop_front();
      inner.overflows += 1;
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_fifo_order_preserved() {
    let buffer = RingBuffer::new(10);
    for i in 0..5 {
      assert!(buffer.write(i));
    }
    assert_eq!(buffer.drain(), vec![0, 1, 2, 3, 4]);
    assert_eq!(buffer.size(), 0);
  }

  #[test]
  fn test_overflow_drops_oldest() {
    let buffer = RingBuffer::new(3);
    for i in 0..5 {
      buffer.write(i);
    }
    assert_eq!(buffer.overflow_count(), 2);
    assert_eq!(buffer.drain(), vec![2, 3, 4]);
  }

  #[test]
  fn test_counter_conservation() {
    let buffer = RingBuffer::new(4);
    for i in 0..10 {
      buffer.write(i);
    }
    buffer.drain_n(2);
    let stats = buffer.stats();
    assert_eq!(
      stats.writes,
      stats.reads + stats.size as u64 + stats.overflows
    );
  }

  #[test]
  fn test_snapshot_does_not_consume() {
    let buffer = RingBuffer::new(4);
    buffer.write(7);
    buffer.write(8);
    assert_eq!(buffer.snapshot(), vec![7, 8]);
    assert_eq!(buffer.size(), 2);
    assert_eq!(buffer.peek(), Some(7));
    assert_eq!(buffer.size(), 2);
  }

  #[test]
  fn test_drain_n_partial() {
    let buffer = RingBuffer::new(8);
    for i in 0..4 {
      buffer.write(i);
    }
    assert_eq!(buffer.drain_n(2), vec![0, 1]);
    assert_eq!(buffer.drain_n(10), vec![2, 3]);
  }

  #[test]
  fn test_resize_trims_from_front() {
    let buffer = RingBuffer::new(8);
    for i in 0..6 {
      buffer.write(i);
    }
    buffer.resize(3);
    assert_eq!(buffer.drain(), vec![3, 4, 5]);
  }
}
