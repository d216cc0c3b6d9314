// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! GATT characteristic UUIDs and notification packet decoders.
//!
//! All sensor packets share the same layout: a 4-byte little-endian device
//! tick (32768 Hz clock) followed by fixed-size sample records. A packet that
//! is only the header decodes to zero samples. Trailing bytes that do not
//! fill a whole record are ignored, never turned into a partial sample.

use crate::device::hardware::ScannedDevice;
use lxband_core::{
  SensorType,
  errors::DecodeError,
  message::{AccSample, BatterySample, EegSample, PpgSample},
};
use uuid::{Uuid, uuid};

pub const EEG_NOTIFY_SERVICE_UUID: Uuid = uuid!("df7b5d95-3afe-00a1-084c-b50895ef4f95");
pub const EEG_NOTIFY_CHAR_UUID: Uuid = uuid!("00ab4d15-66b4-0d8a-824f-8d6f8966c6e5");
pub const PPG_SERVICE_UUID: Uuid = uuid!("1cc50ec0-6967-9d84-a243-c2267f924d1f");
pub const PPG_CHAR_UUID: Uuid = uuid!("6c739642-23ba-818b-2045-bfe8970263f6");
pub const ACCELEROMETER_SERVICE_UUID: Uuid = uuid!("75c276c3-8f97-20bc-a143-b354244886d4");
pub const ACCELEROMETER_CHAR_UUID: Uuid = uuid!("d3d46a35-4394-e9aa-5a43-e7921120aaed");
pub const BATTERY_SERVICE_UUID: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");
pub const BATTERY_CHAR_UUID: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Advertised name prefix identifying Link Band headbands.
pub const DEVICE_NAME_PREFIX: &str = "LXB";

/// Device tick clock, ticks per second.
pub const TIMESTAMP_CLOCK_HZ: f64 = 32768.0;

const HEADER_LEN: usize = 4;
const EEG_RECORD_LEN: usize = 7;
const PPG_RECORD_LEN: usize = 6;
const ACC_RECORD_LEN: usize = 6;

const EEG_SAMPLE_RATE: f64 = 250.0;
const PPG_SAMPLE_RATE: f64 = 50.0;
const ACC_SAMPLE_RATE: f64 = 30.0;

/// ADC count to microvolts: 4.033 V reference, gain 12, 23-bit signed range.
const EEG_UV_PER_COUNT: f64 = 4.033 / 12.0 / ((1 << 23) as f64 - 1.0) * 1e6;

/// True if an advertisement belongs to a Link Band.
pub fn is_link_band(device: &ScannedDevice) -> bool {
  device.name.starts_with(DEVICE_NAME_PREFIX)
}

fn read_tick(packet: &[u8], sensor: SensorType) -> Result<u32, DecodeError> {
  if packet.len() < HEADER_LEN {
    return Err(DecodeError::ShortPacket {
      sensor,
      len: packet.len(),
      min: HEADER_LEN,
    });
  }
  Ok(u32::from_le_bytes([packet[0], packet[1], packet[2], packet[3]]))
}

/// 24-bit MSB-first two's-complement read.
fn read_i24_be(bytes: &[u8]) -> i32 {
  let mut raw = ((bytes[0] as i32) << 16) | ((bytes[1] as i32) << 8) | bytes[2] as i32;
  if raw & 0x0080_0000 != 0 {
    raw -= 0x0100_0000;
  }
  raw
}

/// 24-bit MSB-first unsigned read.
fn read_u24_be(bytes: &[u8]) -> u32 {
  ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

/// Decode an EEG notification packet. Record layout: 1 byte lead-off flags
/// (bit 0 = ch1 negative electrode, bit 2 = ch2), then two 24-bit MSB-first
/// signed channel values.
pub fn decode_eeg(packet: &[u8]) -> Result<Vec<EegSample>, DecodeError> {
  let tick = read_tick(packet, SensorType::Eeg)?;
  let base_timestamp = tick as f64 / TIMESTAMP_CLOCK_HZ;
  let num_samples = (packet.len() - HEADER_LEN) / EEG_RECORD_LEN;
  let mut samples = Vec::with_capacity(num_samples);
  for i in 0..num_samples {
    let record = &packet[HEADER_LEN + i * EEG_RECORD_LEN..HEADER_LEN + (i + 1) * EEG_RECORD_LEN];
    let leadoff = record[0];
    samples.push(EegSample {
      timestamp: base_timestamp + i as f64 / EEG_SAMPLE_RATE,
      ch1: read_i24_be(&record[1..4]) as f64 * EEG_UV_PER_COUNT,
      ch2: read_i24_be(&record[4..7]) as f64 * EEG_UV_PER_COUNT,
      leadoff_ch1: leadoff & 0x01 != 0,
      leadoff_ch2: leadoff & 0x04 != 0,
    });
  }
  Ok(samples)
}

/// Decode a PPG notification packet: two 24-bit unsigned values per record.
///
/// The base timestamp divides the tick by 32.768 then 1000, the formula the
/// device firmware and all previously recorded sessions use. Do not replace
/// it with the EEG/ACC `tick / 32768` expression without device-side
/// confirmation, even though the two agree numerically.
pub fn decode_ppg(packet: &[u8]) -> Result<Vec<PpgSample>, DecodeError> {
  let tick = read_tick(packet, SensorType::Ppg)?;
  let base_timestamp = tick as f64 / 32.768 / 1000.0;
  let num_samples = (packet.len() - HEADER_LEN) / PPG_RECORD_LEN;
  let mut samples = Vec::with_capacity(num_samples);
  for i in 0..num_samples {
    let record = &packet[HEADER_LEN + i * PPG_RECORD_LEN..HEADER_LEN + (i + 1) * PPG_RECORD_LEN];
    samples.push(PpgSample {
      timestamp: base_timestamp + i as f64 / PPG_SAMPLE_RATE,
      red: read_u24_be(&record[0..3]),
      ir: read_u24_be(&record[3..6]),
    });
  }
  Ok(samples)
}

/// Decode an accelerometer notification packet: three little-endian i16 axes
/// per record.
pub fn decode_acc(packet: &[u8]) -> Result<Vec<AccSample>, DecodeError> {
  let tick = read_tick(packet, SensorType::Acc)?;
  let base_timestamp = tick as f64 / TIMESTAMP_CLOCK_HZ;
  let num_samples = (packet.len() - HEADER_LEN) / ACC_RECORD_LEN;
  let mut samples = Vec::with_capacity(num_samples);
  for i in 0..num_samples {
    let record = &packet[HEADER_LEN + i * ACC_RECORD_LEN..HEADER_LEN + (i + 1) * ACC_RECORD_LEN];
    samples.push(AccSample {
      timestamp: base_timestamp + i as f64 / ACC_SAMPLE_RATE,
      x: i16::from_le_bytes([record[0], record[1]]),
      y: i16::from_le_bytes([record[2], record[3]]),
      z: i16::from_le_bytes([record[4], record[5]]),
    });
  }
  Ok(samples)
}

/// Decode a battery notification: a single u8 percentage, stamped with the
/// wall-clock arrival time since the device only notifies on change.
pub fn decode_battery(packet: &[u8], arrival_time: f64) -> Result<BatterySample, DecodeError> {
  if packet.is_empty() {
    return Err(DecodeError::ShortPacket {
      sensor: SensorType::Bat,
      len: 0,
      min: 1,
    });
  }
  Ok(BatterySample {
    timestamp: arrival_time,
    level: packet[0],
  })
}

#[cfg(test)]
mod test {
  use super::*;

  fn eeg_packet(tick: u32, records: &[(u8, i32, i32)]) -> Vec<u8> {
    let mut packet = tick.to_le_bytes().to_vec();
    for (leadoff, ch1, ch2) in records {
      packet.push(*leadoff);
      packet.extend_from_slice(&[(ch1 >> 16) as u8, (ch1 >> 8) as u8, *ch1 as u8]);
      packet.extend_from_slice(&[(ch2 >> 16) as u8, (ch2 >> 8) as u8, *ch2 as u8]);
    }
    packet
  }

  #[test]
  fn test_eeg_reference_packet() {
    // tick 0x00010000 = 65536 ticks = 2.0 s, four records, ch1 = +1 count,
    // ch2 = -1 count (0xFFFFFF in 24-bit two's complement).
    let packet = eeg_packet(0x0001_0000, &[(0x00, 1, 0xFFFFFF); 4]);
    assert_eq!(packet.len(), 32);
    let samples = decode_eeg(&packet).expect("Valid packet");
    assert_eq!(samples.len(), 4);
    let expected_ts = [2.000, 2.004, 2.008, 2.012];
    for (sample, expected) in samples.iter().zip(expected_ts) {
      assert!((sample.timestamp - expected).abs() < 1e-9);
      assert!(!sample.leadoff_ch1);
      assert!(!sample.leadoff_ch2);
    }
    // One count is about 4.0e-2 uV, negative for ch2.
    assert!((samples[0].ch1 - 4.033 / 12.0 / ((1 << 23) as f64 - 1.0) * 1e6).abs() < 1e-9);
    assert!((samples[0].ch1 - 4.0e-2).abs() < 1e-3);
    assert!((samples[0].ch2 + samples[0].ch1).abs() < 1e-12);
  }

  #[test]
  fn test_eeg_sample_spacing_is_exactly_4ms() {
    let packet = eeg_packet(12345, &[(0, 100, -100); 10]);
    let samples = decode_eeg(&packet).expect("Valid packet");
    for pair in samples.windows(2) {
      assert!((pair[1].timestamp - pair[0].timestamp - 1.0 / 250.0).abs() < 1e-12);
    }
  }

  #[test]
  fn test_eeg_leadoff_bits() {
    let packet = eeg_packet(0, &[(0x05, 0, 0)]);
    let samples = decode_eeg(&packet).expect("Valid packet");
    assert!(samples[0].leadoff_ch1);
    assert!(samples[0].leadoff_ch2);
  }

  #[test]
  fn test_header_only_packet_decodes_to_zero_samples() {
    let packet = 0u32.to_le_bytes().to_vec();
    assert!(decode_eeg(&packet).expect("Valid packet").is_empty());
    assert!(decode_ppg(&packet).expect("Valid packet").is_empty());
    assert!(decode_acc(&packet).expect("Valid packet").is_empty());
  }

  #[test]
  fn test_short_packet_is_an_error() {
    assert!(matches!(
      decode_eeg(&[1, 2, 3]),
      Err(DecodeError::ShortPacket { len: 3, min: 4, .. })
    ));
    assert!(matches!(
      decode_battery(&[], 0.0),
      Err(DecodeError::ShortPacket { .. })
    ));
  }

  #[test]
  fn test_trailing_partial_record_ignored() {
    let mut packet = eeg_packet(0, &[(0, 1, 1)]);
    packet.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    assert_eq!(decode_eeg(&packet).expect("Valid packet").len(), 1);
  }

  #[test]
  fn test_ppg_decode_values_and_base() {
    let mut packet = 32768u32.to_le_bytes().to_vec();
    packet.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);
    let samples = decode_ppg(&packet).expect("Valid packet");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].red, 65536);
    assert_eq!(samples[0].ir, 0xFF_FFFF);
    assert!((samples[0].timestamp - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_acc_negative_axes() {
    let mut packet = 0u32.to_le_bytes().to_vec();
    let x = (-1000i16).to_le_bytes();
    let y = 2000i16.to_le_bytes();
    let z = (-3i16).to_le_bytes();
    packet.extend_from_slice(&[x[0], x[1], y[0], y[1], z[0], z[1]]);
    let samples = decode_acc(&packet).expect("Valid packet");
    assert_eq!((samples[0].x, samples[0].y, samples[0].z), (-1000, 2000, -3));
  }

  #[test]
  fn test_sample_count_formula() {
    for records in [0usize, 1, 7, 25] {
      let packet = eeg_packet(0, &vec![(0u8, 5i32, 5i32); records]);
      let samples = decode_eeg(&packet).expect("Valid packet");
      assert_eq!(samples.len(), (packet.len() - 4) / 7);
    }
  }

  #[test]
  fn test_battery_decode() {
    let sample = decode_battery(&[87], 1234.5).expect("Valid packet");
    assert_eq!(sample.level, 87);
    assert!((sample.timestamp - 1234.5).abs() < f64::EPSILON);
  }
}
