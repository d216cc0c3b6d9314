// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Session export: pack a recorded session directory into a ZIP archive.
//!
//! The archive is rooted at the session directory, so relative paths inside
//! mirror the on-disk layout (`<stream>.json`, `meta.json`). This is plain
//! blocking IO; callers on the runtime go through `spawn_blocking`.

use lxband_core::errors::RecordError;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::{ZipWriter, write::FileOptions};

/// Write `<output>` as a ZIP of every regular file in `session_dir`.
/// Returns the archive size in bytes.
pub fn export_session_zip(session_dir: &Path, output: &Path) -> Result<u64, RecordError> {
  let entries = std::fs::read_dir(session_dir).map_err(|e| {
    RecordError::FileOpen(session_dir.to_string_lossy().into_owned(), e.to_string())
  })?;
  let file = File::create(output)
    .map_err(|e| RecordError::FileOpen(output.to_string_lossy().into_owned(), e.to_string()))?;
  let mut writer = ZipWriter::new(file);
  let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

  let mut buffer = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|e| {
      RecordError::FileOpen(session_dir.to_string_lossy().into_owned(), e.to_string())
    })?;
    let path = entry.path();
    if !path.is_file() {
      continue;
    }
    let name = entry.file_name().to_string_lossy().into_owned();
    writer
      .start_file(&name, options)
      .map_err(|e| RecordError::WriteFailed(name.clone(), e.to_string()))?;
    buffer.clear();
    File::open(&path)
      .and_then(|mut f| f.read_to_end(&mut buffer))
      .map_err(|e| RecordError::FileOpen(name.clone(), e.to_string()))?;
    writer
      .write_all(&buffer)
      .map_err(|e| RecordError::WriteFailed(name.clone(), e.to_string()))?;
    debug!("Archived {} ({} bytes)", name, buffer.len());
  }
  writer
    .finish()
    .map_err(|e| RecordError::WriteFailed(output.to_string_lossy().into_owned(), e.to_string()))?;
  let size = std::fs::metadata(output)
    .map_err(|e| RecordError::FileOpen(output.to_string_lossy().into_owned(), e.to_string()))?
    .len();
  info!("Exported {:?} to {:?} ({} bytes)", session_dir, output, size);
  Ok(size)
}
