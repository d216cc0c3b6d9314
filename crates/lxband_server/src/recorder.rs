// Link Band SDK Rust Source Code File - See https://github.com/lxband for more info.
//
// Copyright 2024-2026 Link Band SDK Developers. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Session recorder: one file per `(device, sensor, stream)` tuple plus a
//! manifest.
//!
//! Emitters call [`DataRecorder::add_data`] for every sample they drain
//! while a session is active, before any subscriber fan-out happens, so a
//! session captures everything even with zero subscribers. Writes go through
//! one mutex per open file (append order is exactly offer order) and are
//! never fsynced per call. A file that fails to open disables recording for
//! that stream only; write failures are counted into the manifest and never
//! abort acquisition.

use crate::device::{DeviceInfo, sanitize_for_filename};
use lxband_core::errors::RecordError;
use lxband_core::util;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// On-disk format for a session, chosen at `start_recording`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFormat {
  #[default]
  Json,
  Csv,
}

/// Per-file accounting in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
  pub size_bytes: u64,
  pub samples: u64,
}

/// `meta.json`, written on stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
  pub session_name: String,
  pub start_time: f64,
  pub end_time: f64,
  pub duration: f64,
  pub device: Option<DeviceInfo>,
  pub files: BTreeMap<String, FileEntry>,
  pub total_size: u64,
  pub write_errors: u64,
}

struct StreamFile {
  file: tokio::fs::File,
  bytes_written: u64,
  samples: u64,
}

struct ActiveSession {
  session_name: String,
  directory: PathBuf,
  format: RecordingFormat,
  start_time: f64,
  device: Option<DeviceInfo>,
  files: Mutex<HashMap<String, Arc<Mutex<StreamFile>>>>,
  /// Streams whose file failed to open; further samples for them are
  /// counted as errors and dropped without retrying the open.
  disabled: std::sync::Mutex<HashSet<String>>,
  write_errors: AtomicU64,
}

struct RecorderState {
  active: Option<Arc<ActiveSession>>,
  last_manifest: Option<SessionManifest>,
}

pub struct DataRecorder {
  data_root: PathBuf,
  state: Mutex<RecorderState>,
}

impl DataRecorder {
  pub fn new(data_root: PathBuf) -> Self {
    Self {
      data_root,
      state: Mutex::new(RecorderState {
        active: None,
        last_manifest: None,
      }),
    }
  }

  pub async fn is_recording(&self) -> bool {
    self.state.lock().await.active.is_some()
  }

  pub async fn current_session(&self) -> Option<String> {
    self
      .state
      .lock()
      .await
      .active
      .as_ref()
      .map(|s| s.session_name.clone())
  }

  /// Create the session directory and activate recording. The name defaults
  /// to a timestamp; anything outside `[A-Za-z0-9_-]` is replaced before it
  /// becomes a path component.
  pub async fn start_recording(
    &self,
    session_name: Option<String>,
    format: RecordingFormat,
    device: Option<DeviceInfo>,
  ) -> Result<String, RecordError> {
    let mut state = self.state.lock().await;
    if state.active.is_some() {
      return Err(RecordError::SessionAlreadyActive);
    }
    let raw_name = session_name.unwrap_or_else(|| {
      chrono::Local::now()
        .format("session_%Y%m%d_%H%M%S")
        .to_string()
    });
    let session_name = sanitize_for_filename(&raw_name);
    let directory = self.data_root.join(&session_name);
    tokio::fs::create_dir_all(&directory).await.map_err(|e| {
      RecordError::SessionDirectory(directory.to_string_lossy().into_owned(), e.to_string())
    })?;
    info!("Recording session {} started at {:?}", session_name, directory);
    state.active = Some(Arc::new(ActiveSession {
      session_name: session_name.clone(),
      directory,
      format,
      start_time: util::unix_now(),
      device,
      files: Mutex::new(HashMap::new()),
      disabled: std::sync::Mutex::new(HashSet::new()),
      write_errors: AtomicU64::new(0),
    }));
    Ok(session_name)
  }

  /// Append one serialized sample to the stream named `data_type`
  /// (e.g. `01-23-45-67-89-AB_eeg_raw`). A no-op when no session is active.
  pub async fn add_data<T: Serialize>(&self, data_type: &str, sample: &T) {
    let session = {
      let state = self.state.lock().await;
      match &state.active {
        Some(session) => session.clone(),
        None => return,
      }
    };
    session.append(data_type, sample).await;
  }

  /// Manifests of every completed session under the data root, newest
  /// first by start time. Directories without a readable `meta.json`
  /// (crashed or foreign) are skipped.
  pub async fn list_sessions(&self) -> Vec<SessionManifest> {
    let mut sessions = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(&self.data_root).await else {
      return sessions;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
      let meta_path = entry.path().join("meta.json");
      let Ok(contents) = tokio::fs::read_to_string(&meta_path).await else {
        continue;
      };
      match serde_json::from_str::<SessionManifest>(&contents) {
        Ok(manifest) => sessions.push(manifest),
        Err(e) => debug!("Skipping unreadable manifest {:?}: {}", meta_path, e),
      }
    }
    sessions.sort_by(|a, b| {
      b.start_time
        .partial_cmp(&a.start_time)
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    sessions
  }

  /// Close every stream file, write `meta.json` and return the manifest.
  /// Calling stop with no active session returns the previous manifest
  /// unchanged.
  pub async fn stop_recording(&self) -> Result<SessionManifest, RecordError> {
    let mut state = self.state.lock().await;
    let session = match state.active.take() {
      Some(session) => session,
      None => {
        return state
          .last_manifest
          .clone()
          .ok_or(RecordError::NoActiveSession);
      }
    };
    let manifest = session.finalize().await?;
    info!(
      "Recording session {} stopped: {} files, {} bytes",
      manifest.session_name,
      manifest.files.len(),
      manifest.total_size
    );
    state.last_manifest = Some(manifest.clone());
    Ok(manifest)
  }
}

impl ActiveSession {
  fn extension(&self) -> &'static str {
    match self.format {
      RecordingFormat::Json => "json",
      RecordingFormat::Csv => "csv",
    }
  }

  async fn append<T: Serialize>(&self, data_type: &str, sample: &T) {
    if self
      .disabled
      .lock()
      .expect("Disabled-set lock poisoned")
      .contains(data_type)
    {
      self.write_errors.fetch_add(1, Ordering::Relaxed);
      return;
    }
    let handle = match self.open_or_get(data_type).await {
      Some(handle) => handle,
      None => return,
    };
    let mut stream = handle.lock().await;
    let payload = match self.render(sample, stream.samples == 0) {
      Ok(payload) => payload,
      Err(e) => {
        warn!("Could not serialize sample for {}: {}", data_type, e);
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        return;
      }
    };
    match stream.file.write_all(payload.as_bytes()).await {
      Ok(()) => {
        stream.bytes_written += payload.len() as u64;
        stream.samples += 1;
      }
      Err(e) => {
        warn!("Write to {} failed: {}", data_type, e);
        self.write_errors.fetch_add(1, Ordering::Relaxed);
      }
    }
  }

  async fn open_or_get(&self, data_type: &str) -> Option<Arc<Mutex<StreamFile>>> {
    let mut files = self.files.lock().await;
    if let Some(handle) = files.get(data_type) {
      return Some(handle.clone());
    }
    let path = self
      .directory
      .join(format!("{}.{}", sanitize_for_filename(data_type), self.extension()));
    match tokio::fs::File::create(&path).await {
      Ok(mut file) => {
        if self.format == RecordingFormat::Json {
          if let Err(e) = file.write_all(b"[").await {
            error!("Could not start array in {:?}: {}", path, e);
            self
              .disabled
              .lock()
              .expect("Disabled-set lock poisoned")
              .insert(data_type.to_owned());
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            return None;
          }
        }
        let handle = Arc::new(Mutex::new(StreamFile {
          file,
          bytes_written: 1,
          samples: 0,
        }));
        files.insert(data_type.to_owned(), handle.clone());
        Some(handle)
      }
      Err(e) => {
        // Recording for this stream is disabled; everything else continues.
        error!("Could not open {:?}, disabling stream {}: {}", path, data_type, e);
        self
          .disabled
          .lock()
          .expect("Disabled-set lock poisoned")
          .insert(data_type.to_owned());
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  fn render<T: Serialize>(&self, sample: &T, first: bool) -> Result<String, serde_json::Error> {
    match self.format {
      RecordingFormat::Json => {
        let body = serde_json::to_string(sample)?;
        Ok(if first { body } else { format!(",\n{}", body) })
      }
      RecordingFormat::Csv => {
        let value = serde_json::to_value(sample)?;
        let row = match &value {
          serde_json::Value::Object(map) => {
            let cells: Vec<String> = map.values().map(csv_cell).collect();
            cells.join(",")
          }
          other => csv_cell(other),
        };
        if first {
          if let serde_json::Value::Object(map) = &value {
            let header: Vec<&str> = map.keys().map(String::as_str).collect();
            return Ok(format!("{}\n{}\n", header.join(","), row));
          }
        }
        Ok(format!("{}\n", row))
      }
    }
  }

  async fn finalize(&self) -> Result<SessionManifest, RecordError> {
    let end_time = util::unix_now();
    let mut entries = BTreeMap::new();
    let mut total_size = 0u64;
    let files = self.files.lock().await;
    for (data_type, handle) in files.iter() {
      let mut stream = handle.lock().await;
      if self.format == RecordingFormat::Json {
        if let Err(e) = stream.file.write_all(b"]").await {
          warn!("Could not close array for {}: {}", data_type, e);
          self.write_errors.fetch_add(1, Ordering::Relaxed);
        } else {
          stream.bytes_written += 1;
        }
      }
      if let Err(e) = stream.file.flush().await {
        warn!("Could not flush {}: {}", data_type, e);
      }
      total_size += stream.bytes_written;
      entries.insert(
        format!("{}.{}", data_type, self.extension()),
        FileEntry {
          size_bytes: stream.bytes_written,
          samples: stream.samples,
        },
      );
    }
    let manifest = SessionManifest {
      session_name: self.session_name.clone(),
      start_time: self.start_time,
      end_time,
      duration: end_time - self.start_time,
      device: self.device.clone(),
      files: entries,
      total_size,
      write_errors: self.write_errors.load(Ordering::Relaxed),
    };
    let meta_path = self.directory.join("meta.json");
    let contents = serde_json::to_string_pretty(&manifest)
      .expect("Manifest always serializes");
    tokio::fs::write(&meta_path, contents).await.map_err(|e| {
      RecordError::WriteFailed(meta_path.to_string_lossy().into_owned(), e.to_string())
    })?;
    Ok(manifest)
  }
}

fn csv_cell(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
      // Nested series are embedded as quoted JSON.
      format!("\"{}\"", value.to_string().replace('"', "\"\""))
    }
    other => other.to_string(),
  }
}
