//! # Waypoint store
//!
//! Persistence of [`WaypointSequence`]s. The encoding and the storage location are separate
//! seams: a [`WaypointSerializer`] turns a sequence into bytes and back, and a
//! [`WaypointMedium`] holds those bytes.
//!
//! The default pairing is [`JsonSerializer`] over a [`FileMedium`], which writes a file of the
//! form
//!
//! ```json
//! {
//!   "waypoints": [
//!     { "x": 1.0, "y": 0.0, "z": 2.5, "status": "success", "timestamp": "2024-03-09T14:05:07" }
//!   ]
//! }
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::NaiveDateTime;
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{Waypoint, WaypointSequence, WaypointStatus, TIMESTAMP_FORMAT};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Converts waypoint sequences to and from bytes.
pub trait WaypointSerializer {
    fn serialize(&self, sequence: &WaypointSequence) -> Result<Vec<u8>, StoreError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<WaypointSequence, StoreError>;
}

/// Somewhere serialized waypoints can be kept.
pub trait WaypointMedium {
    /// Read the stored bytes, failing with [`StoreError::NotFound`] if nothing has been stored.
    fn read(&self) -> Result<Vec<u8>, StoreError>;

    /// Replace the stored bytes. Either all of `bytes` is stored or the previous contents are
    /// left untouched.
    fn replace(&mut self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Human readable name of the location, used in logs and errors.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Loads and saves waypoint sequences.
pub struct WaypointStore {
    medium: Box<dyn WaypointMedium + Send>,
    serializer: Box<dyn WaypointSerializer + Send>,
}

/// Pretty printed JSON encoding with a stable field order.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

/// A file on disk, replaced atomically via a temporary file in the same directory.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

/// In-memory medium. Clones share the same contents, so a clone kept aside can observe what a
/// store writes.
#[derive(Debug, Default, Clone)]
pub struct MemMedium {
    contents: Arc<Mutex<Option<Vec<u8>>>>,
}

#[derive(Serialize, Deserialize)]
struct WaypointFile {
    waypoints: Vec<WaypointRecord>,
}

#[derive(Serialize, Deserialize)]
struct WaypointRecord {
    x: f64,
    y: f64,
    z: f64,
    status: WaypointStatus,
    #[serde(with = "timestamp_format")]
    timestamp: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No waypoints found at {0}")]
    NotFound(String),

    #[error("Could not read waypoints from {0}: {1}")]
    ReadError(String, io::Error),

    #[error("Could not write waypoints to {0}: {1}")]
    WriteError(String, io::Error),

    #[error("Could not parse waypoints: {0}")]
    ParseError(String),

    #[error("Could not serialize waypoints: {0}")]
    SerializeError(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WaypointStore {
    pub fn new(
        medium: Box<dyn WaypointMedium + Send>,
        serializer: Box<dyn WaypointSerializer + Send>,
    ) -> Self {
        Self { medium, serializer }
    }

    /// JSON waypoints kept in the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::new(
            Box::new(FileMedium::new(path)),
            Box::new(JsonSerializer),
        )
    }

    /// Load the stored sequence. An empty sequence is a valid result, a missing or malformed
    /// store is not.
    pub fn load(&self) -> Result<WaypointSequence, StoreError> {
        let bytes = self.medium.read()?;
        let sequence = self.serializer.deserialize(&bytes)?;

        debug!(
            "Loaded {} waypoints from {}",
            sequence.len(),
            self.medium.describe()
        );

        Ok(sequence)
    }

    /// Overwrite the stored sequence.
    pub fn save(&mut self, sequence: &WaypointSequence) -> Result<(), StoreError> {
        let bytes = self.serializer.serialize(sequence)?;
        self.medium.replace(&bytes)?;

        debug!(
            "Saved {} waypoints to {}",
            sequence.len(),
            self.medium.describe()
        );

        Ok(())
    }

    pub fn location(&self) -> String {
        self.medium.describe()
    }
}

impl WaypointSerializer for JsonSerializer {
    fn serialize(&self, sequence: &WaypointSequence) -> Result<Vec<u8>, StoreError> {
        // JSON has no representation for these, they would be written as null
        if let Some((i, w)) = sequence
            .iter()
            .enumerate()
            .find(|(_, w)| w.position_m.iter().any(|c| !c.is_finite()))
        {
            return Err(StoreError::SerializeError(format!(
                "waypoint {} has a non-finite position {:?}",
                i, w.position_m
            )));
        }

        let file = WaypointFile {
            waypoints: sequence
                .iter()
                .map(|w| WaypointRecord {
                    x: w.position_m.x,
                    y: w.position_m.y,
                    z: w.position_m.z,
                    status: w.status,
                    timestamp: w.recorded_at,
                })
                .collect(),
        };

        serde_json::to_vec_pretty(&file).map_err(|e| StoreError::SerializeError(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<WaypointSequence, StoreError> {
        let file: WaypointFile =
            serde_json::from_slice(bytes).map_err(|e| StoreError::ParseError(e.to_string()))?;

        Ok(file
            .waypoints
            .into_iter()
            .map(|r| Waypoint {
                position_m: Vector3::new(r.x, r.y, r.z),
                status: r.status,
                recorded_at: r.timestamp,
            })
            .collect())
    }
}

impl FileMedium {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("waypoints"));

        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}

impl WaypointMedium for FileMedium {
    fn read(&self) -> Result<Vec<u8>, StoreError> {
        match fs::read(&self.path) {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(self.describe())),
            Err(e) => Err(StoreError::ReadError(self.describe(), e)),
        }
    }

    fn replace(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::WriteError(self.describe(), e))?;
            }
        }

        let temp_path = self.temp_path();

        let written = File::create(&temp_path).and_then(|mut f| {
            f.write_all(bytes)?;
            f.flush()?;
            f.sync_all()
        });

        if let Err(e) = written {
            // The target has not been touched yet, only the temp file needs cleaning up
            fs::remove_file(&temp_path).ok();
            return Err(StoreError::WriteError(self.describe(), e));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            fs::remove_file(&temp_path).ok();
            StoreError::WriteError(self.describe(), e)
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl MemMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// A medium which already holds `bytes`.
    pub fn with_contents(bytes: &[u8]) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(bytes.to_vec()))),
        }
    }

    /// Copy of the stored bytes, if any.
    pub fn contents(&self) -> Option<Vec<u8>> {
        match self.contents.lock() {
            Ok(c) => c.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

impl WaypointMedium for MemMedium {
    fn read(&self) -> Result<Vec<u8>, StoreError> {
        self.contents()
            .ok_or_else(|| StoreError::NotFound(self.describe()))
    }

    fn replace(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let mut contents = match self.contents.lock() {
            Ok(c) => c,
            Err(p) => p.into_inner(),
        };
        *contents = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        String::from("<memory>")
    }
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&t.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn sample_sequence() -> WaypointSequence {
        let t = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();

        vec![
            Waypoint::record(Vector3::new(0.0, 0.0, 0.0), WaypointStatus::Success, t),
            Waypoint::record(
                Vector3::new(5.123456789012345, -0.1, 1e-7),
                WaypointStatus::Failure,
                t + chrono::Duration::seconds(3),
            ),
            Waypoint::record(Vector3::new(-2.5, 0.3, 7.0 / 3.0), WaypointStatus::Success, t),
        ]
        .into()
    }

    #[test]
    fn test_mem_round_trip() {
        let mem = MemMedium::new();
        let mut store = WaypointStore::new(Box::new(mem.clone()), Box::new(JsonSerializer));

        let seq = sample_sequence();
        store.save(&seq).unwrap();

        assert!(mem.contents().is_some());
        assert_eq!(store.load().unwrap(), seq);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("waypoints.json");
        let mut store = WaypointStore::from_path(&path);

        let seq = sample_sequence();
        store.save(&seq).unwrap();
        assert_eq!(store.load().unwrap(), seq);

        // Saving again replaces rather than appends
        let shorter: WaypointSequence = seq.iter().take(1).copied().collect();
        store.save(&shorter).unwrap();
        assert_eq!(store.load().unwrap(), shorter);

        // No temporary files left behind
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("waypoints.json")]);
    }

    #[test]
    fn test_file_format() {
        let bytes = JsonSerializer.serialize(&sample_sequence()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let first = &value["waypoints"][1];
        assert_eq!(first["status"], "failure");
        assert_eq!(first["timestamp"], "2024-03-09T14:05:10");
        assert_eq!(first["x"], 5.123456789012345);

        // Stable field order
        let x = text.find("\"x\"").unwrap();
        let status = text.find("\"status\"").unwrap();
        let timestamp = text.find("\"timestamp\"").unwrap();
        assert!(x < status && status < timestamp);
    }

    #[test]
    fn test_empty_is_valid() {
        let mut store = WaypointStore::new(Box::new(MemMedium::new()), Box::new(JsonSerializer));
        store.save(&WaypointSequence::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = WaypointStore::from_path(dir.path().join("missing.json"));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));

        let store = WaypointStore::new(Box::new(MemMedium::new()), Box::new(JsonSerializer));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let store = WaypointStore::new(
            Box::new(MemMedium::with_contents(b"{\"waypoints\": [ {\"x\": 1.0 } ]}")),
            Box::new(JsonSerializer),
        );
        assert!(matches!(store.load(), Err(StoreError::ParseError(_))));

        let store = WaypointStore::new(
            Box::new(MemMedium::with_contents(b"not json")),
            Box::new(JsonSerializer),
        );
        assert!(matches!(store.load(), Err(StoreError::ParseError(_))));
    }

    #[test]
    fn test_non_finite_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoints.json");
        let mut store = WaypointStore::from_path(&path);

        let seq = sample_sequence();
        store.save(&seq).unwrap();
        let before = fs::read(&path).unwrap();

        let t = seq.get(0).unwrap().recorded_at;
        for bad in &[f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let mut bad_seq = seq.clone();
            bad_seq.push(Waypoint::record(
                Vector3::new(*bad, 0.0, 0.0),
                WaypointStatus::Success,
                t,
            ));

            assert!(matches!(
                store.save(&bad_seq),
                Err(StoreError::SerializeError(_))
            ));
        }

        // The good file is untouched and still loads
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.load().unwrap(), seq);
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoints.json");
        let mut store = WaypointStore::from_path(&path);

        let seq = sample_sequence();
        store.save(&seq).unwrap();
        let before = fs::read(&path).unwrap();

        // Occupy the temporary file's name with a directory so creating it fails
        let medium = FileMedium::new(&path);
        fs::create_dir(medium.temp_path()).unwrap();

        let err = store.save(&WaypointSequence::new());
        assert!(matches!(err, Err(StoreError::WriteError(_, _))));

        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.load().unwrap(), seq);
    }
}
