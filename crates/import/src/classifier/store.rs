use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{ModelSnapshot, SNAPSHOT_VERSION};
use crate::error::ClassifierError;

/// File name of the snapshot inside the data directory.
pub const MODEL_FILE_NAME: &str = "model.data";

/// Where a trained model lives between runs. `load` yields `None` for a missing
/// or unreadable model so callers go through the not-trained path.
pub trait ModelStore: Send + Sync {
    fn load(&self) -> Result<Option<ModelSnapshot>, ClassifierError>;
    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ClassifierError>;
}

/// Gzip-compressed JSON in a single file, replaced atomically on save.
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(MODEL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<ModelSnapshot>, ClassifierError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoder = GzDecoder::new(BufReader::new(file));
        match serde_json::from_reader::<_, ModelSnapshot>(decoder) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Ok(Some(snapshot)),
            Ok(snapshot) => {
                tracing::warn!(
                    path = %self.path.display(),
                    version = snapshot.version,
                    "ignoring model snapshot from another version"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable model snapshot");
                Ok(None)
            }
        }
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ClassifierError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        let mut encoder = GzEncoder::new(BufWriter::new(File::create(&tmp)?), Compression::default());
        serde_json::to_writer(&mut encoder, snapshot)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps the snapshot in memory only.
#[derive(Default)]
pub struct MemoryModelStore {
    snapshot: Mutex<Option<ModelSnapshot>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> Result<Option<ModelSnapshot>, ClassifierError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ClassifierError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
