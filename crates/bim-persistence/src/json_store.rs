//! Stores JSON en disco para la cola de revisión y el historial de feedback.
//!
//! Cada archivo guarda un arreglo JSON con la colección completa. Cada
//! escritura va a un temporal hermano que luego se renombra sobre el destino,
//! de modo que un lector nunca ve un archivo a medio escribir. Un archivo
//! ausente o vacío equivale a una colección vacía.
use bim_confidence::{FeedbackRecord, FeedbackStore, ReviewItem, ReviewStore, StoreError};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

/// Archivo JSON con un arreglo de `T`.
#[derive(Debug)]
pub struct JsonArrayFile<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonArrayFile<T>
    where T: Serialize + DeserializeOwned
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(),
               write_lock: Mutex::new(()),
               _marker: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<T>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("json store missing, starting empty path={}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| PersistenceError::Corrupt { path: self.path.display().to_string(),
                                                                            message: e.to_string() })
    }

    pub fn write_all(&self, items: &[T]) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let body = serde_json::to_vec_pretty(items)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
        }
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
            file.write_all(&body).map_err(|e| PersistenceError::io(&tmp, e))?;
            file.sync_all().map_err(|e| PersistenceError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| PersistenceError::io(&self.path, e))?;
        debug!("json store written path={} items={}", self.path.display(), items.len());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Cola de revisión persistida en un archivo JSON.
#[derive(Debug)]
pub struct JsonFileReviewStore {
    file: JsonArrayFile<ReviewItem>,
}

impl JsonFileReviewStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let file = JsonArrayFile::new(path);
        info!("review store path={}", file.path().display());
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl ReviewStore for JsonFileReviewStore {
    fn load(&self) -> Result<Vec<ReviewItem>, StoreError> {
        Ok(self.file.read_all()?)
    }

    fn save(&self, items: &[ReviewItem]) -> Result<(), StoreError> {
        Ok(self.file.write_all(items)?)
    }
}

/// Historial de feedback persistido en un archivo JSON.
#[derive(Debug)]
pub struct JsonFileFeedbackStore {
    file: JsonArrayFile<FeedbackRecord>,
}

impl JsonFileFeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let file = JsonArrayFile::new(path);
        info!("feedback store path={}", file.path().display());
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl FeedbackStore for JsonFileFeedbackStore {
    fn load(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        Ok(self.file.read_all()?)
    }

    fn save(&self, records: &[FeedbackRecord]) -> Result<(), StoreError> {
        Ok(self.file.write_all(records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[test]
    fn missing_and_empty_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonArrayFile<Row> = JsonArrayFile::new(dir.path().join("none.json"));
        assert!(file.read_all().unwrap().is_empty());
        fs::write(dir.path().join("none.json"), "  \n").unwrap();
        assert!(file.read_all().unwrap().is_empty());
    }

    #[test]
    fn write_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/rows.json");
        let file: JsonArrayFile<Row> = JsonArrayFile::new(&path);
        file.write_all(&[Row { n: 1 }, Row { n: 2 }]).unwrap();
        assert_eq!(file.read_all().unwrap(), vec![Row { n: 1 }, Row { n: 2 }]);
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, "{not json").unwrap();
        let file: JsonArrayFile<Row> = JsonArrayFile::new(&path);
        assert!(matches!(file.read_all(), Err(PersistenceError::Corrupt { .. })));
    }
}
