use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use directories::ProjectDirs;
use log::debug;

use crate::error::StoreError;

// ------------------------------------------------------------------------------------------------
// Key-value storage persisted between sessions.
// ------------------------------------------------------------------------------------------------

const PERSISTED_STATE_FILE_PREFIX: &str = "sonytv_manager_";

/// String key-value storage owned by one managed TV.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Volatile [`KeyValueStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// [`KeyValueStore`] written through to a JSON file in the data directory.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store of the TV at `host` in `data_dir`, or in the platform data directory when
    /// `None`. Each host has its own file. A missing file is an empty store.
    pub fn open(data_dir: Option<PathBuf>, host: &str) -> Result<Self, StoreError> {
        let path = get_data_file(data_dir, host)?;

        let values = match File::open(&path) {
            Ok(mut file) => {
                let mut file_data = String::new();

                file.read_to_string(&mut file_data)
                    .map_err(|e| StoreError::Io(format!("Error reading {:?}: {:?}", &path, e)))?;

                serde_json::from_str::<BTreeMap<String, String>>(&file_data).map_err(|e| {
                    StoreError::Serialization(format!("Error reading {:?}: {:?}", &path, e))
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Could not read {:?}: {:?}",
                    &path, e
                )))
            }
        };

        Ok(FileStore { path, values })
    }

    fn write(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.values)
            .map_err(|e| StoreError::Serialization(format!("Error writing store: {:?}", e)))?;

        File::create(&self.path)
            .and_then(|mut file| file.write_all(json.as_bytes()))
            .map_err(|e| StoreError::Io(format!("Error writing {:?}: {:?}", &self.path, e)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }

        self.values.insert(key.to_string(), value);
        self.write()
    }
}

/// Get the path to the data file of `host` as a PathBuf, creating the directory if necessary.
fn get_data_file(passed_path: Option<PathBuf>, host: &str) -> Result<PathBuf, StoreError> {
    let mut dir_path_buf = match passed_path {
        Some(path) => path,
        None => match ProjectDirs::from("com", "sonytv_manager", "sonytv_manager") {
            Some(project_dirs) => project_dirs.data_dir().to_path_buf(),
            None => {
                return Err(StoreError::Io(
                    "Could not determine where to write data file: home directory unknown".into(),
                ))
            }
        },
    };

    std::fs::create_dir_all(&dir_path_buf)
        .map_err(|e| StoreError::Io(format!("Could not create data directory: {:?}", e)))?;

    dir_path_buf.push(data_file_name(host));
    debug!("Data file: {:?}", dir_path_buf);

    Ok(dir_path_buf)
}

/// File name for `host`, with everything but ASCII alphanumerics replaced (`192.168.1.50` becomes
/// `sonytv_manager_192_168_1_50.json`).
fn data_file_name(host: &str) -> String {
    let sanitized: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    format!("{}{}.json", PERSISTED_STATE_FILE_PREFIX, sanitized)
}

// ================================================================================================
// Tests
