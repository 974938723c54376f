//! Durable copy of the metadata map and its description export.

use crate::data::processing::descriptions_csv;
use crate::data::MetadataMap;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const METADATA_FILE: &str = "metaDataEntities.txt";
const DESCRIPTIONS_FILE: &str = "descriptions.csv";

/// Reads and writes the files kept under `{data_dir}/metadata`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    metadata_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            metadata_dir: data_dir.as_ref().join("metadata"),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.metadata_dir.join(METADATA_FILE)
    }

    pub fn descriptions_path(&self) -> PathBuf {
        self.metadata_dir.join(DESCRIPTIONS_FILE)
    }

    /// Loads the persisted metadata map.
    ///
    /// A missing file is a first boot and yields an empty map.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_metadata(&self) -> Result<MetadataMap> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(MetadataMap::new());
        }

        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overwrites the persisted metadata map.
    pub fn save_metadata(&self, metadata: &MetadataMap) -> Result<()> {
        let json = serde_json::to_string(metadata)?;
        self.write_atomic(&self.metadata_path(), json.as_bytes())
    }

    /// Writes the `coinId,description` export read by the recommendation generator.
    pub fn export_descriptions(&self, metadata: &MetadataMap) -> Result<()> {
        let csv = descriptions_csv(metadata);
        self.write_atomic(&self.descriptions_path(), csv.as_bytes())
    }

    /// Writes through a sibling temp file so readers never see a truncated file.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.metadata_dir)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
