use anyhow::{bail, Context, Result};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::debug;

/// Address of a staged object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLocation {
    pub bucket: String,
    pub object_name: String,
}

impl fmt::Display for StagingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object_name)
    }
}

/// Flat, named blob storage used to hand batches from the fetch side to the
/// warehouse loader.
pub trait ObjectStore: Send + Sync {
    /// Writes `data` under `object_name`, replacing any existing object.
    fn put(&self, object_name: &str, data: &[u8]) -> Result<StagingLocation>;
    fn get(&self, location: &StagingLocation) -> Result<Vec<u8>>;
}

/// Object store backed by a local directory acting as the bucket.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create staging directory {:?}", root))?;
        Ok(Self { root })
    }

    fn object_path(&self, object_name: &str) -> Result<PathBuf> {
        if object_name.is_empty()
            || object_name.contains(['/', '\\'])
            || object_name.starts_with('.')
        {
            bail!("Invalid object name {:?}", object_name);
        }
        Ok(self.root.join(object_name))
    }

    fn bucket_name(&self) -> String {
        self.root.display().to_string()
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, object_name: &str, data: &[u8]) -> Result<StagingLocation> {
        let target = self.object_path(object_name)?;

        // Same directory as the target: persist is a rename.
        let mut tmp = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("Failed to create temp file in {:?}", self.root))?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .with_context(|| format!("Failed to move staged object into {:?}", target))?;

        debug!("Staged {} bytes at {:?}", data.len(), target);
        Ok(StagingLocation {
            bucket: self.bucket_name(),
            object_name: object_name.to_string(),
        })
    }

    fn get(&self, location: &StagingLocation) -> Result<Vec<u8>> {
        if location.bucket != self.bucket_name() {
            bail!(
                "Object {} does not belong to bucket {}",
                location,
                self.bucket_name()
            );
        }
        let path = self.object_path(&location.object_name)?;
        std::fs::read(&path).with_context(|| format!("Failed to read staged object {:?}", path))
    }
}
