use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::PersistenceError;

/// Trajectory identifier; also the file/directory stem on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrajId(String);

impl TrajId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrajId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for TrajId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Source of fresh trajectory ids, injected into the trajectory buffer.
pub trait IdAllocator {
    fn next_id(&mut self) -> Result<TrajId, PersistenceError>;
}

impl<T: IdAllocator + ?Sized> IdAllocator for Box<T> {
    fn next_id(&mut self) -> Result<TrajId, PersistenceError> {
        (**self).next_id()
    }
}

/// Plain in-memory counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    next: u64,
}

impl Counter {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl IdAllocator for Counter {
    fn next_id(&mut self) -> Result<TrajId, PersistenceError> {
        let id = self.next;
        self.next += 1;
        Ok(TrajId::from(id))
    }
}

/// One greater than the largest numeric entry in `dir`.
///
/// Ids handed out earlier by the same allocator are never repeated, even if
/// nothing was written for them yet.
#[derive(Debug, Clone)]
pub struct DirectoryScan {
    dir: PathBuf,
    last_issued: Option<u64>,
}

impl DirectoryScan {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_issued: None,
        }
    }

    fn scan_max(&self) -> Result<Option<u64>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let entries =
            fs::read_dir(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        let mut max = None;
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::io(&self.dir, e))?;
            if let Some(id) = parse_numeric_stem(&entry.file_name().to_string_lossy()) {
                max = max.max(Some(id));
            }
        }
        Ok(max)
    }
}

impl IdAllocator for DirectoryScan {
    fn next_id(&mut self) -> Result<TrajId, PersistenceError> {
        let after_scan = self.scan_max()?.map_or(0, |max| max + 1);
        let after_issued = self.last_issued.map_or(0, |last| last + 1);
        let id = after_scan.max(after_issued);
        self.last_issued = Some(id);
        Ok(TrajId::from(id))
    }
}

/// Random uuid per trajectory.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueIds;

impl IdAllocator for UniqueIds {
    fn next_id(&mut self) -> Result<TrajId, PersistenceError> {
        Ok(TrajId::new(uuid::Uuid::new_v4().to_string()))
    }
}

fn parse_numeric_stem(name: &str) -> Option<u64> {
    let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
    stem.parse().ok()
}
