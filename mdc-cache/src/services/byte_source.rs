//! Ranged byte-read capability
//!
//! Signature computation only ever needs two bounded windows of a source, so sources
//! expose ranged reads instead of whole-file reads. Two kinds are provided:
//! - [`MemorySource`]: bytes already loaded in memory
//! - [`FileSource`]: a file on disk, read with seek + exact-length reads

use crate::error::FileAccessError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A source whose bytes can be read by range
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Display name (bare file name)
    fn name(&self) -> &str;

    /// Total size in bytes
    async fn size(&self) -> Result<u64, FileAccessError>;

    /// Read exactly `length` bytes starting at `offset`
    ///
    /// `offset + length` may equal the source size but never exceed it.
    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, FileAccessError>;
}

/// Bare file name of a path-like identifier
///
/// Splits on both `/` and `\` so identifiers produced on another platform collapse to the
/// same name. Returns the input unchanged when it has no separator.
pub fn bare_file_name(identifier: &str) -> &str {
    let trimmed = identifier.trim_end_matches(is_separator);
    match trimmed.rsplit(is_separator).next() {
        Some(name) if !name.is_empty() => name,
        _ => identifier,
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn check_range(name: &str, offset: u64, length: u64, size: u64) -> Result<(), FileAccessError> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(FileAccessError::OutOfRange {
            name: name.to_string(),
            offset,
            length,
            size,
        }),
    }
}

/// Already-loaded bytes
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        Self {
            name: bare_file_name(&name).to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size(&self) -> Result<u64, FileAccessError> {
        Ok(self.bytes.len() as u64)
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, FileAccessError> {
        check_range(&self.name, offset, length, self.bytes.len() as u64)?;
        // In range, so both bounds fit in usize
        let start = offset as usize;
        let end = start + length as usize;
        Ok(self.bytes[start..end].to_vec())
    }
}

/// File on disk
///
/// Every read opens the file, seeks and reads exactly the requested length on the
/// blocking pool. The file is never read in full.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size(&self) -> Result<u64, FileAccessError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|source| FileAccessError::Metadata {
                name: self.name.clone(),
                source,
            })?;
        Ok(metadata.len())
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, FileAccessError> {
        let path = self.path.clone();
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, FileAccessError> {
            use std::fs::File;
            use std::io::{Read, Seek, SeekFrom};

            let mut file = File::open(&path).map_err(|source| FileAccessError::Open {
                path: path.clone(),
                source,
            })?;

            let size = file
                .metadata()
                .map_err(|source| FileAccessError::Metadata {
                    name: name.clone(),
                    source,
                })?
                .len();
            check_range(&name, offset, length, size)?;

            let read_err = |source| FileAccessError::Read {
                name: name.clone(),
                offset,
                length,
                source,
            };

            file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
            let mut buffer = vec![0u8; length as usize];
            file.read_exact(&mut buffer).map_err(read_err)?;

            Ok(buffer)
        })
        .await
        .map_err(|e| FileAccessError::Task {
            name: self.name.clone(),
            reason: e.to_string(),
        })?
    }
}
