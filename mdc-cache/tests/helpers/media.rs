//! Media content builders

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Deterministic pseudo-random media bytes; different seeds give different content
pub fn media_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Temporary directory of media files
pub struct MediaDir {
    dir: TempDir,
}

impl MediaDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Write `bytes` to `name` inside the directory
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    /// Write `bytes` to `subdir/name`, creating `subdir` as needed
    pub fn write_in(&self, subdir: &str, name: &str, bytes: &[u8]) -> PathBuf {
        let parent = self.dir.path().join(subdir);
        fs::create_dir_all(&parent).unwrap();
        let path = parent.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    /// Path to a file that does not exist
    pub fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
