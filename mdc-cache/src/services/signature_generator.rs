//! Partial content signatures
//!
//! Identifies identical source files regardless of name or location, at a cost that does
//! not grow with file size.
//!
//! **Algorithm:**
//! 1. Read the head window: first `min(64 KiB, size)` bytes
//! 2. Read the tail window: last `min(64 KiB, size)` bytes (overlaps the head for files
//!    under 128 KiB; the size term keeps signatures distinct)
//! 3. SHA-256 over head ‖ tail ‖ size as 8 bytes big-endian
//! 4. Hex-encode the digest

use crate::error::FileAccessError;
use crate::models::ContentSignature;
use crate::services::byte_source::ByteSource;
use sha2::{Digest, Sha256};

/// Size of each sampled window
pub const WINDOW_SIZE: u64 = 64 * 1024;

/// Compute the partial content signature of `source`
///
/// Exactly two bounded reads are issued regardless of total size. Read failures are
/// returned as-is; nothing is retried here.
pub async fn compute_signature(source: &dyn ByteSource) -> Result<ContentSignature, FileAccessError> {
    let file_size = source.size().await?;
    let window = WINDOW_SIZE.min(file_size);

    tracing::debug!(
        file = %source.name(),
        file_size,
        window,
        "Computing partial signature"
    );

    let head = source.read_range(0, window).await?;
    let tail = source.read_range(file_size - window, window).await?;

    let partial_hash = hash_windows(&head, &tail, file_size);

    tracing::debug!(
        file = %source.name(),
        hash = %partial_hash,
        "Computed partial signature"
    );

    Ok(ContentSignature {
        partial_hash,
        file_size,
        file_name: source.name().to_string(),
        generated_at: mdc_common::time::now(),
    })
}

/// Hash of the two windows and the size, hex-encoded
pub fn hash_windows(head: &[u8], tail: &[u8], file_size: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(head);
    hasher.update(tail);
    hasher.update(file_size.to_be_bytes());
    format!("{:x}", hasher.finalize())
}
