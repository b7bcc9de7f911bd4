//! # mdc-cache
//!
//! Content-addressed derivative cache with duplicate-source detection.
//!
//! - Partial content signatures ([`services::signature_generator`]) identify identical
//!   source files by a bounded head/tail sample.
//! - [`GenerationCache`] generates each derivative at most once per normalized
//!   [`CacheKey`], coalescing concurrent requests and evicting least-recently-used entries.
//! - [`DuplicateResolver`] hands detected duplicates to a UI collaborator and collects
//!   one decision per item (or one complete decision per batch).

pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{DecisionError, Error, FileAccessError, GenerationError, Result};
pub use crate::models::{
    ArtifactDescriptor, ContentSignature, DerivativeKind, DuplicateChoice, DuplicateItem,
    GenerationParams, MediaRef,
};
pub use crate::services::{
    compute_signature, normalize, ByteSource, CacheKey, CacheSettings, DerivativeGenerator,
    DerivativeService, DuplicateResolver, FileSource, GenerationCache, ImportCoordinator,
    ImportOutcome, InMemoryLibrary, MediaLibrary, MemorySource,
};
