//! Cache and duplicate-detection services

pub mod byte_source;
pub mod cache_key;
pub mod derivative_service;
pub mod duplicate_resolver;
pub mod generation_cache;
pub mod import_coordinator;
pub mod media_library;
pub mod signature_generator;

pub use byte_source::{bare_file_name, ByteSource, FileSource, MemorySource};
pub use cache_key::{normalize, CacheKey};
pub use derivative_service::{DerivativeGenerator, DerivativeService};
pub use duplicate_resolver::{BatchSnapshot, DecisionMapping, DuplicateResolver};
pub use generation_cache::{CacheEntryInfo, CacheSettings, CacheStats, GenerationCache};
pub use import_coordinator::{ImportCoordinator, ImportOutcome};
pub use media_library::{InMemoryLibrary, MediaLibrary};
pub use signature_generator::{compute_signature, hash_windows, WINDOW_SIZE};
