//! Data model shared by the cache services

pub mod artifact;
pub mod duplicate;
pub mod signature;

pub use artifact::{ArtifactDescriptor, DerivativeKind, GenerationParams};
pub use duplicate::{DuplicateChoice, DuplicateItem, MediaRef};
pub use signature::ContentSignature;
