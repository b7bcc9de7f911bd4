//! Test helper modules for mdc-cache integration tests
//!
//! - MockGenerator: counting, delayable, optionally failing derivative generator
//! - Media content builders (in-memory and on-disk)
//! - Scripted UI answers for duplicate decisions

#![allow(dead_code)]

pub mod media;
pub mod mock_generator;
pub mod ui;

pub use media::{media_bytes, MediaDir};
pub use mock_generator::MockGenerator;
pub use ui::{answer_batch, answer_single};
