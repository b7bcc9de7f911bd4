//! # MDC Common Library
//!
//! Shared code for the media derivative cache crates:
//! - Error type and result alias
//! - TOML configuration loading
//! - Logging bootstrap
//! - Event types (MdcEvent) and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
