//! Event types for the MDC event system
//!
//! Provides the shared event definitions and the EventBus used to notify the UI
//! collaborator about generation outcomes and pending duplicate decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// MDC event types
///
/// Events are broadcast via EventBus and can be serialized for transmission to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MdcEvent {
    /// A new generation was registered and started for a cache key
    GenerationStarted {
        /// Normalized cache key
        key: String,
        timestamp: DateTime<Utc>,
    },

    /// A generation finished successfully and its result was cached
    GenerationCompleted {
        key: String,
        /// Wall time spent inside the generator
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A generation failed; nothing was cached for the key
    ///
    /// This is the failure notification surfaced to the initiating UI action.
    GenerationFailed {
        key: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// An eviction pass removed least-recently-used entries
    CacheEvicted {
        removed: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    /// Duplicates were detected and a decision is awaited
    DuplicatesDetected {
        /// Ids of the pending duplicate items, in presentation order
        item_ids: Vec<Uuid>,
        /// True when presented as a batch
        batch: bool,
        timestamp: DateTime<Utc>,
    },

    /// A pending duplicate decision was resolved
    DuplicatesResolved {
        item_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// One import could not be read; the rest of its batch continues
    ImportFailed {
        file_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MdcEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            MdcEvent::GenerationStarted { .. } => "GenerationStarted",
            MdcEvent::GenerationCompleted { .. } => "GenerationCompleted",
            MdcEvent::GenerationFailed { .. } => "GenerationFailed",
            MdcEvent::CacheEvicted { .. } => "CacheEvicted",
            MdcEvent::DuplicatesDetected { .. } => "DuplicatesDetected",
            MdcEvent::DuplicatesResolved { .. } => "DuplicatesResolved",
            MdcEvent::ImportFailed { .. } => "ImportFailed",
        }
    }
}

/// Central event distribution bus
///
/// Cloning is cheap; all clones share one broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MdcEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers start lagging
    ///
    /// # Examples
    ///
    /// ```
    /// use mdc_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MdcEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MdcEvent) -> Result<usize, broadcast::error::SendError<MdcEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MdcEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
