//! Duplicate resolution workflow
//!
//! Detects imports whose content already exists in the media library and hands the
//! decision of what to do about them to an external UI collaborator.
//!
//! **Per item:** Detected → Presented → Resolved(choice)
//! **Per batch:** Empty → Collecting → AwaitingDecision → Resolved
//!
//! The import side awaits [`DuplicateResolver::present_duplicate`] or
//! [`DuplicateResolver::present_batch`]; the UI side reads
//! [`DuplicateResolver::pending_single`] / [`DuplicateResolver::pending_batch`] (or
//! listens for `DuplicatesDetected` events) and answers with `resolve_single` /
//! `resolve_batch`. Each pending decision holds exactly one response sender, taken on
//! resolution, so a decision can never be delivered twice.
//!
//! The workflow only produces decisions; enacting them is the caller's job.

use crate::error::DecisionError;
use crate::models::{ContentSignature, DuplicateChoice, DuplicateItem, MediaRef};
use crate::services::byte_source::ByteSource;
use crate::services::media_library::MediaLibrary;
use mdc_common::config::DuplicateConfig;
use mdc_common::events::{EventBus, MdcEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Complete decision for a batch: one choice per presented item id
pub type DecisionMapping = HashMap<Uuid, DuplicateChoice>;

/// A single duplicate awaiting its decision
struct PendingSingle {
    item: DuplicateItem,
    respond: oneshot::Sender<DuplicateChoice>,
}

/// A batch of duplicates awaiting one complete decision
struct BatchDuplicateDetectionState {
    batch_id: Uuid,
    show: bool,
    duplicates: Vec<DuplicateItem>,
    pending_resolve: Option<oneshot::Sender<DecisionMapping>>,
}

/// What the UI collaborator sees of a pending batch
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub show: bool,
    pub duplicates: Vec<DuplicateItem>,
}

/// Duplicate detection and decision round-trips
pub struct DuplicateResolver {
    library: Arc<dyn MediaLibrary>,
    single: Mutex<Option<PendingSingle>>,
    batch: Mutex<Option<BatchDuplicateDetectionState>>,
    decision_timeout: Option<Duration>,
    events: Option<EventBus>,
}

fn lock<S>(slot: &Mutex<S>) -> MutexGuard<'_, S> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DuplicateResolver {
    /// Resolver that waits indefinitely for decisions
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            single: Mutex::new(None),
            batch: Mutex::new(None),
            decision_timeout: None,
            events: None,
        }
    }

    /// Resolver with the configured decision timeout policy
    pub fn from_config(library: Arc<dyn MediaLibrary>, config: &DuplicateConfig) -> Self {
        Self::new(library).with_decision_timeout(config.decision_timeout_ms.map(mdc_common::time::millis_to_duration))
    }

    /// Give up on a decision after `timeout` (None = wait indefinitely)
    pub fn with_decision_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.decision_timeout = timeout;
        self
    }

    /// Announce pending and resolved decisions on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn library(&self) -> &Arc<dyn MediaLibrary> {
        &self.library
    }

    /// Existing media with the same content, if any
    ///
    /// Equality is partial hash AND file size.
    pub async fn find_duplicate(&self, signature: &ContentSignature) -> Option<MediaRef> {
        self.library.find_by_signature(signature).await
    }

    // ------------------------------------------------------------------------
    // Single-item path
    // ------------------------------------------------------------------------

    /// Present one duplicate and wait for the UI's choice
    pub async fn present_duplicate(
        &self,
        existing: MediaRef,
        pending: Arc<dyn ByteSource>,
        signature: ContentSignature,
    ) -> Result<DuplicateChoice, DecisionError> {
        let item = DuplicateItem::new(pending, existing, signature);
        let item_id = item.id;
        let (tx, rx) = oneshot::channel();

        {
            let mut slot = lock(&self.single);
            if slot.is_some() {
                return Err(DecisionError::DecisionPending);
            }
            *slot = Some(PendingSingle { item, respond: tx });
        }

        info!(item_id = %item_id, "Duplicate presented, awaiting decision");
        self.emit(MdcEvent::DuplicatesDetected {
            item_ids: vec![item_id],
            batch: false,
            timestamp: mdc_common::time::now(),
        });

        self.await_decision(rx, || {
            let mut slot = lock(&self.single);
            if slot.as_ref().is_some_and(|p| p.item.id == item_id) {
                *slot = None;
            }
        })
        .await
    }

    /// The single duplicate currently awaiting a decision
    pub fn pending_single(&self) -> Option<DuplicateItem> {
        lock(&self.single).as_ref().map(|p| p.item.clone())
    }

    /// Deliver the UI's choice for the pending single duplicate
    ///
    /// Returns the item with its choice set.
    pub fn resolve_single(&self, choice: DuplicateChoice) -> Result<DuplicateItem, DecisionError> {
        let pending = lock(&self.single)
            .take()
            .ok_or(DecisionError::NoPendingDecision)?;

        let mut item = pending.item;
        item.choice = Some(choice);

        if pending.respond.send(choice).is_err() {
            warn!(item_id = %item.id, "Duplicate decision arrived after the caller stopped waiting");
            return Err(DecisionError::Abandoned);
        }

        debug!(item_id = %item.id, ?choice, "Duplicate resolved");
        self.emit(MdcEvent::DuplicatesResolved {
            item_ids: vec![item.id],
            timestamp: mdc_common::time::now(),
        });
        Ok(item)
    }

    // ------------------------------------------------------------------------
    // Batch path
    // ------------------------------------------------------------------------

    /// Present every duplicate of a batch import and wait for one complete decision
    ///
    /// An empty batch resolves immediately with an empty mapping.
    pub async fn present_batch(
        &self,
        duplicates: Vec<DuplicateItem>,
    ) -> Result<DecisionMapping, DecisionError> {
        if duplicates.is_empty() {
            return Ok(DecisionMapping::new());
        }

        let batch_id = Uuid::new_v4();
        let item_ids: Vec<Uuid> = duplicates.iter().map(|d| d.id).collect();
        let (tx, rx) = oneshot::channel();

        {
            let mut slot = lock(&self.batch);
            if slot.is_some() {
                return Err(DecisionError::DecisionPending);
            }
            *slot = Some(BatchDuplicateDetectionState {
                batch_id,
                show: true,
                duplicates,
                pending_resolve: Some(tx),
            });
        }

        info!(
            batch_id = %batch_id,
            count = item_ids.len(),
            "Duplicate batch presented, awaiting decision"
        );
        self.emit(MdcEvent::DuplicatesDetected {
            item_ids,
            batch: true,
            timestamp: mdc_common::time::now(),
        });

        self.await_decision(rx, || {
            let mut slot = lock(&self.batch);
            if slot.as_ref().is_some_and(|b| b.batch_id == batch_id) {
                *slot = None;
            }
        })
        .await
    }

    /// The batch currently awaiting a decision
    pub fn pending_batch(&self) -> Option<BatchSnapshot> {
        lock(&self.batch).as_ref().map(|b| BatchSnapshot {
            show: b.show,
            duplicates: b.duplicates.clone(),
        })
    }

    /// Deliver the UI's complete decision for the pending batch
    ///
    /// The mapping must name every presented item and nothing else. A rejected mapping
    /// leaves the batch pending so the UI can try again. Returns the items with their
    /// choices set, in presentation order.
    pub fn resolve_batch(&self, mapping: DecisionMapping) -> Result<Vec<DuplicateItem>, DecisionError> {
        let mut slot = lock(&self.batch);
        let state = slot.as_ref().ok_or(DecisionError::NoPendingDecision)?;

        let presented: HashSet<Uuid> = state.duplicates.iter().map(|d| d.id).collect();

        let missing: Vec<Uuid> = state
            .duplicates
            .iter()
            .map(|d| d.id)
            .filter(|id| !mapping.contains_key(id))
            .collect();
        if !missing.is_empty() {
            warn!(missing = missing.len(), "Rejected incomplete duplicate decision");
            return Err(DecisionError::Incomplete { missing });
        }

        let unknown: Vec<Uuid> = mapping
            .keys()
            .filter(|id| !presented.contains(id))
            .copied()
            .collect();
        if !unknown.is_empty() {
            warn!(unknown = unknown.len(), "Rejected duplicate decision naming unknown items");
            return Err(DecisionError::UnknownItems { unknown });
        }

        let mut state = slot.take().ok_or(DecisionError::NoPendingDecision)?;
        drop(slot);

        state.show = false;
        for item in &mut state.duplicates {
            item.choice = mapping.get(&item.id).copied();
        }

        let sender = state
            .pending_resolve
            .take()
            .ok_or(DecisionError::NoPendingDecision)?;
        if sender.send(mapping).is_err() {
            warn!(batch_id = %state.batch_id, "Batch decision arrived after the caller stopped waiting");
            return Err(DecisionError::Abandoned);
        }

        debug!(batch_id = %state.batch_id, count = state.duplicates.len(), "Duplicate batch resolved");
        self.emit(MdcEvent::DuplicatesResolved {
            item_ids: state.duplicates.iter().map(|d| d.id).collect(),
            timestamp: mdc_common::time::now(),
        });
        Ok(state.duplicates)
    }

    /// Drop every pending decision; waiting callers observe `Abandoned`
    ///
    /// Returns how many decisions (single and batch) were dropped.
    pub fn dismiss_all(&self) -> usize {
        let single = lock(&self.single).take();
        let batch = lock(&self.batch).take();
        let dismissed = usize::from(single.is_some()) + usize::from(batch.is_some());
        if dismissed > 0 {
            info!(dismissed, "Dismissed pending duplicate decisions");
        }
        dismissed
    }

    /// Wait on `rx`, honoring the decision timeout; `on_timeout` clears our pending state
    async fn await_decision<R>(
        &self,
        rx: oneshot::Receiver<R>,
        on_timeout: impl FnOnce(),
    ) -> Result<R, DecisionError> {
        match self.decision_timeout {
            None => rx.await.map_err(|_| DecisionError::Abandoned),
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received.map_err(|_| DecisionError::Abandoned),
                Err(_) => {
                    on_timeout();
                    let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    warn!(waited_ms, "Duplicate decision timed out");
                    Err(DecisionError::TimedOut { waited_ms })
                }
            },
        }
    }

    fn emit(&self, event: MdcEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}
