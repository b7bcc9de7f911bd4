//! Scripted UI collaborator

use mdc_cache::services::{BatchSnapshot, DecisionMapping};
use mdc_cache::{DuplicateChoice, DuplicateItem, DuplicateResolver};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(5);

/// Wait for a pending batch and answer every item with `choice`
pub async fn answer_batch(resolver: &DuplicateResolver, choice: DuplicateChoice) -> BatchSnapshot {
    let snapshot = loop {
        if let Some(snapshot) = resolver.pending_batch() {
            break snapshot;
        }
        tokio::time::sleep(POLL).await;
    };

    let mapping: DecisionMapping = snapshot
        .duplicates
        .iter()
        .map(|item| (item.id, choice))
        .collect();
    resolver.resolve_batch(mapping).unwrap();
    snapshot
}

/// Wait for a pending single duplicate and answer it with `choice`
pub async fn answer_single(resolver: &DuplicateResolver, choice: DuplicateChoice) -> DuplicateItem {
    while resolver.pending_single().is_none() {
        tokio::time::sleep(POLL).await;
    }
    resolver.resolve_single(choice).unwrap()
}
