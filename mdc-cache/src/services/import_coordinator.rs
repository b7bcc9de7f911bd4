//! Import flow with duplicate detection
//!
//! **Algorithm (batch):**
//! 1. Compute each source's content signature (a read failure fails that item only)
//! 2. Look the signature up in the media library
//! 3. Unique items are recorded at once, so identical files later in the same batch are
//!    detected against them
//! 4. All duplicates of the batch go to the UI in a single decision round-trip
//! 5. Choices become outcomes, returned in input order
//!
//! The coordinator decides what happens to each file. Storing media and generating
//! derivatives for it is up to the caller.

use crate::error::Error;
use crate::models::{ContentSignature, DuplicateChoice, DuplicateItem, MediaRef};
use crate::services::byte_source::ByteSource;
use crate::services::duplicate_resolver::DuplicateResolver;
use crate::services::signature_generator::compute_signature;
use mdc_common::events::{EventBus, MdcEvent};
use std::sync::Arc;
use tracing::{info, warn};

/// What became of one imported source
#[derive(Debug)]
pub enum ImportOutcome {
    /// New media (unique content, or a duplicate the user chose to copy)
    Imported {
        media: MediaRef,
        signature: ContentSignature,
    },
    /// Duplicate discarded in favor of existing media
    ReusedExisting {
        existing: MediaRef,
        pending_name: String,
    },
    /// Duplicate discarded entirely
    Cancelled { pending_name: String },
    /// Source could not be processed
    Failed { pending_name: String, error: Error },
}

impl ImportOutcome {
    /// Name of the source this outcome is for
    ///
    /// For imported media this is the recorded name, which differs from the source name
    /// when a same-name copy was renamed.
    pub fn pending_name(&self) -> &str {
        match self {
            ImportOutcome::Imported { media, .. } => &media.name,
            ImportOutcome::ReusedExisting { pending_name, .. }
            | ImportOutcome::Cancelled { pending_name }
            | ImportOutcome::Failed { pending_name, .. } => pending_name,
        }
    }
}

pub struct ImportCoordinator {
    resolver: Arc<DuplicateResolver>,
    events: Option<EventBus>,
}

impl ImportCoordinator {
    pub fn new(resolver: Arc<DuplicateResolver>) -> Self {
        Self {
            resolver,
            events: None,
        }
    }

    /// Publish import failures on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn resolver(&self) -> &Arc<DuplicateResolver> {
        &self.resolver
    }

    /// Import one source, asking the UI about it if it is a duplicate
    pub async fn import_single(&self, source: Arc<dyn ByteSource>) -> ImportOutcome {
        let pending_name = source.name().to_string();
        let signature = match compute_signature(source.as_ref()).await {
            Ok(signature) => signature,
            Err(err) => return self.failed(pending_name, err.into()),
        };

        let Some(existing) = self.resolver.find_duplicate(&signature).await else {
            return self.record_new(pending_name, signature).await;
        };

        match self
            .resolver
            .present_duplicate(existing.clone(), source, signature.clone())
            .await
        {
            Ok(choice) => self.apply_choice(choice, pending_name, existing, signature).await,
            Err(err) => self.failed(pending_name, err.into()),
        }
    }

    /// Import a batch of sources with one decision round-trip for all duplicates
    ///
    /// Outcomes are returned in input order.
    pub async fn import_batch(&self, sources: Vec<Arc<dyn ByteSource>>) -> Vec<ImportOutcome> {
        let total = sources.len();
        let mut outcomes: Vec<Option<ImportOutcome>> = (0..total).map(|_| None).collect();
        let mut duplicates: Vec<(usize, DuplicateItem)> = Vec::new();

        for (index, source) in sources.into_iter().enumerate() {
            let pending_name = source.name().to_string();
            let signature = match compute_signature(source.as_ref()).await {
                Ok(signature) => signature,
                Err(err) => {
                    outcomes[index] = Some(self.failed(pending_name, err.into()));
                    continue;
                }
            };

            match self.resolver.find_duplicate(&signature).await {
                Some(existing) => {
                    duplicates.push((index, DuplicateItem::new(source, existing, signature)));
                }
                None => {
                    outcomes[index] = Some(self.record_new(pending_name, signature).await);
                }
            }
        }

        if !duplicates.is_empty() {
            info!(
                total,
                duplicates = duplicates.len(),
                "Batch import found duplicates"
            );
            let items = duplicates.iter().map(|(_, item)| item.clone()).collect();
            match self.resolver.present_batch(items).await {
                Ok(mapping) => {
                    for (index, item) in duplicates {
                        let choice = mapping
                            .get(&item.id)
                            .copied()
                            .unwrap_or(DuplicateChoice::Cancel);
                        outcomes[index] = Some(
                            self.apply_choice(
                                choice,
                                item.pending_file_name,
                                item.existing,
                                item.signature,
                            )
                            .await,
                        );
                    }
                }
                Err(err) => {
                    for (index, item) in duplicates {
                        outcomes[index] =
                            Some(self.failed(item.pending_file_name, err.clone().into()));
                    }
                }
            }
        }

        outcomes.into_iter().flatten().collect()
    }

    async fn apply_choice(
        &self,
        choice: DuplicateChoice,
        pending_name: String,
        existing: MediaRef,
        signature: ContentSignature,
    ) -> ImportOutcome {
        match choice {
            DuplicateChoice::UseExisting => ImportOutcome::ReusedExisting {
                existing,
                pending_name,
            },
            DuplicateChoice::ImportCopy => {
                let name = self.unique_copy_name(&pending_name, &existing.name).await;
                if name != pending_name {
                    info!(file = %pending_name, renamed = %name, "Importing copy under a new name");
                }
                self.record_new(name, signature).await
            }
            DuplicateChoice::Cancel => ImportOutcome::Cancelled { pending_name },
        }
    }

    /// Name for an imported copy that no recorded media carries yet
    ///
    /// Derivatives are keyed by bare file name, so a copy sharing its name with other
    /// media would share their cached artifacts.
    async fn unique_copy_name(&self, pending_name: &str, existing_name: &str) -> String {
        let library = self.resolver.library();
        if pending_name != existing_name && !library.name_in_use(pending_name).await {
            return pending_name.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = numbered_name(pending_name, n);
            if candidate != existing_name && !library.name_in_use(&candidate).await {
                return candidate;
            }
            n += 1;
        }
    }

    async fn record_new(&self, pending_name: String, signature: ContentSignature) -> ImportOutcome {
        let media = MediaRef::new(pending_name);
        self.resolver
            .library()
            .record(media.clone(), signature.clone())
            .await;
        ImportOutcome::Imported { media, signature }
    }

    fn failed(&self, pending_name: String, error: Error) -> ImportOutcome {
        warn!(file = %pending_name, error = %error, "Import failed");
        if let Some(events) = &self.events {
            events.emit_lossy(MdcEvent::ImportFailed {
                file_name: pending_name.clone(),
                error: error.to_string(),
                timestamp: mdc_common::time::now(),
            });
        }
        ImportOutcome::Failed {
            pending_name,
            error,
        }
    }
}

/// `clip.mp4` -> `clip (n).mp4`; names without an extension get the suffix at the end
fn numbered_name(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &name[..dot], n, &name[dot..]),
        _ => format!("{} ({})", name, n),
    }
}
