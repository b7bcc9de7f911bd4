//! Derivative generator double

use async_trait::async_trait;
use mdc_cache::{ArtifactDescriptor, DerivativeGenerator, GenerationError, GenerationParams};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Generator that counts calls, can be slowed down and can be told to fail
#[derive(Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
    delay: Duration,
    failure: Mutex<Option<GenerationError>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every generation takes `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fail every subsequent generation with `error`
    pub fn fail_with(&self, error: GenerationError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Let subsequent generations succeed again
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DerivativeGenerator for MockGenerator {
    async fn generate(&self, params: &GenerationParams) -> Result<ArtifactDescriptor, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        let count = if params.interval > 0.0 {
            (params.duration / params.interval).ceil() as usize
        } else {
            1
        };
        Ok(ArtifactDescriptor {
            kind: params.kind,
            urls: (0..count.min(4))
                .map(|i| format!("blob:{}/{}/{}", params.source, call, i))
                .collect(),
            width: params.width,
            height: params.height,
            count,
            duration: params.duration,
        })
    }
}
