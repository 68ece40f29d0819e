//! Sequential batch captioning over an owned queue of images.
//!
//! [`BatchQueue`] is the only way to mutate the item list. [`BatchProcessor`]
//! drives one pass at a time: each item is compressed, sent, and settled
//! before the next one starts, and results come back in queue order.

use crate::client::CaptionService;
use crate::compress::{compress, CompressionOptions, EncodedPayload};
use crate::constants::PASTED_IMAGE_LABEL;
use crate::error::{CaptionError, Result};
use crate::intake::{display_name, read_image_file};
use crate::settings::{CaptionSettings, Captions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

#[derive(Debug)]
struct ImageItem {
    id: ItemId,
    source_name: String,
    // Released once a payload has been encoded
    source: Option<ImageSource>,
    encoded: Option<EncodedPayload>,
    status: ItemStatus,
    in_pass: bool,
}

/// Read-only view of a queued item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub source_name: String,
    pub status: ItemStatus,
    pub compressed: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<ImageItem>,
    running: bool,
}

impl QueueState {
    fn find_mut(&mut self, id: ItemId) -> Option<&mut ImageItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

enum PendingJob {
    Encoded(EncodedPayload),
    Raw(ImageSource),
}

/// Handle to the ordered item collection. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues in-memory image bytes. A blank name gets the pasted-image label.
    pub fn add_bytes(&self, source_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> ItemId {
        let mut source_name = source_name.into();
        if source_name.trim().is_empty() {
            source_name = PASTED_IMAGE_LABEL.to_string();
        }
        self.push(source_name, ImageSource::Bytes(bytes.into()))
    }

    /// Queues a file; it is read when its turn comes.
    pub fn add_file(&self, path: impl Into<PathBuf>) -> ItemId {
        let path = path.into();
        self.push(display_name(&path), ImageSource::File(path))
    }

    fn push(&self, source_name: String, source: ImageSource) -> ItemId {
        let id = ItemId::new();
        self.state().items.push(ImageItem {
            id,
            source_name,
            source: Some(source),
            encoded: None,
            status: ItemStatus::Pending,
            in_pass: false,
        });
        id
    }

    /// Removes an item. Items that are waiting for their turn simply drop
    /// out of the running pass; an item being processed cannot be removed.
    ///
    /// Returns `Ok(false)` when no item has that id.
    pub fn remove(&self, id: ItemId) -> Result<bool> {
        let mut state = self.state();
        let Some(index) = state.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        if state.items[index].status == ItemStatus::Processing {
            return Err(CaptionError::ItemBusy(id));
        }
        state.items.remove(index);
        Ok(true)
    }

    /// Removes every item that is not currently being processed.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let before = state.items.len();
        state
            .items
            .retain(|item| item.status == ItemStatus::Processing);
        before - state.items.len()
    }

    pub fn list(&self) -> Vec<ItemSnapshot> {
        self.state()
            .items
            .iter()
            .map(|item| ItemSnapshot {
                id: item.id,
                source_name: item.source_name.clone(),
                status: item.status,
                compressed: item.encoded.is_some(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn status_of(&self, id: ItemId) -> Option<ItemStatus> {
        self.state()
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.status)
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.state().items.iter().any(|item| item.id == id)
    }

    fn ids(&self) -> HashSet<ItemId> {
        self.state().items.iter().map(|item| item.id).collect()
    }

    /// Starts a pass: every item goes back to `Pending` and the current
    /// item ids, in order, become the pass.
    fn begin_pass(&self) -> Result<Vec<ItemId>> {
        let mut state = self.state();
        if state.running {
            return Err(CaptionError::BatchRunning);
        }
        state.running = true;
        Ok(state
            .items
            .iter_mut()
            .map(|item| {
                item.status = ItemStatus::Pending;
                item.in_pass = true;
                item.id
            })
            .collect())
    }

    fn end_pass(&self) {
        let mut state = self.state();
        state.running = false;
        for item in state.items.iter_mut() {
            item.in_pass = false;
            // Only reachable when a run was dropped mid-item
            if item.status == ItemStatus::Processing {
                item.status = ItemStatus::Pending;
            }
        }
    }

    /// Marks an item as processing and hands out what is needed to send it.
    /// `None` when the item was removed before its turn.
    fn start_item(&self, id: ItemId) -> Option<(String, PendingJob)> {
        let mut state = self.state();
        let item = state.find_mut(id)?;
        let job = match (&item.encoded, &item.source) {
            (Some(payload), _) => PendingJob::Encoded(payload.clone()),
            (None, Some(source)) => PendingJob::Raw(source.clone()),
            (None, None) => return None,
        };
        item.status = ItemStatus::Processing;
        Some((item.source_name.clone(), job))
    }

    fn store_payload(&self, id: ItemId, payload: EncodedPayload) {
        if let Some(item) = self.state().find_mut(id) {
            item.encoded = Some(payload);
            item.source = None;
        }
    }

    fn finish_item(&self, id: ItemId, status: ItemStatus) {
        if let Some(item) = self.state().find_mut(id) {
            item.status = status;
            item.in_pass = false;
        }
    }

    /// Pass items still waiting in the queue.
    fn remaining_in_pass(&self) -> usize {
        self.state()
            .items
            .iter()
            .filter(|item| item.in_pass && item.status == ItemStatus::Pending)
            .count()
    }
}

struct PassGuard<'a>(&'a BatchQueue);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.end_pass();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Captioned(Captions),
    Failed(String),
}

/// Outcome of one item in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub item_id: ItemId,
    pub source_name: String,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Captioned(_))
    }

    pub fn captions(&self) -> Option<&Captions> {
        match &self.outcome {
            BatchOutcome::Captioned(captions) => Some(captions),
            BatchOutcome::Failed(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Captioned(_) => None,
            BatchOutcome::Failed(message) => Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.succeeded()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Receives status and progress events synchronously as a pass advances.
pub trait BatchObserver: Send + Sync {
    fn on_status_change(&self, _id: ItemId, _status: ItemStatus) {}
    fn on_progress(&self, _progress: BatchProgress) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

pub struct BatchProcessor<S> {
    service: S,
    queue: BatchQueue,
    compression: CompressionOptions,
    results: Vec<BatchResult>,
}

impl<S: CaptionService> BatchProcessor<S> {
    pub fn new(service: S) -> Self {
        Self::with_queue(service, BatchQueue::new())
    }

    pub fn with_queue(service: S, queue: BatchQueue) -> Self {
        Self {
            service,
            queue,
            compression: CompressionOptions::batch(),
            results: Vec::new(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = compression;
        self
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    /// Results of the most recent pass, in queue order. Results of items
    /// removed from the queue since are left out.
    pub fn results(&self) -> Vec<BatchResult> {
        let present = self.queue.ids();
        self.results
            .iter()
            .filter(|result| present.contains(&result.item_id))
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_results(&self.results())
    }

    /// Runs one pass over the queue.
    ///
    /// Items are processed strictly one at a time in queue order. A failing
    /// item is recorded as an error and the pass moves on. Items added while
    /// the pass runs wait for the next pass; items removed before their turn
    /// are skipped.
    pub async fn run(
        &mut self,
        settings: &CaptionSettings,
        observer: &dyn BatchObserver,
    ) -> Result<Vec<BatchResult>> {
        settings.validate()?;

        let pass = self.queue.begin_pass()?;
        let _guard = PassGuard(&self.queue);
        self.results.clear();

        info!(items = pass.len(), "starting batch pass");
        for &id in &pass {
            observer.on_status_change(id, ItemStatus::Pending);
        }
        if !pass.is_empty() {
            observer.on_progress(BatchProgress {
                completed: 0,
                total: pass.len(),
            });
        }

        let mut results = Vec::with_capacity(pass.len());
        for id in pass {
            let Some((source_name, job)) = self.queue.start_item(id) else {
                debug!(item = %id, "skipping item removed before its turn");
                continue;
            };
            observer.on_status_change(id, ItemStatus::Processing);
            debug!(item = %id, name = %source_name, "captioning item");

            let outcome = self.process(id, job, settings).await;
            let status = match &outcome {
                BatchOutcome::Captioned(_) => ItemStatus::Done,
                BatchOutcome::Failed(message) => {
                    warn!(item = %id, name = %source_name, error = %message, "item failed");
                    ItemStatus::Error
                }
            };

            self.queue.finish_item(id, status);
            observer.on_status_change(id, status);
            results.push(BatchResult {
                item_id: id,
                source_name,
                outcome,
            });

            let completed = results.len();
            observer.on_progress(BatchProgress {
                completed,
                total: completed + self.queue.remaining_in_pass(),
            });
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch pass complete"
        );

        self.results = results.clone();
        Ok(results)
    }

    async fn process(&self, id: ItemId, job: PendingJob, settings: &CaptionSettings) -> BatchOutcome {
        let payload = match job {
            PendingJob::Encoded(payload) => payload,
            PendingJob::Raw(source) => match encode_source(source, self.compression).await {
                Ok(payload) => {
                    self.queue.store_payload(id, payload.clone());
                    payload
                }
                Err(err) => return BatchOutcome::Failed(err.to_string()),
            },
        };

        match self
            .service
            .generate_caption(&payload.to_data_uri(), settings)
            .await
        {
            Ok(response) => BatchOutcome::Captioned(response.captions),
            Err(err) => BatchOutcome::Failed(err.to_string()),
        }
    }
}

async fn encode_source(source: ImageSource, options: CompressionOptions) -> Result<EncodedPayload> {
    tokio::task::spawn_blocking(move || match source {
        ImageSource::Bytes(bytes) => compress(&bytes, &options),
        ImageSource::File(path) => compress(&read_image_file(&path)?, &options),
    })
    .await
    .map_err(|e| CaptionError::Encode(format!("compression task failed: {}", e)))?
}
