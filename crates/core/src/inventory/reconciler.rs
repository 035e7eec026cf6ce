//! Batch reconciliation
//!
//! Turns drained [`ChangeRecord`]s into batch create, update and delete
//! operations, submits them with bounded parallelism, polls each operation
//! to a terminal state and attributes every entry's outcome back to the
//! item it came from.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use stockx_domain::{
    to_cents, BatchConfig, ChangeRecord, CreateListingInput, ItemKey, Operation, OperationInput,
    OperationItem, OperationItemStatus, OperationKind, Result, StockxError, UpdateListingInput,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::change_set::ChangeSet;
use super::index::InventoryIndex;
use super::results::{EntryFailure, FailedEntry, FlushReport, ItemResult};
use crate::client::MarketplaceClient;

#[derive(Debug, Clone)]
struct PlannedEntry {
    origin: ItemKey,
    input: OperationInput,
}

#[derive(Debug, Clone)]
struct Chunk {
    kind: OperationKind,
    entries: Vec<PlannedEntry>,
}

#[derive(Debug, Default)]
struct Plan {
    deletes: Vec<PlannedEntry>,
    updates: Vec<PlannedEntry>,
    creates: Vec<PlannedEntry>,
    entries_per_item: BTreeMap<ItemKey, usize>,
}

impl Plan {
    fn build(records: &[ChangeRecord], index: &InventoryIndex) -> Self {
        let mut plan = Self::default();

        for record in records {
            let key = &record.item_key;
            let listing_ids: &[String] =
                index.get(key).map_or(&[], |item| item.listing_ids.as_slice());
            if listing_ids.is_empty() && record.desired_quantity.unwrap_or(0) == 0 {
                warn!(item = %key, "change recorded for an item with no listings");
            }

            let target_price = record.desired_price.unwrap_or_else(|| key.amount());
            let price_changed = to_cents(target_price) != key.amount_cents();
            let current = listing_ids.len();
            let target = record
                .desired_quantity
                .map_or(current, |quantity| usize::try_from(quantity).unwrap_or(usize::MAX));

            // Listing ids are oldest first, so removals take the oldest.
            let removed = current.saturating_sub(target);
            let (to_delete, survivors) = listing_ids.split_at(removed);

            let mut count = 0;
            for listing_id in to_delete {
                plan.deletes.push(PlannedEntry {
                    origin: key.clone(),
                    input: OperationInput::Delete { listing_id: listing_id.clone() },
                });
                count += 1;
            }

            if price_changed {
                for listing_id in survivors {
                    plan.updates.push(PlannedEntry {
                        origin: key.clone(),
                        input: OperationInput::Update {
                            listing_id: listing_id.clone(),
                            amount: target_price,
                        },
                    });
                    count += 1;
                }
            }

            for _ in current..target {
                plan.creates.push(PlannedEntry {
                    origin: key.clone(),
                    input: OperationInput::Create {
                        variant_id: key.variant_id.clone(),
                        amount: target_price,
                        currency: key.currency.clone(),
                    },
                });
                count += 1;
            }

            plan.entries_per_item.insert(key.clone(), count);
        }
        plan
    }

    fn into_chunks(self, batch_size: usize) -> (Vec<Chunk>, BTreeMap<ItemKey, usize>) {
        let batch_size = batch_size.max(1);
        let mut chunks = Vec::new();
        for (kind, entries) in [
            (OperationKind::Delete, self.deletes),
            (OperationKind::Update, self.updates),
            (OperationKind::Create, self.creates),
        ] {
            chunks.extend(
                entries.chunks(batch_size).map(|entries| Chunk { kind, entries: entries.to_vec() }),
            );
        }
        (chunks, self.entries_per_item)
    }
}

enum ChunkResult {
    Completed(Operation),
    Failed(StockxError),
    Skipped(StockxError),
}

struct ChunkOutcome {
    chunk: Chunk,
    result: ChunkResult,
}

/// Applies change sets to the marketplace in batches
#[derive(Debug, Clone)]
pub struct BatchReconciler {
    client: MarketplaceClient,
    config: BatchConfig,
}

impl BatchReconciler {
    pub fn new(client: MarketplaceClient, config: BatchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Drain `changes` and apply them.
    ///
    /// Never fails as a whole: per-item outcomes are in the report. Drained
    /// records are not re-queued, whatever the outcome.
    #[instrument(skip_all, fields(items = changes.len()))]
    pub async fn flush(&self, changes: &ChangeSet, index: &InventoryIndex) -> FlushReport {
        let records = changes.drain();
        if records.is_empty() {
            return FlushReport::default();
        }

        let (chunks, entries_per_item) =
            Plan::build(&records, index).into_chunks(self.config.batch_size);
        debug!(chunks = chunks.len(), "reconciliation planned");

        let fatal: Mutex<Option<StockxError>> = Mutex::new(None);
        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks)
            .map(|chunk| self.run_chunk(chunk, &fatal))
            .buffer_unordered(self.config.max_parallel.max(1))
            .collect()
            .await;

        let mut results: BTreeMap<ItemKey, ItemResult> = records
            .iter()
            .map(|record| (record.item_key.clone(), ItemResult::new(record.item_key.clone())))
            .collect();
        for outcome in outcomes {
            attribute(outcome, &mut results);
        }

        let results: Vec<ItemResult> = results
            .into_iter()
            .map(|(key, mut result)| {
                result.finish(entries_per_item.get(&key).copied().unwrap_or(0));
                result
            })
            .collect();
        let report = FlushReport { results };

        info!(
            items = report.results.len(),
            failed = report.failed().count(),
            not_attempted = report.not_attempted().count(),
            created = report.created_count(),
            updated = report.updated_count(),
            deleted = report.deleted_count(),
            "flush complete"
        );
        report
    }

    async fn run_chunk(&self, chunk: Chunk, fatal: &Mutex<Option<StockxError>>) -> ChunkOutcome {
        let earlier = fatal.lock().clone();
        if let Some(error) = earlier {
            return ChunkOutcome { chunk, result: ChunkResult::Skipped(error) };
        }

        let outcome = match self.submit(&chunk).await {
            Ok(operation) => self.await_terminal(operation).await,
            Err(err) => Err(err),
        };

        let result = match outcome {
            Ok(operation) => ChunkResult::Completed(operation),
            Err(err) => {
                warn!(kind = %chunk.kind, entries = chunk.entries.len(), error = %err, "batch failed");
                if err.is_fatal() {
                    fatal.lock().get_or_insert_with(|| err.clone());
                }
                ChunkResult::Failed(err)
            }
        };
        ChunkOutcome { chunk, result }
    }

    async fn submit(&self, chunk: &Chunk) -> Result<Operation> {
        match chunk.kind {
            OperationKind::Create => {
                let inputs: Vec<CreateListingInput> = chunk
                    .entries
                    .iter()
                    .filter_map(|entry| entry.input.create_key())
                    .map(|key| CreateListingInput::single(&key))
                    .collect();
                self.client.batch_create_listings(&inputs).await
            }
            OperationKind::Update => {
                let inputs: Vec<UpdateListingInput> = chunk
                    .entries
                    .iter()
                    .filter_map(|entry| match &entry.input {
                        OperationInput::Update { listing_id, amount } => Some(UpdateListingInput {
                            listing_id: listing_id.clone(),
                            amount: *amount,
                            currency: entry.origin.currency.clone(),
                        }),
                        _ => None,
                    })
                    .collect();
                self.client.batch_update_listings(&inputs).await
            }
            OperationKind::Delete => {
                let listing_ids: Vec<String> = chunk
                    .entries
                    .iter()
                    .filter_map(|entry| entry.input.listing_id().map(str::to_string))
                    .collect();
                self.client.batch_delete_listings(&listing_ids).await
            }
        }
    }

    /// Poll until terminal, doubling the interval up to `poll_max`.
    async fn await_terminal(&self, mut operation: Operation) -> Result<Operation> {
        let started = Instant::now();
        let timeout = self.config.poll_timeout();
        let mut interval = self.config.poll_initial();

        while !operation.is_terminal() {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(StockxError::OperationTimeout {
                    operation_id: operation.operation_id,
                    waited: elapsed,
                });
            }
            tokio::time::sleep(interval.min(timeout - elapsed)).await;
            interval = next_interval(interval, self.config.poll_max());

            operation = self.client.operation_status(operation.kind, &operation.operation_id).await?;
            debug!(operation_id = %operation.operation_id, status = %operation.status, "polled operation");
        }
        Ok(operation)
    }
}

fn next_interval(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

fn attribute(outcome: ChunkOutcome, results: &mut BTreeMap<ItemKey, ItemResult>) {
    let ChunkOutcome { chunk, result } = outcome;
    let kind = chunk.kind;

    let fail_all = |results: &mut BTreeMap<ItemKey, ItemResult>, error: EntryFailure| {
        for entry in &chunk.entries {
            if let Some(result) = results.get_mut(&entry.origin) {
                result.record_failure(FailedEntry { kind, input: entry.input.clone(), error: error.clone() });
            }
        }
    };

    let operation = match result {
        ChunkResult::Skipped(error) => return fail_all(results, EntryFailure::NotAttempted(error)),
        ChunkResult::Failed(error) => return fail_all(results, EntryFailure::Request(error)),
        ChunkResult::Completed(operation) => operation,
    };

    let mut by_listing: HashMap<&str, &OperationItem> = HashMap::new();
    let mut by_create: HashMap<ItemKey, VecDeque<&OperationItem>> = HashMap::new();
    for item in &operation.items {
        if let Some(listing_id) = item.input.listing_id() {
            by_listing.insert(listing_id, item);
        } else if let Some(key) = item.input.create_key() {
            by_create.entry(key).or_default().push_back(item);
        }
    }

    for entry in &chunk.entries {
        let Some(result) = results.get_mut(&entry.origin) else { continue };
        let echoed = match entry.input.listing_id() {
            Some(listing_id) => by_listing.get(listing_id).copied(),
            None => entry
                .input
                .create_key()
                .and_then(|key| by_create.get_mut(&key))
                .and_then(VecDeque::pop_front),
        };

        let failure = match echoed {
            Some(item) if item.status == OperationItemStatus::Completed => {
                let listing_id =
                    item.listing_id.clone().or_else(|| entry.input.listing_id().map(str::to_string));
                result.record_success(kind, listing_id);
                continue;
            }
            Some(item) if item.status == OperationItemStatus::Failed => {
                item.error.clone().unwrap_or_else(|| "entry failed".to_string())
            }
            Some(_) => "entry still queued after the operation finished".to_string(),
            None if operation.status == stockx_domain::OperationStatus::Succeeded => {
                result.record_success(kind, entry.input.listing_id().map(str::to_string));
                continue;
            }
            None => operation.error.clone().unwrap_or_else(|| "operation failed".to_string()),
        };
        result.record_failure(FailedEntry {
            kind,
            input: entry.input.clone(),
            error: EntryFailure::Rejected(failure),
        });
    }
}
