use crate::client::AnnotationService;
use crate::records::{GeneRecord, GeneStub};
use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, info_span, trace, warn};

/// The batch lookup endpoint.
pub const LOOKUP_ENDPOINT: &str = "/lookup/id";

/// Why a lookup batch contributed no record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The request failed or its answer could not be read.
    Failed(String),
    /// The service answered with an empty mapping, which is also what a non-success
    /// status turns into.
    EmptyResponse,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Failed(msg) => write!(f, "{}", msg),
            SkipReason::EmptyResponse => write!(f, "empty response"),
        }
    }
}

/// A batch of ids dropped from a lookup. Dropped batches are never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBatch {
    /// 0-based position of the batch in the lookup.
    pub index: usize,
    pub ids: Vec<String>,
    pub reason: SkipReason,
}

/// The records resolved by [get_info] and the batches it had to drop.
#[derive(Clone, Debug, Default)]
pub struct LookupOutcome {
    pub records: Vec<GeneRecord>,
    pub batches: usize,
    pub skipped_batches: Vec<SkippedBatch>,
}

impl LookupOutcome {
    /// Ids that were requested in a dropped batch.
    pub fn skipped_ids(&self) -> impl Iterator<Item = &str> {
        self.skipped_batches
            .iter()
            .flat_map(|b| b.ids.iter().map(|s| s.as_str()))
    }
}

/// Resolves one batch of ids. With `expand` set the service inlines transcripts and
/// their exons into each record. Ids the service does not know map to `None`, and
/// so do records that cannot be read; those are logged and the rest of the batch
/// is kept.
pub fn get_lookup_batch<S: AnnotationService + ?Sized>(
    service: &S,
    ids: &[String],
    expand: bool,
) -> anyhow::Result<HashMap<String, Option<GeneRecord>>> {
    let body = json!({ "ids": ids, "params": { "expand": expand } });
    let v = service.post_batch(LOOKUP_ENDPOINT, &body)?;
    let entries =
        Map::<String, Value>::deserialize(&v).context("Unexpected batch lookup response")?;

    let records = entries
        .into_iter()
        .map(|(id, entry)| {
            let rec = match entry {
                Value::Null => None,
                entry => match GeneRecord::deserialize(&entry) {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        warn!("Could not read the record of {}: {}", id, e);
                        None
                    }
                },
            };
            (id, rec)
        })
        .collect();
    Ok(records)
}

/// Resolves gene stubs into full records, `batch_size` ids per request.
///
/// Batches are sent in input order and each keeps the input order of its ids; records
/// come back in that same order. Ids unknown to the service are omitted.
///
/// When a batch request fails, the failure is logged and recorded, the lookup pauses
/// for `delay` so a struggling service is not hammered, and moves on to the next batch.
/// A batch answered with an empty mapping is recorded as well, without the pause. In
/// both cases the batch's genes are missing from the result.
///
/// ### Returns
///
/// A [LookupOutcome] holding the resolved records and the dropped batches.
pub fn get_info<S: AnnotationService + ?Sized>(
    service: &S,
    genes: &[GeneStub],
    batch_size: usize,
    delay: Duration,
) -> LookupOutcome {
    let batch_size = batch_size.max(1);
    let n_batches = genes.len().div_ceil(batch_size);
    let _span = info_span!("lookup", genes = genes.len(), batches = n_batches).entered();
    info!(
        "Resolving {} genes in {} batches of up to {}",
        genes.len(),
        n_batches,
        batch_size
    );

    let mut outcome = LookupOutcome {
        records: Vec::with_capacity(genes.len()),
        ..Default::default()
    };

    for (index, chunk) in genes.chunks(batch_size).enumerate() {
        outcome.batches += 1;
        let ids: Vec<String> = chunk.iter().map(|g| g.id.clone()).collect();

        match get_lookup_batch(service, &ids, true) {
            Ok(mut found) if !found.is_empty() => {
                let before = outcome.records.len();
                for id in &ids {
                    if let Some(Some(rec)) = found.remove(id) {
                        outcome.records.push(rec);
                    } else {
                        trace!("No record for {}", id);
                    }
                }
                debug!(
                    "Batch {}: {} of {} ids resolved",
                    index,
                    outcome.records.len() - before,
                    ids.len()
                );
            }
            Ok(_) => {
                warn!("Batch {} returned no records; its {} genes are dropped.", index, ids.len());
                outcome.skipped_batches.push(SkippedBatch {
                    index,
                    ids,
                    reason: SkipReason::EmptyResponse,
                });
            }
            Err(e) => {
                warn!("Could not retrieve batch {}: {:#}", index, e);
                outcome.skipped_batches.push(SkippedBatch {
                    index,
                    ids,
                    reason: SkipReason::Failed(format!("{:#}", e)),
                });
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }

        if (index + 1) % 100 == 0 {
            info!("{} of {} batches done", index + 1, n_batches);
        }
    }

    if outcome.skipped_batches.is_empty() {
        info!("Resolved {} gene records", outcome.records.len());
    } else {
        warn!(
            "Resolved {} gene records; {} of {} batches were dropped",
            outcome.records.len(),
            outcome.skipped_batches.len(),
            outcome.batches
        );
    }
    outcome
}
