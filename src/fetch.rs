//! Retrieval of gene records from the annotation service.
//!
//! The stages run strictly one after the other on the calling thread:
//! [`assembly`] lists the chromosomes, [`overlap`] scans each of them window by
//! window for gene stubs, and [`lookup`] resolves the stubs into full records in
//! batches. The last two never abort on a single failed request; what they had
//! to leave out is returned next to what they fetched.
pub mod assembly;
pub mod lookup;
pub mod overlap;

pub use assembly::{chromosomes_info, select_chromosomes};
pub use lookup::{get_info, LookupOutcome, SkipReason, SkippedBatch};
pub use overlap::{genes_in_chromosome, windows, ChromosomeScan, SkippedWindow, Window};

#[cfg(test)]
pub(crate) mod fake;
