//! IGFinder finds the intronless genes of a species. It scans every chromosome of
//! the assembly through the [Ensembl REST](https://rest.ensembl.org) service, resolves
//! the transcript structure of each gene, and labels a gene intronless when one of
//! its transcripts is made of a single exon, unless the gene is known to carry an
//! intron in its UTR. The labeled genes are written as a [Polars](https://pola.rs/)
//! backed table, optionally followed by a statistical comparison of the two groups
//! and a few figures.
//!
//! The remote service sits behind the [client::AnnotationService] trait, so the
//! whole [pipeline::Pipeline] can run against any implementation of it.

pub mod classify;
pub mod client;
pub mod error;
pub mod fetch;
pub mod igfinder_utils;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod plots;
pub mod records;
pub mod report;
pub mod stats;
pub mod utr;

pub use client::{AnnotationService, EnsemblClient};
pub use error::ServiceError;
pub use pipeline::{Pipeline, RunSummary};
