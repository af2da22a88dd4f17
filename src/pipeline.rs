use crate::classify::{classify, ClassificationSummary};
use crate::client::AnnotationService;
use crate::fetch::{
    chromosomes_info, genes_in_chromosome, get_info, select_chromosomes, SkippedBatch,
    SkippedWindow,
};
use crate::options::IgFinderOptions;
use crate::plots::generate_visualizations;
use crate::records::GeneStub;
use crate::report::{write_skipped_report, GeneTable};
use crate::stats::run_statistical_comparisons;
use crate::utr::load_utr_exceptions;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, info_span, warn};

/// What a run did, for the caller to report.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub chromosomes: usize,
    pub windows_queried: usize,
    pub skipped_windows: Vec<SkippedWindow>,
    /// Distinct gene ids found by the scan.
    pub genes_found: usize,
    pub batches: usize,
    pub skipped_batches: Vec<SkippedBatch>,
    pub records: usize,
    pub classification: ClassificationSummary,
    /// The gene table, if one was written.
    pub table: Option<PathBuf>,
    pub stats: Option<PathBuf>,
    pub plots: Vec<PathBuf>,
    pub skipped_report: Option<PathBuf>,
}

impl RunSummary {
    /// `true` if no window and no batch was dropped.
    pub fn is_complete(&self) -> bool {
        self.skipped_windows.is_empty() && self.skipped_batches.is_empty()
    }
}

/// Keeps the first occurrence of every id. A gene spanning a window boundary is
/// returned by both windows.
pub fn dedup_stubs(stubs: Vec<GeneStub>) -> Vec<GeneStub> {
    let mut seen = HashSet::with_capacity(stubs.len());
    stubs
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect()
}

/// One IGFinder run: scan, resolve, classify and report.
pub struct Pipeline {
    options: IgFinderOptions,
}

impl Pipeline {
    pub fn new(options: IgFinderOptions) -> Pipeline {
        Pipeline { options }
    }

    pub fn options(&self) -> &IgFinderOptions {
        &self.options
    }

    /// Runs the whole analysis against `service`.
    ///
    /// The UTR exception file is read first, so a missing file fails the run before
    /// any request is sent. The assembly lookup is the only request whose failure is
    /// fatal: failed windows and batches are logged, counted in the returned
    /// [RunSummary] and, when asked for, listed in the skipped report.
    ///
    /// When no gene record could be resolved, or classification leaves nothing, a
    /// warning is logged and no file is written.
    pub fn run<S: AnnotationService + ?Sized>(&self, service: &S) -> anyhow::Result<RunSummary> {
        let opts = &self.options;
        let _span = info_span!("run", species = opts.species.as_str()).entered();
        let start = Instant::now();
        let mut summary = RunSummary::default();

        let utr_exceptions = load_utr_exceptions(&opts.utr_db)?;

        let (all_chromosomes, _) = chromosomes_info(service, &opts.species)?;
        let chromosomes = select_chromosomes(&all_chromosomes, &opts.chromosomes);
        summary.chromosomes = chromosomes.len();
        if chromosomes.is_empty() {
            warn!("None of the requested chromosomes is part of the assembly.");
        } else {
            info!("Scanning {} chromosomes", chromosomes.len());
        }

        let mut stubs = Vec::new();
        for chr in &chromosomes {
            let scan = genes_in_chromosome(
                service,
                &opts.species,
                &chr.name,
                chr.length,
                opts.fetch.window_size(),
            );
            summary.windows_queried += scan.windows_queried;
            summary.skipped_windows.extend(scan.skipped_windows);
            stubs.extend(scan.genes);
        }
        let n_stubs = stubs.len();
        let stubs = dedup_stubs(stubs);
        summary.genes_found = stubs.len();
        info!(
            "Found {} distinct genes ({} before removing duplicates)",
            stubs.len(),
            n_stubs
        );

        let lookup = get_info(
            service,
            &stubs,
            opts.fetch.batch_size(),
            opts.fetch.batch_delay,
        );
        summary.batches = lookup.batches;
        summary.skipped_batches = lookup.skipped_batches;
        summary.records = lookup.records.len();

        if lookup.records.is_empty() {
            warn!("No gene record could be retrieved; nothing is written.");
            return Ok(self.finish(summary, start));
        }

        let (genes, classification) = classify(&lookup.records, &utr_exceptions, opts.policy);
        summary.classification = classification;
        if genes.is_empty() {
            warn!("No gene is left after classification; nothing is written.");
            return Ok(self.finish(summary, start));
        }

        let table = GeneTable::from_classified(&genes)?;
        table.write_tsv(&opts.output.table)?;
        summary.table = Some(opts.output.table.clone());

        if let Some(path) = &opts.output.skipped_report {
            write_skipped_report(path, &summary.skipped_windows, &summary.skipped_batches)?;
            summary.skipped_report = Some(path.clone());
        }
        if let Some(prefix) = &opts.output.stats_prefix {
            summary.stats = Some(run_statistical_comparisons(&table, prefix)?);
        }
        if let Some(prefix) = &opts.output.plots_prefix {
            summary.plots = generate_visualizations(&table, prefix)?;
        }

        Ok(self.finish(summary, start))
    }

    fn finish(&self, summary: RunSummary, start: Instant) -> RunSummary {
        info!(
            "Chromosomes: {}, windows: {} ({} skipped), batches: {} ({} skipped)",
            summary.chromosomes,
            summary.windows_queried,
            summary.skipped_windows.len(),
            summary.batches,
            summary.skipped_batches.len()
        );
        info!(
            "Intronless: {}, multi-exonic: {}",
            summary.classification.intronless, summary.classification.multi_exonic
        );
        if !summary.is_complete() {
            warn!(
                "Some data could not be fetched; genes of {} windows and {} batches are missing from the results.",
                summary.skipped_windows.len(),
                summary.skipped_batches.len()
            );
        }
        info!("Finished in {:?}", start.elapsed());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let stubs = ["a", "b", "a", "c", "b"].map(GeneStub::new).to_vec();
        let ids: Vec<String> = dedup_stubs(stubs).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
