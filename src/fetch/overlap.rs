use crate::client::AnnotationService;
use crate::igfinder_utils::region_string;
use crate::records::GeneStub;
use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, info_span, warn};

/// The feature type requested from the overlap endpoint.
pub const GENE_FEATURE: &str = "gene";

/// An inclusive, 1-based window `[start, end]` of a chromosome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn region(&self, chromosome: &str) -> String {
        region_string(chromosome, self.start, self.end)
    }
}

/// A window whose overlap query failed and was left out of a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedWindow {
    pub chromosome: String,
    pub window: Window,
    pub reason: String,
}

/// What a chromosome scan brought back: every stub returned by the windows that
/// succeeded, in window order, and the windows that did not.
#[derive(Clone, Debug, Default)]
pub struct ChromosomeScan {
    pub chromosome: String,
    pub genes: Vec<GeneStub>,
    pub windows_queried: usize,
    pub skipped_windows: Vec<SkippedWindow>,
}

impl ChromosomeScan {
    /// `true` if every window of the chromosome was fetched.
    pub fn is_complete(&self) -> bool {
        self.skipped_windows.is_empty()
    }
}

/// Partitions `[1, length]` into consecutive windows of `window_size` bases. Window `k`
/// covers `[1 + k * window_size, min((k + 1) * window_size, length)]`, so the last
/// window is truncated to `length`. A zero `length` yields no window.
///
/// ```rust
/// # use igfinder::fetch::windows;
/// let w: Vec<_> = windows(2_500_000, 1_000_000).map(|w| (w.start, w.end)).collect();
/// assert_eq!(w, vec![(1, 1_000_000), (1_000_001, 2_000_000), (2_000_001, 2_500_000)]);
/// ```
pub fn windows(length: u64, window_size: u64) -> impl Iterator<Item = Window> {
    let window_size = window_size.max(1);
    let n = length / window_size + u64::from(length % window_size != 0);
    (0..n).map(move |k| Window {
        start: 1 + k * window_size,
        end: ((k + 1) * window_size).min(length),
    })
}

/// Queries the features of type `feature` overlapping `region` (e.g. `1:1-1000000`).
pub fn overlapping_features<S: AnnotationService + ?Sized>(
    service: &S,
    species: &str,
    region: &str,
    feature: &str,
) -> anyhow::Result<Vec<GeneStub>> {
    let endpoint = format!("/overlap/region/{}/{}", species, region);
    let v = service.get(&endpoint, &[("feature", feature)])?;
    let stubs = Vec::<GeneStub>::deserialize(&v)
        .with_context(|| format!("Unexpected overlap response for {}", region))?;
    Ok(stubs)
}

/// Collects the gene stubs of a chromosome by scanning it window by window.
///
/// A window whose query fails for any reason is logged, recorded in
/// [ChromosomeScan::skipped_windows] and skipped; the scan always goes on with the
/// next window, so the result is best effort and never an error.
///
/// ### Arguments
///
/// * `service`: the annotation service to query.
/// * `species`: the species name used in the endpoint, e.g. `homo_sapiens`.
/// * `chromosome`: the chromosome name.
/// * `length`: the chromosome length in bases.
/// * `window_size`: the width of each window.
pub fn genes_in_chromosome<S: AnnotationService + ?Sized>(
    service: &S,
    species: &str,
    chromosome: &str,
    length: u64,
    window_size: u64,
) -> ChromosomeScan {
    let _span = info_span!("chromosome", name = chromosome).entered();

    let mut scan = ChromosomeScan {
        chromosome: chromosome.to_string(),
        ..Default::default()
    };

    for window in windows(length, window_size) {
        let region = window.region(chromosome);
        scan.windows_queried += 1;
        match overlapping_features(service, species, &region, GENE_FEATURE) {
            Ok(genes) => {
                debug!("{} genes in window {}", genes.len(), region);
                scan.genes.extend(genes);
            }
            Err(e) => {
                warn!("Skipping window {}: {:#}", region, e);
                scan.skipped_windows.push(SkippedWindow {
                    chromosome: chromosome.to_string(),
                    window,
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    if scan.is_complete() {
        info!(
            "{}: {} genes from {} windows",
            chromosome,
            scan.genes.len(),
            scan.windows_queried
        );
    } else {
        warn!(
            "{}: {} genes from {} windows, {} windows skipped",
            chromosome,
            scan.genes.len(),
            scan.windows_queried,
            scan.skipped_windows.len()
        );
    }
    scan
}
