use crate::options::ExceptionPolicy;
use crate::records::{ClassifiedGene, GeneCategory, GeneRecord};
use crate::utr::UtrExceptionSet;
use tracing::info;

/// Counts gathered while classifying.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub intronless: usize,
    pub multi_exonic: usize,
    /// Structurally intronless genes reported as multi-exonic because of the exception set.
    pub reclassified: usize,
    /// Structurally intronless genes left out because of the exception set.
    pub dropped: usize,
}

impl ClassificationSummary {
    pub fn total(&self) -> usize {
        self.intronless + self.multi_exonic
    }
}

/// Labels each record as intronless or multi-exonic.
///
/// A gene is intronless when at least one of its transcripts has exactly one exon and
/// its id is not in `utr_exceptions`. Structurally intronless genes that are excepted
/// are handled according to `policy`: reported as multi-exonic, or left out.
/// Every other gene is multi-exonic.
///
/// The output lists all intronless genes first and then all multi-exonic genes, each
/// group in input order. `length` is `end - start` for both.
///
/// ### Example
///
/// ```rust
/// # use igfinder::classify::classify;
/// # use igfinder::options::ExceptionPolicy;
/// # use igfinder::records::{GeneCategory, GeneRecord, TranscriptRecord};
/// # use igfinder::utr::UtrExceptionSet;
/// let gene = GeneRecord {
///     id: "g1".to_string(),
///     start: 100,
///     end: 400,
///     chromosome: "1".to_string(),
///     biotype: "lncRNA".to_string(),
///     transcripts: vec![TranscriptRecord { exons: vec![serde_json::json!({})] }],
/// };
/// let (genes, _) = classify(&[gene], &UtrExceptionSet::default(), ExceptionPolicy::Reclassify);
/// assert_eq!(genes[0].category, GeneCategory::Intronless);
/// assert_eq!(genes[0].length, 300);
/// ```
pub fn classify(
    records: &[GeneRecord],
    utr_exceptions: &UtrExceptionSet,
    policy: ExceptionPolicy,
) -> (Vec<ClassifiedGene>, ClassificationSummary) {
    let mut intronless = Vec::new();
    let mut multi_exonic = Vec::new();
    let mut summary = ClassificationSummary::default();

    for rec in records {
        let structural = rec.has_intronless_transcript();
        let excepted = structural && utr_exceptions.contains(&rec.id);

        if structural && !excepted {
            intronless.push(to_classified(rec, GeneCategory::Intronless));
        } else if excepted && policy == ExceptionPolicy::Drop {
            summary.dropped += 1;
        } else {
            if excepted {
                summary.reclassified += 1;
            }
            multi_exonic.push(to_classified(rec, GeneCategory::MultiExonic));
        }
    }

    summary.intronless = intronless.len();
    summary.multi_exonic = multi_exonic.len();
    info!("Intronless genes: {}", summary.intronless);
    info!("Multi-exonic genes: {}", summary.multi_exonic);
    match policy {
        ExceptionPolicy::Reclassify if summary.reclassified > 0 => info!(
            "{} intronless genes listed as UTR exceptions were reported as multi-exonic",
            summary.reclassified
        ),
        ExceptionPolicy::Drop if summary.dropped > 0 => info!(
            "{} intronless genes listed as UTR exceptions were left out",
            summary.dropped
        ),
        _ => {}
    }

    intronless.append(&mut multi_exonic);
    (intronless, summary)
}

fn to_classified(rec: &GeneRecord, category: GeneCategory) -> ClassifiedGene {
    ClassifiedGene {
        id: rec.id.clone(),
        start: rec.start,
        end: rec.end,
        chromosome: rec.chromosome.clone(),
        biotype: rec.biotype.clone(),
        length: rec.end - rec.start,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TranscriptRecord;
    use serde_json::json;

    fn gene(id: &str, start: i64, end: i64, exons: &[usize]) -> GeneRecord {
        GeneRecord {
            id: id.to_string(),
            start,
            end,
            chromosome: String::from("3"),
            biotype: String::from("protein_coding"),
            transcripts: exons
                .iter()
                .map(|&n| TranscriptRecord {
                    exons: vec![json!({}); n],
                })
                .collect(),
        }
    }

    fn ids(genes: &[ClassifiedGene]) -> Vec<&str> {
        genes.iter().map(|g| g.id.as_str()).collect()
    }

    #[test]
    fn test_single_exon_transcript_is_intronless() {
        let (out, summary) = classify(
            &[gene("g", 1, 5, &[3, 1])],
            &UtrExceptionSet::default(),
            ExceptionPolicy::Reclassify,
        );
        assert_eq!(out[0].category, GeneCategory::Intronless);
        assert_eq!(summary.intronless, 1);
    }

    #[test]
    fn test_all_multi_exon_transcripts_ignore_exceptions() {
        let utr: UtrExceptionSet = ["g"].into_iter().collect();
        for policy in [ExceptionPolicy::Reclassify, ExceptionPolicy::Drop] {
            let (out, summary) = classify(&[gene("g", 1, 5, &[2, 4])], &utr, policy);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].category, GeneCategory::MultiExonic);
            assert_eq!(summary.reclassified, 0);
            assert_eq!(summary.dropped, 0);
        }
    }

    #[test]
    fn test_gene_without_transcripts_is_multi_exonic() {
        let (out, _) = classify(
            &[gene("g", 1, 5, &[])],
            &UtrExceptionSet::default(),
            ExceptionPolicy::Reclassify,
        );
        assert_eq!(out[0].category, GeneCategory::MultiExonic);
    }

    #[test]
    fn test_exception_reclassifies_by_default() {
        let utr: UtrExceptionSet = ["g2"].into_iter().collect();
        let records = [gene("g1", 0, 10, &[1]), gene("g2", 0, 10, &[1, 2])];
        let (out, summary) = classify(&records, &utr, ExceptionPolicy::default());
        assert_eq!(ids(&out), vec!["g1", "g2"]);
        assert_eq!(out[1].category, GeneCategory::MultiExonic);
        assert_eq!(summary.reclassified, 1);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_exception_drop_policy() {
        let utr: UtrExceptionSet = ["g2"].into_iter().collect();
        let records = [gene("g1", 0, 10, &[1]), gene("g2", 0, 10, &[1])];
        let (out, summary) = classify(&records, &utr, ExceptionPolicy::Drop);
        assert_eq!(ids(&out), vec!["g1"]);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.total(), 1);
    }

    #[test]
    fn test_two_pass_ordering_and_length() {
        let records = [
            gene("G1", 100, 250, &[1]),
            gene("G2", 1000, 5000, &[2]),
            gene("G3", 7, 8, &[4, 1]),
        ];
        let (out, _) = classify(&records, &UtrExceptionSet::default(), ExceptionPolicy::Reclassify);
        assert_eq!(ids(&out), vec!["G1", "G3", "G2"]);
        for g in &out {
            assert_eq!(g.length, g.end - g.start);
        }
        assert_eq!(out[2].length, 4000);
    }

    #[test]
    fn test_empty_exception_set_keeps_intronless() {
        let records = [gene("a", 0, 1, &[1]), gene("b", 0, 1, &[1])];
        let (out, summary) = classify(&records, &UtrExceptionSet::default(), ExceptionPolicy::Drop);
        assert!(out.iter().all(|g| g.category == GeneCategory::Intronless));
        assert_eq!(summary.intronless, 2);
    }
}
