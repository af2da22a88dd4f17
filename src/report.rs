//! The classified table and the files written from it.

use crate::fetch::{SkippedBatch, SkippedWindow};
use crate::igfinder_utils::natural_chromosome_order;
use crate::records::{ClassifiedGene, GeneCategory};
use anyhow::Context;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Columns of the output table, in order.
pub const TABLE_COLUMNS: [&str; 7] = ["id", "start", "end", "chr", "biotype", "type", "length"];
/// Columns of the skipped fetch report, in order.
pub const SKIPPED_COLUMNS: [&str; 5] = ["kind", "chromosome", "region_or_batch", "ids", "reason"];

/// Gene counts of one chromosome, per category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChromosomeCounts {
    pub chromosome: String,
    pub intronless: u64,
    pub multi_exonic: u64,
}

/// The classified genes as a [DataFrame] with the columns of [TABLE_COLUMNS].
/// Row order is the order of the classifier output.
#[derive(Clone, Debug)]
pub struct GeneTable {
    df: DataFrame,
}

impl GeneTable {
    pub fn from_classified(genes: &[ClassifiedGene]) -> anyhow::Result<GeneTable> {
        let df = DataFrame::new(vec![
            Series::new("id", genes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()),
            Series::new("start", genes.iter().map(|g| g.start).collect::<Vec<_>>()),
            Series::new("end", genes.iter().map(|g| g.end).collect::<Vec<_>>()),
            Series::new(
                "chr",
                genes.iter().map(|g| g.chromosome.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                "biotype",
                genes.iter().map(|g| g.biotype.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                "type",
                genes.iter().map(|g| g.category.as_str()).collect::<Vec<_>>(),
            ),
            Series::new("length", genes.iter().map(|g| g.length).collect::<Vec<_>>()),
        ])
        .context("Could not build the gene table")?;
        Ok(GeneTable { df })
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Writes the table tab-separated with a header line, creating the parent
    /// directories of `path` if needed.
    pub fn write_tsv<T: AsRef<Path>>(&self, path: T) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut df = self.df.clone();
        write_tsv_df(&mut df, path)?;
        info!("Wrote {} genes to {:?}", df.height(), path);
        Ok(())
    }

    /// The `length` values of the genes of `category`, in table order.
    pub fn lengths(&self, category: GeneCategory) -> anyhow::Result<Vec<f64>> {
        let df = self
            .df
            .clone()
            .lazy()
            .filter(col("type").eq(lit(category.as_str())))
            .select([col("length").cast(DataType::Float64)])
            .collect()?;
        let lengths = df.column("length")?.f64()?.into_no_null_iter().collect();
        Ok(lengths)
    }

    /// Lengths of the intronless and of the multi-exonic genes.
    pub fn lengths_by_type(&self) -> anyhow::Result<(Vec<f64>, Vec<f64>)> {
        Ok((
            self.lengths(GeneCategory::Intronless)?,
            self.lengths(GeneCategory::MultiExonic)?,
        ))
    }

    /// The chromosome by category contingency table, one entry per chromosome
    /// present in the table, in natural chromosome order.
    pub fn counts_by_chromosome_and_type(&self) -> anyhow::Result<Vec<ChromosomeCounts>> {
        let df = self
            .df
            .clone()
            .lazy()
            .group_by([col("chr"), col("type")])
            .agg([col("id").count().alias("n")])
            .with_column(col("n").cast(DataType::UInt64))
            .collect()?;

        let chr = df.column("chr")?.str()?;
        let category = df.column("type")?.str()?;
        let n = df.column("n")?.u64()?;

        let mut per_chr: HashMap<String, ChromosomeCounts> = HashMap::new();
        for ((c, t), n) in chr
            .into_no_null_iter()
            .zip(category.into_no_null_iter())
            .zip(n.into_no_null_iter())
        {
            let counts = per_chr.entry(c.to_string()).or_insert_with(|| ChromosomeCounts {
                chromosome: c.to_string(),
                ..Default::default()
            });
            match t.parse::<GeneCategory>()? {
                GeneCategory::Intronless => counts.intronless += n,
                GeneCategory::MultiExonic => counts.multi_exonic += n,
            }
        }

        let mut counts: Vec<ChromosomeCounts> = per_chr.into_values().collect();
        counts.sort_by(|a, b| natural_chromosome_order(&a.chromosome, &b.chromosome));
        Ok(counts)
    }
}

fn write_tsv_df(df: &mut DataFrame, path: &Path) -> anyhow::Result<()> {
    // create the folder if it doesn't exist
    fs::create_dir_all(path.parent().with_context(|| {
        format!(
            "Could not get the parent directory of the given output file path {:?}",
            path.as_os_str()
        )
    })?)?;

    let file = fs::File::create(path)
        .with_context(|| format!("Could not create the output file {:?}", path))?;
    let mut file = BufWriter::with_capacity(4194304, file);
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)
        .with_context(|| format!("Could not write {:?}", path))?;
    file.flush()?;
    Ok(())
}

/// Writes every window and lookup batch that was dropped during the fetch, one
/// per line, so that genes missing because of a failed request can be told apart
/// from genes that do not exist.
///
/// Window rows carry the chromosome and the region; batch rows carry the batch
/// index and the comma-separated ids they held, with `.` as their chromosome.
pub fn write_skipped_report<T: AsRef<Path>>(
    path: T,
    windows: &[SkippedWindow],
    batches: &[SkippedBatch],
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let n = windows.len() + batches.len();
    let mut kind = Vec::with_capacity(n);
    let mut chromosome = Vec::with_capacity(n);
    let mut region_or_batch = Vec::with_capacity(n);
    let mut ids = Vec::with_capacity(n);
    let mut reason = Vec::with_capacity(n);

    for w in windows {
        kind.push(String::from("window"));
        chromosome.push(w.chromosome.clone());
        region_or_batch.push(w.window.region(&w.chromosome));
        ids.push(String::from("."));
        reason.push(w.reason.clone());
    }
    for b in batches {
        kind.push(String::from("batch"));
        chromosome.push(String::from("."));
        region_or_batch.push(b.index.to_string());
        ids.push(b.ids.join(","));
        reason.push(b.reason.to_string());
    }

    let mut df = DataFrame::new(vec![
        Series::new(SKIPPED_COLUMNS[0], kind),
        Series::new(SKIPPED_COLUMNS[1], chromosome),
        Series::new(SKIPPED_COLUMNS[2], region_or_batch),
        Series::new(SKIPPED_COLUMNS[3], ids),
        Series::new(SKIPPED_COLUMNS[4], reason),
    ])?;
    write_tsv_df(&mut df, path)?;
    info!(
        "Wrote {} skipped windows and {} skipped batches to {:?}",
        windows.len(),
        batches.len(),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{SkipReason, Window};

    fn gene(id: &str, chr: &str, start: i64, end: i64, category: GeneCategory) -> ClassifiedGene {
        ClassifiedGene {
            id: id.to_string(),
            start,
            end,
            chromosome: chr.to_string(),
            biotype: String::from("protein_coding"),
            length: end - start,
            category,
        }
    }

    fn table() -> GeneTable {
        GeneTable::from_classified(&[
            gene("a", "2", 0, 100, GeneCategory::Intronless),
            gene("b", "10", 0, 300, GeneCategory::Intronless),
            gene("c", "2", 0, 1000, GeneCategory::MultiExonic),
            gene("d", "2", 50, 2050, GeneCategory::MultiExonic),
            gene("e", "X", 0, 10, GeneCategory::MultiExonic),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("genes.tsv");
        table().write_tsv(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], TABLE_COLUMNS.join("\t"));
        assert_eq!(lines[1], "a\t0\t100\t2\tprotein_coding\tintronless\t100");
        assert_eq!(lines[3], "c\t0\t1000\t2\tprotein_coding\tmulti-exonic\t1000");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_lengths_by_type() {
        let (intronless, multi) = table().lengths_by_type().unwrap();
        assert_eq!(intronless, vec![100.0, 300.0]);
        assert_eq!(multi, vec![1000.0, 2000.0, 10.0]);
    }

    #[test]
    fn test_counts_by_chromosome_and_type() {
        let counts = table().counts_by_chromosome_and_type().unwrap();
        assert_eq!(
            counts,
            vec![
                ChromosomeCounts {
                    chromosome: "2".into(),
                    intronless: 1,
                    multi_exonic: 2
                },
                ChromosomeCounts {
                    chromosome: "10".into(),
                    intronless: 1,
                    multi_exonic: 0
                },
                ChromosomeCounts {
                    chromosome: "X".into(),
                    intronless: 0,
                    multi_exonic: 1
                },
            ]
        );
    }

    #[test]
    fn test_skipped_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skipped.tsv");
        let windows = [SkippedWindow {
            chromosome: "7".into(),
            window: Window { start: 1, end: 1_000_000 },
            reason: "HTTP 503".into(),
        }];
        let batches = [SkippedBatch {
            index: 3,
            ids: vec!["g1".into(), "g2".into()],
            reason: SkipReason::EmptyResponse,
        }];
        write_skipped_report(&path, &windows, &batches).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], SKIPPED_COLUMNS.join("\t"));
        assert_eq!(lines[1], "window\t7\t7:1-1000000\t.\tHTTP 503");
        assert_eq!(lines[2], "batch\t.\t3\tg1,g2\tempty response");
    }
}
