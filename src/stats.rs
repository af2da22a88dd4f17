use crate::report::{ChromosomeCounts, GeneTable};
use anyhow::Context;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of a two-sample t-test with unequal variances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WelchTest {
    pub t: f64,
    /// Welch-Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value.
    pub p: f64,
}

/// Result of a chi-squared test of independence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChiSquaredTest {
    pub chi2: f64,
    pub dof: usize,
    pub p: f64,
    /// Whether Yates' continuity correction was applied.
    pub corrected: bool,
}

fn mean_var(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Welch's t-test of `a` against `b`. `None` if a sample has fewer than two
/// values or both samples have zero variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<WelchTest> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let (m1, v1) = mean_var(a);
    let (m2, v2) = mean_var(b);
    let s1 = v1 / a.len() as f64;
    let s2 = v2 / b.len() as f64;
    let se2 = s1 + s2;
    if se2 <= 0.0 || !se2.is_finite() {
        return None;
    }

    let t = (m1 - m2) / se2.sqrt();
    let df = se2.powi(2)
        / (s1.powi(2) / (a.len() as f64 - 1.0) + s2.powi(2) / (b.len() as f64 - 1.0));
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);
    Some(WelchTest { t, df, p })
}

/// Chi-squared test of independence between chromosome and category.
///
/// Categories with no gene at all are left out of the table, as are chromosomes
/// without genes. `None` if what remains has no degree of freedom. With exactly
/// one degree of freedom Yates' continuity correction is applied: each
/// `|observed - expected|` is reduced by at most 0.5.
pub fn chi_squared_independence(counts: &[ChromosomeCounts]) -> Option<ChiSquaredTest> {
    let rows: Vec<[f64; 2]> = counts
        .iter()
        .map(|c| [c.intronless as f64, c.multi_exonic as f64])
        .filter(|r| r[0] + r[1] > 0.0)
        .collect();
    let col_sums = rows.iter().fold([0.0, 0.0], |acc, r| [acc[0] + r[0], acc[1] + r[1]]);
    let cols: Vec<usize> = (0..2).filter(|&j| col_sums[j] > 0.0).collect();

    if rows.len() < 2 || cols.len() < 2 {
        return None;
    }
    let dof = (rows.len() - 1) * (cols.len() - 1);
    let corrected = dof == 1;
    let total: f64 = col_sums.iter().sum();

    let mut chi2 = 0.0;
    for r in &rows {
        let row_sum = r[0] + r[1];
        for &j in &cols {
            let expected = row_sum * col_sums[j] / total;
            let mut diff = (r[j] - expected).abs();
            if corrected {
                diff -= diff.min(0.5);
            }
            chi2 += diff * diff / expected;
        }
    }

    let dist = ChiSquared::new(dof as f64).ok()?;
    let p = dist.sf(chi2).clamp(0.0, 1.0);
    Some(ChiSquaredTest {
        chi2,
        dof,
        p,
        corrected,
    })
}

/// Scientific notation with a signed, two digit exponent: `1.2345e-05`.
fn sci(x: f64) -> String {
    let s = format!("{:.4e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(e) => format!(
                "{}e{}{:02}",
                mantissa,
                if e < 0 { '-' } else { '+' },
                e.abs()
            ),
            Err(_) => s,
        },
        None => s,
    }
}

/// The two report lines for `table`.
pub fn statistical_comparisons(table: &GeneTable) -> anyhow::Result<Vec<String>> {
    let (intronless, multi_exonic) = table.lengths_by_type()?;
    let t_line = match welch_t_test(&intronless, &multi_exonic) {
        Some(w) => format!("T-test (length): t = {:.2}, p = {}", w.t, sci(w.p)),
        None => {
            warn!(
                "Cannot compare lengths of {} intronless and {} multi-exonic genes",
                intronless.len(),
                multi_exonic.len()
            );
            String::from("T-test (length): not enough data")
        }
    };

    let counts = table.counts_by_chromosome_and_type()?;
    let chi_line = match chi_squared_independence(&counts) {
        Some(c) => format!(
            "Chi-squared (chromosomes): chi2 = {:.2}, p = {}",
            c.chi2,
            sci(c.p)
        ),
        None => {
            warn!(
                "The chromosome by category table over {} chromosomes has no degree of freedom",
                counts.len()
            );
            String::from("Chi-squared (chromosomes): not enough data")
        }
    };
    Ok(vec![t_line, chi_line])
}

/// Runs the length and chromosome comparisons and writes them to `{prefix}.txt`.
///
/// ### Returns
///
/// The path of the written report.
pub fn run_statistical_comparisons(table: &GeneTable, prefix: &str) -> anyhow::Result<PathBuf> {
    let path = PathBuf::from(format!("{}.txt", prefix));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let lines = statistical_comparisons(table)?;

    let mut f = fs::File::create(&path)
        .with_context(|| format!("Could not create the statistics report {:?}", path))?;
    for l in &lines {
        writeln!(f, "{}", l)?;
        info!("{}", l);
    }
    info!("Statistics written to {:?}", path);
    Ok(path)
}
