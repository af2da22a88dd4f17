//! SVG figures of the classified table.

use crate::records::GeneCategory;
use crate::report::{ChromosomeCounts, GeneTable};
use anyhow::bail;
use plotters::prelude::*;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SIZE: (u32, u32) = (900, 600);
const CATEGORIES: [GeneCategory; 2] = [GeneCategory::Intronless, GeneCategory::MultiExonic];
const INTRONLESS_COLOR: RGBColor = RGBColor(31, 119, 180);
const MULTI_EXONIC_COLOR: RGBColor = RGBColor(255, 127, 14);
/// Number of points at which each density curve is evaluated.
const KDE_POINTS: usize = 256;

fn color(category: GeneCategory) -> RGBColor {
    match category {
        GeneCategory::Intronless => INTRONLESS_COLOR,
        GeneCategory::MultiExonic => MULTI_EXONIC_COLOR,
    }
}

fn label(category: GeneCategory) -> &'static str {
    match category {
        GeneCategory::Intronless => "Intronless",
        GeneCategory::MultiExonic => "Multi-exonic",
    }
}

/// The files written by [generate_visualizations].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotFiles {
    pub boxplot: PathBuf,
    pub violin: PathBuf,
    pub density: PathBuf,
    pub chromosomal_distribution: PathBuf,
}

impl PlotFiles {
    pub fn with_prefix(prefix: &str) -> PlotFiles {
        PlotFiles {
            boxplot: PathBuf::from(format!("{}_boxplot.svg", prefix)),
            violin: PathBuf::from(format!("{}_violin.svg", prefix)),
            density: PathBuf::from(format!("{}_density.svg", prefix)),
            chromosomal_distribution: PathBuf::from(format!(
                "{}_chromosomal_distribution.svg",
                prefix
            )),
        }
    }

    pub fn paths(&self) -> [&Path; 4] {
        [
            self.boxplot.as_path(),
            self.violin.as_path(),
            self.density.as_path(),
            self.chromosomal_distribution.as_path(),
        ]
    }
}

/// Gaussian kernel bandwidth following Scott's rule, `sd * n^(-1/5)`.
/// `None` with fewer than two values or no spread.
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    let h = sd * n.powf(-0.2);
    (h > 0.0 && h.is_finite()).then_some(h)
}

/// Evaluates the Gaussian kernel density estimate of `values` on `n_points`
/// evenly spaced points spanning three bandwidths past the extreme values.
pub fn gaussian_kde(values: &[f64], n_points: usize) -> Option<Vec<(f64, f64)>> {
    let h = scott_bandwidth(values)?;
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min) - 3.0 * h;
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + 3.0 * h;
    let step = (hi - lo) / (n_points.max(2) - 1) as f64;
    let norm = 1.0 / (values.len() as f64 * h * (2.0 * PI).sqrt());

    let curve = (0..n_points.max(2))
        .map(|i| {
            let x = lo + i as f64 * step;
            let d: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / h).powi(2)).exp())
                .sum();
            (x, d * norm)
        })
        .collect();
    Some(curve)
}

fn value_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    let pad = ((hi - lo) * 0.05).max(1.0);
    Some((lo - pad, hi + pad))
}

fn category_at(x: f64) -> String {
    let i = x.round();
    if (x - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < CATEGORIES.len() {
        CATEGORIES[i as usize].as_str().to_string()
    } else {
        String::new()
    }
}

fn draw_boxplot(path: &Path, groups: &[(GeneCategory, Vec<f64>)]) -> anyhow::Result<()> {
    let Some((lo, hi)) = value_range(groups.iter().flat_map(|(_, v)| v)) else {
        bail!("No length to draw in {:?}", path);
    };

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Gene length by type", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (0..CATEGORIES.len() as u32).into_segmented(),
            lo as f32..hi as f32,
        )?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("type")
        .y_desc("length")
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                category_at(f64::from(*i))
            }
            SegmentValue::Last => String::new(),
        })
        .draw()?;

    for (i, (category, values)) in groups.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        let quartiles = Quartiles::new(values.as_slice());
        chart.draw_series(std::iter::once(
            Boxplot::new_vertical(SegmentValue::CenterOf(i as u32), &quartiles)
                .width(60)
                .style(color(*category)),
        ))?;
    }
    root.present()?;
    Ok(())
}

fn draw_violin(path: &Path, groups: &[(GeneCategory, Vec<f64>)]) -> anyhow::Result<()> {
    let curves: Vec<Option<Vec<(f64, f64)>>> = groups
        .iter()
        .map(|(_, v)| gaussian_kde(v, KDE_POINTS))
        .collect();
    let Some((lo, hi)) = value_range(
        curves
            .iter()
            .flatten()
            .flat_map(|c| c.iter().map(|(x, _)| x)),
    ) else {
        bail!("Not enough lengths to draw {:?}", path);
    };

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Gene length by type", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(CATEGORIES.len() as f64 - 0.5), lo..hi)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(CATEGORIES.len() * 2 + 1)
        .x_label_formatter(&|x| category_at(*x))
        .x_desc("type")
        .y_desc("length")
        .draw()?;

    for (i, ((category, _), curve)) in groups.iter().zip(&curves).enumerate() {
        let Some(curve) = curve else {
            debug!("Too few {} genes for a violin", category);
            continue;
        };
        let peak = curve.iter().map(|(_, d)| *d).fold(0.0, f64::max);
        let center = i as f64;
        // half width of 0.4 at the density peak
        let outline: Vec<(f64, f64)> = curve
            .iter()
            .map(|&(y, d)| (center + 0.4 * d / peak, y))
            .chain(curve.iter().rev().map(|&(y, d)| (center - 0.4 * d / peak, y)))
            .collect();
        let c = color(*category);
        chart.draw_series(std::iter::once(Polygon::new(outline.clone(), c.mix(0.6).filled())))?;
        chart.draw_series(std::iter::once(PathElement::new(outline, c.stroke_width(1))))?;
    }
    root.present()?;
    Ok(())
}

fn draw_density(path: &Path, groups: &[(GeneCategory, Vec<f64>)]) -> anyhow::Result<()> {
    let curves: Vec<(GeneCategory, Vec<(f64, f64)>)> = groups
        .iter()
        .filter_map(|(c, v)| gaussian_kde(v, KDE_POINTS).map(|k| (*c, k)))
        .collect();
    if curves.is_empty() {
        bail!("Not enough lengths to draw {:?}", path);
    }
    let x_lo = curves.iter().flat_map(|(_, k)| k.iter().map(|p| p.0)).fold(f64::INFINITY, f64::min);
    let x_hi = curves.iter().flat_map(|(_, k)| k.iter().map(|p| p.0)).fold(f64::NEG_INFINITY, f64::max);
    let y_hi = curves.iter().flat_map(|(_, k)| k.iter().map(|p| p.1)).fold(0.0, f64::max);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Gene length density", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi * 1.05)?;
    chart
        .configure_mesh()
        .x_desc("length")
        .y_desc("density")
        .y_label_formatter(&|y| format!("{:.1e}", y))
        .draw()?;

    for (category, curve) in curves {
        let c = color(category);
        chart
            .draw_series(AreaSeries::new(curve, 0.0, c.mix(0.3)).border_style(c))?
            .label(label(category))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], c.mix(0.6).filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_chromosomal_distribution(path: &Path, counts: &[ChromosomeCounts]) -> anyhow::Result<()> {
    if counts.is_empty() {
        bail!("No chromosome to draw in {:?}", path);
    }
    let y_hi = counts
        .iter()
        .map(|c| c.intronless.max(c.multi_exonic))
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let names: Vec<&str> = counts.iter().map(|c| c.chromosome.as_str()).collect();
    let chr_at = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < names.len() {
            names[i as usize].to_string()
        } else {
            String::new()
        }
    };

    let root = SVGBackend::new(path, (SIZE.0.max(40 * counts.len() as u32), SIZE.1))
        .into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Distribution of genes by chromosome", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(counts.len() as f64 - 0.5), 0.0..y_hi * 1.1)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(counts.len())
        .x_label_formatter(&chr_at)
        .x_desc("chromosome")
        .y_desc("genes")
        .draw()?;

    for (category, offset) in [(GeneCategory::Intronless, -0.4), (GeneCategory::MultiExonic, 0.0)] {
        let c = color(category);
        chart
            .draw_series(counts.iter().enumerate().map(|(i, cc)| {
                let n = match category {
                    GeneCategory::Intronless => cc.intronless,
                    GeneCategory::MultiExonic => cc.multi_exonic,
                };
                let x = i as f64 + offset;
                Rectangle::new([(x, 0.0), (x + 0.4, n as f64)], c.filled())
            }))?
            .label(label(category))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], c.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Draws the length boxplot, the length violin plot, the length density curves and
/// the per-chromosome counts of `table` as SVG files named after `prefix`.
///
/// A figure that cannot be drawn, e.g. densities when each type has a single
/// gene, is reported and skipped; the others are still written.
///
/// ### Returns
///
/// The paths of the figures that were written.
pub fn generate_visualizations(table: &GeneTable, prefix: &str) -> anyhow::Result<Vec<PathBuf>> {
    if table.is_empty() {
        bail!("The gene table is empty; there is nothing to plot.");
    }
    let files = PlotFiles::with_prefix(prefix);
    if let Some(parent) = files.boxplot.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut groups = Vec::with_capacity(CATEGORIES.len());
    for c in CATEGORIES {
        groups.push((c, table.lengths(c)?));
    }
    let counts = table.counts_by_chromosome_and_type()?;

    let results = [
        (&files.boxplot, draw_boxplot(&files.boxplot, &groups)),
        (&files.violin, draw_violin(&files.violin, &groups)),
        (&files.density, draw_density(&files.density, &groups)),
        (
            &files.chromosomal_distribution,
            draw_chromosomal_distribution(&files.chromosomal_distribution, &counts),
        ),
    ];

    let mut written = Vec::with_capacity(results.len());
    for (path, res) in results {
        match res {
            Ok(()) => written.push(path.clone()),
            Err(e) => warn!("Skipping the figure {:?}: {:#}", path, e),
        }
    }
    info!("Wrote {} figures with the prefix {}", written.len(), prefix);
    Ok(written)
}
