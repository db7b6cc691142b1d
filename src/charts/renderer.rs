//! Static Frame Renderer
//! Writes one PNG per year: the top countries for a metric, bars colored by
//! region.
//!
//! Layout:
//! 1. Caption: "{metric label} - {year}"
//! 2. Horizontal bars, largest at the top
//! 3. Country names on the Y axis, metric values on the X axis

use crate::charts::palette::region_rgb;
use crate::config::FrameSettings;
use crate::data::{DataPreparer, Metric, PreparerError, Record};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Preparer(#[from] PreparerError),
    #[error("Failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Drawing failed: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render every year of a derived table into `<output_dir>/frames/`.
    ///
    /// Frames are drawn in parallel; paths come back in year order.
    pub fn render_year_frames(
        df: &DataFrame,
        metric: Metric,
        output_dir: &Path,
        settings: &FrameSettings,
    ) -> Result<Vec<PathBuf>, RenderError> {
        let records = DataPreparer::records(df)?;
        let regions = DataPreparer::distinct_regions(df)?;

        let mut by_year: BTreeMap<i32, Vec<&Record>> = BTreeMap::new();
        for record in &records {
            by_year.entry(record.year).or_default().push(record);
        }
        if by_year.is_empty() {
            return Ok(Vec::new());
        }

        let frames_dir = output_dir.join("frames");
        std::fs::create_dir_all(&frames_dir).map_err(|source| RenderError::Io {
            path: frames_dir.clone(),
            source,
        })?;

        let x_max = Self::axis_max(&records, metric);
        let jobs: Vec<(i32, Vec<&Record>)> = by_year.into_iter().collect();

        let paths = jobs
            .par_iter()
            .map(|(year, rows)| {
                let path = frames_dir.join(format!("{}_{}.png", metric.column(), year));
                let top = Self::top_countries(rows, metric, settings.top_n);
                Self::render_frame(&path, *year, &top, &regions, metric, x_max, settings)?;
                Ok(path)
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        info!(
            frames = paths.len(),
            dir = %frames_dir.display(),
            "Exported year frames"
        );
        Ok(paths)
    }

    /// Largest finite values first, at most `n` rows.
    pub fn top_countries<'a>(rows: &[&'a Record], metric: Metric, n: usize) -> Vec<&'a Record> {
        let mut ranked: Vec<&Record> = rows
            .iter()
            .copied()
            .filter(|r| metric.value(r).is_finite())
            .collect();
        ranked.sort_by(|a, b| {
            metric
                .value(b)
                .partial_cmp(&metric.value(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }

    /// Shared X range so frames are comparable when played in sequence.
    fn axis_max(records: &[Record], metric: Metric) -> f64 {
        let max = records
            .iter()
            .map(|r| metric.value(r))
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);
        if max > 0.0 {
            max * 1.1
        } else {
            1.0
        }
    }

    /// Rank drawn in segment `slot`; rank 0 sits at the top. The segmented
    /// axis over `0..n` has one spare segment above the bars, which maps to
    /// `None`.
    fn rank_at(n: u32, slot: u32) -> Option<usize> {
        n.checked_sub(1)?.checked_sub(slot).map(|rank| rank as usize)
    }

    fn render_frame(
        path: &Path,
        year: i32,
        top: &[&Record],
        regions: &[String],
        metric: Metric,
        x_max: f64,
        settings: &FrameSettings,
    ) -> Result<(), RenderError> {
        let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let n = top.len().max(1) as u32;
        let names: Vec<String> = top.iter().map(|r| r.country.clone()).collect();

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} - {}", metric.label(), year), ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(180)
            .build_cartesian_2d(0.0..x_max, (0u32..n).into_segmented())
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc(metric.label())
            .y_labels(n as usize + 1)
            .y_label_formatter(&|seg| match seg {
                SegmentValue::CenterOf(slot) => Self::rank_at(n, *slot)
                    .and_then(|rank| names.get(rank))
                    .cloned()
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(top.iter().enumerate().map(|(rank, record)| {
                let slot = (n - 1).saturating_sub(rank as u32);
                let region_idx = regions
                    .iter()
                    .position(|r| r == &record.region)
                    .unwrap_or(0);
                let (r, g, b) = region_rgb(region_idx);
                Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(slot)),
                        (metric.value(record), SegmentValue::Exact(slot + 1)),
                    ],
                    RGBColor(r, g, b).filled(),
                )
            }))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        debug!(path = %path.display(), year, "Rendered frame");
        Ok(())
    }
}
