//! Chart Plotter Module
//! Draws the per-year preview chart using egui_plot.

use crate::charts::palette::region_rgb;
use crate::charts::StaticChartRenderer;
use crate::data::{DataPreparer, Metric, PreparerError, Record};
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Plot};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// Preview data for every year of a filtered table.
#[derive(Clone, Debug, Default)]
pub struct ChartData {
    pub metric: Metric,
    pub regions: Vec<String>,
    pub years: Vec<i32>,
    /// Top countries per year, largest first.
    pub top_by_year: BTreeMap<i32, Vec<Record>>,
    /// Upper Y bound shared by all years.
    pub y_max: f64,
}

impl ChartData {
    pub fn from_table(df: &DataFrame, metric: Metric, top_n: usize) -> Result<Self, PreparerError> {
        let records = DataPreparer::records(df)?;
        let regions = DataPreparer::distinct_regions(df)?;
        let years = DataPreparer::years(df)?;

        let mut by_year: BTreeMap<i32, Vec<&Record>> = BTreeMap::new();
        for record in &records {
            by_year.entry(record.year).or_default().push(record);
        }

        let top_by_year = by_year
            .iter()
            .map(|(year, rows)| {
                let top = StaticChartRenderer::top_countries(rows, metric, top_n)
                    .into_iter()
                    .cloned()
                    .collect();
                (*year, top)
            })
            .collect();

        let y_max = DataPreparer::global_max(df, metric)?.unwrap_or(100.0);

        Ok(Self {
            metric,
            regions,
            years,
            top_by_year,
            y_max,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Creates the interactive preview chart using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Get color for a region by its first-seen index.
    pub fn get_region_color(region_index: usize) -> Color32 {
        let (r, g, b) = region_rgb(region_index);
        Color32::from_rgb(r, g, b)
    }

    /// Draw the bar chart for one year.
    /// X-axis: countries ranked by metric, Y-axis: metric value
    pub fn draw_year_chart(ui: &mut egui::Ui, chart_data: &ChartData, year: i32, height: f32) {
        let rows = chart_data
            .top_by_year
            .get(&year)
            .cloned()
            .unwrap_or_default();
        let x_labels: Vec<String> = rows.iter().map(|r| r.country.clone()).collect();

        Plot::new(format!("year_chart_{}", chart_data.metric))
            .height(height)
            .legend(Legend::default())
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .include_y(0.0)
            .include_y(chart_data.y_max)
            .y_axis_label(chart_data.metric.label())
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if idx >= 0.0 && (idx - mark.value).abs() < 1e-6 {
                    x_labels.get(idx as usize).cloned().unwrap_or_default()
                } else {
                    String::new()
                }
            })
            .show(ui, |plot_ui| {
                for (region_idx, region) in chart_data.regions.iter().enumerate() {
                    let color = Self::get_region_color(region_idx);
                    let bars: Vec<Bar> = rows
                        .iter()
                        .enumerate()
                        .filter(|(_, r)| &r.region == region)
                        .map(|(i, r)| {
                            Bar::new(i as f64, chart_data.metric.value(r))
                                .width(0.7)
                                .name(&r.country_year)
                                .fill(color)
                        })
                        .collect();

                    if bars.is_empty() {
                        continue;
                    }
                    plot_ui.bar_chart(BarChart::new(bars).color(color).name(region));
                }
            });
    }
}
