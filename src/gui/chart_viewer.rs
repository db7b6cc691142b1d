//! Chart Viewer Widget
//! Central panel that animates the per-year preview chart.

use crate::charts::{ChartData, ChartPlotter};
use egui::{Color32, RichText};
use std::time::Duration;

const CHART_HEIGHT: f32 = 520.0;

/// Animated year-by-year preview.
pub struct ChartViewer {
    pub chart_data: Option<ChartData>,
    pub year_index: usize,
    pub playing: bool,
    frame_duration: Duration,
    last_step: f64,
}

impl ChartViewer {
    pub fn new(frame_duration: Duration) -> Self {
        Self {
            chart_data: None,
            year_index: 0,
            playing: false,
            frame_duration,
            last_step: 0.0,
        }
    }

    /// Clear the chart
    pub fn clear(&mut self) {
        self.chart_data = None;
        self.year_index = 0;
        self.playing = false;
    }

    /// Swap in new data, keeping the current year when it still exists.
    pub fn set_chart_data(&mut self, chart_data: ChartData) {
        let current_year = self.current_year();
        self.year_index = current_year
            .and_then(|y| chart_data.years.iter().position(|&v| v == y))
            .unwrap_or(0);
        self.chart_data = Some(chart_data);
    }

    pub fn current_year(&self) -> Option<i32> {
        self.chart_data
            .as_ref()
            .and_then(|d| d.years.get(self.year_index).copied())
    }

    /// Move to the next year, wrapping to the first.
    pub fn step(&mut self) {
        if let Some(data) = &self.chart_data {
            if !data.years.is_empty() {
                self.year_index = (self.year_index + 1) % data.years.len();
            }
        }
    }

    pub fn show(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(data) = self.chart_data.as_ref().filter(|d| !d.is_empty()) else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        };
        let year_count = data.years.len();

        if self.playing {
            let now = ctx.input(|i| i.time);
            if now - self.last_step >= self.frame_duration.as_secs_f64() {
                self.last_step = now;
                self.step();
            }
            ctx.request_repaint_after(self.frame_duration);
        }

        let Some(data) = self.chart_data.as_ref() else {
            return;
        };
        let Some(year) = data.years.get(self.year_index).copied() else {
            return;
        };

        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(2.0, Color32::from_rgb(100, 149, 237)))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.label(
                    RichText::new(format!("{} - {}", data.metric.label(), year))
                        .size(18.0)
                        .strong(),
                );

                ui.add_space(8.0);

                // Legend
                ui.horizontal_wrapped(|ui| {
                    for (idx, region) in data.regions.iter().enumerate() {
                        let (rect, _) =
                            ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
                        ui.painter()
                            .rect_filled(rect, 3.0, ChartPlotter::get_region_color(idx));
                        ui.label(RichText::new(region).size(13.0));
                        ui.add_space(12.0);
                    }
                });

                ui.add_space(10.0);
                ChartPlotter::draw_year_chart(ui, data, year, CHART_HEIGHT);
            });

        ui.add_space(10.0);

        ui.horizontal(|ui| {
            let label = if self.playing { "⏸ Pause" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.playing = !self.playing;
                self.last_step = ctx.input(|i| i.time);
            }

            let mut index = self.year_index;
            let slider = egui::Slider::new(&mut index, 0..=year_count.saturating_sub(1))
                .show_value(false)
                .text(format!("year={}", year));
            if ui.add(slider).changed() {
                self.year_index = index;
                self.playing = false;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn data_with_years(years: Vec<i32>) -> ChartData {
        ChartData {
            years,
            top_by_year: BTreeMap::new(),
            ..ChartData::default()
        }
    }

    #[test]
    fn step_wraps_around() {
        let mut viewer = ChartViewer::new(Duration::from_millis(500));
        viewer.set_chart_data(data_with_years(vec![2015, 2016, 2017]));

        viewer.step();
        viewer.step();
        assert_eq!(viewer.current_year(), Some(2017));
        viewer.step();
        assert_eq!(viewer.current_year(), Some(2015));
    }

    #[test]
    fn new_data_keeps_current_year_when_present() {
        let mut viewer = ChartViewer::new(Duration::from_millis(500));
        viewer.set_chart_data(data_with_years(vec![2015, 2016, 2017]));
        viewer.step();

        viewer.set_chart_data(data_with_years(vec![2016, 2017]));
        assert_eq!(viewer.current_year(), Some(2016));

        viewer.set_chart_data(data_with_years(vec![2020]));
        assert_eq!(viewer.current_year(), Some(2020));
    }

    #[test]
    fn clear_drops_data() {
        let mut viewer = ChartViewer::new(Duration::from_millis(500));
        viewer.set_chart_data(data_with_years(vec![2015]));
        viewer.clear();
        assert_eq!(viewer.current_year(), None);
    }
}
