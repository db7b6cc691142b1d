//! Control Panel Widget
//! Left side panel with the data source, metric and region controls.

use crate::charts::MapKind;
use crate::data::{Metric, UNKNOWN_REGION};
use egui::{Color32, ComboBox, RichText, ScrollArea};

/// User choices that drive every view.
#[derive(Default, Clone)]
pub struct UserSettings {
    pub source_name: Option<String>,
    pub metric: Metric,
    pub map_kind: MapKind,
}

/// Left side control panel with file selection and display controls.
pub struct ControlPanel {
    pub settings: UserSettings,
    pub regions: Vec<String>,
    pub selected_regions: Vec<bool>,
    pub progress: f32,
    pub status: String,
    pub data_ready: bool,
    pub busy: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            settings: UserSettings::default(),
            regions: Vec::new(),
            selected_regions: Vec::new(),
            progress: 0.0,
            status: "Ready".to_string(),
            data_ready: false,
            busy: false,
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the region list; every region starts selected.
    pub fn update_regions(&mut self, regions: Vec<String>) {
        self.selected_regions = vec![true; regions.len()];
        self.regions = regions;
        self.data_ready = true;
    }

    /// Regions currently ticked, in list order.
    pub fn get_selected_regions(&self) -> Vec<String> {
        self.regions
            .iter()
            .zip(self.selected_regions.iter())
            .filter(|(_, &selected)| selected)
            .map(|(region, _)| region.clone())
            .collect()
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("🌍 Pageviews Map")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Population, pageviews and pageviews per 1,000 people")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let source_text = self
                        .settings
                        .source_name
                        .clone()
                        .unwrap_or_else(|| "No data loaded".to_string());

                    ui.label(RichText::new(&source_text).size(12.0).color(
                        if self.settings.source_name.is_some() {
                            Color32::WHITE
                        } else {
                            Color32::GRAY
                        },
                    ));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.add_enabled_ui(!self.busy, |ui| {
                            if ui.button("📂 Upload CSV").clicked() {
                                action = ControlPanelAction::BrowseCsv;
                            }
                        });
                    });
                });
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Metric Section =====
        ui.label(RichText::new("📐 Metric").size(14.0).strong());
        ui.add_space(5.0);

        ui.horizontal(|ui| {
            ui.add_sized([90.0, 20.0], egui::Label::new("Choose a metric:"));
            ComboBox::from_id_salt("metric")
                .width(170.0)
                .selected_text(self.settings.metric.column())
                .show_ui(ui, |ui| {
                    for metric in Metric::ALL {
                        if ui
                            .selectable_label(self.settings.metric == metric, metric.column())
                            .clicked()
                        {
                            self.settings.metric = metric;
                            action = ControlPanelAction::SelectionChanged;
                        }
                    }
                });
        });

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.radio_value(&mut self.settings.map_kind, MapKind::Bubble, "Bubble Map");
            ui.radio_value(&mut self.settings.map_kind, MapKind::Choropleth, "Choropleth");
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Region Filter Section =====
        ui.label(RichText::new("🗺 Filter by region").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(5.0)
            .show(ui, |ui| {
                ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                    if self.regions.is_empty() {
                        ui.label(RichText::new("No regions").color(Color32::GRAY));
                    }
                    for (i, region) in self.regions.iter().enumerate() {
                        if let Some(selected) = self.selected_regions.get_mut(i) {
                            let label = if region == UNKNOWN_REGION {
                                "(no region)"
                            } else {
                                region.as_str()
                            };
                            if ui.checkbox(selected, label).changed() {
                                action = ControlPanelAction::SelectionChanged;
                            }
                        }
                    }
                });
            });

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            if ui.small_button("Select All").clicked() {
                self.selected_regions.iter_mut().for_each(|v| *v = true);
                action = ControlPanelAction::SelectionChanged;
            }
            if ui.small_button("Clear All").clicked() {
                self.selected_regions.iter_mut().for_each(|v| *v = false);
                action = ControlPanelAction::SelectionChanged;
            }
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Action Buttons =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.data_ready && !self.busy, |ui| {
                let button = egui::Button::new(RichText::new("▶ Open Map").size(16.0))
                    .min_size(egui::vec2(200.0, 35.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::OpenMap;
                }

                ui.add_space(8.0);

                let export_button =
                    egui::Button::new(RichText::new("🖼 Export Frames").size(14.0))
                        .min_size(egui::vec2(150.0, 30.0));
                if ui.add(export_button).clicked() {
                    action = ControlPanelAction::ExportFrames;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Progress Section =====
        ui.label(RichText::new("📊 Progress").size(14.0).strong());
        ui.add_space(5.0);

        ui.add(
            egui::ProgressBar::new(self.progress / 100.0)
                .show_percentage()
                .animate(self.busy),
        );

        ui.add_space(5.0);

        let status_color = if self.status.contains("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.contains("Complete") || self.status.starts_with("Loaded") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    /// Set progress and status
    pub fn set_progress(&mut self, progress: f32, status: &str) {
        self.progress = progress;
        self.status = status.to_string();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseCsv,
    SelectionChanged,
    OpenMap,
    ExportFrames,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_regions_start_fully_selected() {
        let mut panel = ControlPanel::new();
        panel.update_regions(vec!["Asia".into(), "Europe".into()]);

        assert!(panel.data_ready);
        assert_eq!(panel.get_selected_regions(), vec!["Asia", "Europe"]);
    }

    #[test]
    fn unticked_regions_are_excluded() {
        let mut panel = ControlPanel::new();
        panel.update_regions(vec!["Asia".into(), "Europe".into(), "Africa".into()]);
        panel.selected_regions[1] = false;

        assert_eq!(panel.get_selected_regions(), vec!["Asia", "Africa"]);

        panel.selected_regions.iter_mut().for_each(|v| *v = false);
        assert!(panel.get_selected_regions().is_empty());
    }
}
