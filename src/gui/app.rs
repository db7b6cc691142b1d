//! Pageviews Map Main Application
//! Main window with control panel and animated preview.

use crate::charts::{ChartData, FigureBuilder, MapPage, StaticChartRenderer};
use crate::config::AppConfig;
use crate::data::{DataLoader, DataPreparer, DataSource, LoaderError};
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction};
use anyhow::Context;
use egui::SidePanel;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// CSV loading result from background thread
enum LoadResult {
    Progress(f32, String),
    Complete {
        df: DataFrame,
        regions: Vec<String>,
        source_name: String,
    },
    /// Default file missing and no upload supplied.
    NeedsUpload(PathBuf),
    Error(String),
}

/// Frame export result from background thread
enum ExportResult {
    Complete(Vec<PathBuf>),
    Error(String),
}

/// Main application window.
pub struct PageviewsMapApp {
    config: AppConfig,
    loader: DataLoader,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    // Async CSV loading
    load_rx: Option<Receiver<LoadResult>>,
    is_loading: bool,

    // Async frame export
    export_rx: Option<Receiver<ExportResult>>,
    is_exporting: bool,
}

impl PageviewsMapApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let frame_duration = Duration::from_millis(u64::from(config.map.frame_duration_ms));
        let mut app = Self {
            config,
            loader: DataLoader::new(),
            control_panel: ControlPanel::new(),
            chart_viewer: ChartViewer::new(frame_duration),
            load_rx: None,
            is_loading: false,
            export_rx: None,
            is_exporting: false,
        };

        let default_path = app.config.data_path.clone();
        app.start_loading(move |tx| {
            let _ = tx.send(LoadResult::Progress(10.0, "Reading default CSV...".to_string()));
            match DataLoader::resolve_data_source(&default_path, None) {
                Ok(df) => Ok((df, default_path.display().to_string())),
                Err(LoaderError::NotFound(path)) => Err(LoadResult::NeedsUpload(path)),
                Err(e) => Err(LoadResult::Error(e.to_string())),
            }
        });
        app
    }

    /// Run a load on a background thread, then derive columns there too.
    fn start_loading<F>(&mut self, read: F)
    where
        F: FnOnce(&Sender<LoadResult>) -> Result<(DataFrame, String), LoadResult> + Send + 'static,
    {
        let (tx, rx) = channel();
        self.load_rx = Some(rx);
        self.is_loading = true;
        self.control_panel.busy = true;
        self.control_panel.set_progress(5.0, "Loading CSV file...");

        thread::spawn(move || {
            let (raw, source_name) = match read(&tx) {
                Ok(loaded) => loaded,
                Err(result) => {
                    let _ = tx.send(result);
                    return;
                }
            };

            let _ = tx.send(LoadResult::Progress(60.0, "Deriving columns...".to_string()));

            let result = DataPreparer::derive_columns(&raw).and_then(|df| {
                let regions = DataPreparer::distinct_regions(&df)?;
                Ok((df, regions))
            });

            let _ = match result {
                Ok((df, regions)) => tx.send(LoadResult::Complete {
                    df,
                    regions,
                    source_name,
                }),
                Err(e) => tx.send(LoadResult::Error(e.to_string())),
            };
        });
    }

    /// Upload fallback: load a file picked by the user.
    fn handle_browse_csv(&mut self) {
        if self.is_loading {
            return;
        }

        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        else {
            return;
        };

        self.chart_viewer.clear();
        self.start_loading(move |tx| {
            let _ = tx.send(LoadResult::Progress(10.0, "Reading uploaded CSV...".to_string()));
            let source = DataSource::upload_from_path(&path)
                .map_err(|e| LoadResult::Error(e.to_string()))?;
            let df = DataLoader::load(&source).map_err(|e| LoadResult::Error(e.to_string()))?;
            Ok((df, source.name()))
        });
    }

    /// Check for CSV loading results
    fn check_load_results(&mut self) {
        let rx = self.load_rx.take();
        if let Some(rx) = rx {
            let mut should_keep_receiver = true;

            while let Ok(result) = rx.try_recv() {
                match result {
                    LoadResult::Progress(progress, status) => {
                        self.control_panel.set_progress(progress, &status);
                    }
                    LoadResult::Complete {
                        df,
                        regions,
                        source_name,
                    } => {
                        self.loader.set_dataframe(df, source_name.clone());
                        self.control_panel.settings.source_name = Some(source_name);
                        self.control_panel.update_regions(regions);
                        self.control_panel.set_progress(
                            100.0,
                            &format!(
                                "Loaded {} rows, {} regions",
                                self.loader.get_row_count(),
                                self.control_panel.regions.len()
                            ),
                        );
                        self.finish_loading();
                        should_keep_receiver = false;
                        self.refresh_preview();
                    }
                    LoadResult::NeedsUpload(path) => {
                        warn!(path = %path.display(), "Default data file missing");
                        self.control_panel.set_progress(
                            0.0,
                            &format!(
                                "Default data not found at {}. Upload a CSV to continue.",
                                path.display()
                            ),
                        );
                        self.finish_loading();
                        should_keep_receiver = false;
                    }
                    LoadResult::Error(e) => {
                        error!(error = %e, "Failed to load data");
                        self.control_panel.set_progress(0.0, &format!("Error: {}", e));
                        self.finish_loading();
                        should_keep_receiver = false;
                        // Previously loaded data, if any, stays on screen.
                        self.refresh_preview();
                    }
                }
            }

            if should_keep_receiver {
                self.load_rx = Some(rx);
            }
        }
    }

    fn finish_loading(&mut self) {
        self.is_loading = false;
        self.control_panel.busy = self.is_exporting;
    }

    /// Current table restricted to the ticked regions.
    fn filtered_table(&self) -> anyhow::Result<Option<DataFrame>> {
        let Some(df) = self.loader.get_dataframe() else {
            return Ok(None);
        };
        let selected = self.control_panel.get_selected_regions();
        let filtered = DataPreparer::filter_by_region(df, &selected)
            .context("filtering by region")?;
        Ok(Some(filtered))
    }

    /// Rebuild the preview after a metric or region change.
    fn refresh_preview(&mut self) {
        let metric = self.control_panel.settings.metric;
        let result = self.filtered_table().and_then(|df| {
            df.map(|df| ChartData::from_table(&df, metric, self.config.frames.top_n))
                .transpose()
                .context("building preview")
        });

        match result {
            Ok(Some(chart_data)) => self.chart_viewer.set_chart_data(chart_data),
            Ok(None) => self.chart_viewer.clear(),
            Err(e) => {
                error!(error = %e, "Preview failed");
                self.control_panel.set_progress(0.0, &format!("Error: {:#}", e));
            }
        }
    }

    /// Write the map page and open it in the default browser.
    fn handle_open_map(&mut self) {
        match self.write_map_page() {
            Ok(Some(path)) => {
                if let Err(e) = open::that(&path) {
                    warn!(error = %e, path = %path.display(), "Could not open map page");
                }
                self.control_panel
                    .set_progress(100.0, &format!("Complete! Map written to {}", path.display()));
            }
            Ok(None) => self.control_panel.set_progress(0.0, "No data loaded"),
            Err(e) => {
                error!(error = %e, "Map export failed");
                self.control_panel.set_progress(0.0, &format!("Error: {:#}", e));
            }
        }
    }

    fn write_map_page(&self) -> anyhow::Result<Option<PathBuf>> {
        let Some(df) = self.filtered_table()? else {
            return Ok(None);
        };
        let settings = &self.control_panel.settings;

        let figure = FigureBuilder::build(&df, settings.metric, settings.map_kind, &self.config.map)
            .context("building map figure")?;
        let stem = format!("{}_{}", settings.map_kind.slug(), settings.metric.column());
        let path = MapPage::write(&self.config.output_dir, &stem, &self.config.title, &figure)
            .context("writing map page")?;

        info!(
            source = self.loader.get_source_name().unwrap_or_default(),
            kind = %settings.map_kind,
            metric = %settings.metric,
            rows = df.height(),
            "Map ready"
        );
        Ok(Some(path))
    }

    /// Start PNG frame export in background thread
    fn start_export(&mut self) {
        let df = match self.filtered_table() {
            Ok(Some(df)) => df,
            Ok(None) => {
                self.control_panel.set_progress(0.0, "No data loaded");
                return;
            }
            Err(e) => {
                self.control_panel.set_progress(0.0, &format!("Error: {:#}", e));
                return;
            }
        };

        let metric = self.control_panel.settings.metric;
        let output_dir = self.config.output_dir.clone();
        let settings = self.config.frames.clone();

        let (tx, rx) = channel();
        self.export_rx = Some(rx);
        self.is_exporting = true;
        self.control_panel.busy = true;
        self.control_panel.set_progress(20.0, "Rendering frames...");

        thread::spawn(move || {
            let result =
                StaticChartRenderer::render_year_frames(&df, metric, &output_dir, &settings);
            let _ = match result {
                Ok(paths) => tx.send(ExportResult::Complete(paths)),
                Err(e) => tx.send(ExportResult::Error(e.to_string())),
            };
        });
    }

    /// Check for export results
    fn check_export_results(&mut self) {
        let Some(rx) = self.export_rx.take() else {
            return;
        };

        match rx.try_recv() {
            Ok(ExportResult::Complete(paths)) => {
                let status = if paths.is_empty() {
                    "No frames to export".to_string()
                } else {
                    format!("Complete! {} frames exported", paths.len())
                };
                self.control_panel.set_progress(100.0, &status);
                self.is_exporting = false;
            }
            Ok(ExportResult::Error(e)) => {
                error!(error = %e, "Frame export failed");
                self.control_panel.set_progress(0.0, &format!("Error: {}", e));
                self.is_exporting = false;
            }
            Err(TryRecvError::Empty) => self.export_rx = Some(rx),
            Err(TryRecvError::Disconnected) => {
                self.control_panel
                    .set_progress(0.0, "Error: frame export stopped unexpectedly");
                self.is_exporting = false;
            }
        }
        self.control_panel.busy = self.is_loading || self.is_exporting;
    }
}

impl eframe::App for PageviewsMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();
        self.check_export_results();

        // Request repaint while loading or exporting
        if self.is_loading || self.is_exporting {
            ctx.request_repaint();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::BrowseCsv => self.handle_browse_csv(),
                        ControlPanelAction::SelectionChanged => self.refresh_preview(),
                        ControlPanelAction::OpenMap => self.handle_open_map(),
                        ControlPanelAction::ExportFrames => {
                            if !self.is_exporting {
                                self.start_export();
                            }
                        }
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(&self.config.title);
            ui.add_space(8.0);
            self.chart_viewer.show(ctx, ui);
        });
    }
}
