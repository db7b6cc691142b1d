//! Pageviews Map - Animated per-country pageview dashboard
//!
//! Loads per-country pageview and population statistics, derives pageviews
//! per 1,000 people, and shows them as animated maps and charts.

mod charts;
mod config;
mod data;
mod gui;

use anyhow::Context;
use config::AppConfig;
use eframe::egui;
use gui::PageviewsMapApp;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pageviews_map=info")),
        )
        .init();

    // One-time initialization; everything downstream receives this object.
    let config = AppConfig::load().context("loading configuration")?;
    info!(data_path = %config.data_path.display(), "Starting Pageviews Map");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 850.0])
            .with_min_inner_size([1100.0, 700.0])
            .with_title(config.title.clone()),
        ..Default::default()
    };

    eframe::run_native(
        "Pageviews Map",
        options,
        Box::new(move |cc| Ok(Box::new(PageviewsMapApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}
