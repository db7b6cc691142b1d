//! Charts module - map figures, PNG frames and the egui preview

mod figure;
mod page;
mod palette;
mod plotter;
mod renderer;

pub use figure::{FigureBuilder, MapKind};
pub use page::MapPage;
pub use plotter::{ChartData, ChartPlotter};
pub use renderer::StaticChartRenderer;
