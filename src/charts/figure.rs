//! Plotly Figure Builder
//! Produces the figure document (data, layout, frames) for the animated
//! bubble map and choropleth map. Plotly does all projection, color-scale and
//! animation work; this module only supplies data and display parameters.

use crate::charts::palette::region_hex;
use crate::config::MapSettings;
use crate::data::{DataPreparer, Metric, PreparerError, Record};
use polars::prelude::DataFrame;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Largest bubble diameter in pixels.
pub const MAX_BUBBLE_SIZE: f64 = 20.0;

#[derive(Error, Debug)]
pub enum FigureError {
    #[error(transparent)]
    Preparer(#[from] PreparerError),
    #[error("Failed to serialize figure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Which geographic view to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapKind {
    #[default]
    Bubble,
    Choropleth,
}

impl MapKind {
    pub fn slug(self) -> &'static str {
        match self {
            MapKind::Bubble => "bubble",
            MapKind::Choropleth => "choropleth",
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKind::Bubble => f.write_str("Bubble Map"),
            MapKind::Choropleth => f.write_str("Choropleth Map"),
        }
    }
}

pub struct FigureBuilder;

impl FigureBuilder {
    /// Build the full figure for a derived (and already region-filtered) table.
    pub fn build(
        df: &DataFrame,
        metric: Metric,
        kind: MapKind,
        settings: &MapSettings,
    ) -> Result<Value, FigureError> {
        let records = DataPreparer::records(df)?;
        let regions = Self::regions_in_order(&records);
        let by_year = Self::group_by_year(&records);

        let frames: Vec<Value> = match kind {
            MapKind::Bubble => {
                let sizeref = Self::bubble_sizeref(&records, metric);
                by_year
                    .iter()
                    .map(|(year, rows)| {
                        let traces = Self::bubble_traces(rows, &regions, metric, sizeref);
                        Self::frame(*year, traces)
                    })
                    .collect()
            }
            MapKind::Choropleth => {
                let zmax = DataPreparer::global_max(df, metric)?;
                by_year
                    .iter()
                    .map(|(year, rows)| {
                        Self::frame(*year, vec![Self::choropleth_trace(rows, metric, zmax)])
                    })
                    .collect()
            }
        };

        let initial = frames
            .first()
            .map(|f| f["data"].clone())
            .unwrap_or_else(|| json!([]));
        let years: Vec<i32> = by_year.keys().copied().collect();

        debug!(
            kind = kind.slug(),
            metric = metric.column(),
            frames = frames.len(),
            "Built map figure"
        );

        Ok(json!({
            "data": initial,
            "layout": Self::layout(metric, &years, settings),
            "frames": frames,
        }))
    }

    fn regions_in_order(records: &[Record]) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        for record in records {
            if !regions.contains(&record.region) {
                regions.push(record.region.clone());
            }
        }
        regions
    }

    fn group_by_year(records: &[Record]) -> BTreeMap<i32, Vec<&Record>> {
        let mut by_year: BTreeMap<i32, Vec<&Record>> = BTreeMap::new();
        for record in records {
            by_year.entry(record.year).or_default().push(record);
        }
        by_year
    }

    /// Bubble scale shared by all frames so sizes stay comparable over time.
    pub fn bubble_sizeref(records: &[Record], metric: Metric) -> f64 {
        let max = records
            .iter()
            .map(|r| metric.value(r))
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);

        if max > 0.0 {
            2.0 * max / (MAX_BUBBLE_SIZE * MAX_BUBBLE_SIZE)
        } else {
            1.0
        }
    }

    fn frame(year: i32, data: Vec<Value>) -> Value {
        json!({
            "name": year.to_string(),
            "data": data,
        })
    }

    /// One trace per region, including regions with no rows this year, so
    /// trace indices line up across frames.
    fn bubble_traces(
        rows: &[&Record],
        regions: &[String],
        metric: Metric,
        sizeref: f64,
    ) -> Vec<Value> {
        regions
            .iter()
            .enumerate()
            .map(|(idx, region)| {
                let in_region: Vec<&Record> = rows
                    .iter()
                    .copied()
                    .filter(|r| &r.region == region)
                    .collect();
                let countries: Vec<&str> = in_region.iter().map(|r| r.country.as_str()).collect();
                let sizes: Vec<f64> = in_region
                    .iter()
                    .map(|r| {
                        let v = metric.value(r);
                        if v.is_finite() && v > 0.0 {
                            v
                        } else {
                            0.0
                        }
                    })
                    .collect();

                json!({
                    "type": "scattergeo",
                    "name": region,
                    "legendgroup": region,
                    "locationmode": "country names",
                    "locations": countries,
                    "hovertext": countries,
                    "marker": {
                        "size": sizes,
                        "sizemode": "area",
                        "sizeref": sizeref,
                        "color": region_hex(idx),
                    },
                })
            })
            .collect()
    }

    fn choropleth_trace(rows: &[&Record], metric: Metric, zmax: Option<f64>) -> Value {
        let countries: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
        let z: Vec<Value> = rows
            .iter()
            .map(|r| {
                let v = metric.value(r);
                if v.is_finite() {
                    json!(v)
                } else {
                    Value::Null
                }
            })
            .collect();

        json!({
            "type": "choropleth",
            "locationmode": "country names",
            "locations": countries,
            "hovertext": countries,
            "z": z,
            "zmin": 0.0,
            "zmax": zmax,
            "colorscale": "Plasma",
            "colorbar": { "title": { "text": metric.label() } },
        })
    }

    fn layout(metric: Metric, years: &[i32], settings: &MapSettings) -> Value {
        let duration = settings.frame_duration_ms;
        let steps: Vec<Value> = years
            .iter()
            .map(|year| {
                json!({
                    "label": year.to_string(),
                    "method": "animate",
                    "args": [[year.to_string()], {
                        "mode": "immediate",
                        "frame": { "duration": duration, "redraw": true },
                        "transition": { "duration": 0 },
                    }],
                })
            })
            .collect();

        json!({
            "title": { "text": format!("Animated Time Map of {}", metric.label()) },
            "width": settings.width,
            "height": settings.height,
            "geo": {
                "projection": { "type": settings.projection },
                "showcountries": true,
                "countrycolor": "black",
                "showcoastlines": true,
                "coastlinecolor": "gray",
                "showland": true,
                "landcolor": "lightgray",
            },
            "updatemenus": [{
                "type": "buttons",
                "showactive": false,
                "buttons": [
                    {
                        "label": "Play",
                        "method": "animate",
                        "args": [null, {
                            "frame": { "duration": duration, "redraw": true },
                            "fromcurrent": true,
                            "transition": { "duration": 0 },
                        }],
                    },
                    {
                        "label": "Pause",
                        "method": "animate",
                        "args": [[null], {
                            "mode": "immediate",
                            "frame": { "duration": 0, "redraw": false },
                        }],
                    },
                ],
            }],
            "sliders": [{
                "currentvalue": { "prefix": "year=" },
                "steps": steps,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn derived() -> DataFrame {
        let raw = df!(
            "country_year" => ["France 2020", "Germany 2020", "Brazil 2020", "France 2019", "Nauru 2019"],
            "region" => ["Europe", "Europe", "Americas", "Europe", "Oceania"],
            "population" => [65_000_000i64, 83_000_000, 212_000_000, 64_900_000, 0],
            "total_pageviews" => [1_300_000_000i64, 1_500_000_000, 800_000_000, 1_250_000_000, 10],
        )
        .unwrap();
        DataPreparer::derive_columns(&raw).unwrap()
    }

    #[test]
    fn bubble_map_has_one_frame_per_year_and_trace_per_region() {
        let fig = FigureBuilder::build(
            &derived(),
            Metric::TotalPageviews,
            MapKind::Bubble,
            &MapSettings::default(),
        )
        .unwrap();

        let frames = fig["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["name"], "2019");
        assert_eq!(frames[1]["name"], "2020");

        for frame in frames {
            let traces = frame["data"].as_array().unwrap();
            let names: Vec<&str> = traces.iter().map(|t| t["name"].as_str().unwrap()).collect();
            assert_eq!(names, vec!["Europe", "Americas", "Oceania"]);
        }

        let europe_2020 = &frames[1]["data"][0];
        assert_eq!(europe_2020["locations"], json!(["France", "Germany"]));
        assert_eq!(europe_2020["locationmode"], "country names");
        assert_eq!(fig["data"], frames[0]["data"]);
    }

    #[test]
    fn bubble_sizes_drop_non_finite_values() {
        let fig = FigureBuilder::build(
            &derived(),
            Metric::PageviewsPer1000,
            MapKind::Bubble,
            &MapSettings::default(),
        )
        .unwrap();

        let oceania_2019 = &fig["frames"][0]["data"][2];
        assert_eq!(oceania_2019["marker"]["size"], json!([0.0]));
    }

    #[test]
    fn sizeref_scales_to_largest_value() {
        let records = DataPreparer::records(&derived()).unwrap();
        let sizeref = FigureBuilder::bubble_sizeref(&records, Metric::Population);
        assert_eq!(sizeref, 2.0 * 212_000_000.0 / 400.0);
    }

    #[test]
    fn choropleth_uses_global_max_and_nulls() {
        let df = derived();
        let fig = FigureBuilder::build(
            &df,
            Metric::PageviewsPer1000,
            MapKind::Choropleth,
            &MapSettings::default(),
        )
        .unwrap();

        let expected_max = DataPreparer::global_max(&df, Metric::PageviewsPer1000).unwrap();
        let trace_2019 = &fig["frames"][0]["data"][0];
        assert_eq!(trace_2019["type"], "choropleth");
        assert_eq!(trace_2019["zmax"], json!(expected_max));
        assert_eq!(trace_2019["zmin"], json!(0.0));
        assert_eq!(trace_2019["z"][1], Value::Null);
        assert_eq!(fig["frames"][1]["data"][0]["zmax"], trace_2019["zmax"]);
    }

    #[test]
    fn layout_carries_title_and_settings() {
        let settings = MapSettings {
            width: 1200,
            height: 600,
            projection: "orthographic".to_string(),
            frame_duration_ms: 500,
        };
        let fig = FigureBuilder::build(&derived(), Metric::Population, MapKind::Bubble, &settings)
            .unwrap();

        let layout = &fig["layout"];
        assert_eq!(layout["title"]["text"], "Animated Time Map of Population");
        assert_eq!(layout["width"], 1200);
        assert_eq!(layout["geo"]["projection"]["type"], "orthographic");
        assert_eq!(layout["sliders"][0]["steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_selection_builds_empty_figure() {
        let empty = DataPreparer::filter_by_region(&derived(), &[]).unwrap();
        let fig = FigureBuilder::build(
            &empty,
            Metric::Population,
            MapKind::Choropleth,
            &MapSettings::default(),
        )
        .unwrap();

        assert_eq!(fig["frames"], json!([]));
        assert_eq!(fig["data"], json!([]));
    }
}
