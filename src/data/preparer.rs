//! Data Preparer Module
//! Derives `country`, `year` and `pageviews_per_1000` from the raw table and
//! provides the region filter used by every view.

use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PreparerError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Row {row}: cannot split country_year '{value}': {reason}")]
    Parse {
        row: usize,
        value: String,
        reason: &'static str,
    },
    #[error("Row {row}: {column} is missing")]
    MissingValue { row: usize, column: &'static str },
}

/// Region of a row whose region cell is empty.
pub const UNKNOWN_REGION: &str = "";

/// Metric a user can map onto bubble size or choropleth color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    Population,
    TotalPageviews,
    #[default]
    PageviewsPer1000,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::Population,
        Metric::TotalPageviews,
        Metric::PageviewsPer1000,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Population => "population",
            Metric::TotalPageviews => "total_pageviews",
            Metric::PageviewsPer1000 => "pageviews_per_1000",
        }
    }

    /// Column name with underscores as spaces and each word capitalized.
    pub fn label(self) -> String {
        self.column()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of this metric on a record.
    pub fn value(self, record: &Record) -> f64 {
        match self {
            Metric::Population => record.population,
            Metric::TotalPageviews => record.total_pageviews,
            Metric::PageviewsPer1000 => record.pageviews_per_1000,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One country-year row of a derived table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub country_year: String,
    pub country: String,
    pub year: i32,
    pub region: String,
    pub population: f64,
    pub total_pageviews: f64,
    pub pageviews_per_1000: f64,
}

/// Column-wise transforms on the pageview table.
pub struct DataPreparer;

impl DataPreparer {
    /// Split `"<country name> <year>"` on its last whitespace boundary.
    pub fn split_country_year(value: &str) -> Result<(&str, i32), &'static str> {
        let trimmed = value.trim_end();
        let (name, year) = trimmed
            .rsplit_once(char::is_whitespace)
            .ok_or("no whitespace before a trailing year")?;
        let year = year.parse::<i32>().map_err(|_| "trailing token is not an integer")?;
        let name = name.trim_end();
        if name.trim_start().is_empty() {
            return Err("country name is empty");
        }
        Ok((name, year))
    }

    /// Add `country`, `year` and `pageviews_per_1000`.
    ///
    /// `population` and `total_pageviews` are coerced to Float64. Row count and
    /// order are unchanged. Zero population yields a non-finite ratio.
    pub fn derive_columns(df: &DataFrame) -> Result<DataFrame, PreparerError> {
        let country_year = df.column("country_year")?.cast(&DataType::String)?;
        let country_year = country_year.str()?;

        let mut countries: Vec<String> = Vec::with_capacity(df.height());
        let mut years: Vec<i32> = Vec::with_capacity(df.height());

        for (row, value) in country_year.into_iter().enumerate() {
            let value = value.ok_or(PreparerError::Parse {
                row,
                value: String::new(),
                reason: "value is missing",
            })?;
            let (country, year) =
                Self::split_country_year(value).map_err(|reason| PreparerError::Parse {
                    row,
                    value: value.to_string(),
                    reason,
                })?;
            countries.push(country.to_string());
            years.push(year);
        }

        let population = df.column("population")?.cast(&DataType::Float64)?;
        let pageviews = df.column("total_pageviews")?.cast(&DataType::Float64)?;

        let per_1000: Float64Chunked = population
            .f64()?
            .into_iter()
            .zip(pageviews.f64()?.into_iter())
            .map(|(pop, views)| match (pop, views) {
                (Some(pop), Some(views)) => Some(views / (pop / 1000.0)),
                _ => None,
            })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new("country".into(), countries))?;
        out.with_column(Column::new("year".into(), years))?;
        out.with_column(population)?;
        out.with_column(pageviews)?;
        out.with_column(per_1000.with_name("pageviews_per_1000".into()).into_series())?;

        debug!(rows = out.height(), "Derived country, year and pageviews_per_1000");
        Ok(out)
    }

    /// Unique regions in first-seen order. Empty cells count as
    /// [`UNKNOWN_REGION`].
    pub fn distinct_regions(df: &DataFrame) -> Result<Vec<String>, PreparerError> {
        let regions = df.column("region")?.cast(&DataType::String)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for region in regions.str()?.into_iter().map(|r| r.unwrap_or(UNKNOWN_REGION)) {
            if seen.insert(region) {
                out.push(region.to_string());
            }
        }
        Ok(out)
    }

    /// Keep rows whose region is selected. An empty selection keeps nothing.
    pub fn filter_by_region(
        df: &DataFrame,
        selected: &[String],
    ) -> Result<DataFrame, PreparerError> {
        let regions = df.column("region")?.cast(&DataType::String)?;
        let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let mask: BooleanChunked = regions
            .str()?
            .into_iter()
            .map(|region| selected.contains(region.unwrap_or(UNKNOWN_REGION)))
            .collect();

        Ok(df.filter(&mask)?)
    }

    /// Sorted distinct years; one animation frame each.
    pub fn years(df: &DataFrame) -> Result<Vec<i32>, PreparerError> {
        let years = df.column("year")?.cast(&DataType::Int32)?;
        let years: BTreeSet<i32> = years.i32()?.into_iter().flatten().collect();
        Ok(years.into_iter().collect())
    }

    /// `ceil(max / 100) * 100` over the finite values of `metric`.
    pub fn global_max(df: &DataFrame, metric: Metric) -> Result<Option<f64>, PreparerError> {
        let values = df.column(metric.column())?.cast(&DataType::Float64)?;
        let max = values
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

        Ok(max.map(|m| (m / 100.0).ceil() * 100.0))
    }

    /// Typed rows of a derived table.
    pub fn records(df: &DataFrame) -> Result<Vec<Record>, PreparerError> {
        let country_year = df.column("country_year")?.cast(&DataType::String)?;
        let country = df.column("country")?.cast(&DataType::String)?;
        let region = df.column("region")?.cast(&DataType::String)?;
        let year = df.column("year")?.cast(&DataType::Int32)?;
        let population = df.column("population")?.cast(&DataType::Float64)?;
        let pageviews = df.column("total_pageviews")?.cast(&DataType::Float64)?;
        let per_1000 = df.column("pageviews_per_1000")?.cast(&DataType::Float64)?;

        let (country_year, country, region) = (country_year.str()?, country.str()?, region.str()?);
        let year = year.i32()?;
        let (population, pageviews, per_1000) = (population.f64()?, pageviews.f64()?, per_1000.f64()?);

        let missing = |row, column| PreparerError::MissingValue { row, column };

        (0..df.height())
            .map(|i| -> Result<Record, PreparerError> {
                Ok(Record {
                    country_year: country_year
                        .get(i)
                        .ok_or_else(|| missing(i, "country_year"))?
                        .to_string(),
                    country: country.get(i).ok_or_else(|| missing(i, "country"))?.to_string(),
                    year: year.get(i).ok_or_else(|| missing(i, "year"))?,
                    region: region.get(i).unwrap_or(UNKNOWN_REGION).to_string(),
                    population: population.get(i).unwrap_or(f64::NAN),
                    total_pageviews: pageviews.get(i).unwrap_or(f64::NAN),
                    pageviews_per_1000: per_1000.get(i).unwrap_or(f64::NAN),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table() -> DataFrame {
        df!(
            "country_year" => ["France 2020", "United States 2019", "Afghanistan 2015", "France 2019", "Tuvalu 2020"],
            "region" => ["Europe", "Americas", "Asia", "Europe", "Oceania"],
            "population" => [65_000_000i64, 328_000_000, 33_736_494, 64_900_000, 0],
            "total_pageviews" => [1_300_000_000i64, 9_000_000_000, 120_000, 1_250_000_000, 5_000],
        )
        .unwrap()
    }

    fn derived_table() -> DataFrame {
        DataPreparer::derive_columns(&raw_table()).unwrap()
    }

    fn all_regions(df: &DataFrame) -> Vec<String> {
        DataPreparer::distinct_regions(df).unwrap()
    }

    #[test]
    fn splits_on_last_whitespace() {
        assert_eq!(DataPreparer::split_country_year("France 2020"), Ok(("France", 2020)));
        assert_eq!(
            DataPreparer::split_country_year("Bosnia and Herzegovina 2018"),
            Ok(("Bosnia and Herzegovina", 2018))
        );
        assert_eq!(DataPreparer::split_country_year("Chad  2016 "), Ok(("Chad", 2016)));
    }

    #[test]
    fn split_rejects_malformed_values() {
        assert!(DataPreparer::split_country_year("France").is_err());
        assert!(DataPreparer::split_country_year("France twenty").is_err());
        assert!(DataPreparer::split_country_year("2020").is_err());
        assert!(DataPreparer::split_country_year(" 2020").is_err());
    }

    #[test]
    fn derives_france_example() {
        let records = DataPreparer::records(&derived_table()).unwrap();
        let france = &records[0];

        assert_eq!(france.country, "France");
        assert_eq!(france.year, 2020);
        assert_eq!(france.pageviews_per_1000, 20000.0);
    }

    #[test]
    fn derived_columns_match_formula() {
        let records = DataPreparer::records(&derived_table()).unwrap();

        for record in records.iter().filter(|r| r.population > 0.0) {
            let expected = record.total_pageviews / (record.population / 1000.0);
            assert!((record.pageviews_per_1000 - expected).abs() <= expected.abs() * 1e-12);

            let (name, year) = DataPreparer::split_country_year(&record.country_year).unwrap();
            assert_eq!(record.country, name);
            assert_eq!(record.year, year);
        }
    }

    #[test]
    fn zero_population_is_non_finite_not_an_error() {
        let records = DataPreparer::records(&derived_table()).unwrap();
        let tuvalu = records.iter().find(|r| r.country == "Tuvalu").unwrap();
        assert!(!tuvalu.pageviews_per_1000.is_finite());
    }

    #[test]
    fn derivation_keeps_row_count_and_order() {
        let raw = raw_table();
        let derived = derived_table();

        assert_eq!(derived.height(), raw.height());
        assert!(derived
            .column("country_year")
            .unwrap()
            .as_materialized_series()
            .equals_missing(raw.column("country_year").unwrap().as_materialized_series()));
    }

    #[test]
    fn malformed_country_year_fails_with_row() {
        let raw = df!(
            "country_year" => ["France 2020", "Atlantis"],
            "region" => ["Europe", "Ocean"],
            "population" => [1i64, 2],
            "total_pageviews" => [1i64, 2],
        )
        .unwrap();

        match DataPreparer::derive_columns(&raw).unwrap_err() {
            PreparerError::Parse { row, value, .. } => {
                assert_eq!(row, 1);
                assert_eq!(value, "Atlantis");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn distinct_regions_are_unique_and_complete() {
        let df = derived_table();
        let regions = all_regions(&df);

        assert_eq!(regions, vec!["Europe", "Americas", "Asia", "Oceania"]);
        let unique: HashSet<&String> = regions.iter().collect();
        assert_eq!(unique.len(), regions.len());
    }

    #[test]
    fn filter_with_all_regions_is_identity() {
        let df = derived_table();
        let filtered = DataPreparer::filter_by_region(&df, &all_regions(&df)).unwrap();

        assert!(filtered.equals_missing(&df));
    }

    #[test]
    fn empty_region_cells_survive_identity_filter() {
        let raw = df!(
            "country_year" => ["France 2020", "Kosovo 2020"],
            "region" => [Some("Europe"), None],
            "population" => [65_000_000i64, 1_800_000],
            "total_pageviews" => [1_300_000_000i64, 2_000_000],
        )
        .unwrap();
        let df = DataPreparer::derive_columns(&raw).unwrap();

        let regions = all_regions(&df);
        assert_eq!(regions, vec!["Europe", UNKNOWN_REGION]);

        let filtered = DataPreparer::filter_by_region(&df, &regions).unwrap();
        assert!(filtered.equals_missing(&df));

        let europe = DataPreparer::filter_by_region(&df, &["Europe".to_string()]).unwrap();
        assert_eq!(europe.height(), 1);

        let kosovo = &DataPreparer::records(&filtered).unwrap()[1];
        assert_eq!(kosovo.region, UNKNOWN_REGION);
    }

    #[test]
    fn records_reject_missing_key_fields() {
        let mut df = derived_table();
        let years: Int32Chunked = [Some(2020), None, Some(2015), Some(2019), Some(2020)]
            .into_iter()
            .collect();
        df.with_column(years.with_name("year".into()).into_series()).unwrap();

        match DataPreparer::records(&df).unwrap_err() {
            PreparerError::MissingValue { row, column } => {
                assert_eq!(row, 1);
                assert_eq!(column, "year");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn filter_with_no_regions_is_empty() {
        let df = derived_table();
        let filtered = DataPreparer::filter_by_region(&df, &[]).unwrap();

        assert_eq!(filtered.height(), 0);
        assert_eq!(filtered.width(), df.width());
    }

    #[test]
    fn filter_keeps_only_selected_regions_in_order() {
        let df = derived_table();
        let filtered = DataPreparer::filter_by_region(&df, &["Europe".to_string()]).unwrap();
        let records = DataPreparer::records(&filtered).unwrap();

        let years: Vec<i32> = records.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2020, 2019]);
        assert!(records.iter().all(|r| r.region == "Europe"));
    }

    #[test]
    fn years_are_sorted_and_distinct() {
        assert_eq!(DataPreparer::years(&derived_table()).unwrap(), vec![2015, 2019, 2020]);
    }

    #[test]
    fn global_max_rounds_up_to_hundred() {
        let df = derived_table();

        // France 2019: 1_250_000_000 / 64_900 = 19260.4...
        // Largest finite ratio is United States: 9e9 / 328_000 = 27439.02...
        assert_eq!(
            DataPreparer::global_max(&df, Metric::PageviewsPer1000).unwrap(),
            Some(27500.0)
        );
        assert_eq!(
            DataPreparer::global_max(&df, Metric::Population).unwrap(),
            Some(328_000_000.0)
        );
    }

    #[test]
    fn global_max_of_empty_table_is_none() {
        let empty = DataPreparer::filter_by_region(&derived_table(), &[]).unwrap();
        assert_eq!(DataPreparer::global_max(&empty, Metric::TotalPageviews).unwrap(), None);
    }

    #[test]
    fn metric_labels_are_title_cased() {
        assert_eq!(Metric::Population.label(), "Population");
        assert_eq!(Metric::TotalPageviews.label(), "Total Pageviews");
        assert_eq!(Metric::PageviewsPer1000.label(), "Pageviews Per 1000");
    }
}
