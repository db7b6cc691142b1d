//! CSV Data Loader Module
//! Handles CSV loading from disk or from an uploaded file using Polars.

use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Columns every input file must provide.
pub const REQUIRED_COLUMNS: [&str; 4] = ["country_year", "region", "population", "total_pageviews"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Data source not found: {0}")]
    NotFound(PathBuf),
    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn {
        column: &'static str,
        source_name: String,
    },
}

/// Where a table comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Path(PathBuf),
    /// A file picked by the user, already read into memory.
    Upload { name: String, bytes: Vec<u8> },
}

impl DataSource {
    /// Read a user-picked file into an upload source.
    pub fn upload_from_path(path: &Path) -> Result<Self, LoaderError> {
        let bytes = std::fs::read(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(DataSource::Upload { name, bytes })
    }

    pub fn name(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Upload { name, .. } => name.clone(),
        }
    }
}

/// Holds the current table and where it came from.
pub struct DataLoader {
    df: Option<DataFrame>,
    source_name: Option<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            df: None,
            source_name: None,
        }
    }

    /// Load a table from a path or an uploaded file.
    pub fn load(source: &DataSource) -> Result<DataFrame, LoaderError> {
        let df = match source {
            DataSource::Path(path) => {
                if !path.exists() {
                    return Err(LoaderError::NotFound(path.clone()));
                }
                LazyCsvReader::new(path)
                    .with_infer_schema_length(Some(10000))
                    .finish()?
                    .collect()?
            }
            DataSource::Upload { bytes, .. } => CsvReadOptions::default()
                .with_infer_schema_length(Some(10000))
                .into_reader_with_file_handle(Cursor::new(bytes.as_slice()))
                .finish()?,
        };

        Self::check_required_columns(&df, &source.name())?;
        info!(
            source = %source.name(),
            rows = df.height(),
            columns = df.width(),
            "Loaded CSV"
        );
        Ok(df)
    }

    /// Load the default file, or the alternate source when the default is absent.
    ///
    /// Returns `NotFound` when neither is available; callers must stop there.
    pub fn resolve_data_source(
        default_path: &Path,
        alternate: Option<&DataSource>,
    ) -> Result<DataFrame, LoaderError> {
        if default_path.exists() {
            return Self::load(&DataSource::Path(default_path.to_path_buf()));
        }

        match alternate {
            Some(source) => {
                debug!(
                    default = %default_path.display(),
                    alternate = %source.name(),
                    "Default data source missing, using alternate"
                );
                Self::load(source)
            }
            None => {
                warn!(path = %default_path.display(), "No data source available");
                Err(LoaderError::NotFound(default_path.to_path_buf()))
            }
        }
    }

    fn check_required_columns(df: &DataFrame, source_name: &str) -> Result<(), LoaderError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for column in REQUIRED_COLUMNS {
            if !names.iter().any(|n| n == column) {
                return Err(LoaderError::MissingColumn {
                    column,
                    source_name: source_name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Get a reference to the loaded DataFrame.
    pub fn get_dataframe(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    pub fn get_source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Set DataFrame directly (used for async loading)
    pub fn set_dataframe(&mut self, df: DataFrame, source_name: String) {
        self.df = Some(df);
        self.source_name = Some(source_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "country_year,region,population,total_pageviews\n\
        \"Afghanistan 2015\",Asia,33736494,120000\n\
        \"France 2020\",Europe,65000000,1300000000\n";

    fn write_sample(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("pageviews.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_csv_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), SAMPLE);

        let df = DataLoader::load(&DataSource::Path(path)).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn loads_csv_from_upload_bytes() {
        let source = DataSource::Upload {
            name: "upload.csv".to_string(),
            bytes: SAMPLE.as_bytes().to_vec(),
        };

        let df = DataLoader::load(&source).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn uploaded_rows_with_empty_region_are_kept_by_full_selection() {
        use crate::data::DataPreparer;

        let source = DataSource::Upload {
            name: "upload.csv".to_string(),
            bytes: b"country_year,region,population,total_pageviews\n\
                \"France 2020\",Europe,65000000,1300000000\n\
                \"Kosovo 2020\",,1800000,2000000\n"
                .to_vec(),
        };

        let df = DataPreparer::derive_columns(&DataLoader::load(&source).unwrap()).unwrap();
        let regions = DataPreparer::distinct_regions(&df).unwrap();
        let filtered = DataPreparer::filter_by_region(&df, &regions).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(filtered.height(), 2);
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::load(&DataSource::Path(dir.path().join("nope.csv"))).unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let source = DataSource::Upload {
            name: "bad.csv".to_string(),
            bytes: b"country_year,region,population\n\"Chad 2016\",Africa,14000000\n".to_vec(),
        };

        let err = DataLoader::load(&source).unwrap_err();
        match err {
            LoaderError::MissingColumn { column, .. } => assert_eq!(column, "total_pageviews"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_prefers_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), SAMPLE);
        let alternate = DataSource::Upload {
            name: "other.csv".to_string(),
            bytes: b"not,a,valid\n".to_vec(),
        };

        let df = DataLoader::resolve_data_source(&path, Some(&alternate)).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn resolve_falls_back_to_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let alternate = DataSource::Upload {
            name: "upload.csv".to_string(),
            bytes: SAMPLE.as_bytes().to_vec(),
        };

        let df =
            DataLoader::resolve_data_source(&dir.path().join("missing.csv"), Some(&alternate))
                .unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn resolve_without_any_source_halts() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::resolve_data_source(&dir.path().join("missing.csv"), None)
            .unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn upload_from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), SAMPLE);

        let source = DataSource::upload_from_path(&path).unwrap();
        assert_eq!(source.name(), "pageviews.csv");
    }
}
