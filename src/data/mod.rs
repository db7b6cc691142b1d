//! Data module - CSV loading and column derivation

mod loader;
mod preparer;

pub use loader::{DataLoader, DataSource, LoaderError};
pub use preparer::{DataPreparer, Metric, PreparerError, Record, UNKNOWN_REGION};
