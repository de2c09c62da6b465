//! Training dataset loading.
//!
//! Only the columns the recommender needs are kept: the cafe key, the
//! display-name candidates, the address and the model features.

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::config::{DatasetConfig, FEATURE_NAMES};
use crate::features::FeatureRangeTable;
use crate::lookup::DISPLAY_NAME_CANDIDATES;

/// Column-oriented view of the merged cafe dataset.
#[derive(Debug, Clone, Default)]
pub struct CafeDataset {
    n_rows: usize,
    text_columns: Vec<(String, Vec<Option<String>>)>,
    feature_columns: Vec<(String, Vec<f64>)>,
}

impl CafeDataset {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            ..Default::default()
        }
    }

    /// Add a text column. Shorter columns are padded with nulls.
    pub fn with_text_column(mut self, name: &str, mut values: Vec<Option<String>>) -> Self {
        values.resize(self.n_rows, None);
        self.text_columns.push((name.to_string(), values));
        self
    }

    /// Add a feature column. Only finite values are kept.
    pub fn with_feature_column(mut self, name: &str, values: Vec<f64>) -> Self {
        let values = values.into_iter().filter(|v| v.is_finite()).collect();
        self.feature_columns.push((name.to_string(), values));
        self
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.text_columns.iter().any(|(n, _)| n == name)
            || self.feature_columns.iter().any(|(n, _)| n == name)
    }

    pub fn text_column(&self, name: &str) -> Option<&[Option<String>]> {
        self.text_columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Sorted distinct trimmed values of the key column.
    pub fn distinct_keys(&self, key_column: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .text_column(key_column)
            .unwrap_or(&[])
            .iter()
            .flatten()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Min/percentile/max table over every loaded feature column.
    pub fn feature_ranges(&self) -> FeatureRangeTable {
        FeatureRangeTable::from_columns(
            self.feature_columns
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_slice())),
        )
    }

    /// Load the dataset from a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DatasetConfig) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read dataset CSV: {}", path.display()))?;

        let mut dataset = CafeDataset::new(df.height());

        let keys = text_values(&df, &config.key_column)?.with_context(|| {
            format!("Dataset has no key column '{}'", config.key_column)
        })?;
        dataset = dataset.with_text_column(&config.key_column, keys);

        match text_values(&df, &config.address_column)? {
            Some(addresses) => {
                dataset = dataset.with_text_column(&config.address_column, addresses);
            }
            None => tracing::warn!(
                "Dataset has no address column '{}', addresses will show as N/A",
                config.address_column
            ),
        }

        for candidate in DISPLAY_NAME_CANDIDATES {
            if let Some(values) = text_values(&df, candidate)? {
                dataset = dataset.with_text_column(candidate, values);
            }
        }

        for name in FEATURE_NAMES.iter() {
            match df.column(name) {
                Ok(col) => {
                    let values = numeric_values(col)
                        .with_context(|| format!("Feature column '{}' is not numeric", name))?;
                    dataset = dataset.with_feature_column(name, values);
                }
                Err(_) => tracing::warn!("Dataset has no feature column '{}'", name),
            }
        }

        tracing::info!(
            "Loaded dataset {} ({} rows, {} cafes)",
            path.display(),
            dataset.n_rows(),
            dataset.distinct_keys(&config.key_column).len()
        );

        Ok(dataset)
    }
}

/// Read a column as optional strings, whatever its parsed dtype.
fn text_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let col = match df.column(name) {
        Ok(col) => col,
        Err(_) => return Ok(None),
    };
    let casted = col.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(Some(values))
}

/// Non-null values of a numeric column as f64.
fn numeric_values(col: &Column) -> Result<Vec<f64>> {
    let casted = col.cast(&DataType::Float64)?;
    let values = casted.f64()?.into_iter().flatten().collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_pads_text_columns() {
        let ds = CafeDataset::new(3).with_text_column("name_updated", vec![Some("A".into())]);
        assert_eq!(ds.text_column("name_updated").unwrap().len(), 3);
        assert!(ds.has_column("name_updated"));
        assert!(!ds.has_column("name"));
    }

    #[test]
    fn test_distinct_keys_sorted_and_trimmed() {
        let ds = CafeDataset::new(4).with_text_column(
            "name_updated",
            vec![
                Some("LAP COFFEE_Torstraße ".into()),
                Some("LAP COFFEE_Adalbertstraße".into()),
                None,
                Some("LAP COFFEE_Torstraße".into()),
            ],
        );
        assert_eq!(
            ds.distinct_keys("name_updated"),
            vec!["LAP COFFEE_Adalbertstraße", "LAP COFFEE_Torstraße"]
        );
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name,name_updated,address,parks_count_1km,open_bars_count_500m,lst_celsius_1km,temp_max,temp_min,precip_mm,ndvi,nightlight"
        )
        .unwrap();
        writeln!(file, "LAP Coffee,LAP COFFEE_Torstraße,Torstraße 1,3,10,12.5,15.0,10.0,0.0,0.21,55.0").unwrap();
        writeln!(file, "LAP Coffee,LAP COFFEE_Torstraße,Torstraße 1,3,10,14.5,17.0,12.0,1.2,0.25,57.0").unwrap();
        writeln!(file, "LAP Coffee,LAP COFFEE_Kastanienallee,Kastanienallee 5,8,4,11.0,13.0,9.0,0.4,0.40,30.0").unwrap();
        file.flush().unwrap();

        let ds = CafeDataset::from_csv(file.path(), &DatasetConfig::default()).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert!(ds.has_column("name"));
        assert_eq!(
            ds.distinct_keys("name_updated"),
            vec!["LAP COFFEE_Kastanienallee", "LAP COFFEE_Torstraße"]
        );

        let ranges = ds.feature_ranges();
        assert_eq!(ranges.len(), FEATURE_NAMES.len());
        let parks = ranges.get("parks_count_1km").unwrap();
        assert_eq!(parks.min, 3.0);
        assert_eq!(parks.max, 8.0);
        assert_eq!(parks.p50, 3.0);
    }

    #[test]
    fn test_from_csv_requires_key_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,address,ndvi").unwrap();
        writeln!(file, "LAP Coffee,Torstraße 1,0.2").unwrap();
        file.flush().unwrap();

        let err = CafeDataset::from_csv(file.path(), &DatasetConfig::default()).unwrap_err();
        assert!(err.to_string().contains("name_updated"));
    }
}
