//! Cafe lookup table and class label reconciliation.
//!
//! The classifier may have been trained on raw cafe keys or on label-encoded
//! integers. [`ClassLabelMap`] hides that difference from the recommender.

use serde::Serialize;
use std::collections::HashMap;

use crate::dataset::CafeDataset;
use crate::model::{ClassLabel, Classifier};

/// Display-name columns, probed in order.
pub const DISPLAY_NAME_CANDIDATES: [&str; 3] = ["name", "datenamelatlon", "date_name"];

/// Placeholder for missing addresses.
pub const ADDRESS_UNAVAILABLE: &str = "N/A";

/// Human-readable details of one cafe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CafeRecord {
    pub key: String,
    pub name: String,
    pub address: String,
}

/// Deduplicated cafe key -> record table.
#[derive(Debug, Clone, Default)]
pub struct CafeLookup {
    records: HashMap<String, CafeRecord>,
    display_column: Option<String>,
}

impl CafeLookup {
    /// Build from the training dataset. The first row for each key wins.
    pub fn build(dataset: &CafeDataset, key_column: &str, address_column: &str) -> Self {
        let display_column = DISPLAY_NAME_CANDIDATES
            .iter()
            .find(|c| dataset.has_column(c))
            .map(|c| c.to_string());

        match &display_column {
            Some(col) if col != DISPLAY_NAME_CANDIDATES[0] => {
                tracing::info!("Using column '{}' for friendly cafe names", col)
            }
            Some(_) => {}
            None => tracing::warn!(
                "Could not find a friendly name column, falling back to '{}'",
                key_column
            ),
        }

        let keys = dataset.text_column(key_column).unwrap_or(&[]);
        let names = display_column
            .as_deref()
            .and_then(|c| dataset.text_column(c));
        let addresses = dataset.text_column(address_column);

        let mut records = Vec::new();
        for (row, key) in keys.iter().enumerate() {
            let key = match key.as_deref().map(str::trim) {
                Some(k) if !k.is_empty() => k.to_string(),
                _ => continue,
            };

            let name = cell(names, row).unwrap_or_else(|| key.clone());
            let address = cell(addresses, row).unwrap_or_else(|| ADDRESS_UNAVAILABLE.to_string());
            records.push(CafeRecord { key, name, address });
        }

        Self {
            display_column,
            ..Self::from_records(records)
        }
    }

    /// Index records by key. The first record for each key wins.
    pub fn from_records(records: impl IntoIterator<Item = CafeRecord>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            map.entry(record.key.clone()).or_insert(record);
        }
        Self {
            records: map,
            display_column: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&CafeRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column the display names were taken from, if any.
    pub fn display_column(&self) -> Option<&str> {
        self.display_column.as_deref()
    }
}

fn cell(column: Option<&[Option<String>]>, row: usize) -> Option<String> {
    column
        .and_then(|c| c.get(row))
        .and_then(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// How the classifier encodes its classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelEncoding {
    /// Dense integers assigned in sorted key order
    Integer,
    /// Raw cafe keys
    String,
}

/// Classifier output label -> cafe key, in classifier class order.
#[derive(Debug, Clone)]
pub struct ClassLabelMap {
    labels: Vec<ClassLabel>,
    keys: HashMap<ClassLabel, String>,
    encoding: LabelEncoding,
}

impl ClassLabelMap {
    /// Reconcile the classifier's labels with the sorted dataset keys.
    ///
    /// Never fails: if the labels cannot be read, the sorted keys are taken
    /// as string labels.
    pub fn build<C: Classifier + ?Sized>(classifier: &C, sorted_keys: &[String]) -> Self {
        match classifier.class_labels() {
            Ok(labels) => Self::from_labels(labels, sorted_keys),
            Err(e) => {
                tracing::warn!(
                    "Could not read classifier class labels ({:#}), assuming string classes",
                    e
                );
                let labels = sorted_keys
                    .iter()
                    .map(|k| ClassLabel::Key(k.clone()))
                    .collect();
                Self::from_labels(labels, sorted_keys)
            }
        }
    }

    pub fn from_labels(labels: Vec<ClassLabel>, sorted_keys: &[String]) -> Self {
        let all_integer = !labels.is_empty()
            && labels.iter().all(|l| matches!(l, ClassLabel::Index(_)));

        if all_integer {
            tracing::info!(
                "Classifier classes are integers, mapping {} indices onto sorted cafe keys",
                labels.len()
            );
            let keys = sorted_keys
                .iter()
                .enumerate()
                .map(|(i, k)| (ClassLabel::Index(i as i64), k.clone()))
                .collect();
            if let Some(first) = labels.first() {
                tracing::debug!(
                    "Mapping index {} -> {}",
                    first,
                    sorted_keys.first().map(String::as_str).unwrap_or("ERROR")
                );
            }
            return Self {
                labels,
                keys,
                encoding: LabelEncoding::Integer,
            };
        }

        let labels: Vec<ClassLabel> = labels
            .into_iter()
            .map(|l| ClassLabel::Key(l.to_string().trim().to_string()))
            .collect();
        let keys = labels
            .iter()
            .map(|l| (l.clone(), l.to_string()))
            .collect();

        Self {
            labels,
            keys,
            encoding: LabelEncoding::String,
        }
    }

    pub fn encoding(&self) -> LabelEncoding {
        self.encoding
    }

    /// Number of classes the classifier reports.
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn label_at(&self, class_index: usize) -> Option<&ClassLabel> {
        self.labels.get(class_index)
    }

    pub fn resolve(&self, label: &ClassLabel) -> Option<&str> {
        self.keys.get(label).map(String::as_str)
    }

    /// Cafe key for a class position. Unmapped labels fall back to their text.
    pub fn key_for_class(&self, class_index: usize) -> Option<String> {
        let label = self.label_at(class_index)?;
        Some(
            self.resolve(label)
                .map(str::to_string)
                .unwrap_or_else(|| label.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::FixedClassifier;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn dataset_with_names() -> CafeDataset {
        CafeDataset::new(4)
            .with_text_column(
                "name_updated",
                vec![
                    Some("Beta".into()),
                    Some("Alpha".into()),
                    Some("Beta".into()),
                    None,
                ],
            )
            .with_text_column(
                "name",
                vec![
                    Some("Beta Coffee".into()),
                    Some("Alpha Coffee".into()),
                    Some("Beta Duplicate".into()),
                    Some("Orphan".into()),
                ],
            )
            .with_text_column(
                "address",
                vec![
                    Some("Torstraße 1".into()),
                    None,
                    Some("Elsewhere 9".into()),
                    Some("Nowhere".into()),
                ],
            )
    }

    #[test]
    fn test_lookup_first_occurrence_wins() {
        let lookup = CafeLookup::build(&dataset_with_names(), "name_updated", "address");
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.display_column(), Some("name"));

        let beta = lookup.get("Beta").unwrap();
        assert_eq!(beta.name, "Beta Coffee");
        assert_eq!(beta.address, "Torstraße 1");

        let alpha = lookup.get("Alpha").unwrap();
        assert_eq!(alpha.address, ADDRESS_UNAVAILABLE);
    }

    #[test]
    fn test_lookup_probes_candidates_in_order() {
        let ds = CafeDataset::new(1)
            .with_text_column("name_updated", vec![Some("Alpha".into())])
            .with_text_column("date_name", vec![Some("2024 Alpha".into())])
            .with_text_column("datenamelatlon", vec![Some("Alpha 52.5 13.4".into())]);

        let lookup = CafeLookup::build(&ds, "name_updated", "address");
        assert_eq!(lookup.display_column(), Some("datenamelatlon"));
        assert_eq!(lookup.get("Alpha").unwrap().name, "Alpha 52.5 13.4");
    }

    #[test]
    fn test_lookup_falls_back_to_key() {
        let ds = CafeDataset::new(1)
            .with_text_column("name_updated", vec![Some(" Alpha ".into())])
            .with_text_column("address", vec![Some("Torstraße 1".into())]);

        let lookup = CafeLookup::build(&ds, "name_updated", "address");
        assert_eq!(lookup.display_column(), None);
        let record = lookup.get("Alpha").unwrap();
        assert_eq!(record.name, "Alpha");
        assert_eq!(record.address, "Torstraße 1");
    }

    #[test]
    fn test_integer_labels_map_to_sorted_keys() {
        let map = ClassLabelMap::from_labels(
            vec![ClassLabel::Index(0), ClassLabel::Index(1), ClassLabel::Index(2)],
            &keys(&["Alpha", "Beta", "Gamma"]),
        );
        assert_eq!(map.encoding(), LabelEncoding::Integer);
        assert_eq!(map.num_classes(), 3);
        assert_eq!(map.resolve(&ClassLabel::Index(2)), Some("Gamma"));
        assert_eq!(map.key_for_class(0).as_deref(), Some("Alpha"));
        assert_eq!(map.resolve(&ClassLabel::Index(7)), None);
    }

    #[test]
    fn test_string_labels_are_trimmed_identity() {
        let map = ClassLabelMap::from_labels(
            vec![ClassLabel::Key(" Alpha ".into()), ClassLabel::Key("Beta".into())],
            &keys(&["Alpha", "Beta"]),
        );
        assert_eq!(map.encoding(), LabelEncoding::String);
        assert_eq!(map.key_for_class(0).as_deref(), Some("Alpha"));
        assert_eq!(map.resolve(&ClassLabel::Key("Beta".into())), Some("Beta"));
    }

    #[test]
    fn test_mixed_labels_are_treated_as_strings() {
        let map = ClassLabelMap::from_labels(
            vec![ClassLabel::Index(1), ClassLabel::Key("Beta".into())],
            &keys(&["Alpha", "Beta"]),
        );
        assert_eq!(map.encoding(), LabelEncoding::String);
        assert_eq!(map.key_for_class(0).as_deref(), Some("1"));
        assert_eq!(map.key_for_class(1).as_deref(), Some("Beta"));
    }

    #[test]
    fn test_introspection_failure_falls_back_to_identity() {
        let mut classifier = FixedClassifier::indexed(vec![0.5, 0.5]);
        classifier.labels = None;

        let map = ClassLabelMap::build(&classifier, &keys(&["Alpha", "Beta"]));
        assert_eq!(map.encoding(), LabelEncoding::String);
        assert_eq!(map.num_classes(), 2);
        assert_eq!(map.key_for_class(1).as_deref(), Some("Beta"));
    }

    #[test]
    fn test_out_of_range_class_has_no_key() {
        let map = ClassLabelMap::from_labels(vec![ClassLabel::Index(0)], &keys(&["Alpha"]));
        assert_eq!(map.key_for_class(3), None);
    }
}
