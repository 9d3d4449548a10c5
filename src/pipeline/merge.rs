use std::collections::HashMap;

use serde::Deserialize;

use crate::metadata::record::MetadataValue;
use crate::metadata::table::Table;
use crate::{MediaError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub id_column: String,
    pub duration_column: String,
    pub confidence_column: String,
    pub min_confidence: f64,
    pub count_column: String,
    pub duration_sum_column: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            duration_column: "audio-duration_s".to_string(),
            confidence_column: "probe_confidence".to_string(),
            min_confidence: 0.5,
            count_column: "count".to_string(),
            duration_sum_column: "duration_sum".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Totals {
    count: i64,
    duration: f64,
}

/// Left join of `primary` with per-id aggregates of `companion`.
///
/// Every primary row is kept and gains a count of the companion rows sharing
/// its id, plus the sum of their durations. Companion rows only count when
/// their duration is positive and their probe confidence exceeds
/// `options.min_confidence`. Ids absent from the companion get zeros.
pub fn merge(primary: &Table, companion: &Table, options: &MergeOptions) -> Result<Table> {
    if !primary.is_empty() && !primary.has_column(&options.id_column) {
        return Err(MediaError::Table(format!(
            "primary table has no '{}' column",
            options.id_column
        )));
    }
    if !companion.is_empty() && !companion.has_column(&options.id_column) {
        return Err(MediaError::Table(format!(
            "companion table has no '{}' column",
            options.id_column
        )));
    }

    let mut totals: HashMap<&str, Totals> = HashMap::new();
    let mut skipped = 0usize;
    for row in companion.rows() {
        let Some(id) = row.get(&options.id_column).and_then(MetadataValue::as_str) else {
            skipped += 1;
            continue;
        };
        let duration = row.get(&options.duration_column).and_then(MetadataValue::as_f64);
        let confidence = row.get(&options.confidence_column).and_then(MetadataValue::as_f64);

        match (duration, confidence) {
            (Some(duration), Some(confidence))
                if duration > 0.0 && confidence > options.min_confidence =>
            {
                let entry = totals.entry(id).or_default();
                entry.count += 1;
                entry.duration += duration;
            }
            _ => skipped += 1,
        }
    }
    log::debug!(
        "Merge: {} ids with valid companion rows, {} rows skipped",
        totals.len(),
        skipped
    );

    let mut merged = Table::new();
    for row in primary.rows() {
        let id = row.get(&options.id_column).and_then(MetadataValue::as_str);
        let found = id.and_then(|id| totals.get(id)).copied().unwrap_or_default();

        let mut row = row.clone();
        row.set(options.count_column.as_str(), found.count);
        row.set(options.duration_sum_column.as_str(), found.duration);
        merged.push(row);
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::record::MetadataRecord;
    use pretty_assertions::assert_eq;

    fn media_row(id: &str, duration: f64, confidence: f64) -> MetadataRecord {
        let mut row = MetadataRecord::new();
        row.set("id", id);
        row.set("audio-duration_s", duration);
        row.set("probe_confidence", confidence);
        row
    }

    fn participant(id: &str) -> MetadataRecord {
        let mut row = MetadataRecord::new();
        row.set("id", id);
        row.set("age", 34i64);
        row
    }

    #[test]
    fn counts_and_sums_valid_rows_per_id() {
        let primary = Table::from_records(vec![participant("P1"), participant("P2")]);
        let companion = Table::from_records(vec![
            media_row("P1", 10.0, 0.9),
            media_row("P1", 20.0, 0.9),
        ]);

        let merged = merge(&primary, &companion, &MergeOptions::default()).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(0, "count").and_then(MetadataValue::as_f64), Some(2.0));
        assert_eq!(merged.get(0, "duration_sum").and_then(MetadataValue::as_f64), Some(30.0));
        assert_eq!(merged.get(1, "count").and_then(MetadataValue::as_f64), Some(0.0));
        assert_eq!(merged.get(1, "duration_sum").and_then(MetadataValue::as_f64), Some(0.0));
        assert_eq!(merged.get(0, "age"), Some(&MetadataValue::Integer(34)));
    }

    #[test]
    fn invalid_rows_are_filtered_out() {
        let primary = Table::from_records(vec![participant("P1")]);
        let mut missing_duration = MetadataRecord::new();
        missing_duration.set("id", "P1");
        missing_duration.set("probe_confidence", 100.0);

        let companion = Table::from_records(vec![
            media_row("P1", 5.0, 100.0),
            media_row("P1", 0.0, 100.0),
            media_row("P1", 7.0, 0.2),
            missing_duration,
        ]);

        let merged = merge(&primary, &companion, &MergeOptions::default()).unwrap();

        assert_eq!(merged.get(0, "count").and_then(MetadataValue::as_f64), Some(1.0));
        assert_eq!(merged.get(0, "duration_sum").and_then(MetadataValue::as_f64), Some(5.0));
    }

    #[test]
    fn works_on_tables_read_from_csv() {
        let primary = Table::from_reader("id,group\nP1,G1\nP9,G3\n".as_bytes()).unwrap();
        let companion = Table::from_reader(
            "file_id,id,probe_confidence,audio-duration_s\nP1_a,P1,100,12.5\nP1_b,P1,100,\n"
                .as_bytes(),
        )
        .unwrap();

        let merged = merge(&primary, &companion, &MergeOptions::default()).unwrap();

        assert_eq!(merged.columns(), &["id", "group", "count", "duration_sum"]);
        assert_eq!(merged.get(0, "count").and_then(MetadataValue::as_f64), Some(1.0));
        assert_eq!(merged.get(0, "duration_sum").and_then(MetadataValue::as_f64), Some(12.5));
        assert_eq!(merged.get(1, "count").and_then(MetadataValue::as_f64), Some(0.0));
    }

    #[test]
    fn missing_id_column_is_an_error() {
        let primary = Table::from_reader("name\nx\n".as_bytes()).unwrap();
        let err = merge(&primary, &Table::new(), &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MediaError::Table(_)));
    }
}
