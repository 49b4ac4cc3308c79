use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use super::listing::ListingRecord;

/// Rows are listings, columns are the union of every key seen. Missing cells
/// hold the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ListingTable {
    /// `leading` columns come first even when no record carries them.
    pub fn from_records(records: &[ListingRecord], leading: &[String]) -> Self {
        let mut columns: Vec<String> = leading.to_vec();
        for key in records.iter().flat_map(|r| r.keys()) {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }

        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.value_or_sentinel(c).to_string())
                    .collect()
            })
            .collect();

        ListingTable { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> anyhow::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(&self.columns)?;
        for row in self.rows.iter() {
            writer.write_record(row)?;
        }

        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush csv writer: {}", e))
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(object)
            })
            .collect();

        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Writes `<stem>.csv` and `<stem>.json` into `dir`.
    pub fn export(&self, dir: &Path, stem: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;

        let csv_path = dir.join(format!("{}.csv", stem));
        std::fs::write(&csv_path, self.to_csv()?)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;

        let json_path = dir.join(format!("{}.json", stem));
        std::fs::write(&json_path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        Ok((csv_path, json_path))
    }
}

#[cfg(test)]
mod tests {
    use super::ListingTable;
    use crate::domain::listing::{ListingRecord, SENTINEL};

    fn record(pairs: &[(&str, &str)]) -> ListingRecord {
        let mut record = ListingRecord::new();
        for (k, v) in pairs {
            record.insert(k, *v);
        }
        record
    }

    #[test]
    fn columns_are_union_with_sentinel_fill() {
        let records = vec![
            record(&[("Title", "Cook"), ("Price", "$18")]),
            record(&[("Title", "Driver"), ("Location", "Downtown")]),
        ];
        let leading = vec!["Title".to_string(), "Link".to_string()];

        let table = ListingTable::from_records(&records, &leading);

        assert_eq!(table.columns, vec!["Title", "Link", "Price", "Location"]);
        assert_eq!(table.rows[0], vec!["Cook", SENTINEL, "$18", SENTINEL]);
        assert_eq!(table.rows[1], vec!["Driver", SENTINEL, SENTINEL, "Downtown"]);
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let records = vec![record(&[("Title", "Cook, line"), ("Price", "$18")])];
        let table = ListingTable::from_records(&records, &[]);

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "Title,Price\n\"Cook, line\",$18\n");
    }

    #[test]
    fn json_keeps_every_column_per_record() {
        let records = vec![record(&[("Title", "Cook")]), record(&[("Price", "$5")])];
        let table = ListingTable::from_records(&records, &[]);

        let parsed: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(parsed[0]["Price"], SENTINEL);
        assert_eq!(parsed[1]["Title"], SENTINEL);
        assert_eq!(parsed[1]["Price"], "$5");
    }

    #[test]
    fn empty_records_give_empty_table() {
        let table = ListingTable::from_records(&[], &["Title".to_string()]);
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["Title"]);
    }
}
