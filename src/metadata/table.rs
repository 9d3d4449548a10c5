use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, Writer};

use crate::metadata::record::{MetadataRecord, MetadataValue};
use crate::Result;

/// Rows of metadata records. The column set is the union of every row's keys
/// in order of first appearance; cells a row lacks are written empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<MetadataRecord>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.push(record);
        }
        table
    }

    pub fn push(&mut self, record: MetadataRecord) {
        for key in record.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.to_string());
            }
        }
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[MetadataRecord] {
        &self.rows
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&MetadataValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Rows whose `column` holds the given text.
    pub fn find<'a>(&'a self, column: &'a str, value: &'a str) -> impl Iterator<Item = &'a MetadataRecord> {
        self.rows
            .iter()
            .filter(move |r| r.get(column).and_then(MetadataValue::as_str) == Some(value))
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);
        if !self.columns.is_empty() {
            writer.write_record(&self.columns)?;
            for row in &self.rows {
                writer.write_record(self.columns.iter().map(|column| {
                    row.get(column).map(ToString::to_string).unwrap_or_default()
                }))?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Cells are read back as text; empty cells become nulls.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut table = Self::new();
        table.columns = headers.iter().map(str::to_string).collect();

        for result in reader.records() {
            let record = result?;
            let mut row = MetadataRecord::new();
            for (column, cell) in headers.iter().zip(record.iter()) {
                if cell.is_empty() {
                    row.set(column, MetadataValue::Null);
                } else {
                    row.set(column, cell);
                }
            }
            table.push(row);
        }

        Ok(table)
    }
}
