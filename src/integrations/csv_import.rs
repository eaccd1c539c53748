//! CSV Import
//!
//! Spreadsheet import for training logs and lung-capacity measurements.
//! Columns are mapped by header name; the date column falls back to the
//! first cell that parses as a date.

use super::{parse_flexible_date, store_batch, BatchReport, SkipReason};
use crate::records::{LungCapacityLog, LungInput};
use crate::storage::{Entry, RecordStore, StorageResult};
use std::io::Read;
use std::path::Path;

/// What a spreadsheet column holds
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Date,
    TrainingType,
    Location,
    Duration,
    Content,
    Notes,
    Measurement,
    /// Anything else, keyed by normalized header
    Other(String),
}

impl Column {
    fn from_header(header: &str) -> Self {
        let key = header.trim().to_lowercase();
        match key.as_str() {
            "date" | "day" | "日期" => Column::Date,
            "type" | "training_type" | "training type" | "类型" | "训练类型" => {
                Column::TrainingType
            }
            "location" | "place" | "地点" => Column::Location,
            "duration" | "duration_minutes" | "minutes" | "时长" => Column::Duration,
            "content" | "内容" | "训练内容" => Column::Content,
            "notes" | "note" | "备注" => Column::Notes,
            _ if is_measurement_header(&key) => Column::Measurement,
            _ => Column::Other(key.replace(' ', "_")),
        }
    }
}

fn is_measurement_header(key: &str) -> bool {
    key.contains("lung") || key.contains("capacity") || key.contains("肺活量")
}

/// Shared row walking for both importers
struct SheetLayout {
    columns: Vec<Column>,
    date_column: Option<usize>,
}

impl SheetLayout {
    fn from_headers(headers: Option<&csv::StringRecord>, date_column: Option<usize>) -> Self {
        let columns: Vec<Column> = headers
            .map(|h| h.iter().map(Column::from_header).collect())
            .unwrap_or_default();
        let date_column = date_column.or_else(|| columns.iter().position(|c| *c == Column::Date));
        Self {
            columns,
            date_column,
        }
    }

    fn column(&self, idx: usize) -> Column {
        if Some(idx) == self.date_column {
            return Column::Date;
        }
        self.columns
            .get(idx)
            .cloned()
            .unwrap_or_else(|| Column::Other(format!("col{}", idx + 1)))
    }

    /// Locate and parse the row's date, returning its column index
    fn row_date(&self, record: &csv::StringRecord) -> Result<(usize, chrono::NaiveDate), SkipReason> {
        match self.date_column {
            Some(idx) => {
                let raw = record.get(idx).map(str::trim).unwrap_or("");
                if raw.is_empty() {
                    return Err(SkipReason::MissingDate);
                }
                parse_flexible_date(raw)
                    .map(|date| (idx, date))
                    .ok_or_else(|| SkipReason::UnparseableDate(raw.to_string()))
            }
            None => record
                .iter()
                .enumerate()
                .find_map(|(idx, cell)| parse_flexible_date(cell).map(|date| (idx, date)))
                .ok_or(SkipReason::MissingDate),
        }
    }
}

/// CSV importer for training log entries
pub struct CsvImporter {
    /// Explicit date column (0-indexed); detected from headers otherwise
    date_column: Option<usize>,
    /// Whether the CSV has a header row
    has_header: bool,
    /// Replace existing entries instead of skipping them
    overwrite: bool,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    /// Create a new CSV importer with default settings
    pub fn new() -> Self {
        Self {
            date_column: None,
            has_header: true,
            overwrite: false,
        }
    }

    /// Set the date column index
    pub fn with_date_column(mut self, column: usize) -> Self {
        self.date_column = Some(column);
        self
    }

    /// Set whether the CSV has a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Overwrite entries whose date already exists
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Import a CSV file into the store
    pub fn import(&self, store: &RecordStore, path: &Path) -> StorageResult<BatchReport> {
        let file = std::fs::File::open(path)?;
        let report = self.import_reader(store, file)?;
        tracing::info!("Imported {:?}: {}", path, report);
        Ok(report)
    }

    /// Import from a CSV string (useful for testing)
    pub fn import_str(&self, store: &RecordStore, csv_data: &str) -> StorageResult<BatchReport> {
        self.import_reader(store, csv_data.as_bytes())
    }

    fn import_reader<R: Read>(&self, store: &RecordStore, reader: R) -> StorageResult<BatchReport> {
        let (items, mut report) = self.parse(reader)?;
        store_batch(store, items, self.overwrite, &mut report)?;
        Ok(report)
    }

    /// Turn rows into labelled entries; unusable rows land in the report
    pub fn parse<R: Read>(&self, reader: R) -> StorageResult<(Vec<(String, Entry)>, BatchReport)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .from_reader(reader);

        let headers = if self.has_header {
            Some(reader.headers()?.clone())
        } else {
            None
        };
        let layout = SheetLayout::from_headers(headers.as_ref(), self.date_column);

        let mut items = Vec::new();
        let mut report = BatchReport::new();

        for (line_num, result) in reader.records().enumerate() {
            let label = row_label(line_num, self.has_header);

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    report.skip(label, SkipReason::Malformed(e.to_string()));
                    continue;
                }
            };

            match self.row_to_entry(&layout, &record) {
                Ok(entry) => items.push((label, entry)),
                Err(reason) => report.skip(label, reason),
            }
        }

        Ok((items, report))
    }

    fn row_to_entry(&self, layout: &SheetLayout, record: &csv::StringRecord) -> Result<Entry, SkipReason> {
        let (date_idx, date) = layout.row_date(record)?;
        let mut entry = Entry::new(date, "", "");
        let mut extra = Vec::new();
        let mut measurements = Vec::new();

        for (idx, cell) in record.iter().enumerate() {
            let cell = cell.trim();
            if idx == date_idx || cell.is_empty() {
                continue;
            }

            match layout.column(idx) {
                Column::Date => {}
                Column::TrainingType => entry.training_type = cell.to_string(),
                Column::Location => entry.location = cell.to_string(),
                Column::Duration => {
                    let minutes = cell.parse::<f64>().map_err(|_| {
                        SkipReason::Invalid(format!("duration '{}' is not a number", cell))
                    })?;
                    entry.duration_minutes = Some(minutes);
                }
                Column::Content => entry.content = cell.to_string(),
                Column::Notes => entry.notes = cell.to_string(),
                Column::Measurement => measurements.push(numeric_value(cell)),
                Column::Other(name) => match cell.parse::<f64>() {
                    Ok(_) => entry = entry.metric(name, numeric_value(cell)),
                    Err(_) => extra.push(format!("{}: {}", name, cell)),
                },
            }
        }

        // Several measurement columns keep every reading, in column order
        match measurements.len() {
            0 => {}
            1 => entry = entry.metric("lung_capacity", measurements.remove(0)),
            _ => entry = entry.metric("lung_capacity", measurements),
        }

        if !extra.is_empty() {
            if !entry.content.is_empty() {
                extra.insert(0, std::mem::take(&mut entry.content));
            }
            entry.content = extra.join("\n");
        }

        entry.validate().map_err(|e| SkipReason::Invalid(e.to_string()))
    }
}

/// CSV importer for lung-capacity measurements
///
/// Every measurement column (header mentioning lung, capacity or 肺活量)
/// contributes one value; rows for a date already on file are merged
/// into that date's record.
pub struct LungCsvImporter {
    date_column: Option<usize>,
    has_header: bool,
}

impl Default for LungCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl LungCsvImporter {
    pub fn new() -> Self {
        Self {
            date_column: None,
            has_header: true,
        }
    }

    pub fn with_date_column(mut self, column: usize) -> Self {
        self.date_column = Some(column);
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Import a CSV file into the lung-capacity log
    pub fn import(&self, log: &LungCapacityLog, path: &Path) -> StorageResult<BatchReport> {
        let file = std::fs::File::open(path)?;
        let report = self.import_reader(log, file)?;
        tracing::info!("Imported lung capacity from {:?}: {}", path, report);
        Ok(report)
    }

    pub fn import_str(&self, log: &LungCapacityLog, csv_data: &str) -> StorageResult<BatchReport> {
        self.import_reader(log, csv_data.as_bytes())
    }

    fn import_reader<R: Read>(&self, log: &LungCapacityLog, reader: R) -> StorageResult<BatchReport> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .from_reader(reader);

        let headers = if self.has_header {
            Some(reader.headers()?.clone())
        } else {
            None
        };
        let layout = SheetLayout::from_headers(headers.as_ref(), self.date_column);
        let any_measurement_header = layout.columns.contains(&Column::Measurement);

        let mut labels = Vec::new();
        let mut inputs = Vec::new();
        let mut report = BatchReport::new();

        for (line_num, result) in reader.records().enumerate() {
            let label = row_label(line_num, self.has_header);

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    report.skip(label, SkipReason::Malformed(e.to_string()));
                    continue;
                }
            };

            let (date_idx, date) = match layout.row_date(&record) {
                Ok(found) => found,
                Err(reason) => {
                    report.skip(label, reason);
                    continue;
                }
            };

            let mut measurements = Vec::new();
            let mut notes = String::new();
            let mut bad_cell = None;

            for (idx, cell) in record.iter().enumerate() {
                let cell = cell.trim();
                if idx == date_idx || cell.is_empty() {
                    continue;
                }
                let column = layout.column(idx);
                let is_measurement = match column {
                    Column::Measurement => true,
                    // Header-less sheets: every other numeric cell counts
                    Column::Other(_) => !any_measurement_header,
                    _ => false,
                };

                if column == Column::Notes {
                    notes = cell.to_string();
                } else if is_measurement {
                    match cell.parse::<f64>() {
                        Ok(ml) if ml.is_finite() => measurements.push(ml.round() as i64),
                        _ if any_measurement_header => {
                            bad_cell = Some(cell.to_string());
                            break;
                        }
                        _ => {}
                    }
                }
            }

            if let Some(cell) = bad_cell {
                report.skip(
                    label,
                    SkipReason::Invalid(format!("measurement '{}' is not a number", cell)),
                );
                continue;
            }
            if !measurements.iter().any(|ml| *ml > 0) {
                report.skip(label, SkipReason::NoMeasurements);
                continue;
            }

            labels.push(label);
            inputs.push(LungInput {
                date,
                measurements,
                notes,
            });
        }

        if !inputs.is_empty() {
            for (label, outcome) in labels.into_iter().zip(log.add_all(inputs)?) {
                match outcome {
                    Ok(_) => report.imported += 1,
                    Err(e) => match SkipReason::from_store_error(&e) {
                        Some(reason) => report.skip(label, reason),
                        None => return Err(e),
                    },
                }
            }
        }

        Ok(report)
    }
}

fn row_label(line_num: usize, has_header: bool) -> String {
    let actual_line = if has_header { line_num + 2 } else { line_num + 1 };
    format!("row {}", actual_line)
}

/// Integers stay integers in the JSON document
fn numeric_value(cell: &str) -> serde_json::Value {
    if let Ok(n) = cell.parse::<i64>() {
        return serde_json::Value::from(n);
    }
    cell.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(cell.to_string()))
}
