//! Historical penguin observations read from CSV.

use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Number, Value};

use crate::features::{CategoricalField, NumericField};

/// Name of the label column.
pub const TARGET_COLUMN: &str = "species";

/// Cells that mean "no value".
const MISSING_MARKERS: [&str; 2] = ["", "NA"];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: csv::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no header row")]
    MissingHeader,
    #[error("column `{0}` appears more than once in the header")]
    DuplicateColumn(String),
    #[error("column `{0}` is not a penguin feature or the `species` target")]
    UnknownColumn(String),
    #[error("required column `{0}` is missing")]
    MissingColumn(&'static str),
    #[error("line {line}: expected {expected} cells, found {actual}")]
    RaggedRow {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

/// One data row, with its 1-based line number in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub line: usize,
    cells: Vec<Option<String>>,
}

impl DatasetRow {
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

/// A parsed table of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let reader = reader_builder()
            .from_path(path)
            .map_err(|source| DatasetError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_reader(reader)
    }

    /// Parse CSV text with a header row.
    ///
    /// Cells may be double-quoted (with `""` as an escaped quote). Empty and
    /// `NA` cells are missing values. Blank lines are skipped.
    pub fn from_csv_str(text: &str) -> Result<Self, DatasetError> {
        Self::from_reader(reader_builder().from_reader(text.as_bytes()))
    }

    fn from_reader<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let header = reader.headers()?;
        if header.is_empty() {
            return Err(DatasetError::MissingHeader);
        }
        let columns: Vec<String> = header.iter().map(str::to_string).collect();
        check_header(&columns)?;

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while reader.read_record(&mut record)? {
            let line = record.position().map_or(0, |p| p.line() as usize);
            if record.len() != columns.len() {
                return Err(DatasetError::RaggedRow {
                    line,
                    expected: columns.len(),
                    actual: record.len(),
                });
            }
            let cells = record
                .iter()
                .map(|c| (!MISSING_MARKERS.contains(&c)).then(|| c.to_string()))
                .collect();
            rows.push(DatasetRow { line, cells });
        }

        Ok(Self { columns, rows })
    }

    /// Header names, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove rows with any missing cell. Returns how many were dropped.
    pub fn drop_incomplete(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(DatasetRow::is_complete);
        before - self.rows.len()
    }

    /// Numeric feature columns in header order.
    pub fn numeric_columns(&self) -> Vec<NumericField> {
        self.columns
            .iter()
            .filter_map(|c| NumericField::from_name(c))
            .collect()
    }

    /// Value of `column` in `row`, if present.
    pub fn cell<'a>(&self, row: &'a DatasetRow, column: &str) -> Option<&'a str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        row.cells.get(idx)?.as_deref()
    }

    /// The row's features as a request payload, shaped like a prediction
    /// request so it can go through the same validator.
    ///
    /// Cells that parse as numbers become JSON numbers; everything else stays
    /// a string and is left for the validator to judge.
    pub fn payload(&self, row: &DatasetRow) -> Value {
        let mut object = Map::new();
        for (column, cell) in self.columns.iter().zip(&row.cells) {
            if column == TARGET_COLUMN {
                continue;
            }
            let value = match cell {
                None => Value::Null,
                Some(text) if NumericField::from_name(column).is_some() => numeric_cell(text),
                Some(text) => Value::String(text.clone()),
            };
            object.insert(column.clone(), value);
        }
        Value::Object(object)
    }

    /// A dataset with the same header and the given rows.
    pub(crate) fn with_rows(&self, rows: Vec<DatasetRow>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Write the table back out as CSV, with missing cells as `NA`.
    pub fn write_csv<W: io::Write>(&self, out: W) -> Result<(), DatasetError> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.cells.iter().map(|c| c.as_deref().unwrap_or("NA")))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Target label of `row`.
    pub fn target<'a>(&self, row: &'a DatasetRow) -> Option<&'a str> {
        self.cell(row, TARGET_COLUMN)
    }
}

fn check_header(columns: &[String]) -> Result<(), DatasetError> {
    for (idx, column) in columns.iter().enumerate() {
        if columns[..idx].contains(column) {
            return Err(DatasetError::DuplicateColumn(column.clone()));
        }
        let known = column == TARGET_COLUMN
            || NumericField::from_name(column).is_some()
            || CategoricalField::from_name(column).is_some();
        if !known {
            return Err(DatasetError::UnknownColumn(column.clone()));
        }
    }

    let required = std::iter::once(TARGET_COLUMN)
        .chain(NumericField::ALL.into_iter().map(NumericField::name))
        .chain(CategoricalField::ALL.into_iter().map(CategoricalField::name));
    for name in required {
        if !columns.iter().any(|c| c == name) {
            return Err(DatasetError::MissingColumn(name));
        }
    }
    Ok(())
}

fn numeric_cell(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(i.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(text.to_string()), Value::Number)
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(Trim::All);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEADER: &str =
        "species,island,bill_length_mm,bill_depth_mm,flipper_length_mm,body_mass_g,sex,year";

    fn csv(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        text.push('\n');
        text
    }

    #[test]
    fn parses_rows_and_missing_markers() {
        let ds = Dataset::from_csv_str(&csv(&[
            "Adelie,Torgersen,39.1,18.7,181,3750,male,2007",
            "Adelie,Torgersen,NA,NA,NA,NA,,2007",
        ]))
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[0].line, 2);
        assert!(ds.rows()[0].is_complete());
        assert!(!ds.rows()[1].is_complete());
        assert_eq!(ds.cell(&ds.rows()[1], "sex"), None);
        assert_eq!(ds.cell(&ds.rows()[1], "year"), Some("2007"));
    }

    #[test]
    fn drops_incomplete_rows() {
        let mut ds = Dataset::from_csv_str(&csv(&[
            "Adelie,Torgersen,39.1,18.7,181,3750,male,2007",
            "Adelie,Torgersen,NA,NA,NA,NA,NA,2007",
            "Gentoo,Biscoe,46.1,13.2,211,4500,female,2007",
        ]))
        .unwrap();
        assert_eq!(ds.drop_incomplete(), 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.target(&ds.rows()[1]), Some("Gentoo"));
    }

    #[test]
    fn handles_quoted_cells() {
        let ds = Dataset::from_csv_str(&csv(&[
            r#"Adelie,"Biscoe, North",39.1,18.7,181,3750,"ma""le",2007"#,
        ]))
        .unwrap();
        let row = &ds.rows()[0];
        assert_eq!(ds.cell(row, "island"), Some("Biscoe, North"));
        assert_eq!(ds.cell(row, "sex"), Some("ma\"le"));
        assert_eq!(ds.cell(row, "year"), Some("2007"));
    }

    #[test]
    fn skips_blank_lines_and_trims_cells() {
        let ds = Dataset::from_csv_str(&csv(&[
            "",
            "Adelie, Torgersen ,39.1,18.7,181,3750,male,2007",
            "",
        ]))
        .unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.cell(&ds.rows()[0], "island"), Some("Torgersen"));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("penguins.csv");
        std::fs::write(&path, csv(&["Gentoo,Biscoe,46.1,13.2,211,4500,female,2007"])).unwrap();
        let ds = Dataset::read(&path).unwrap();
        assert_eq!(ds.target(&ds.rows()[0]), Some("Gentoo"));

        assert!(matches!(
            Dataset::read(&dir.path().join("missing.csv")),
            Err(DatasetError::Read { .. })
        ));
    }

    #[test]
    fn written_csv_reads_back_identically() {
        let ds = Dataset::from_csv_str(&csv(&[
            r#"Adelie,"Biscoe, North",39.1,18.7,181,3750,male,2007"#,
            "Adelie,Torgersen,NA,NA,NA,NA,,2007",
        ]))
        .unwrap();
        let mut out = Vec::new();
        ds.write_csv(&mut out).unwrap();
        let again = Dataset::from_csv_str(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(again, ds);
    }

    #[test]
    fn payload_mirrors_a_request() {
        let ds = Dataset::from_csv_str(&csv(&["Adelie,Torgersen,39.1,18.7,181,3750,male,2007"]))
            .unwrap();
        assert_eq!(
            ds.payload(&ds.rows()[0]),
            json!({
                "island": "Torgersen",
                "bill_length_mm": 39.1,
                "bill_depth_mm": 18.7,
                "flipper_length_mm": 181,
                "body_mass_g": 3750,
                "sex": "male",
                "year": 2007
            })
        );
    }

    #[test]
    fn unparseable_numbers_stay_strings() {
        assert_eq!(numeric_cell("12.5"), json!(12.5));
        assert_eq!(numeric_cell("twelve"), json!("twelve"));
    }

    #[test]
    fn header_problems() {
        assert!(matches!(Dataset::from_csv_str(""), Err(DatasetError::MissingHeader)));
        assert!(matches!(
            Dataset::from_csv_str(&format!("{HEADER},colour\n")),
            Err(DatasetError::UnknownColumn(c)) if c == "colour"
        ));
        assert!(matches!(
            Dataset::from_csv_str("species,island,bill_length_mm\n"),
            Err(DatasetError::MissingColumn("bill_depth_mm"))
        ));
        assert!(matches!(
            Dataset::from_csv_str(&csv(&["Adelie,Dream,1"])),
            Err(DatasetError::RaggedRow { line: 2, expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn numeric_columns_follow_header_order() {
        let ds = Dataset::from_csv_str(
            "year,species,sex,island,body_mass_g,bill_depth_mm,bill_length_mm,flipper_length_mm\n",
        )
        .unwrap();
        assert_eq!(
            ds.numeric_columns(),
            [
                NumericField::Year,
                NumericField::BodyMassG,
                NumericField::BillDepthMm,
                NumericField::BillLengthMm,
                NumericField::FlipperLengthMm
            ]
        );
    }
}
