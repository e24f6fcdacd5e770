//! Fitting the encoding metadata and building the design matrix.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use tracing::{debug, info};

use crate::encoding::{
    encode, EncodingError, EncodingMetadata, FeatureVector, MetadataDocument, MetadataError,
    METADATA_FORMAT_VERSION,
};
use crate::features::CategoricalField;
use crate::schema::{RequestSchema, ValidationError};

use super::dataset::{Dataset, DatasetError};

#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("dataset has no complete rows")]
    EmptyDataset,

    #[error("fitted metadata is inconsistent: {0}")]
    Metadata(#[from] MetadataError),

    #[error("line {line}: {source}")]
    InvalidRow {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("line {line}: {source}")]
    Encoding {
        line: usize,
        #[source]
        source: EncodingError,
    },

    #[error("line {line}: species `{species}` is not among the fitted labels")]
    UnknownLabel { line: usize, species: String },

    #[error("line {line}: missing species")]
    MissingLabel { line: usize },

    #[error("failed to write design matrix: {0}")]
    Write(#[from] csv::Error),
}

/// Learn the column layout, vocabulary and label map from complete rows.
///
/// Numeric columns keep their dataset header order. Each categorical field
/// then contributes one indicator column per observed level, levels sorted,
/// `sex` before `island`. Labels are the sorted distinct species.
pub fn fit_encoding(dataset: &Dataset) -> Result<EncodingMetadata, FitError> {
    let complete: Vec<_> = dataset.rows().iter().filter(|r| r.is_complete()).collect();
    if complete.is_empty() {
        return Err(FitError::EmptyDataset);
    }

    let mut levels: BTreeMap<CategoricalField, BTreeSet<String>> = BTreeMap::new();
    let mut labels = BTreeSet::new();
    for row in &complete {
        for field in CategoricalField::ALL {
            if let Some(level) = dataset.cell(row, field.name()) {
                levels.entry(field).or_default().insert(level.to_string());
            }
        }
        match dataset.target(row) {
            Some(species) => labels.insert(species.to_string()),
            None => return Err(FitError::MissingLabel { line: row.line }),
        };
    }

    let mut feature_columns: Vec<String> = dataset
        .numeric_columns()
        .into_iter()
        .map(|f| f.name().to_string())
        .collect();
    let mut categorical_levels = BTreeMap::new();
    for field in CategoricalField::ALL {
        let field_levels: Vec<String> = levels
            .remove(&field)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        feature_columns.extend(field_levels.iter().map(|l| field.indicator_column(l)));
        categorical_levels.insert(field.name().to_string(), field_levels);
    }

    let metadata = EncodingMetadata::from_document(MetadataDocument {
        format_version: METADATA_FORMAT_VERSION,
        feature_columns,
        label_classes: labels.into_iter().collect(),
        categorical_levels: Some(categorical_levels),
        model_digest: None,
    })?;

    info!(
        rows = complete.len(),
        columns = metadata.num_columns(),
        labels = ?metadata.labels(),
        "fitted encoding metadata"
    );
    Ok(metadata)
}

/// Training rows encoded exactly as the server encodes requests.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    columns: Vec<String>,
    rows: Vec<FeatureVector>,
    labels: Vec<usize>,
}

impl DesignMatrix {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    /// Class index of every row.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write as CSV: the metadata columns followed by a `label` column.
    ///
    /// Column names are quoted when they contain separators, so every row has
    /// exactly as many cells as the header.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), FitError> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(self.columns.iter().map(String::as_str).chain(["label"]))?;
        for (row, label) in self.rows.iter().zip(&self.labels) {
            let mut cells: Vec<String> = row.as_slice().iter().map(f32::to_string).collect();
            cells.push(label.to_string());
            writer.write_record(&cells)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Encode every complete row through the request validator and encoder.
///
/// Rows go through [`RequestSchema::validate`] and [`encode`] exactly as a
/// prediction request would, so the model is fitted on the vectors the
/// server will produce.
pub fn encode_dataset(
    dataset: &Dataset,
    metadata: &EncodingMetadata,
) -> Result<DesignMatrix, FitError> {
    let schema = RequestSchema::from_metadata(metadata);
    let mut rows = Vec::with_capacity(dataset.len());
    let mut labels = Vec::with_capacity(dataset.len());

    for row in dataset.rows().iter().filter(|r| r.is_complete()) {
        let record = schema
            .validate(&dataset.payload(row))
            .map_err(|source| FitError::InvalidRow {
                line: row.line,
                source,
            })?;
        let vector = encode(&record, metadata).map_err(|source| FitError::Encoding {
            line: row.line,
            source,
        })?;
        let species = dataset
            .target(row)
            .ok_or(FitError::MissingLabel { line: row.line })?;
        let label = metadata
            .labels()
            .iter()
            .position(|l| l == species)
            .ok_or_else(|| FitError::UnknownLabel {
                line: row.line,
                species: species.to_string(),
            })?;
        rows.push(vector);
        labels.push(label);
    }

    debug!(rows = rows.len(), "encoded design matrix");
    Ok(DesignMatrix {
        columns: metadata.columns().to_vec(),
        rows,
        labels,
    })
}
