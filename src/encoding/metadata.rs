//! Encoding metadata: the column contract shared by training and serving.
//!
//! The persisted [`MetadataDocument`] is compiled once into an
//! [`EncodingMetadata`], which resolves every column name to the record field
//! (or categorical level) that fills it. Encoding walks that resolved layout,
//! so the vector order is always the order the model was fitted with.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::features::{CategoricalField, NumericField};

/// Metadata document version written by this crate.
pub const METADATA_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    METADATA_FORMAT_VERSION
}

/// On-disk form of the encoding metadata (`metadata.json`).
///
/// `categorical_levels` and `model_digest` are optional so documents written
/// by older training scripts (columns and labels only) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub feature_columns: Vec<String>,
    pub label_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_levels: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_digest: Option<String>,
}

/// Errors raised while compiling a metadata document.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported metadata format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("metadata lists no feature columns")]
    NoColumns,
    #[error("metadata lists no label classes")]
    NoLabels,
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("label `{0}` appears more than once")]
    DuplicateLabel(String),
    #[error("label class {0} is empty")]
    EmptyLabel(usize),
    #[error("categorical field `{0}` is not a request field")]
    UnknownCategoricalField(String),
    #[error("categorical field `{field}` lists level `{level}` more than once")]
    DuplicateLevel { field: CategoricalField, level: String },
    #[error("categorical field `{0}` has an empty level")]
    EmptyLevel(CategoricalField),
    #[error("column `{0}` does not map to any request field or known level")]
    UnknownColumn(String),
    #[error("numeric field `{0}` has no column")]
    MissingNumericColumn(NumericField),
    #[error("categorical field `{0}` has no levels")]
    MissingCategoricalField(CategoricalField),
    #[error("level `{level}` of `{field}` has no indicator column")]
    MissingIndicatorColumn { field: CategoricalField, level: String },
}

/// What fills one position of the feature vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Copy of a numeric field.
    Numeric(NumericField),
    /// 1.0 when the field's level equals `level`, else 0.0.
    Indicator {
        field: CategoricalField,
        level: String,
    },
}

/// Validated encoding metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingMetadata {
    columns: Vec<String>,
    layout: Vec<ColumnSource>,
    vocabulary: BTreeMap<CategoricalField, Vec<String>>,
    labels: Vec<String>,
    model_digest: Option<String>,
}

impl EncodingMetadata {
    /// Parse and compile a `metadata.json` document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MetadataError> {
        let doc: MetadataDocument = serde_json::from_slice(bytes)?;
        Self::from_document(doc)
    }

    /// Compile a metadata document, checking that every column resolves to
    /// exactly one source and every field of the request is covered.
    pub fn from_document(doc: MetadataDocument) -> Result<Self, MetadataError> {
        if doc.format_version != METADATA_FORMAT_VERSION {
            return Err(MetadataError::UnsupportedVersion {
                found: doc.format_version,
                expected: METADATA_FORMAT_VERSION,
            });
        }
        if doc.feature_columns.is_empty() {
            return Err(MetadataError::NoColumns);
        }
        check_labels(&doc.label_classes)?;

        let mut seen = HashSet::new();
        for column in &doc.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(MetadataError::DuplicateColumn(column.clone()));
            }
        }

        let vocabulary = match &doc.categorical_levels {
            Some(levels) => explicit_vocabulary(levels)?,
            None => inferred_vocabulary(&doc.feature_columns)?,
        };

        let layout = doc
            .feature_columns
            .iter()
            .map(|column| resolve_column(column, &vocabulary))
            .collect::<Result<Vec<_>, _>>()?;

        for field in NumericField::ALL {
            if !layout.contains(&ColumnSource::Numeric(field)) {
                return Err(MetadataError::MissingNumericColumn(field));
            }
        }
        for field in CategoricalField::ALL {
            let levels = vocabulary
                .get(&field)
                .filter(|l| !l.is_empty())
                .ok_or(MetadataError::MissingCategoricalField(field))?;
            for level in levels {
                if !seen.contains(field.indicator_column(level).as_str()) {
                    return Err(MetadataError::MissingIndicatorColumn {
                        field,
                        level: level.clone(),
                    });
                }
            }
        }

        Ok(Self {
            columns: doc.feature_columns,
            layout,
            vocabulary,
            labels: doc.label_classes,
            model_digest: doc.model_digest,
        })
    }

    /// Persistable form, with the vocabulary always written out.
    pub fn to_document(&self) -> MetadataDocument {
        let categorical_levels = self
            .vocabulary
            .iter()
            .map(|(field, levels)| (field.name().to_string(), levels.clone()))
            .collect();
        MetadataDocument {
            format_version: METADATA_FORMAT_VERSION,
            feature_columns: self.columns.clone(),
            label_classes: self.labels.clone(),
            categorical_levels: Some(categorical_levels),
            model_digest: self.model_digest.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_document())
    }

    /// Canonical column names, in vector order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Resolved source of every column, in vector order.
    pub fn layout(&self) -> &[ColumnSource] {
        &self.layout
    }

    /// Trained levels of a categorical field.
    pub fn levels(&self, field: CategoricalField) -> &[String] {
        self.vocabulary.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Class labels indexed by model output.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    /// Digest of the model this metadata was bundled with.
    pub fn model_digest(&self) -> Option<&str> {
        self.model_digest.as_deref()
    }

    pub fn with_model_digest(mut self, digest: impl Into<String>) -> Self {
        self.model_digest = Some(digest.into());
        self
    }
}

fn check_labels(labels: &[String]) -> Result<(), MetadataError> {
    if labels.is_empty() {
        return Err(MetadataError::NoLabels);
    }
    let mut seen = HashSet::new();
    for (idx, label) in labels.iter().enumerate() {
        if label.is_empty() {
            return Err(MetadataError::EmptyLabel(idx));
        }
        if !seen.insert(label.as_str()) {
            return Err(MetadataError::DuplicateLabel(label.clone()));
        }
    }
    Ok(())
}

fn push_level(
    vocabulary: &mut BTreeMap<CategoricalField, Vec<String>>,
    field: CategoricalField,
    level: &str,
) -> Result<(), MetadataError> {
    if level.is_empty() {
        return Err(MetadataError::EmptyLevel(field));
    }
    let levels = vocabulary.entry(field).or_default();
    if levels.iter().any(|l| l == level) {
        return Err(MetadataError::DuplicateLevel {
            field,
            level: level.to_string(),
        });
    }
    levels.push(level.to_string());
    Ok(())
}

fn explicit_vocabulary(
    levels: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<CategoricalField, Vec<String>>, MetadataError> {
    let mut vocabulary = BTreeMap::new();
    for (name, field_levels) in levels {
        let field = CategoricalField::from_name(name)
            .ok_or_else(|| MetadataError::UnknownCategoricalField(name.clone()))?;
        for level in field_levels {
            push_level(&mut vocabulary, field, level)?;
        }
    }
    Ok(vocabulary)
}

/// Recover the vocabulary from `<field>_<level>` column names.
fn inferred_vocabulary(
    columns: &[String],
) -> Result<BTreeMap<CategoricalField, Vec<String>>, MetadataError> {
    let mut vocabulary = BTreeMap::new();
    for column in columns {
        if NumericField::from_name(column).is_some() {
            continue;
        }
        for field in CategoricalField::ALL {
            if let Some(level) = field.level_of(column) {
                push_level(&mut vocabulary, field, level)?;
            }
        }
    }
    Ok(vocabulary)
}

fn resolve_column(
    column: &str,
    vocabulary: &BTreeMap<CategoricalField, Vec<String>>,
) -> Result<ColumnSource, MetadataError> {
    if let Some(field) = NumericField::from_name(column) {
        return Ok(ColumnSource::Numeric(field));
    }
    for (&field, levels) in vocabulary {
        if let Some(level) = field.level_of(column) {
            if levels.iter().any(|l| l == level) {
                return Ok(ColumnSource::Indicator {
                    field,
                    level: level.to_string(),
                });
            }
        }
    }
    Err(MetadataError::UnknownColumn(column.to_string()))
}
