//! Request features and the validated record they parse into.

use std::fmt;

/// Numeric request fields, in dataset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericField {
    BillLengthMm,
    BillDepthMm,
    FlipperLengthMm,
    BodyMassG,
    Year,
}

impl NumericField {
    pub const ALL: [NumericField; 5] = [
        NumericField::BillLengthMm,
        NumericField::BillDepthMm,
        NumericField::FlipperLengthMm,
        NumericField::BodyMassG,
        NumericField::Year,
    ];

    /// Wire and column name.
    pub fn name(self) -> &'static str {
        match self {
            NumericField::BillLengthMm => "bill_length_mm",
            NumericField::BillDepthMm => "bill_depth_mm",
            NumericField::FlipperLengthMm => "flipper_length_mm",
            NumericField::BodyMassG => "body_mass_g",
            NumericField::Year => "year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Integer fields accept only whole numbers; the rest are positive measurements.
    pub fn is_integer(self) -> bool {
        matches!(self, NumericField::Year)
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Categorical request fields, in the order their indicator columns are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoricalField {
    Sex,
    Island,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 2] = [CategoricalField::Sex, CategoricalField::Island];

    /// Wire name, also the indicator column prefix.
    pub fn name(self) -> &'static str {
        match self {
            CategoricalField::Sex => "sex",
            CategoricalField::Island => "island",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Column holding the indicator for `level` (`sex_male`, `island_Dream`, ...).
    pub fn indicator_column(self, level: &str) -> String {
        format!("{}_{}", self.name(), level)
    }

    /// Level encoded by `column`, if the column belongs to this field.
    pub fn level_of<'a>(self, column: &'a str) -> Option<&'a str> {
        column
            .strip_prefix(self.name())
            .and_then(|rest| rest.strip_prefix('_'))
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated prediction request.
///
/// Only the schema validator constructs records, so every field is present
/// and inside its declared domain.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    bill_length_mm: f64,
    bill_depth_mm: f64,
    flipper_length_mm: f64,
    body_mass_g: f64,
    year: i64,
    sex: String,
    island: String,
}

impl FeatureRecord {
    pub(crate) fn new(measurements: [f64; 4], year: i64, sex: String, island: String) -> Self {
        let [bill_length_mm, bill_depth_mm, flipper_length_mm, body_mass_g] = measurements;
        Self {
            bill_length_mm,
            bill_depth_mm,
            flipper_length_mm,
            body_mass_g,
            year,
            sex,
            island,
        }
    }

    pub fn bill_length_mm(&self) -> f64 {
        self.bill_length_mm
    }

    pub fn bill_depth_mm(&self) -> f64 {
        self.bill_depth_mm
    }

    pub fn flipper_length_mm(&self) -> f64 {
        self.flipper_length_mm
    }

    pub fn body_mass_g(&self) -> f64 {
        self.body_mass_g
    }

    pub fn year(&self) -> i64 {
        self.year
    }

    pub fn sex(&self) -> &str {
        &self.sex
    }

    pub fn island(&self) -> &str {
        &self.island
    }

    /// Value of a numeric field.
    pub fn numeric(&self, field: NumericField) -> f64 {
        match field {
            NumericField::BillLengthMm => self.bill_length_mm,
            NumericField::BillDepthMm => self.bill_depth_mm,
            NumericField::FlipperLengthMm => self.flipper_length_mm,
            NumericField::BodyMassG => self.body_mass_g,
            NumericField::Year => self.year as f64,
        }
    }

    /// Level of a categorical field.
    pub fn level(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Sex => &self.sex,
            CategoricalField::Island => &self.island,
        }
    }
}
