//! Request payload validation.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::encoding::EncodingMetadata;
use crate::features::{CategoricalField, FeatureRecord, NumericField};

use super::error::{FieldProblem, ProblemKind, ValidationError};

/// Accepted request shape, derived from the encoding metadata of a bundle.
///
/// The categorical domains are the trained vocabularies, so anything the
/// validator lets through is something the encoder can place.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSchema {
    domains: BTreeMap<CategoricalField, Vec<String>>,
}

impl RequestSchema {
    pub fn from_metadata(metadata: &EncodingMetadata) -> Self {
        let domains = CategoricalField::ALL
            .into_iter()
            .map(|field| (field, metadata.levels(field).to_vec()))
            .collect();
        Self { domains }
    }

    /// Literals accepted for `field`.
    pub fn accepted(&self, field: CategoricalField) -> &[String] {
        self.domains.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse `payload` into a record, collecting every problem.
    pub fn validate(&self, payload: &Value) -> Result<FeatureRecord, ValidationError> {
        let Some(object) = payload.as_object() else {
            return Err(ValidationError::new(vec![FieldProblem {
                kind: ProblemKind::NotAnObject,
                loc: vec!["body".to_string()],
                msg: "Input should be a valid JSON object".to_string(),
                input: payload.clone(),
                expected: None,
            }]));
        };

        let mut problems = Vec::new();

        let mut measurements = [0.0_f64; 4];
        for (slot, field) in measurements.iter_mut().zip(NumericField::ALL) {
            match measurement(object, field) {
                Ok(v) => *slot = v,
                Err(p) => problems.push(p),
            }
        }

        let year = match integer(object, NumericField::Year) {
            Ok(v) => v,
            Err(p) => {
                problems.push(p);
                0
            }
        };

        let sex = self.level(object, CategoricalField::Sex, &mut problems);
        let island = self.level(object, CategoricalField::Island, &mut problems);

        match (sex, island) {
            (Some(sex), Some(island)) if problems.is_empty() => {
                Ok(FeatureRecord::new(measurements, year, sex, island))
            }
            _ => Err(ValidationError::new(problems)),
        }
    }

    fn level(
        &self,
        object: &Map<String, Value>,
        field: CategoricalField,
        problems: &mut Vec<FieldProblem>,
    ) -> Option<String> {
        let name = field.name();
        let accepted = self.accepted(field);
        let problem = match object.get(name) {
            None | Some(Value::Null) => missing(name, object.get(name)),
            Some(Value::String(s)) if accepted.iter().any(|a| a == s) => return Some(s.clone()),
            Some(v @ Value::String(_)) => {
                FieldProblem::new(name, ProblemKind::NotInDomain, enum_message(accepted), v.clone())
                    .with_expected(accepted)
            }
            Some(v) => FieldProblem::new(
                name,
                ProblemKind::NotAString,
                "Input should be a valid string",
                v.clone(),
            ),
        };
        problems.push(problem);
        None
    }
}

/// Free-function form of [`RequestSchema::validate`].
pub fn validate(payload: &Value, schema: &RequestSchema) -> Result<FeatureRecord, ValidationError> {
    schema.validate(payload)
}

fn missing(name: &str, input: Option<&Value>) -> FieldProblem {
    FieldProblem::new(
        name,
        ProblemKind::Missing,
        "Field required",
        input.cloned().unwrap_or(Value::Null),
    )
}

fn measurement(object: &Map<String, Value>, field: NumericField) -> Result<f64, FieldProblem> {
    let name = field.name();
    let value = match object.get(name) {
        None | Some(Value::Null) => return Err(missing(name, object.get(name))),
        Some(v) => v,
    };
    let Some(x) = value.as_f64() else {
        return Err(FieldProblem::new(
            name,
            ProblemKind::NotANumber,
            "Input should be a valid number",
            value.clone(),
        ));
    };
    if !x.is_finite() {
        return Err(FieldProblem::new(
            name,
            ProblemKind::NotFinite,
            "Input should be a finite number",
            value.clone(),
        ));
    }
    if x <= 0.0 {
        return Err(FieldProblem::new(
            name,
            ProblemKind::NotPositive,
            "Input should be greater than 0",
            value.clone(),
        ));
    }
    Ok(x)
}

fn integer(object: &Map<String, Value>, field: NumericField) -> Result<i64, FieldProblem> {
    let name = field.name();
    let value = match object.get(name) {
        None | Some(Value::Null) => return Err(missing(name, object.get(name))),
        Some(v) => v,
    };
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    // Integral floats (`2007.0`) are whole numbers too.
    match value.as_f64() {
        Some(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(x as i64),
        _ => Err(FieldProblem::new(
            name,
            ProblemKind::NotAnInteger,
            "Input should be a valid integer",
            value.clone(),
        )),
    }
}

fn enum_message(accepted: &[String]) -> String {
    let quoted: Vec<String> = accepted.iter().map(|a| format!("'{a}'")).collect();
    match quoted.split_last() {
        None => "Input should be one of no accepted values".to_string(),
        Some((only, [])) => format!("Input should be {only}"),
        Some((last, rest)) => format!("Input should be {} or {last}", rest.join(", ")),
    }
}
