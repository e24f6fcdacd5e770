//! Field-level validation problems.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Machine-readable reason a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProblemKind {
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "float_type")]
    NotANumber,
    #[serde(rename = "finite_number")]
    NotFinite,
    #[serde(rename = "greater_than")]
    NotPositive,
    #[serde(rename = "int_type")]
    NotAnInteger,
    #[serde(rename = "string_type")]
    NotAString,
    #[serde(rename = "enum")]
    NotInDomain,
    #[serde(rename = "model_type")]
    NotAnObject,
    #[serde(rename = "json_invalid")]
    InvalidJson,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProblem {
    #[serde(rename = "type")]
    pub kind: ProblemKind,
    /// Location of the field in the request, e.g. `["body", "sex"]`.
    pub loc: Vec<String>,
    pub msg: String,
    /// The literal value received (`null` when missing).
    pub input: Value,
    /// Accepted values, for enumerated fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Vec<String>>,
}

impl FieldProblem {
    pub(crate) fn new(field: &str, kind: ProblemKind, msg: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            input,
            expected: None,
        }
    }

    pub(crate) fn with_expected(mut self, expected: &[String]) -> Self {
        self.expected = Some(expected.to_vec());
        self
    }

    /// Field name this problem is about (`body` for whole-payload problems).
    pub fn field(&self) -> &str {
        self.loc.last().map_or("body", String::as_str)
    }
}

/// Every problem found in one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationError {
    problems: Vec<FieldProblem>,
}

impl ValidationError {
    pub(crate) fn new(problems: Vec<FieldProblem>) -> Self {
        debug_assert!(!problems.is_empty());
        Self { problems }
    }

    /// A body that could not be parsed as JSON at all.
    pub fn invalid_json(err: &serde_json::Error, body: &str) -> Self {
        Self::new(vec![FieldProblem {
            kind: ProblemKind::InvalidJson,
            loc: vec!["body".to_string()],
            msg: format!("JSON decode error: {err}"),
            input: Value::String(body.to_string()),
            expected: None,
        }])
    }

    pub fn problems(&self) -> &[FieldProblem] {
        &self.problems
    }

    /// Problem reported for `field`, if any.
    pub fn problem_for(&self, field: &str) -> Option<&FieldProblem> {
        self.problems.iter().find(|p| p.field() == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed validation:")?;
        for (idx, p) in self.problems.iter().enumerate() {
            let sep = if idx == 0 { " " } else { "; " };
            write!(f, "{sep}{}: {} (got {})", p.field(), p.msg, p.input)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
