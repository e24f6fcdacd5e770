//! Scoring a served bundle against labelled rows.
//!
//! Rows go through [`PredictionService::predict`], the same path a request
//! takes, so the report measures what the server would answer.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::service::{PredictionService, ServiceError};

use super::dataset::Dataset;

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("dataset has no complete rows to evaluate")]
    EmptyDataset,

    #[error("line {line}: missing species")]
    MissingLabel { line: usize },

    #[error("line {line}: {source}")]
    Prediction {
        line: usize,
        #[source]
        source: ServiceError,
    },
}

/// Precision, recall and F1 of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Rows whose true label is this class.
    pub support: usize,
}

/// Per-class metrics plus accuracy and support-weighted F1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub weighted_f1: f64,
    pub rows: usize,
}

impl ClassificationReport {
    /// Score `predicted` against `truth`, pairwise.
    ///
    /// Classes are the sorted union of both label sets. Ratios with a zero
    /// denominator count as 0.
    pub fn from_labels<S: AsRef<str>>(truth: &[S], predicted: &[S]) -> Self {
        #[derive(Default)]
        struct Counts {
            tp: usize,
            fp: usize,
            fn_: usize,
        }

        let mut counts: BTreeMap<&str, Counts> = BTreeMap::new();
        let mut correct = 0;
        for (t, p) in truth.iter().zip(predicted) {
            let (t, p) = (t.as_ref(), p.as_ref());
            if t == p {
                correct += 1;
                counts.entry(t).or_default().tp += 1;
            } else {
                counts.entry(t).or_default().fn_ += 1;
                counts.entry(p).or_default().fp += 1;
            }
        }

        let rows = truth.len().min(predicted.len());
        let classes: Vec<ClassMetrics> = counts
            .into_iter()
            .map(|(label, c)| {
                let precision = ratio(c.tp, c.tp + c.fp);
                let recall = ratio(c.tp, c.tp + c.fn_);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support: c.tp + c.fn_,
                }
            })
            .collect();

        let weighted_f1 = if rows == 0 {
            0.0
        } else {
            classes.iter().map(|c| c.f1 * c.support as f64).sum::<f64>() / rows as f64
        };

        Self {
            classes,
            accuracy: ratio(correct, rows),
            weighted_f1,
            rows,
        }
    }

    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max("weighted f1".len());
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>7}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$}  {:>9.4}  {:>7}", "accuracy", self.accuracy, self.rows)?;
        write!(f, "{:>width$}  {:>9.4}  {:>7}", "weighted f1", self.weighted_f1, self.rows)
    }
}

/// Predict every complete row of `dataset` through `service` and score the
/// answers against the `species` column.
pub fn evaluate(
    service: &PredictionService,
    dataset: &Dataset,
) -> Result<ClassificationReport, EvaluateError> {
    let mut truth = Vec::new();
    let mut predicted = Vec::new();

    for row in dataset.rows().iter().filter(|r| r.is_complete()) {
        let species = dataset
            .target(row)
            .ok_or(EvaluateError::MissingLabel { line: row.line })?;
        let prediction = service
            .predict(&dataset.payload(row))
            .map_err(|source| EvaluateError::Prediction {
                line: row.line,
                source,
            })?;
        debug!(line = row.line, truth = species, predicted = %prediction.species, "row scored");
        truth.push(species.to_string());
        predicted.push(prediction.species);
    }

    if truth.is_empty() {
        return Err(EvaluateError::EmptyDataset);
    }

    let report = ClassificationReport::from_labels(truth.as_slice(), predicted.as_slice());
    info!(
        rows = report.rows,
        accuracy = report.accuracy,
        weighted_f1 = report.weighted_f1,
        "evaluation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ready_store;
    use approx::assert_abs_diff_eq;

    const SAMPLE: &str = include_str!("../../tests/test-cases/penguins/penguins_sample.csv");

    #[test]
    fn per_class_and_weighted_scores() {
        let truth = ["a", "a", "b", "b"];
        let predicted = ["a", "b", "b", "b"];
        let report = ClassificationReport::from_labels(&truth[..], &predicted[..]);

        let a = report.class("a").unwrap();
        assert_abs_diff_eq!(a.precision, 1.0);
        assert_abs_diff_eq!(a.recall, 0.5);
        assert_abs_diff_eq!(a.f1, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(a.support, 2);

        let b = report.class("b").unwrap();
        assert_abs_diff_eq!(b.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.recall, 1.0);
        assert_abs_diff_eq!(b.f1, 0.8, epsilon = 1e-12);

        assert_abs_diff_eq!(report.accuracy, 0.75);
        assert_abs_diff_eq!(report.weighted_f1, (2.0 / 3.0 + 0.8) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn classes_never_seen_in_truth_score_zero() {
        let report = ClassificationReport::from_labels(&["a"][..], &["c"][..]);
        let c = report.class("c").unwrap();
        assert_eq!(c.support, 0);
        assert_abs_diff_eq!(c.precision, 0.0);
        assert_abs_diff_eq!(c.f1, 0.0);
        assert_abs_diff_eq!(report.weighted_f1, 0.0);
    }

    #[test]
    fn scores_sample_rows_through_the_service() {
        let service = PredictionService::new(ready_store());
        let dataset = Dataset::from_csv_str(SAMPLE).unwrap();
        let report = evaluate(&service, &dataset).unwrap();

        assert_eq!(report.rows, 15);
        let supports: Vec<_> = report.classes.iter().map(|c| (c.label.as_str(), c.support)).collect();
        assert_eq!(supports, [("Adelie", 7), ("Chinstrap", 4), ("Gentoo", 4)]);
        assert_abs_diff_eq!(report.accuracy, 1.0);
        assert_abs_diff_eq!(report.weighted_f1, 1.0);

        let text = report.to_string();
        assert!(text.contains("weighted f1"));
        assert!(text.contains("Chinstrap"));
    }

    #[test]
    fn rows_the_server_rejects_name_their_line() {
        let service = PredictionService::new(ready_store());
        let text = "species,island,bill_length_mm,bill_depth_mm,flipper_length_mm,body_mass_g,sex,year\n\
                    Adelie,Torgersen,39.1,18.7,181,3750,male,2007\n\
                    Adelie,Anvers,39.1,18.7,181,3750,male,2007\n";
        let err = evaluate(&service, &Dataset::from_csv_str(text).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            EvaluateError::Prediction { line: 3, source: ServiceError::Validation(_) }
        ));
    }

    #[test]
    fn nothing_to_score_is_an_error() {
        let service = PredictionService::new(ready_store());
        let text = "species,island,bill_length_mm,bill_depth_mm,flipper_length_mm,body_mass_g,sex,year\n\
                    Adelie,Torgersen,NA,18.7,181,3750,male,2007\n";
        assert!(matches!(
            evaluate(&service, &Dataset::from_csv_str(text).unwrap()),
            Err(EvaluateError::EmptyDataset)
        ));
    }
}
