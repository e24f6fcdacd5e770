//! Stratified train/test split.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::dataset::{Dataset, DatasetRow};

/// Default share of rows held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default seed for the split shuffle.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("test fraction must be in [0, 1), got {0}")]
pub struct InvalidTestFraction(pub f64);

/// Split `dataset` into train and test parts, keeping each species' share.
///
/// Every species holds out `round(count * test_fraction)` rows, but always
/// keeps at least one row for training. Rows without a species go to the
/// training part. Both parts keep file order.
pub fn stratified_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), InvalidTestFraction> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(InvalidTestFraction(test_fraction));
    }

    let mut by_species: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, row) in dataset.rows().iter().enumerate() {
        if let Some(species) = dataset.target(row) {
            by_species.entry(species).or_default().push(idx);
        }
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut held_out = vec![false; dataset.len()];
    for indices in by_species.values_mut() {
        let count = indices.len();
        let n_test = ((count as f64 * test_fraction).round() as usize).min(count - 1);
        indices.shuffle(&mut rng);
        for &idx in &indices[..n_test] {
            held_out[idx] = true;
        }
    }

    let (test, train): (Vec<_>, Vec<_>) = dataset
        .rows()
        .iter()
        .cloned()
        .zip(held_out)
        .partition(|(_, test)| *test);
    let strip = |rows: Vec<(DatasetRow, bool)>| -> Vec<DatasetRow> {
        rows.into_iter().map(|(row, _)| row).collect()
    };
    Ok((dataset.with_rows(strip(train)), dataset.with_rows(strip(test))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../tests/test-cases/penguins/penguins_sample.csv");

    fn sample() -> Dataset {
        let mut ds = Dataset::from_csv_str(SAMPLE).unwrap();
        ds.drop_incomplete();
        ds
    }

    fn species_counts(ds: &Dataset) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in ds.rows() {
            *counts.entry(ds.target(row).unwrap().to_string()).or_default() += 1;
        }
        counts
    }

    #[test]
    fn holds_out_each_species_proportionally() {
        let ds = sample();
        let (train, test) = stratified_split(&ds, 0.2, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(train.len() + test.len(), ds.len());

        // 7 Adelie, 4 Gentoo, 4 Chinstrap
        let held = species_counts(&test);
        assert_eq!(held["Adelie"], 1);
        assert_eq!(held["Gentoo"], 1);
        assert_eq!(held["Chinstrap"], 1);
        assert_eq!(species_counts(&train)["Adelie"], 6);
    }

    #[test]
    fn split_is_deterministic_and_keeps_file_order() {
        let ds = sample();
        let (train_a, test_a) = stratified_split(&ds, 0.3, 7).unwrap();
        let (train_b, test_b) = stratified_split(&ds, 0.3, 7).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);

        let lines: Vec<usize> = train_a.rows().iter().map(|r| r.line).collect();
        assert!(lines.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_fraction_keeps_everything_for_training() {
        let ds = sample();
        let (train, test) = stratified_split(&ds, 0.0, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(train, ds);
        assert!(test.is_empty());
    }

    #[test]
    fn every_species_keeps_a_training_row() {
        let ds = sample();
        let (train, _) = stratified_split(&ds, 0.99, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(species_counts(&train).len(), 3);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let ds = sample();
        assert_eq!(
            stratified_split(&ds, 1.0, 0).unwrap_err(),
            InvalidTestFraction(1.0)
        );
        assert!(stratified_split(&ds, -0.1, 0).is_err());
    }
}
