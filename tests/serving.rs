//! End-to-end serving tests: payload -> validator -> encoder -> predictor -> response.

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use serde_json::{json, Map, Value};

use penguins::artifact::{ArtifactStore, Readiness, StoreError};
use penguins::encoding::{encode, ColumnSource, EncodingMetadata, FeatureVector, MetadataDocument};
use penguins::features::CategoricalField;
use penguins::predictor::{predict, PredictError};
use penguins::schema::{ProblemKind, RequestSchema};
use penguins::service::{PredictionService, ServiceError};

use common::{
    assert_slice_approx_eq, fixture_bundle, fixture_raw_bundle, ready_store, request_cases,
    valid_payload, MemoryBundleReader, DEFAULT_TOLERANCE,
};

// =============================================================================
// Recorded Requests
// =============================================================================

#[test]
fn recorded_request_cases() {
    let service = PredictionService::new(ready_store());
    let cases = request_cases();
    assert!(!cases.is_empty());

    for case in cases {
        let response = service.handle(&case.payload);
        assert_eq!(response.status, case.status, "{}: {}", case.name, response.body);

        if let Some(species) = &case.species {
            assert_eq!(response.body, json!({ "species": species }), "{}", case.name);
        }
        if !case.invalid_fields.is_empty() {
            let named: BTreeSet<&str> = response.body["detail"]
                .as_array()
                .unwrap_or_else(|| panic!("{}: detail is not a list", case.name))
                .iter()
                .filter_map(|p| p["loc"][1].as_str())
                .collect();
            let expected: BTreeSet<&str> = case.invalid_fields.iter().map(String::as_str).collect();
            assert_eq!(named, expected, "{}", case.name);
        }
    }
}

#[test]
fn out_of_domain_sex_names_accepted_values() {
    let service = PredictionService::new(ready_store());
    let mut payload = valid_payload();
    payload["sex"] = json!("shemale");

    let err = match service.predict(&payload) {
        Err(ServiceError::Validation(err)) => err,
        other => panic!("expected validation error, got {other:?}"),
    };
    let problem = err.problem_for("sex").unwrap();
    assert_eq!(problem.kind, ProblemKind::NotInDomain);
    assert_eq!(problem.input, json!("shemale"));
    let accepted: BTreeSet<_> = problem.expected.clone().unwrap().into_iter().collect();
    assert_eq!(accepted, BTreeSet::from(["male".to_string(), "female".to_string()]));
}

#[test]
fn out_of_domain_island_names_accepted_values() {
    let service = PredictionService::new(ready_store());
    let mut payload = valid_payload();
    payload["island"] = json!("Australia");

    let response = service.handle(&payload);
    assert_eq!(response.status, 400);
    let detail = &response.body["detail"][0];
    assert_eq!(detail["loc"], json!(["body", "island"]));
    assert_eq!(detail["input"], "Australia");
    let accepted: BTreeSet<&str> = detail["expected"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(accepted, BTreeSet::from(["Torgersen", "Biscoe", "Dream"]));
}

#[rstest]
#[case("sex", "female")]
#[case("sex", "male")]
#[case("island", "Biscoe")]
#[case("island", "Dream")]
#[case("island", "Torgersen")]
fn every_trained_level_is_served(#[case] field: &str, #[case] level: &str) {
    let service = PredictionService::new(ready_store());
    let mut payload = valid_payload();
    payload[field] = json!(level);
    assert_eq!(service.handle(&payload).status, 200);
}

#[rstest]
#[case("sex", "MALE")]
#[case("sex", " male")]
#[case("sex", "")]
#[case("island", "torgersen")]
#[case("island", "Anvers")]
fn near_miss_literals_are_rejected(#[case] field: &str, #[case] literal: &str) {
    let service = PredictionService::new(ready_store());
    let mut payload = valid_payload();
    payload[field] = json!(literal);
    let response = service.handle(&payload);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["detail"][0]["loc"][1], field);
    assert_eq!(response.body["detail"][0]["type"], "enum");
}

// =============================================================================
// Store Readiness
// =============================================================================

#[test]
fn predictions_before_load_are_unavailable() {
    let store = Arc::new(ArtifactStore::new(
        Arc::new(MemoryBundleReader::new(fixture_raw_bundle())),
        Duration::from_secs(5),
    ));
    let service = PredictionService::new(Arc::clone(&store));

    for case in request_cases() {
        assert!(matches!(
            service.predict(&case.payload),
            Err(ServiceError::Unavailable(StoreError::ArtifactUnavailable {
                state: Readiness::Uninitialized
            }))
        ));
        assert_eq!(service.handle(&case.payload).status, 503);
    }

    store.load("fixture").unwrap();
    assert_eq!(service.handle(&valid_payload()).status, 200);
}

#[test]
fn failed_load_keeps_every_request_unavailable() {
    let mut raw = fixture_raw_bundle();
    raw.metadata = br#"{"format_version": 2, "feature_columns": [], "label_classes": []}"#.to_vec();
    let store = Arc::new(ArtifactStore::new(
        Arc::new(MemoryBundleReader::new(raw)),
        Duration::from_secs(5),
    ));
    assert!(store.load("fixture").is_err());

    let service = PredictionService::new(store);
    assert_eq!(service.handle(&valid_payload()).status, 503);
    assert_eq!(service.health().body, json!({ "status": "failed" }));
}

// =============================================================================
// Predictor Contract
// =============================================================================

#[test]
fn margins_sum_base_score_and_class_trees() {
    let bundle = fixture_bundle();
    let record = bundle.schema().validate(&valid_payload()).unwrap();
    let features = encode(&record, bundle.metadata()).unwrap();
    let margins = bundle.model().predict_margins(features.as_slice());
    // base score 0.5 plus one leaf from each of the class's two trees
    assert_slice_approx_eq(&margins, &[0.90, 0.41, 0.25], DEFAULT_TOLERANCE, "margins");
}

#[test]
fn mismatched_vector_length_fails_fast() {
    let bundle = fixture_bundle();
    let short = FeatureVector::from_values(vec![39.1, 18.7, 181.0, 3750.0, 2007.0]);
    assert_eq!(
        predict(&short, &bundle),
        Err(PredictError::DimensionMismatch {
            expected: 10,
            actual: 5
        })
    );
}

// =============================================================================
// Properties
// =============================================================================

const NUMERIC_KEYS: [&str; 5] = [
    "bill_length_mm",
    "bill_depth_mm",
    "flipper_length_mm",
    "body_mass_g",
    "year",
];

prop_compose! {
    fn valid_request()(
        bill_length in 30.0f64..60.0,
        bill_depth in 13.0f64..22.0,
        flipper in 170.0f64..235.0,
        mass in 2700.0f64..6300.0,
        year in 2007i64..=2009,
        sex in prop::sample::select(vec!["female", "male"]),
        island in prop::sample::select(vec!["Biscoe", "Dream", "Torgersen"]),
    ) -> Vec<(&'static str, Value)> {
        vec![
            ("bill_length_mm", json!(bill_length)),
            ("bill_depth_mm", json!(bill_depth)),
            ("flipper_length_mm", json!(flipper)),
            ("body_mass_g", json!(mass)),
            ("year", json!(year)),
            ("sex", json!(sex)),
            ("island", json!(island)),
        ]
    }
}

fn to_payload(entries: &[(&str, Value)]) -> Value {
    let mut object = Map::new();
    for (key, value) in entries {
        object.insert(key.to_string(), value.clone());
    }
    Value::Object(object)
}

proptest! {
    #[test]
    fn encode_and_predict_are_deterministic(entries in valid_request()) {
        let bundle = fixture_bundle();
        let payload = to_payload(&entries);
        let record = bundle.schema().validate(&payload).unwrap();

        let first = encode(&record, bundle.metadata()).unwrap();
        let second = encode(&record, bundle.metadata()).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), bundle.metadata().num_columns());

        let a = predict(&first, &bundle).unwrap();
        let b = predict(&second, &bundle).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(bundle.metadata().labels().contains(&a.species));
    }

    #[test]
    fn key_order_does_not_change_the_vector(
        entries in valid_request().prop_shuffle(),
    ) {
        let bundle = fixture_bundle();
        let mut canonical = entries.clone();
        canonical.sort_by_key(|(k, _)| *k);

        let shuffled = bundle.schema().validate(&to_payload(&entries)).unwrap();
        let sorted = bundle.schema().validate(&to_payload(&canonical)).unwrap();
        prop_assert_eq!(
            encode(&shuffled, bundle.metadata()).unwrap(),
            encode(&sorted, bundle.metadata()).unwrap()
        );
    }

    #[test]
    fn categorical_literals_outside_the_domain_are_rejected(
        field in prop::sample::select(vec![CategoricalField::Sex, CategoricalField::Island]),
        literal in "\\PC{0,12}",
    ) {
        let bundle = fixture_bundle();
        let schema = bundle.schema();
        let mut payload = valid_payload();
        payload[field.name()] = json!(literal);

        let accepted = schema.accepted(field).iter().any(|a| *a == literal);
        match schema.validate(&payload) {
            Ok(record) => {
                prop_assert!(accepted);
                prop_assert_eq!(record.level(field), literal.as_str());
            }
            Err(err) => {
                prop_assert!(!accepted);
                prop_assert_eq!(err.problems().len(), 1);
                prop_assert!(err.problem_for(field.name()).is_some());
            }
        }
    }

    #[test]
    fn every_accepted_value_encodes_to_one_indicator(
        sex in prop::collection::btree_set("[a-z]{1,8}", 1..4),
        island in prop::collection::btree_set("[A-Z][a-z]{0,8}", 1..5),
        declared_order in prop::collection::vec(any::<prop::sample::Index>(), 8),
        explicit_levels in any::<bool>(),
    ) {
        let sex: Vec<String> = sex.into_iter().collect();
        let island: Vec<String> = island.into_iter().collect();

        let mut feature_columns: Vec<String> = NUMERIC_KEYS.iter().map(|k| k.to_string()).collect();
        feature_columns.extend(sex.iter().map(|l| CategoricalField::Sex.indicator_column(l)));
        feature_columns.extend(island.iter().map(|l| CategoricalField::Island.indicator_column(l)));

        // Declared levels are listed in a different order from the columns.
        let categorical_levels = explicit_levels.then(|| {
            let mut levels = BTreeMap::new();
            for (field, trained) in [(CategoricalField::Sex, &sex), (CategoricalField::Island, &island)] {
                let mut declared = trained.clone();
                declared.reverse();
                for (i, pick) in declared_order.iter().enumerate() {
                    let len = declared.len();
                    declared.swap(i % len, pick.index(len));
                }
                levels.insert(field.name().to_string(), declared);
            }
            levels
        });

        let metadata = EncodingMetadata::from_document(MetadataDocument {
            format_version: 1,
            feature_columns,
            label_classes: vec!["Adelie".into()],
            categorical_levels,
            model_digest: None,
        })
        .unwrap();
        let schema = RequestSchema::from_metadata(&metadata);

        for (field, trained) in [(CategoricalField::Sex, &sex), (CategoricalField::Island, &island)] {
            let accepted: BTreeSet<&String> = schema.accepted(field).iter().collect();
            prop_assert_eq!(accepted, trained.iter().collect::<BTreeSet<_>>());
        }

        for field in CategoricalField::ALL {
            let other = CategoricalField::ALL.into_iter().find(|f| *f != field).unwrap();
            for value in schema.accepted(field) {
                let mut payload = valid_payload();
                payload[field.name()] = json!(value);
                payload[other.name()] = json!(schema.accepted(other)[0]);

                let record = schema.validate(&payload);
                prop_assert!(record.is_ok(), "{} = {:?} rejected: {:?}", field.name(), value, record);
                let vector = encode(&record.unwrap(), &metadata);
                prop_assert!(vector.is_ok(), "{} = {:?} failed to encode: {:?}", field.name(), value, vector);
                let vector = vector.unwrap();

                let hot: Vec<&str> = metadata
                    .layout()
                    .iter()
                    .zip(metadata.columns())
                    .zip(vector.as_slice())
                    .filter(|((source, _), v)| {
                        matches!(source, ColumnSource::Indicator { field: f, .. } if *f == field)
                            && **v != 0.0
                    })
                    .map(|((_, column), _)| column.as_str())
                    .collect();
                let expected_column = field.indicator_column(value);
                prop_assert_eq!(hot, vec![expected_column.as_str()]);
            }
        }
    }
}
