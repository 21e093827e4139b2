mod common;

use std::fs;

use shelterfinder_lib::ingest::{data_file_candidates, DATA_FILE_CANDIDATES};
use shelterfinder_lib::shelter::UNKNOWN_NAME;
use shelterfinder_lib::{load_from_dir, load_shelters, locate_data_file, Error, SchemaVariant};
use tempfile::tempdir;

use common::{fixtures_dir, generic_fixture, registry_fixture};

#[test]
fn registry_fixture_loads_valid_rows_in_order() {
    let report = load_shelters(&registry_fixture()).expect("registry fixture loads");

    assert_eq!(report.variant, SchemaVariant::FacilityRegistry);
    assert_eq!(report.rows_read, 7);
    assert_eq!(report.rows_skipped, 2);

    let ids: Vec<&str> = report.shelters.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["X1", "X2", "X3", "X5", "X7"]);

    let first = &report.shelters[0];
    assert_eq!(first.name(), "Shelter A");
    assert_eq!(first.address(), "1 Main St");
    assert_eq!(first.latitude(), 35.0);
    assert_eq!(first.longitude(), 139.0);
    assert_eq!(first.notes(), "");

    assert_eq!(report.shelters[1].notes(), "広域避難場所");
    assert_eq!(report.shelters[2].name(), UNKNOWN_NAME);
}

#[test]
fn generic_fixture_uses_alias_chains() {
    let report = load_shelters(&generic_fixture()).expect("generic fixture loads");

    assert_eq!(report.variant, SchemaVariant::Generic);
    assert_eq!(report.rows_skipped, 1);

    let names: Vec<&str> = report.shelters.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["North Hall", "Riverside", UNKNOWN_NAME, "Harbor Gym"]);

    let north = &report.shelters[0];
    assert_eq!(north.id(), "G1");
    assert_eq!(north.latitude(), 35.70);
    assert_eq!(north.longitude(), 139.70);
    assert_eq!(report.shelters[1].notes(), "flood-prone");
}

#[test]
fn every_loaded_shelter_has_finite_coordinates() {
    for path in [registry_fixture(), generic_fixture()] {
        let report = load_shelters(&path).expect("fixture loads");
        for shelter in &report.shelters {
            assert!(shelter.latitude().is_finite(), "{}", shelter.id());
            assert!(shelter.longitude().is_finite(), "{}", shelter.id());
        }
    }
}

#[test]
fn locates_first_existing_candidate() {
    let dir = tempdir().expect("tempdir");
    fs::copy(registry_fixture(), dir.path().join("13121_2.csv")).expect("copy fallback");

    let found = locate_data_file(dir.path()).expect("fallback candidate");
    assert_eq!(found, dir.path().join("13121_2.csv"));

    fs::copy(generic_fixture(), dir.path().join("mergeFromCity_2.csv")).expect("copy primary");
    let found = locate_data_file(dir.path()).expect("primary candidate");
    assert_eq!(found, dir.path().join("mergeFromCity_2.csv"));

    let report = load_from_dir(dir.path()).expect("load primary");
    assert_eq!(report.variant, SchemaVariant::Generic);
}

#[test]
fn missing_data_file_reports_all_candidates() {
    let dir = tempdir().expect("tempdir");
    let err = locate_data_file(dir.path()).unwrap_err();

    match &err {
        Error::DataSourceNotFound { candidates } => {
            assert_eq!(candidates, &data_file_candidates(dir.path()));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let message = err.to_string();
    for name in DATA_FILE_CANDIDATES {
        assert!(message.contains(name), "message should mention {name}: {message}");
    }
}

#[test]
fn directory_named_like_a_candidate_is_ignored() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("mergeFromCity_2.csv")).expect("mkdir");
    assert!(matches!(
        locate_data_file(dir.path()),
        Err(Error::DataSourceNotFound { .. })
    ));
}

#[test]
fn fixtures_directory_is_a_valid_data_root() {
    let report = load_from_dir(&fixtures_dir()).expect("fixtures dir loads");
    assert_eq!(report.variant, SchemaVariant::FacilityRegistry);
}
