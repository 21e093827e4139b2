use std::path::PathBuf;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

pub fn registry_fixture() -> PathBuf {
    fixtures_dir().join("mergeFromCity_2.csv")
}

pub fn generic_fixture() -> PathBuf {
    fixtures_dir().join("generic_shelters.csv")
}
