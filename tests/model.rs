//! Integration tests for loading the demo models.
use gencap::input::load_model;
use gencap::network::CapacityMode;
use gencap::profile::ProfileSource;
use gencap::units::Power;
use rstest::rstest;
use std::path::PathBuf;

/// Get the path to a demo model.
fn get_model_dir(name: &str) -> PathBuf {
    PathBuf::from("demos").join(name)
}

#[rstest]
#[case("constraint_test", 1)]
#[case("solar_storage", 8760)]
fn test_load_demo_model(#[case] name: &str, #[case] num_snapshots: usize) {
    let model = load_model(get_model_dir(name)).unwrap();
    assert_eq!(model.network.snapshots.len(), num_snapshots);
}

/// The irradiance file is not bundled, so the solar profile falls back to synthetic data
#[test]
fn test_solar_storage_fallback_profile() {
    let model = load_model(get_model_dir("solar_storage")).unwrap();
    let solar = &model.profiles["solar"];
    assert_eq!(solar.source, ProfileSource::Synthetic);
    assert_eq!(solar.len(), 8760);
    assert!(solar.values().iter().all(|value| (0.0..=1.0).contains(value)));
    assert_eq!(model.iter_fallback_profiles().count(), 1);
}

/// The generator is not marked as extendable, but its minimum build makes capacity a decision
#[test]
fn test_constraint_test_must_build() {
    let model = load_model(get_model_dir("constraint_test")).unwrap();
    let generator = &model.network.generators["test generator"];
    assert_eq!(
        generator.capacity,
        CapacityMode::Extendable {
            min: Power(100.0),
            max: Power(f64::INFINITY),
        }
    );
}
