//! Shared fixtures for rubbertree integration tests.

use std::ops::RangeInclusive;
use std::sync::Once;

use rubbertree::{EndpointRecord, Lattice, PlanConfig};

static INIT: Once = Once::new();

/// Initialize test logging once; honors `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Health-checked endpoints whose check id equals the record value.
pub fn health_checked(range: RangeInclusive<char>) -> Vec<EndpointRecord> {
    range
        .map(|c| EndpointRecord::health_checked(c.to_string(), c.to_string()))
        .collect()
}

/// A single-cell lattice over the given endpoints.
pub fn single_cell(endpoints: Vec<EndpointRecord>) -> Lattice<EndpointRecord> {
    let mut lattice = Lattice::single_cell();
    lattice
        .add_endpoints_for_sector(&[rubbertree::lattice::SINGLE_CELL_DIMENSION], endpoints)
        .expect("single-cell coordinate always matches");
    lattice
}

/// The 2 AZ x 2 version x 5 endpoint lattice used across scenarios.
pub fn two_by_two_lattice() -> Lattice<EndpointRecord> {
    let mut lattice = Lattice::two_dimensional("AZ", "Version");
    lattice
        .add_endpoints_for_sector(&["us-east-1a", "1"], health_checked('A'..='E'))
        .unwrap();
    lattice
        .add_endpoints_for_sector(&["us-east-1a", "2"], health_checked('F'..='J'))
        .unwrap();
    lattice
        .add_endpoints_for_sector(&["us-east-1b", "1"], health_checked('K'..='O'))
        .unwrap();
    lattice
        .add_endpoints_for_sector(&["us-east-1b", "2"], health_checked('P'..='T'))
        .unwrap();
    lattice
}

/// Plan parameters shared by the vulcanization scenarios.
pub fn plan_config() -> PlanConfig {
    PlanConfig::new("Z124", "www.example.com", "TXT")
}
