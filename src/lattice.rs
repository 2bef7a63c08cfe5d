//! N-dimensional endpoint container with sector addressing and failure
//! simulation.
//!
//! A lattice describes the fault-isolation compartments a service's
//! endpoints live in. Each dimension is a kind of dependency that can fail
//! together: an availability zone, a software version, a cell of a backing
//! store. Endpoints are addressed by a coordinate with one value per
//! dimension, and any value of any dimension can be failed wholesale to
//! obtain the surviving sub-lattice:
//!
//! ```text
//!           us-east-1a     us-east-1b
//!        +--------------+--------------+
//!   v1   |  A B C D E   |  K L M N O   |
//!        +--------------+--------------+
//!   v2   |  F G H I J   |  P Q R S T   |
//!        +--------------+--------------+
//!
//! simulate_failure("AZ", "us-east-1a") keeps K..O and P..T only.
//! ```

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::PlanError;

/// Reserved axis name used by single-cell lattices.
pub const SINGLE_CELL_DIMENSION: &str = "DimensionX";

/// An N-dimensional container of endpoints keyed by sector coordinates.
///
/// Coordinates and per-dimension value sets are kept in ordered containers,
/// so every enumeration is deterministic for identical inputs. A lattice is
/// built by append-only sector additions; once handed to a sharder or the
/// vulcanizer it is treated as frozen, and [`Lattice::simulate_failure`]
/// always returns a fresh lattice.
#[derive(Debug, Clone)]
pub struct Lattice<T> {
    dimension_names: Vec<String>,
    values_by_dimension: BTreeMap<String, BTreeSet<String>>,
    endpoints_by_coordinate: BTreeMap<Vec<String>, Vec<T>>,
}

impl<T> Lattice<T> {
    /// Create a lattice with the given ordered dimension names.
    ///
    /// Fails if no dimension is named.
    pub fn new(dimension_names: Vec<String>) -> Result<Self, PlanError> {
        if dimension_names.is_empty() {
            return Err(PlanError::NoDimensions);
        }

        let values_by_dimension = dimension_names
            .iter()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        Ok(Self {
            dimension_names,
            values_by_dimension,
            endpoints_by_coordinate: BTreeMap::new(),
        })
    }

    /// Create a lattice whose endpoints all share one compartment.
    pub fn single_cell() -> Self {
        Self {
            dimension_names: vec![SINGLE_CELL_DIMENSION.to_string()],
            values_by_dimension: BTreeMap::from([(
                SINGLE_CELL_DIMENSION.to_string(),
                BTreeSet::new(),
            )]),
            endpoints_by_coordinate: BTreeMap::new(),
        }
    }

    /// Create a one-dimensional lattice, e.g. over availability zones.
    pub fn one_dimensional(dimension: impl Into<String>) -> Self {
        let dimension = dimension.into();
        Self {
            values_by_dimension: BTreeMap::from([(dimension.clone(), BTreeSet::new())]),
            dimension_names: vec![dimension],
            endpoints_by_coordinate: BTreeMap::new(),
        }
    }

    /// Create a two-dimensional lattice, e.g. availability zone x version.
    pub fn two_dimensional(first: impl Into<String>, second: impl Into<String>) -> Self {
        let first = first.into();
        let second = second.into();
        Self {
            values_by_dimension: BTreeMap::from([
                (first.clone(), BTreeSet::new()),
                (second.clone(), BTreeSet::new()),
            ]),
            dimension_names: vec![first, second],
            endpoints_by_coordinate: BTreeMap::new(),
        }
    }

    /// Append endpoints to the sector at `coordinate`, registering each
    /// coordinate component as an observed value of its dimension.
    ///
    /// Repeated calls for the same sector append in call order. Fails on
    /// coordinate arity mismatch.
    pub fn add_endpoints_for_sector<S, I>(
        &mut self,
        coordinate: &[S],
        endpoints: I,
    ) -> Result<(), PlanError>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = T>,
    {
        let key = self.coordinate_key(coordinate)?;

        for (dimension, component) in self.dimension_names.iter().zip(&key) {
            if let Some(values) = self.values_by_dimension.get_mut(dimension) {
                values.insert(component.clone());
            }
        }

        let sector = self.endpoints_by_coordinate.entry(key.clone()).or_default();
        let before = sector.len();
        sector.extend(endpoints);
        debug!(
            coordinate = ?key,
            added = sector.len() - before,
            total = sector.len(),
            "added endpoints to sector"
        );

        Ok(())
    }

    /// Append a single endpoint to the sector at `coordinate`.
    pub fn add_endpoint<S: AsRef<str>>(
        &mut self,
        coordinate: &[S],
        endpoint: T,
    ) -> Result<(), PlanError> {
        self.add_endpoints_for_sector(coordinate, [endpoint])
    }

    /// The endpoints of the sector at `coordinate`, or `None` when the
    /// sector is unoccupied. Fails on coordinate arity mismatch.
    pub fn endpoints_for_sector<S: AsRef<str>>(
        &self,
        coordinate: &[S],
    ) -> Result<Option<&[T]>, PlanError> {
        let key = self.coordinate_key(coordinate)?;
        Ok(self
            .endpoints_by_coordinate
            .get(&key)
            .map(Vec::as_slice))
    }

    /// Every occupied coordinate, in sorted order.
    pub fn all_coordinates(&self) -> Vec<Vec<String>> {
        self.endpoints_by_coordinate.keys().cloned().collect()
    }

    /// Ordered dimension names.
    pub fn dimension_names(&self) -> &[String] {
        &self.dimension_names
    }

    /// Observed values of `dimension`. Fails on an unknown dimension name.
    pub fn dimension_values(&self, dimension: &str) -> Result<&BTreeSet<String>, PlanError> {
        self.values_by_dimension
            .get(dimension)
            .ok_or_else(|| PlanError::UnknownDimension(dimension.to_string()))
    }

    /// Number of observed values of `dimension`.
    pub fn dimension_size(&self, dimension: &str) -> Result<usize, PlanError> {
        Ok(self.dimension_values(dimension)?.len())
    }

    /// Total number of endpoints across all sectors.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints_by_coordinate.values().map(Vec::len).sum()
    }

    /// True when no sector holds an endpoint.
    pub fn is_empty(&self) -> bool {
        self.endpoint_count() == 0
    }

    fn coordinate_key<S: AsRef<str>>(&self, coordinate: &[S]) -> Result<Vec<String>, PlanError> {
        if coordinate.len() != self.dimension_names.len() {
            return Err(PlanError::CoordinateArity {
                expected: self.dimension_names.len(),
                got: coordinate.len(),
            });
        }
        Ok(coordinate
            .iter()
            .map(|component| component.as_ref().to_string())
            .collect())
    }
}

impl<T: Clone> Lattice<T> {
    /// All endpoints, concatenated over coordinates in sorted order and in
    /// insertion order within each sector.
    pub fn all_endpoints(&self) -> Vec<T> {
        self.endpoints_by_coordinate
            .values()
            .flat_map(|sector| sector.iter().cloned())
            .collect()
    }

    /// Simulate failure of one value of one dimension.
    ///
    /// Returns a fresh lattice with the same dimensions, restricted to the
    /// sectors whose component at `dimension` differs from `value`; the new
    /// lattice's per-dimension value sets reflect the surviving sectors
    /// only. The input lattice is untouched. Fails on an unknown dimension
    /// name.
    pub fn simulate_failure(&self, dimension: &str, value: &str) -> Result<Self, PlanError> {
        let position = self
            .dimension_names
            .iter()
            .position(|name| name == dimension)
            .ok_or_else(|| PlanError::UnknownDimension(dimension.to_string()))?;

        let mut survivor = Self::new(self.dimension_names.clone())?;
        for (coordinate, endpoints) in &self.endpoints_by_coordinate {
            if coordinate[position] != value {
                survivor.add_endpoints_for_sector(coordinate, endpoints.iter().cloned())?;
            }
        }

        debug!(
            dimension,
            value,
            remaining = survivor.endpoint_count(),
            "simulated failure"
        );
        Ok(survivor)
    }
}
