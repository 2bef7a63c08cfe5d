//! Error types for rubbertree.

use thiserror::Error;

/// Errors surfaced by lattice, sharder, and vulcanizer operations.
///
/// Nothing is retried internally; every failure is the caller's to handle.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A lattice requires at least one dimension.
    #[error("a lattice requires at least one dimension")]
    NoDimensions,

    /// Sector coordinate arity does not match the lattice dimensions.
    #[error("sector coordinate has {got} components, lattice has {expected} dimensions")]
    CoordinateArity {
        /// Number of dimensions declared by the lattice.
        expected: usize,
        /// Number of components in the offending coordinate.
        got: usize,
    },

    /// The named dimension is not part of the lattice.
    #[error("unknown dimension name: {0}")]
    UnknownDimension(String),

    /// Requested sublist size exceeds the master list size.
    #[error("sublist size {requested} exceeds list size {available}")]
    SublistTooLarge {
        /// Requested sublist size.
        requested: usize,
        /// Length of the master list.
        available: usize,
    },

    /// The records-per-entry cap is outside the range the DNS product supports.
    #[error("records per entry must be between 1 and 8, got {0}")]
    RecordsPerEntryOutOfRange(usize),

    /// A lattice cell holds fewer endpoints than a sharder needs.
    #[error("cell {coordinate:?} holds {available} endpoints, {needed} required")]
    InsufficientCell {
        /// Coordinate of the undersized cell.
        coordinate: Vec<String>,
        /// Endpoints present in the cell.
        available: usize,
        /// Endpoints the sharder was asked to pick.
        needed: usize,
    },

    /// The stateful search exhausted every candidate without finding a shard
    /// that honors the overlap limit.
    #[error("no shard satisfies the overlap limit against the recorded fragments")]
    NoShardsAvailable,
}
