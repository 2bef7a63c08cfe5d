//! Rubbertree - pre-computed resilient DNS answer topologies.
//!
//! This crate turns a population of service endpoints, labeled by position
//! along one or more fault-isolation dimensions, into an ordered list of
//! weighted/failover DNS record entries. Installed verbatim in a DNS
//! service that supports alias chaining and health-check evaluation, the
//! plan gives clients resilient endpoint discovery under correlated
//! failure: every single-endpoint failure and every whole-dimension failure
//! already has a healthy answer waiting.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          rubbertree                            │
//! │                                                                │
//! │  endpoints ──▶ Lattice ─────────▶ vulcanize ──▶ [RecordEntry]  │
//! │                   │   (sectors,       │                        │
//! │                   │    failures)      └── AnswerSet chains     │
//! │                   ▼                                            │
//! │        SimpleSignatureSharder /                                │
//! │        StatefulSearchingSharder ──▶ sub-Lattice (the shard)    │
//! │                   │                                            │
//! │                   └── FragmentLedger (overlap bookkeeping)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Lattice`] compartmentalizes endpoints along named dimensions such as
//! availability zone or software version, and can simulate the failure of
//! any dimensional value. [`vulcanize`] lowers a lattice to the record
//! plan; [`AnswerSet`] lowers one answer to a leaf entry plus the alias
//! chain that ANDs together multiple health checks. The sharders assign a
//! caller identity a small sub-lattice, either statelessly by hashing or
//! with a hard bound on pairwise shard overlap.
//!
//! ## Example
//!
//! ```rust
//! use rubbertree::{vulcanize, EndpointRecord, Lattice, PlanConfig};
//!
//! let mut lattice = Lattice::two_dimensional("AZ", "Version");
//! lattice
//!     .add_endpoint(
//!         &["us-east-1a", "v1"],
//!         EndpointRecord::health_checked("192.0.2.1", "hc-1"),
//!     )
//!     .unwrap();
//! lattice
//!     .add_endpoint(
//!         &["us-east-1b", "v2"],
//!         EndpointRecord::health_checked("192.0.2.2", "hc-2"),
//!     )
//!     .unwrap();
//!
//! let config = PlanConfig::new("Z3P5QSUBK4POTI", "www.example.com", "A");
//! let plan = vulcanize(&config, &lattice).unwrap();
//!
//! // Apply the entries to the DNS provider in this exact order; later
//! // entries reference earlier ones by name.
//! for entry in &plan {
//!     println!("{} {} {}", entry.name, entry.rtype, entry.set_identifier);
//! }
//! ```

#![warn(missing_docs)]

pub mod answer;
pub mod config;
pub mod error;
pub mod lattice;
pub mod record;
pub mod shard;
pub mod sublist;
pub mod vulcanize;

// Re-export main types
pub use answer::AnswerSet;
pub use config::PlanConfig;
pub use error::PlanError;
pub use lattice::Lattice;
pub use record::{AliasTarget, EndpointRecord, RecordData, RecordEntry};
pub use shard::{
    FragmentLedger, MemoryFragmentLedger, SimpleSignatureSharder, StatefulSearchingSharder,
};
pub use vulcanize::{vulcanize, vulcanize_records, MAX_RECORDS_PER_ENTRY};
