//! Plan parameter types.

use serde::{Deserialize, Serialize};

/// Parameters for one vulcanized record plan.
///
/// This is the bundle a provisioning pipeline feeds the planner; it can be
/// deserialized from a TOML or JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Hosted zone id that will receive the plan.
    pub zone_id: String,

    /// DNS name at the root of the plan.
    pub name: String,

    /// DNS record type, e.g. "A" or "TXT".
    #[serde(rename = "type")]
    pub rtype: String,

    /// Record TTL in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u64,

    /// Maximum records per answer. The DNS product caps this at 8.
    #[serde(default = "default_records_per_entry")]
    pub records_per_entry: usize,
}

impl PlanConfig {
    /// Create a config with the default TTL and records-per-answer cap.
    pub fn new(
        zone_id: impl Into<String>,
        name: impl Into<String>,
        rtype: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            name: name.into(),
            rtype: rtype.into(),
            ttl: default_ttl(),
            records_per_entry: default_records_per_entry(),
        }
    }
}

fn default_ttl() -> u64 {
    60
}

fn default_records_per_entry() -> usize {
    8
}
