//! Endpoint records and the DNS record entries of a provisioning plan.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A service endpoint: opaque DNS record data plus zero or more health-check
/// identifiers.
///
/// The record data doubles as the endpoint's identity: ordering and equality
/// compare the data only, so two endpoints with equal data are duplicates no
/// matter which health checks they carry. Plain and health-checked endpoints
/// flow through the same pipelines.
#[derive(Debug, Clone)]
pub struct EndpointRecord {
    value: String,
    health_check_ids: Vec<String>,
}

impl EndpointRecord {
    /// Create an endpoint with no health checks.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            health_check_ids: Vec::new(),
        }
    }

    /// Create an endpoint guarded by a single health check.
    pub fn health_checked(value: impl Into<String>, health_check_id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            health_check_ids: vec![health_check_id.into()],
        }
    }

    /// Create an endpoint guarded by several health checks.
    pub fn with_health_checks(value: impl Into<String>, health_check_ids: Vec<String>) -> Self {
        Self {
            value: value.into(),
            health_check_ids,
        }
    }

    /// The DNS record data.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Health-check ids associated with this endpoint, in caller order.
    pub fn health_check_ids(&self) -> &[String] {
        &self.health_check_ids
    }
}

impl PartialEq for EndpointRecord {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for EndpointRecord {}

impl PartialOrd for EndpointRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EndpointRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for EndpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Alias payload of a record entry.
///
/// Points at another entry's DNS name within the same hosted zone; health
/// evaluation follows the target transitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    /// DNS name of the target entry.
    pub dns_name: String,
    /// Hosted zone containing the target.
    pub zone_id: String,
    /// Whether resolvers treat the entry as healthy only if the target is.
    pub evaluate_target_health: bool,
}

/// The mutually exclusive payload of a record entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    /// Concrete record data with a TTL.
    Values {
        /// Record data strings, in answer order.
        values: Vec<String>,
        /// Time-to-live in seconds.
        ttl: u64,
    },
    /// An alias to another entry.
    Alias {
        /// The alias target.
        alias: AliasTarget,
    },
}

/// One DNS record entry of a provisioning plan.
///
/// Entries sharing `(name, type)` are disambiguated by `set_identifier`. The
/// list order produced by the planner is the provisioning order: later
/// entries reference earlier ones by name, so applying them out of order can
/// leave dangling alias targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// DNS name.
    pub name: String,
    /// DNS record type, e.g. "A" or "TXT".
    #[serde(rename = "type")]
    pub rtype: String,
    /// 1 for primary answers, 0 for standby fallbacks.
    pub weight: u64,
    /// Disambiguates entries sharing `(name, type)`.
    pub set_identifier: String,
    /// Health check bound to this entry, if any. One entry binds at most
    /// one check; an alias chain ANDs several together.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_id: Option<String>,
    /// Values or alias payload.
    #[serde(flatten)]
    pub data: RecordData,
}

impl RecordEntry {
    /// The alias target, when this entry carries one.
    pub fn alias(&self) -> Option<&AliasTarget> {
        match &self.data {
            RecordData::Alias { alias } => Some(alias),
            RecordData::Values { .. } => None,
        }
    }

    /// The record data values, when this entry carries them.
    pub fn values(&self) -> Option<&[String]> {
        match &self.data {
            RecordData::Values { values, .. } => Some(values),
            RecordData::Alias { .. } => None,
        }
    }
}
