//! Answer sets and their lowering to DNS record entries.
//!
//! A DNS answer can hold several resource records, but the DNS product
//! binds at most one health check per record entry. When an answer's
//! members carry more than one distinct health check, the lowering emits a
//! chain of alias entries, each consuming one health check and evaluating
//! its target's health transitively, which forms a logical AND of all the
//! checks. Resolvers backtrack through the chain, so a chained answer can
//! stand anywhere a plain one can.

use md5::{Digest, Md5};
use num_bigint::BigInt;
use std::collections::BTreeSet;

use crate::record::{AliasTarget, EndpointRecord, RecordData, RecordEntry};

/// An ordered, de-duplicated set of endpoints forming one DNS answer.
///
/// Members are kept sorted ascending by record value; inserting a duplicate
/// value is a no-op.
#[derive(Debug, Clone, Default)]
pub struct AnswerSet {
    members: BTreeSet<EndpointRecord>,
}

impl AnswerSet {
    /// Create an empty answer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member. Returns false when a member with the same record
    /// value is already present.
    pub fn insert(&mut self, record: EndpointRecord) -> bool {
        self.members.insert(record)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending record-value order.
    pub fn members(&self) -> impl Iterator<Item = &EndpointRecord> {
        self.members.iter()
    }

    /// Lower this answer set to an ordered list of DNS record entries.
    ///
    /// The first entry is the `"leafnode"`: all member values sorted
    /// ascending, weight 1, bound to the first health check. Each further
    /// distinct health check adds one alias entry in front of it; the final
    /// entry carries the requested `name` and is the one external callers
    /// reach. The returned order is the provisioning order.
    pub fn to_records(&self, zone_id: &str, name: &str, rtype: &str, ttl: u64) -> Vec<RecordEntry> {
        // Distinct health checks across the members, ascending. The leaf
        // consumes the first alphabetical id, not the id of the smallest
        // member; provisioned zones depend on this assignment.
        let health_checks: BTreeSet<&str> = self
            .members
            .iter()
            .flat_map(|member| member.health_check_ids().iter().map(String::as_str))
            .collect();
        let mut remaining = health_checks.into_iter();

        let mut entries = vec![RecordEntry {
            name: name.to_string(),
            rtype: rtype.to_string(),
            weight: 1,
            set_identifier: "leafnode".to_string(),
            health_check_id: remaining.next().map(str::to_string),
            data: RecordData::Values {
                values: self
                    .members
                    .iter()
                    .map(|member| member.value().to_string())
                    .collect(),
                ttl,
            },
        }];

        for health_check_id in remaining {
            let last = entries.len() - 1;
            let checksum = checksum_record_data(&entries[last]);

            // The alias becomes the new entry node and inherits the previous
            // node's name; the previous node moves under a checksum label.
            let alias_name = entries[last].name.clone();
            let weight = entries[last].weight;
            let target_name = format!("{checksum}.{alias_name}");
            entries[last].name = target_name.clone();

            entries.push(RecordEntry {
                name: alias_name,
                rtype: rtype.to_string(),
                weight,
                set_identifier: format!("Alias to {checksum}"),
                health_check_id: Some(health_check_id.to_string()),
                data: RecordData::Alias {
                    alias: AliasTarget {
                        dns_name: target_name,
                        zone_id: zone_id.to_string(),
                        evaluate_target_health: true,
                    },
                },
            });
        }

        entries
    }
}

impl FromIterator<EndpointRecord> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = EndpointRecord>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl Extend<EndpointRecord> for AnswerSet {
    fn extend<I: IntoIterator<Item = EndpointRecord>>(&mut self, iter: I) {
        self.members.extend(iter);
    }
}

/// Checksum of an entry's data-bearing fields, rendered as a signed
/// lowercase base-36 integer.
///
/// The digest covers, as UTF-8 bytes: the record type; then for an alias
/// entry the target's zone id, DNS name, and `"true"`/`"false"` health
/// evaluation flag; otherwise the debug rendering of the values list (e.g.
/// `["1.1.1.1", "2.2.2.2"]`) followed by the decimal TTL. The MD5 digest is
/// read as a signed big-endian integer, so a leading `-` is possible.
///
/// The result becomes part of provisioned DNS names; changing any input or
/// the encoding would drift every zone written by an older build.
fn checksum_record_data(entry: &RecordEntry) -> String {
    let mut digest = Md5::new();
    digest.update(entry.rtype.as_bytes());

    match &entry.data {
        RecordData::Alias { alias } => {
            digest.update(alias.zone_id.as_bytes());
            digest.update(alias.dns_name.as_bytes());
            digest.update(if alias.evaluate_target_health {
                "true"
            } else {
                "false"
            });
        }
        RecordData::Values { values, ttl } => {
            digest.update(format!("{values:?}"));
            digest.update(ttl.to_string());
        }
    }

    let bytes = digest.finalize();
    BigInt::from_signed_bytes_be(&bytes).to_str_radix(36)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_sorted_and_deduplicated() {
        let mut answer = AnswerSet::new();
        assert!(answer.insert(EndpointRecord::new("3.3.3.3")));
        assert!(answer.insert(EndpointRecord::new("2.2.2.2")));
        assert!(answer.insert(EndpointRecord::new("1.1.1.1")));
        assert!(!answer.insert(EndpointRecord::new("1.1.1.1")));

        let values: Vec<&str> = answer.members().map(EndpointRecord::value).collect();
        assert_eq!(values, vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
    }

    #[test]
    fn test_plain_answer_lowers_to_one_entry() {
        let answer: AnswerSet = ["3.3.3.3", "2.2.2.2", "1.1.1.1"]
            .into_iter()
            .map(EndpointRecord::new)
            .collect();

        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 1);

        let leaf = &entries[0];
        assert_eq!(leaf.name, "www.example.com");
        assert_eq!(leaf.rtype, "A");
        assert_eq!(leaf.weight, 1);
        assert_eq!(leaf.set_identifier, "leafnode");
        assert_eq!(
            leaf.values().unwrap(),
            &["1.1.1.1", "2.2.2.2", "3.3.3.3"]
        );
        assert_eq!(leaf.health_check_id.as_deref(), None);
    }

    #[test]
    fn test_health_checked_answer_builds_alias_chain() {
        let answer: AnswerSet = [
            EndpointRecord::health_checked("3.3.3.3", "hcid1"),
            EndpointRecord::health_checked("2.2.2.2", "hcid2"),
            EndpointRecord::health_checked("1.1.1.1", "hcid3"),
        ]
        .into_iter()
        .collect();

        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 3);

        // Leaf: sorted values, first alphabetical health check.
        let leaf = &entries[0];
        assert_eq!(
            leaf.values().unwrap(),
            &["1.1.1.1", "2.2.2.2", "3.3.3.3"]
        );
        assert_eq!(leaf.health_check_id.as_deref(), Some("hcid1"));

        // Middle alias points at the (renamed) leaf and consumes the next
        // health check.
        let middle = entries[1].alias().unwrap();
        assert_eq!(middle.dns_name, entries[0].name);
        assert_eq!(middle.zone_id, "Z123");
        assert!(middle.evaluate_target_health);
        assert_eq!(entries[1].health_check_id.as_deref(), Some("hcid2"));
        assert_eq!(entries[2].health_check_id.as_deref(), Some("hcid3"));

        // Entry node points at the middle alias and keeps the public name.
        let entry_node = entries[2].alias().unwrap();
        assert_eq!(entry_node.dns_name, entries[1].name);
        assert_eq!(entries[2].name, "www.example.com");
    }

    #[test]
    fn test_chain_length_is_distinct_health_check_count() {
        let answer: AnswerSet = [
            EndpointRecord::with_health_checks(
                "1.1.1.1",
                vec!["hc-a".to_string(), "hc-b".to_string()],
            ),
            EndpointRecord::health_checked("2.2.2.2", "hc-b"),
        ]
        .into_iter()
        .collect();

        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].health_check_id.as_deref(), Some("hc-a"));
        assert_eq!(entries[1].name, "www.example.com");
    }

    #[test]
    fn test_alias_names_carry_checksum_labels() {
        let answer: AnswerSet = [
            EndpointRecord::health_checked("1.1.1.1", "hc1"),
            EndpointRecord::health_checked("2.2.2.2", "hc2"),
        ]
        .into_iter()
        .collect();

        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 2);

        // The renamed leaf is "<checksum>.www.example.com" and the alias
        // set identifier names the same checksum.
        let renamed = &entries[0].name;
        let label = renamed
            .strip_suffix(".www.example.com")
            .expect("leaf keeps the original name as suffix");
        assert!(!label.is_empty());
        assert_eq!(entries[1].set_identifier, format!("Alias to {label}"));
        assert!(label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_rejected_duplicate_contributes_no_health_check() {
        let mut answer = AnswerSet::new();
        answer.insert(EndpointRecord::health_checked("1.1.1.1", "hc1"));
        // Same value, different check: the whole member is rejected, its
        // check included.
        answer.insert(EndpointRecord::health_checked("1.1.1.1", "hc2"));

        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values().unwrap(), &["1.1.1.1"]);
    }

    #[test]
    fn test_empty_answer_lowers_to_bare_leaf() {
        let answer = AnswerSet::new();
        let entries = answer.to_records("Z123", "www.example.com", "A", 60);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].values().unwrap().is_empty());
        assert_eq!(entries[0].health_check_id.as_deref(), None);
    }
}
