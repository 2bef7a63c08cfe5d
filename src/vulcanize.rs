//! Vulcanization: lowering a lattice to an ordered DNS provisioning plan.
//!
//! The planner pre-computes every record needed to survive the failure of
//! any single endpoint and of any whole dimensional value. The primary
//! level is a weighted set of overlapping answers over all endpoints; a
//! zero-weighted alias leads to a secondary level holding, per dimensional
//! value, a sub-plan over the endpoints that survive that value's failure.
//! The output order is the provisioning order: later entries reference
//! earlier ones by name.

use tracing::debug;

use crate::answer::AnswerSet;
use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::lattice::Lattice;
use crate::record::{AliasTarget, EndpointRecord, RecordData, RecordEntry};
use crate::sublist::SubLists;

/// Upper bound on records per answer imposed by the DNS product.
pub const MAX_RECORDS_PER_ENTRY: usize = 8;

/// Vulcanize a lattice into an ordered provisioning plan.
///
/// A single-cell lattice lowers to a flat plan over its endpoints. A
/// multi-cell lattice additionally gets a secondary tree: its endpoint-
/// failure fallbacks are promoted to primaries under `secondary.<name>`,
/// one sub-plan is emitted per dimensional value over the endpoints
/// surviving that value's failure, and zero-weighted aliases wire the
/// levels together.
pub fn vulcanize(
    config: &PlanConfig,
    lattice: &Lattice<EndpointRecord>,
) -> Result<Vec<RecordEntry>, PlanError> {
    check_records_per_entry(config.records_per_entry)?;

    let mut coordinates = lattice.all_coordinates();
    if coordinates.len() <= 1 {
        return vulcanize_flat(config, &config.name, &lattice.all_endpoints());
    }

    // Coordinates share their arity, so this stable sort keys on a quantity
    // that cannot differ today and preserves the map order.
    coordinates.sort_by_key(Vec::len);

    // Splice each cell's endpoints into the combined order at evenly spaced
    // positions, so the overlapping answer slices mix cells.
    let mut spliced: Vec<EndpointRecord> = Vec::new();
    for coordinate in &coordinates {
        let Some(cell) = lattice.endpoints_for_sector(coordinate)? else {
            continue;
        };
        let step = (spliced.len() + cell.len()) / cell.len();
        for (position, endpoint) in cell.iter().enumerate() {
            spliced.insert(position * step, endpoint.clone());
        }
    }

    let mut plan = vulcanize_flat(config, &config.name, &spliced)?;

    // The zero-weighted endpoint-failure fallbacks become the primary
    // answers of the secondary level.
    let secondary_name = format!("secondary.{}", config.name);
    for entry in plan.iter_mut() {
        if entry.weight == 0 {
            entry.name = secondary_name.clone();
            entry.weight = 1;
        }
    }

    // One sub-plan per dimensional value, over the endpoints that survive
    // failing that value, plus a zero-weighted dispatch alias.
    for dimension in lattice.dimension_names() {
        for value in lattice.dimension_values(dimension)? {
            let prefix = format!("{}-{}", truncate(dimension, 30), truncate(value, 30));
            let sub_name = format!("{prefix}.{secondary_name}");

            let survivors = lattice.simulate_failure(dimension, value)?.all_endpoints();
            plan.extend(vulcanize_flat(config, &sub_name, &survivors)?);

            plan.push(RecordEntry {
                name: secondary_name.clone(),
                rtype: config.rtype.clone(),
                weight: 0,
                set_identifier: prefix,
                health_check_id: None,
                data: RecordData::Alias {
                    alias: AliasTarget {
                        dns_name: sub_name,
                        zone_id: config.zone_id.clone(),
                        evaluate_target_health: true,
                    },
                },
            });
        }
    }

    // Finally, route the root name to the secondary level when every
    // primary answer is unhealthy.
    plan.push(RecordEntry {
        name: config.name.clone(),
        rtype: config.rtype.clone(),
        weight: 0,
        set_identifier: format!("secondary for {}", config.name),
        health_check_id: None,
        data: RecordData::Alias {
            alias: AliasTarget {
                dns_name: secondary_name,
                zone_id: config.zone_id.clone(),
                evaluate_target_health: true,
            },
        },
    });

    debug!(
        entries = plan.len(),
        name = %config.name,
        "vulcanized lattice plan"
    );
    Ok(plan)
}

/// Vulcanize an ordered endpoint list into a flat plan for `config.name`,
/// covering the failure of any single endpoint.
pub fn vulcanize_records(
    config: &PlanConfig,
    records: &[EndpointRecord],
) -> Result<Vec<RecordEntry>, PlanError> {
    check_records_per_entry(config.records_per_entry)?;
    vulcanize_flat(config, &config.name, records)
}

fn vulcanize_flat(
    config: &PlanConfig,
    name: &str,
    records: &[EndpointRecord],
) -> Result<Vec<RecordEntry>, PlanError> {
    let per_entry = config.records_per_entry;
    let mut plan = Vec::new();

    if records.len() > per_entry {
        // More records than fit in one answer: form a pseudo-ring by
        // appending the head to the tail, then emit one overlapping slice
        // per original starting index.
        let mut ring = records.to_vec();
        ring.extend_from_slice(&records[..per_entry - 1]);

        for start in 0..records.len() {
            let answer: AnswerSet = ring[start..start + per_entry].iter().cloned().collect();
            plan.extend(answer.to_records(&config.zone_id, name, &config.rtype, config.ttl));
        }

        return Ok(plan);
    }

    // Everything fits in one answer. Emit it, then one zero-weighted
    // fallback per answer that survives any single record.
    let answer: AnswerSet = records.iter().cloned().collect();
    plan.extend(answer.to_records(&config.zone_id, name, &config.rtype, config.ttl));

    if per_entry - 1 <= records.len() {
        for fallback in SubLists::new(records, per_entry - 1)? {
            let answer: AnswerSet = fallback.into_iter().collect();
            plan.extend(answer.to_records(&config.zone_id, name, &config.rtype, config.ttl));
            if let Some(entry_node) = plan.last_mut() {
                entry_node.weight = 0;
            }
        }
    }

    Ok(plan)
}

fn check_records_per_entry(per_entry: usize) -> Result<(), PlanError> {
    if per_entry == 0 || per_entry > MAX_RECORDS_PER_ENTRY {
        return Err(PlanError::RecordsPerEntryOutOfRange(per_entry));
    }
    Ok(())
}

/// Truncate to at most `max_chars` characters, on a character boundary.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
