//! Shuffle-shard assignment over lattices.
//!
//! In traditional sharding an identifier maps to one endpoint out of many,
//! bounding the blast radius of a per-identifier problem to 1/N. A shuffle
//! shard assigns each identifier a small subset of endpoints instead; when
//! callers tolerate partial availability (or discover endpoints through a
//! vulcanized plan, which does), the blast radius shrinks to the chance
//! that two identifiers share their whole subset.
//!
//! Two assignment strategies are provided:
//!
//! * [`SimpleSignatureSharder`] derives the subset from a keyed hash of the
//!   identifier. It is stateless and needs no coordination, but makes only
//!   a probabilistic promise about how much two assignments overlap.
//! * [`StatefulSearchingSharder`] searches for a subset whose overlap with
//!   every previously assigned shard stays within a hard bound, recording
//!   the fragments it hands out in an external [`FragmentLedger`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::error::PlanError;
use crate::lattice::Lattice;
use crate::sublist::SubLists;

/// Persistent ledger of handed-out shard fragments.
///
/// The sharder canonicalizes every fragment before calling, so
/// implementations treat the key as opaque. A single `shuffle_shard` call
/// reads the ledger during its search and writes the winning fragments at
/// the end; concurrent assignment therefore needs external serialization,
/// or a store with transactional semantics over the fragment key that can
/// roll back one of two racing shards.
pub trait FragmentLedger {
    /// Record a fragment as used.
    fn save(&mut self, fragment: &str);

    /// Has this fragment been used by a previous shard?
    fn contains(&self, fragment: &str) -> bool;
}

/// In-memory fragment ledger, shareable across sharders and threads.
#[derive(Debug, Clone, Default)]
pub struct MemoryFragmentLedger {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl MemoryFragmentLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded fragments.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when no fragment has been recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl FragmentLedger for MemoryFragmentLedger {
    fn save(&mut self, fragment: &str) {
        self.inner.write().insert(fragment.to_string());
    }

    fn contains(&self, fragment: &str) -> bool {
        self.inner.read().contains(fragment)
    }
}

/// Canonical ledger key for a fragment: endpoint identities sorted
/// ascending, joined with ",". Two fragments with equal sorted content get
/// equal keys regardless of element order.
fn canonical_fragment<T: fmt::Display>(fragment: &[T]) -> String {
    let mut identities: Vec<String> = fragment.iter().map(T::to_string).collect();
    identities.sort();
    identities.join(",")
}

/// Stateless hash-based shuffle sharder.
///
/// For a fixed seed the same identifier always maps to the same shard, so
/// assignment needs no storage and can be recomputed anywhere. Over many
/// identifiers each endpoint is selected at a uniform rate.
#[derive(Debug, Clone)]
pub struct SimpleSignatureSharder {
    seed: u64,
}

impl SimpleSignatureSharder {
    /// Create a sharder keyed by `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Derive the shard for `identifier`, selecting `endpoints_per_cell`
    /// distinct endpoints from every occupied cell of `lattice`.
    ///
    /// Fails with [`PlanError::InsufficientCell`] when any cell holds fewer
    /// than `endpoints_per_cell` endpoints.
    pub fn shuffle_shard<T: Clone>(
        &self,
        lattice: &Lattice<T>,
        identifier: &[u8],
        endpoints_per_cell: usize,
    ) -> Result<Lattice<T>, PlanError> {
        let mut shard = Lattice::new(lattice.dimension_names().to_vec())?;

        let mut message = Vec::with_capacity(8 + identifier.len());
        message.extend_from_slice(&self.seed.to_be_bytes());
        message.extend_from_slice(identifier);

        for coordinate in lattice.all_coordinates() {
            let Some(cell) = lattice.endpoints_for_sector(&coordinate)? else {
                continue;
            };
            if cell.len() < endpoints_per_cell {
                return Err(PlanError::InsufficientCell {
                    coordinate,
                    available: cell.len(),
                    needed: endpoints_per_cell,
                });
            }

            // Walk salted digests until the cell yields enough distinct
            // indices; a collision just advances the salt.
            let mut picked: Vec<usize> = Vec::with_capacity(endpoints_per_cell);
            let mut salt: u64 = 0;
            while picked.len() < endpoints_per_cell {
                let index = signature_index(salt, &coordinate, &message, cell.len());
                if !picked.contains(&index) {
                    picked.push(index);
                }
                salt += 1;
            }

            let chosen: Vec<T> = picked.iter().map(|&index| cell[index].clone()).collect();
            shard.add_endpoints_for_sector(&coordinate, chosen)?;
        }

        trace!(
            endpoints = shard.endpoint_count(),
            "derived signature shard"
        );
        Ok(shard)
    }
}

/// Reduce `MD5(salt || coordinate || message)` to a cell index.
///
/// The salt is hashed as 8 big-endian bytes and each coordinate component
/// is length-prefixed (8-byte big-endian length, then UTF-8 bytes) so that
/// component boundaries cannot be confused. The 16-byte digest is read as
/// an unsigned big-endian integer and reduced modulo the cell size.
fn signature_index(salt: u64, coordinate: &[String], message: &[u8], cell_size: usize) -> usize {
    let mut digest = Md5::new();
    digest.update(salt.to_be_bytes());
    for component in coordinate {
        digest.update((component.len() as u64).to_be_bytes());
        digest.update(component.as_bytes());
    }
    digest.update(message);

    let bytes: [u8; 16] = digest.finalize().into();
    (u128::from_be_bytes(bytes) % cell_size as u128) as usize
}

/// Shuffle sharder that guarantees a hard overlap bound between shards.
///
/// A recursive backtracking search picks `endpoints_per_cell` endpoints
/// from one cell, removes every row and column that cell occupies, and
/// recurses into the remainder, rejecting any candidate whose combination
/// with the picks so far would repeat a recorded size-(overlap+1) fragment.
/// The winning shard's fragments are saved to the ledger, so any two shards
/// committed through the same ledger share at most `maximum_overlap`
/// endpoints.
#[derive(Debug)]
pub struct StatefulSearchingSharder<L> {
    ledger: L,
    rng: StdRng,
}

impl<L: FragmentLedger> StatefulSearchingSharder<L> {
    /// Create a sharder with an entropy-seeded search order.
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a sharder with a fixed search-order seed, for reproducible
    /// assignment sequences.
    pub fn with_seed(ledger: L, seed: u64) -> Self {
        Self {
            ledger,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The underlying fragment ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Search for a shard of `endpoints_per_cell` endpoints per surviving
    /// cell whose overlap with every previously committed shard is at most
    /// `maximum_overlap`, then commit its fragments to the ledger.
    ///
    /// Fails with [`PlanError::NoShardsAvailable`] when the search space is
    /// exhausted, and with [`PlanError::InsufficientCell`] when any cell
    /// holds fewer than `endpoints_per_cell` endpoints.
    pub fn shuffle_shard<T>(
        &mut self,
        lattice: &Lattice<T>,
        endpoints_per_cell: usize,
        maximum_overlap: usize,
    ) -> Result<Lattice<T>, PlanError>
    where
        T: Clone + fmt::Display,
    {
        for coordinate in lattice.all_coordinates() {
            let Some(cell) = lattice.endpoints_for_sector(&coordinate)? else {
                continue;
            };
            if cell.len() < endpoints_per_cell {
                return Err(PlanError::InsufficientCell {
                    coordinate,
                    available: cell.len(),
                    needed: endpoints_per_cell,
                });
            }
        }

        let shard = self.search(lattice, endpoints_per_cell, maximum_overlap)?;
        let endpoints = shard.all_endpoints();
        if endpoints.is_empty() {
            return Err(PlanError::NoShardsAvailable);
        }

        // Commit: record every size-(overlap+1) fragment of the shard so
        // later searches steer clear of it.
        if endpoints.len() > maximum_overlap {
            for fragment in SubLists::new(&endpoints, maximum_overlap + 1)? {
                self.ledger.save(&canonical_fragment(&fragment));
            }
        }

        debug!(
            endpoints = endpoints.len(),
            maximum_overlap, "committed shuffle shard"
        );
        Ok(shard)
    }

    fn search<T>(
        &mut self,
        lattice: &Lattice<T>,
        endpoints_per_cell: usize,
        maximum_overlap: usize,
    ) -> Result<Lattice<T>, PlanError>
    where
        T: Clone + fmt::Display,
    {
        let mut coordinates = lattice.all_coordinates();
        coordinates.shuffle(&mut self.rng);

        for coordinate in coordinates {
            // Remove every row and column the candidate cell occupies; what
            // is left is the recursion target.
            let dimensions = lattice.dimension_names();
            let mut complement = lattice.simulate_failure(&dimensions[0], &coordinate[0])?;
            for position in 1..dimensions.len() {
                complement =
                    complement.simulate_failure(&dimensions[position], &coordinate[position])?;
            }

            let Some(cell) = lattice.endpoints_for_sector(&coordinate)? else {
                continue;
            };
            let mut endpoints = cell.to_vec();
            endpoints.shuffle(&mut self.rng);

            for fragment in SubLists::new(&endpoints, endpoints_per_cell)? {
                // A single cell's picks can already collide; skip before
                // paying for the recursion.
                if fragment.len() >= maximum_overlap
                    && self.too_many_collisions(&fragment, maximum_overlap)?
                {
                    continue;
                }

                let partial = self.search(&complement, endpoints_per_cell, maximum_overlap)?;

                let mut combined = fragment.clone();
                combined.extend(partial.all_endpoints());
                if combined.len() >= maximum_overlap
                    && self.too_many_collisions(&combined, maximum_overlap)?
                {
                    continue;
                }

                let mut shard = partial;
                shard.add_endpoints_for_sector(&coordinate, fragment)?;
                return Ok(shard);
            }

            trace!(coordinate = ?coordinate, "cell exhausted, backtracking");
        }

        // Nothing placeable from here; the caller treats an endpoint-less
        // lattice as a dead branch.
        Lattice::new(lattice.dimension_names().to_vec())
    }

    fn too_many_collisions<T>(
        &self,
        haystack: &[T],
        maximum_overlap: usize,
    ) -> Result<bool, PlanError>
    where
        T: Clone + fmt::Display,
    {
        if haystack.len() <= maximum_overlap {
            return Ok(false);
        }
        if haystack.len() == maximum_overlap + 1 {
            return Ok(self.ledger.contains(&canonical_fragment(haystack)));
        }

        for fragment in SubLists::new(haystack, maximum_overlap + 1)? {
            if self.ledger.contains(&canonical_fragment(&fragment)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_cell(range: std::ops::RangeInclusive<char>) -> Vec<String> {
        range.map(|c| c.to_string()).collect()
    }

    fn single_cell_lattice(range: std::ops::RangeInclusive<char>) -> Lattice<String> {
        let mut lattice = Lattice::single_cell();
        lattice
            .add_endpoints_for_sector(&[crate::lattice::SINGLE_CELL_DIMENSION], letter_cell(range))
            .unwrap();
        lattice
    }

    #[test]
    fn test_canonical_fragment_ignores_order() {
        let forward = canonical_fragment(&["A", "B", "C"]);
        let backward = canonical_fragment(&["C", "A", "B"]);
        assert_eq!(forward, backward);
        assert_eq!(forward, "A,B,C");
    }

    #[test]
    fn test_memory_ledger_shares_state_across_clones() {
        let mut ledger = MemoryFragmentLedger::new();
        let reader = ledger.clone();

        assert!(!reader.contains("A,B,C"));
        ledger.save("A,B,C");
        assert!(reader.contains("A,B,C"));
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_signature_shard_is_deterministic() {
        let lattice = single_cell_lattice('A'..='T');
        let sharder = SimpleSignatureSharder::new(5353);

        let first = sharder.shuffle_shard(&lattice, b"customer-1", 4).unwrap();
        let second = sharder.shuffle_shard(&lattice, b"customer-1", 4).unwrap();

        assert_eq!(first.all_endpoints(), second.all_endpoints());
        assert_eq!(first.endpoint_count(), 4);
        assert_eq!(first.all_coordinates().len(), 1);
    }

    #[test]
    fn test_signature_shard_selects_distinct_endpoints() {
        let lattice = single_cell_lattice('A'..='H');
        let sharder = SimpleSignatureSharder::new(1);

        for id in 0..50u32 {
            let shard = sharder
                .shuffle_shard(&lattice, id.to_string().as_bytes(), 4)
                .unwrap();
            let endpoints = shard.all_endpoints();
            let distinct: HashSet<&String> = endpoints.iter().collect();
            assert_eq!(distinct.len(), 4);
        }
    }

    #[test]
    fn test_signature_shard_respects_cells() {
        let mut lattice = Lattice::one_dimensional("AZ");
        lattice
            .add_endpoints_for_sector(&["us-east-1a"], letter_cell('A'..='J'))
            .unwrap();
        lattice
            .add_endpoints_for_sector(&["us-east-1b"], letter_cell('K'..='T'))
            .unwrap();

        let sharder = SimpleSignatureSharder::new(5353);
        let shard = sharder.shuffle_shard(&lattice, b"customer-1", 2).unwrap();

        assert_eq!(shard.endpoint_count(), 4);
        let cell_a = shard.endpoints_for_sector(&["us-east-1a"]).unwrap().unwrap();
        assert!(cell_a.iter().all(|e| ('A'..='J').contains(&e.chars().next().unwrap())));
        let cell_b = shard.endpoints_for_sector(&["us-east-1b"]).unwrap().unwrap();
        assert!(cell_b.iter().all(|e| ('K'..='T').contains(&e.chars().next().unwrap())));
    }

    #[test]
    fn test_signature_shard_undersized_cell_fails() {
        let lattice = single_cell_lattice('A'..='C');
        let sharder = SimpleSignatureSharder::new(5353);

        assert!(matches!(
            sharder.shuffle_shard(&lattice, b"customer-1", 4),
            Err(PlanError::InsufficientCell {
                available: 3,
                needed: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_searching_shard_has_requested_shape() {
        let lattice = single_cell_lattice('A'..='T');
        let mut sharder = StatefulSearchingSharder::with_seed(MemoryFragmentLedger::new(), 7);

        let shard = sharder.shuffle_shard(&lattice, 4, 2).unwrap();
        assert_eq!(shard.endpoint_count(), 4);
        assert_eq!(shard.all_coordinates().len(), 1);
    }

    #[test]
    fn test_searching_shard_commits_fragments() {
        let ledger = MemoryFragmentLedger::new();
        let mut sharder = StatefulSearchingSharder::with_seed(ledger.clone(), 7);

        let lattice = single_cell_lattice('A'..='T');
        let shard = sharder.shuffle_shard(&lattice, 4, 2).unwrap();

        // Every 3-subset of the 4 chosen endpoints is recorded.
        assert_eq!(ledger.len(), 4);
        let endpoints = shard.all_endpoints();
        for fragment in SubLists::new(&endpoints, 3).unwrap() {
            assert!(ledger.contains(&canonical_fragment(&fragment)));
        }
    }

    #[test]
    fn test_searching_shard_exhaustion() {
        let lattice = single_cell_lattice('A'..='E');
        let mut sharder = StatefulSearchingSharder::with_seed(MemoryFragmentLedger::new(), 7);

        // With 5 endpoints, one shard of 4 uses up every 4-subset within
        // overlap 2: any other 4-subset shares at least 3 endpoints.
        sharder
            .shuffle_shard(&lattice, 4, 2)
            .expect("first shard fits");
        assert!(matches!(
            sharder.shuffle_shard(&lattice, 4, 2),
            Err(PlanError::NoShardsAvailable)
        ));
    }

    #[test]
    fn test_searching_shard_undersized_cell_fails() {
        let lattice = single_cell_lattice('A'..='C');
        let mut sharder = StatefulSearchingSharder::with_seed(MemoryFragmentLedger::new(), 7);

        assert!(matches!(
            sharder.shuffle_shard(&lattice, 4, 2),
            Err(PlanError::InsufficientCell { .. })
        ));
    }

    #[test]
    fn test_searching_shard_respects_cells() {
        let mut lattice = Lattice::two_dimensional("AZ", "Version");
        lattice
            .add_endpoints_for_sector(&["us-east-1a", "1"], letter_cell('A'..='E'))
            .unwrap();
        lattice
            .add_endpoints_for_sector(&["us-east-1a", "2"], letter_cell('F'..='J'))
            .unwrap();
        lattice
            .add_endpoints_for_sector(&["us-east-1b", "1"], letter_cell('K'..='O'))
            .unwrap();
        lattice
            .add_endpoints_for_sector(&["us-east-1b", "2"], letter_cell('P'..='T'))
            .unwrap();

        let mut sharder = StatefulSearchingSharder::with_seed(MemoryFragmentLedger::new(), 7);
        for _ in 0..10 {
            let shard = sharder.shuffle_shard(&lattice, 2, 2).unwrap();

            // One cell per AZ/version diagonal: 2 cells of 2 endpoints.
            assert_eq!(shard.endpoint_count(), 4);
            assert_eq!(shard.all_coordinates().len(), 2);

            for coordinate in shard.all_coordinates() {
                let picked = shard.endpoints_for_sector(&coordinate).unwrap().unwrap();
                let source = lattice.endpoints_for_sector(&coordinate).unwrap().unwrap();
                assert!(picked.iter().all(|e| source.contains(e)));
            }
        }
    }
}
