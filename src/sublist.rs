//! Lazy enumeration of fixed-size sublists.

use crate::error::PlanError;

/// Iterator over every size-`k` sublist of a master list, in lexicographic
/// order by index tuple.
///
/// Each emitted sublist preserves the element order of the master list. For
/// `k = 0` a single empty sublist is emitted. The sequence length is
/// `C(m, k)` for a master list of length `m`; enumeration is lazy and may be
/// abandoned early.
///
/// ```
/// use rubbertree::sublist::SubLists;
///
/// let letters = ["A", "B", "C", "D"];
/// let pairs: Vec<_> = SubLists::new(&letters, 2).unwrap().collect();
/// assert_eq!(pairs[0], vec!["A", "B"]);
/// assert_eq!(pairs.len(), 6);
/// ```
pub struct SubLists<'a, T> {
    master: &'a [T],
    cursors: Vec<usize>,
    done: bool,
}

impl<'a, T> SubLists<'a, T> {
    /// Create an enumerator over every size-`size` sublist of `master`.
    ///
    /// Fails if `size` exceeds the master list length.
    pub fn new(master: &'a [T], size: usize) -> Result<Self, PlanError> {
        if size > master.len() {
            return Err(PlanError::SublistTooLarge {
                requested: size,
                available: master.len(),
            });
        }

        Ok(Self {
            master,
            cursors: (0..size).collect(),
            done: false,
        })
    }
}

impl<T: Clone> Iterator for SubLists<'_, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        if self.done {
            return None;
        }

        if self.cursors.is_empty() {
            self.done = true;
            return Some(Vec::new());
        }

        let sublist: Vec<T> = self
            .cursors
            .iter()
            .map(|&index| self.master[index].clone())
            .collect();

        // Advance the rightmost cursor that still has room, then reset the
        // cursors to its right directly behind it.
        let len = self.cursors.len();
        let mut position = len;
        loop {
            if position == 0 {
                self.done = true;
                break;
            }
            position -= 1;
            if self.cursors[position] < self.master.len() - (len - position) {
                self.cursors[position] += 1;
                for next in position + 1..len {
                    self.cursors[next] = self.cursors[next - 1] + 1;
                }
                break;
            }
        }

        Some(sublist)
    }
}
