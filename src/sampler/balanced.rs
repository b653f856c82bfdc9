//! Per-edge-type balanced positive-edge batching.
//!
//! A plain batcher applies one global batch size, so rare edge types
//! can go unrepresented for many minibatches. This batcher instead
//! gives every edge type a per-type batch size proportional to its
//! share of the total edge count, so each minibatch carries at least
//! one edge of every type. The resulting minibatch can be larger than
//! the requested batch size.
//!
//! In no-drop mode an exhausted type keeps contributing one randomly
//! re-drawn edge per remaining iteration until every type is
//! exhausted. This intentionally duplicates examples near epoch end;
//! it is an approximation, not a bug.

use std::collections::HashMap;

use rand::prelude::*;
use rand_xorshift::XorShiftRng;

use tracing::debug;

use crate::error::{Error, Result};
use crate::hetero::EdgeType;

/// Iterates target edge IDs so every edge type appears in every batch.
#[derive(Debug, Clone)]
pub struct AllEtypeEdgeBatcher {
    /// Target eids per type, in a fixed (sorted-etype) order.
    data: Vec<(EdgeType, Vec<u64>)>,
    /// Per-epoch iteration order, aligned with `data`.
    order: Vec<Vec<u64>>,
    bs_per_type: Vec<usize>,
    current_pos: Vec<usize>,
    expected_idxs: usize,
    shuffle: bool,
    drop_last: bool,
    base_seed: u64,
    rng: XorShiftRng,
}

impl AllEtypeEdgeBatcher {
    /// Create a batcher over per-type target edge IDs.
    ///
    /// Types with no targets are dropped: they have nothing to
    /// contribute. Fails when `batch_size` is 0 or no targets remain.
    pub fn new(
        target_eidx: HashMap<EdgeType, Vec<u64>>,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
        seed: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be positive".into()));
        }
        let mut data: Vec<(EdgeType, Vec<u64>)> = target_eidx
            .into_iter()
            .filter(|(_, eids)| !eids.is_empty())
            .collect();
        data.sort_by(|a, b| a.0.cmp(&b.0));

        let total: usize = data.iter().map(|(_, eids)| eids.len()).sum();
        if total == 0 {
            return Err(Error::Configuration(
                "per-edge-type batching requires at least one target edge".into(),
            ));
        }

        // Per-type batch size proportional to the type's share of the
        // total; the ceiling guarantees at least 1.
        let mut bs_per_type = Vec::with_capacity(data.len());
        let mut expected_idxs = 0;
        for (etype, eids) in &data {
            let bs = (batch_size * eids.len()).div_ceil(total);
            let mut exp = eids.len() / bs;
            if !drop_last && eids.len() % bs != 0 {
                exp += 1;
            }
            expected_idxs = expected_idxs.max(exp);
            debug!(etype = %etype, per_type_batch = bs, "balanced batcher type share");
            bs_per_type.push(bs);
        }

        let order = data.iter().map(|(_, eids)| eids.clone()).collect();
        let current_pos = vec![0; data.len()];
        Ok(Self {
            data,
            order,
            bs_per_type,
            current_pos,
            expected_idxs,
            shuffle,
            drop_last,
            base_seed: seed,
            rng: XorShiftRng::seed_from_u64(seed),
        })
    }

    /// Batches per epoch: the maximum over types of
    /// `ceil(count / per_type_batch)`.
    pub fn expected_idxs(&self) -> usize {
        self.expected_idxs
    }

    /// Start a new epoch: re-permute each type's order independently
    /// and rewind positions.
    pub fn reset(&mut self, epoch: u64) {
        self.rng = XorShiftRng::seed_from_u64(self.base_seed.wrapping_add(epoch));
        for (i, (_, eids)) in self.data.iter().enumerate() {
            self.order[i] = eids.clone();
            if self.shuffle {
                self.order[i].shuffle(&mut self.rng);
            }
        }
        for pos in &mut self.current_pos {
            *pos = 0;
        }
    }

    /// The next slice of one type's targets, or `None` once the type
    /// is exhausted (or its tail would be partial in drop-last mode).
    fn next_etype_batch(&mut self, i: usize) -> Option<Vec<u64>> {
        let len = self.order[i].len();
        let pos = self.current_pos[i];
        if pos == len {
            return None;
        }
        let end = if pos + self.bs_per_type[i] > len {
            if self.drop_last {
                return None;
            }
            len
        } else {
            pos + self.bs_per_type[i]
        };
        self.current_pos[i] = end;
        Some(self.order[i][pos..end].to_vec())
    }

    /// The next balanced batch, or `None` when every type has reached
    /// its exhaustion condition.
    pub fn next_batch(&mut self) -> Option<HashMap<EdgeType, Vec<u64>>> {
        let mut parts = Vec::with_capacity(self.data.len());
        let mut all_done = true;
        for i in 0..self.data.len() {
            let part = self.next_etype_batch(i);
            all_done &= part.is_none();
            parts.push(part);
        }
        if all_done {
            return None;
        }

        let mut batch = HashMap::new();
        for (i, part) in parts.into_iter().enumerate() {
            match part {
                Some(eids) => {
                    batch.insert(self.data[i].0.clone(), eids);
                }
                None if !self.drop_last => {
                    // Exhausted type: re-draw one edge so the batch
                    // still covers every type.
                    let eids = &self.data[i].1;
                    let redraw = eids[self.rng.gen_range(0..eids.len())];
                    batch.insert(self.data[i].0.clone(), vec![redraw]);
                }
                None => {}
            }
        }
        Some(batch)
    }
}
