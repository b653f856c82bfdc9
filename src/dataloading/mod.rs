//! Minibatch dataloaders for node, edge and link-prediction tasks.
//!
//! Every loader follows the same protocol: construct it over a target
//! index, call [`reset`](EdgeDataLoader::reset) at each epoch boundary
//! to re-shuffle and rewind, and pull batches either through
//! `next_batch()` (which surfaces storage errors) or through the
//! `Iterator` impl yielding `Result` items. Exhaustion is `None`, never
//! an error. Dropping a loader mid-epoch leaks nothing.
//!
//! Within one worker the batch sequence is deterministic for a fixed
//! seed and epoch; across workers no global ordering is guaranteed.

pub mod edge;
pub mod link;
pub mod node;

pub use edge::{EdgeDataLoader, EdgeLoaderConfig, EdgeMinibatch};
pub use link::{
    LinkLoaderConfig, LinkPredictDataLoader, LinkPredictMinibatch, LinkPredictTestBatch,
    LinkPredictTestDataLoader,
};
pub use node::{NodeDataLoader, NodeLoaderConfig, NodeMinibatch, SemiSupervisedNodeDataLoader};

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::hetero::EdgeType;
use crate::store::ExcludedEdges;

/// Truncate a target ID list so its length divides evenly across
/// distributed workers.
///
/// Training loaders apply this once at construction to keep per-worker
/// batch counts uniform; evaluation loaders never do, since exact
/// coverage matters more than balance.
pub fn trim_data(ids: &mut Vec<u64>, num_workers: usize) {
    let workers = num_workers.max(1);
    let rem = ids.len() % workers;
    if rem != 0 {
        debug!(dropped = rem, workers, "trimming target index for even division");
        ids.truncate(ids.len() - rem);
    }
}

/// [`trim_data`] applied to every list in a target index.
pub fn trim_target_index<K>(targets: &mut HashMap<K, Vec<u64>>, num_workers: usize) {
    for ids in targets.values_mut() {
        trim_data(ids, num_workers);
    }
}

/// Derive the sampling seed for one batch from the loader seed,
/// epoch and step (splitmix64 finalizer).
pub(crate) fn batch_seed(base: u64, epoch: u64, step: u64) -> u64 {
    let mut x = base ^ epoch.rotate_left(32) ^ step.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Build the per-batch exclusion set for neighbor sampling: the
/// batch's own target edges plus, where a reverse type is declared,
/// their reversed counterparts.
pub(crate) fn exclude_with_reverse(
    edges: &HashMap<EdgeType, Vec<(u64, u64)>>,
    reverse_etypes: &HashMap<EdgeType, EdgeType>,
) -> ExcludedEdges {
    let mut exclude: ExcludedEdges = HashMap::new();
    for (etype, pairs) in edges {
        exclude
            .entry(etype.clone())
            .or_default()
            .extend(pairs.iter().copied());
        if let Some(rev) = reverse_etypes.get(etype) {
            exclude
                .entry(rev.clone())
                .or_default()
                .extend(pairs.iter().map(|&(s, d)| (d, s)));
        }
    }
    exclude
}

/// Iterates a typed target index in shuffled fixed-size chunks.
///
/// The flattened (type, id) list is re-permuted at every reset, so one
/// chunk can mix types; this is the plain batching used by the edge,
/// node and (non-balanced) link loaders.
#[derive(Debug, Clone)]
pub(crate) struct FlatBatcher<K> {
    items: Vec<(K, u64)>,
    order: Vec<usize>,
    pos: usize,
    batch_size: usize,
    shuffle: bool,
    base_seed: u64,
}

impl<K: Clone + Ord + Hash + Eq> FlatBatcher<K> {
    pub(crate) fn new(
        targets: HashMap<K, Vec<u64>>,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be positive".into()));
        }
        let mut keys: Vec<K> = targets.keys().cloned().collect();
        keys.sort();
        let mut items = Vec::new();
        for key in keys {
            for &id in &targets[&key] {
                items.push((key.clone(), id));
            }
        }
        let order = (0..items.len()).collect();
        Ok(Self {
            items,
            order,
            pos: 0,
            batch_size,
            shuffle,
            base_seed: seed,
        })
    }

    pub(crate) fn reset(&mut self, epoch: u64) {
        self.order = (0..self.items.len()).collect();
        if self.shuffle {
            let mut rng = XorShiftRng::seed_from_u64(self.base_seed.wrapping_add(epoch));
            self.order.shuffle(&mut rng);
        }
        self.pos = 0;
    }

    pub(crate) fn next_batch(&mut self) -> Option<HashMap<K, Vec<u64>>> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.order.len());
        let mut batch: HashMap<K, Vec<u64>> = HashMap::new();
        for &i in &self.order[self.pos..end] {
            let (key, id) = &self.items[i];
            batch.entry(key.clone()).or_default().push(*id);
        }
        self.pos = end;
        Some(batch)
    }

    pub(crate) fn num_items(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn num_batches(&self) -> usize {
        self.items.len().div_ceil(self.batch_size)
    }
}

/// Dedup-preserving merge of extra IDs into a node set entry.
pub(crate) fn merge_node_ids(
    seeds: &mut HashMap<crate::hetero::NodeType, Vec<u64>>,
    ntype: &crate::hetero::NodeType,
    ids: impl IntoIterator<Item = u64>,
) {
    let list = seeds.entry(ntype.clone()).or_default();
    let mut seen: HashSet<u64> = list.iter().copied().collect();
    for id in ids {
        if seen.insert(id) {
            list.push(id);
        }
    }
}
