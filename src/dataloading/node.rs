//! Minibatch loaders for node-level tasks.
//!
//! The plain loader yields seed nodes with their computation blocks.
//! The semi-supervised variant runs a labeled and an unlabeled loader
//! in lockstep, each at half the configured batch size, and stops when
//! the shorter of the two runs out.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::batch::{Block, NodeSet};
use crate::dataloading::{batch_seed, trim_target_index, FlatBatcher};
use crate::error::{Error, Result};
use crate::fanout::FanoutSpec;
use crate::hetero::NodeType;
use crate::sampler::{FeatureReconstructSampler, NeighborSampler, ReconstructFanout};
use crate::store::DistGraph;

/// Knobs for [`NodeDataLoader`].
#[derive(Debug, Clone)]
pub struct NodeLoaderConfig {
    /// Seed nodes per minibatch.
    pub batch_size: usize,
    /// Training mode: shuffle every epoch and trim the target index to
    /// divide evenly across workers.
    pub train_task: bool,
    /// Fanout for the feature-reconstruction hop, when one is asked for.
    pub construct_feat_fanout: ReconstructFanout,
    /// Distributed worker count used for index trimming.
    pub num_workers: usize,
    /// Base RNG seed.
    pub seed: u64,
}

impl Default for NodeLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            train_task: true,
            construct_feat_fanout: ReconstructFanout::Limit(5),
            num_workers: 1,
            seed: 42,
        }
    }
}

/// One minibatch from a [`NodeDataLoader`].
#[derive(Debug, Clone)]
pub struct NodeMinibatch {
    /// Nodes whose features feed the outermost layer.
    pub input_nodes: NodeSet,
    /// The batch's seed nodes per type.
    pub seeds: NodeSet,
    /// Message-passing blocks, outermost first.
    pub blocks: Vec<Block>,
}

/// Cycles a target node index in shuffled minibatches, sampling the
/// surrounding computation graph for each one.
pub struct NodeDataLoader<'a> {
    graph: &'a dyn DistGraph,
    batcher: FlatBatcher<NodeType>,
    sampler: NeighborSampler,
    reconstruct: Option<FeatureReconstructSampler>,
    seed: u64,
    epoch: u64,
    step: u64,
}

impl std::fmt::Debug for NodeDataLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDataLoader").finish_non_exhaustive()
    }
}

impl<'a> NodeDataLoader<'a> {
    /// Build a loader over `target_nidx` (node IDs per type).
    pub fn new(
        graph: &'a dyn DistGraph,
        mut target_nidx: HashMap<NodeType, Vec<u64>>,
        fanout: FanoutSpec,
        construct_feat_ntypes: &[NodeType],
        config: NodeLoaderConfig,
    ) -> Result<Self> {
        let known: HashSet<NodeType> = graph.node_types().into_iter().collect();
        for ntype in target_nidx.keys() {
            if !known.contains(ntype) {
                return Err(Error::UnknownNodeType(ntype.to_string()));
            }
        }

        if config.train_task {
            trim_target_index(&mut target_nidx, config.num_workers);
        }

        let reconstruct = if construct_feat_ntypes.is_empty() {
            None
        } else {
            Some(FeatureReconstructSampler::new(
                graph,
                construct_feat_ntypes,
                config.construct_feat_fanout,
            )?)
        };

        let batcher = FlatBatcher::new(
            target_nidx,
            config.batch_size,
            config.train_task,
            config.seed,
        )?;
        debug!(
            targets = batcher.num_items(),
            batches = batcher.num_batches(),
            "node dataloader ready"
        );

        let mut loader = Self {
            graph,
            batcher,
            sampler: NeighborSampler::new(fanout),
            reconstruct,
            seed: config.seed,
            epoch: 0,
            step: 0,
        };
        loader.reset();
        Ok(loader)
    }

    /// Start a new epoch: rewind, and re-shuffle in training mode.
    pub fn reset(&mut self) {
        self.batcher.reset(self.epoch);
        self.epoch += 1;
        self.step = 0;
    }

    /// Number of batches one full epoch yields.
    pub fn num_batches(&self) -> usize {
        self.batcher.num_batches()
    }

    /// Total seed nodes in the (trimmed) target index.
    pub fn num_targets(&self) -> usize {
        self.batcher.num_items()
    }

    /// Pull the next minibatch, or `None` when the epoch is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<NodeMinibatch>> {
        let Some(seeds) = self.batcher.next_batch() else {
            return Ok(None);
        };
        let seed = batch_seed(self.seed, self.epoch, self.step);
        self.step += 1;

        let (mut input_nodes, mut blocks) =
            self.sampler.sample_blocks(self.graph, &seeds, None, seed);
        if let Some(rc) = &self.reconstruct {
            if !blocks.is_empty() {
                let (block, expanded) = rc.sample(self.graph, &input_nodes, seed.rotate_left(17));
                blocks.insert(0, block);
                input_nodes = expanded;
            }
        }

        Ok(Some(NodeMinibatch {
            input_nodes,
            seeds,
            blocks,
        }))
    }
}

impl Iterator for NodeDataLoader<'_> {
    type Item = Result<NodeMinibatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// Runs a labeled and an unlabeled [`NodeDataLoader`] in lockstep,
/// each at half the configured batch size.
///
/// An epoch ends when either side is exhausted; the longer side's
/// leftover targets are skipped for that epoch and come back after
/// `reset` with a fresh shuffle.
pub struct SemiSupervisedNodeDataLoader<'a> {
    labeled: NodeDataLoader<'a>,
    unlabeled: NodeDataLoader<'a>,
}

impl<'a> SemiSupervisedNodeDataLoader<'a> {
    /// Build a paired loader; `config.batch_size` is split evenly
    /// between the two halves, so it must be at least 2.
    pub fn new(
        graph: &'a dyn DistGraph,
        labeled_nidx: HashMap<NodeType, Vec<u64>>,
        unlabeled_nidx: HashMap<NodeType, Vec<u64>>,
        fanout: FanoutSpec,
        config: NodeLoaderConfig,
    ) -> Result<Self> {
        let half = NodeLoaderConfig {
            batch_size: config.batch_size / 2,
            ..config
        };
        Ok(Self {
            labeled: NodeDataLoader::new(graph, labeled_nidx, fanout.clone(), &[], half.clone())?,
            unlabeled: NodeDataLoader::new(graph, unlabeled_nidx, fanout, &[], half)?,
        })
    }

    /// Start a new epoch on both halves.
    pub fn reset(&mut self) {
        self.labeled.reset();
        self.unlabeled.reset();
    }

    /// Batches per epoch: the shorter side wins.
    pub fn num_batches(&self) -> usize {
        self.labeled.num_batches().min(self.unlabeled.num_batches())
    }

    /// Pull the next (labeled, unlabeled) pair, or `None` as soon as
    /// either side is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<(NodeMinibatch, NodeMinibatch)>> {
        let Some(labeled) = self.labeled.next_batch()? else {
            return Ok(None);
        };
        let Some(unlabeled) = self.unlabeled.next_batch()? else {
            return Ok(None);
        };
        Ok(Some((labeled, unlabeled)))
    }
}

impl Iterator for SemiSupervisedNodeDataLoader<'_> {
    type Item = Result<(NodeMinibatch, NodeMinibatch)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
