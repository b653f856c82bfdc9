//! Minibatch loaders for link prediction.
//!
//! Training batches carry positive target edges, corrupted negatives
//! drawn by a [`NegativeSampler`], and blocks for the union of positive
//! endpoints and negative destinations. The seed set has to include the
//! negative destinations or their embeddings would be garbage at
//! scoring time.
//!
//! Evaluation walks edge types one at a time in index order and yields
//! ranked candidate tuples instead of blocks.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::batch::{seeds_from_edges, Block, EdgeSubgraph, NodeSet};
use crate::dataloading::{
    batch_seed, exclude_with_reverse, merge_node_ids, trim_target_index, FlatBatcher,
};
use crate::error::{Error, Result};
use crate::fanout::FanoutSpec;
use crate::hetero::EdgeType;
use crate::sampler::{
    AllEtypeEdgeBatcher, NegativeEdges, NegativePolicy, NegativeSampler, NeighborSampler,
    PosNegTuple,
};
use crate::store::DistGraph;

/// Knobs for [`LinkPredictDataLoader`].
#[derive(Debug, Clone)]
pub struct LinkLoaderConfig {
    /// Positive edges per minibatch.
    pub batch_size: usize,
    /// Negatives per positive (per batch for joint policies).
    pub num_negative_edges: usize,
    /// Training mode: shuffle and trim; evaluation mode does neither.
    pub train_task: bool,
    /// Exclude each batch's positives (and declared reverses) from
    /// neighbor sampling.
    pub exclude_training_targets: bool,
    /// Restrict message passing to edges carrying this mask, when the
    /// graph has it on any type. Defaults to `"train_mask"` so
    /// embeddings never see validation or test edges.
    pub edge_mask_for_gnn_embeddings: Option<String>,
    /// Draw every batch proportionally from all target edge types
    /// instead of shuffling them together.
    pub balance_etypes: bool,
    /// In balanced mode, drop ragged per-type tails instead of
    /// redrawing from exhausted types.
    pub drop_last: bool,
    /// Distributed worker count used for index trimming.
    pub num_workers: usize,
    /// Base RNG seed.
    pub seed: u64,
}

impl Default for LinkLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            num_negative_edges: 16,
            train_task: true,
            exclude_training_targets: false,
            edge_mask_for_gnn_embeddings: Some("train_mask".into()),
            balance_etypes: false,
            drop_last: false,
            num_workers: 1,
            seed: 42,
        }
    }
}

/// One training minibatch from a [`LinkPredictDataLoader`].
#[derive(Debug, Clone)]
pub struct LinkPredictMinibatch {
    /// Nodes whose features feed the outermost layer.
    pub input_nodes: NodeSet,
    /// The batch's positive edges with their endpoints.
    pub pos_edges: EdgeSubgraph,
    /// Corrupted destinations per edge type.
    pub neg_edges: HashMap<EdgeType, NegativeEdges>,
    /// Message-passing blocks, outermost first.
    pub blocks: Vec<Block>,
}

enum LinkBatcher {
    Flat(FlatBatcher<EdgeType>),
    Balanced(AllEtypeEdgeBatcher),
}

impl LinkBatcher {
    fn reset(&mut self, epoch: u64) {
        match self {
            Self::Flat(b) => b.reset(epoch),
            Self::Balanced(b) => b.reset(epoch),
        }
    }

    fn next_batch(&mut self) -> Option<HashMap<EdgeType, Vec<u64>>> {
        match self {
            Self::Flat(b) => b.next_batch(),
            Self::Balanced(b) => b.next_batch(),
        }
    }

    fn num_batches(&self) -> usize {
        match self {
            Self::Flat(b) => b.num_batches(),
            Self::Balanced(b) => b.expected_idxs(),
        }
    }
}

/// Training loader pairing positive target edges with sampled
/// negatives and their computation blocks.
pub struct LinkPredictDataLoader<'a> {
    graph: &'a dyn DistGraph,
    batcher: LinkBatcher,
    sampler: NeighborSampler,
    negative: NegativeSampler,
    reverse_etypes: HashMap<EdgeType, EdgeType>,
    exclude_training_targets: bool,
    seed: u64,
    epoch: u64,
    step: u64,
}

impl std::fmt::Debug for LinkPredictDataLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPredictDataLoader").finish_non_exhaustive()
    }
}

impl<'a> LinkPredictDataLoader<'a> {
    /// Build a loader over `target_eidx` with the given corruption
    /// policy.
    ///
    /// [`NegativePolicy::GlobalUniform`] is reserved for evaluation;
    /// asking for it here is a configuration error.
    pub fn new(
        graph: &'a dyn DistGraph,
        mut target_eidx: HashMap<EdgeType, Vec<u64>>,
        fanout: FanoutSpec,
        policy: NegativePolicy,
        reverse_etypes: HashMap<EdgeType, EdgeType>,
        config: LinkLoaderConfig,
    ) -> Result<Self> {
        if policy == NegativePolicy::GlobalUniform {
            return Err(Error::Configuration(
                "global uniform negatives are for evaluation loaders only".into(),
            ));
        }
        let canonical: HashSet<EdgeType> = graph.canonical_etypes().into_iter().collect();
        for etype in target_eidx.keys() {
            if !canonical.contains(etype) {
                return Err(Error::UnknownEdgeType(etype.to_string()));
            }
        }

        if config.train_task {
            trim_target_index(&mut target_eidx, config.num_workers);
        }

        // The mask only applies when at least one edge type actually
        // carries it; otherwise a graph without split masks would
        // sample nothing at all.
        let sampler = match &config.edge_mask_for_gnn_embeddings {
            Some(mask) if canonical.iter().any(|et| graph.has_edge_mask(et, mask)) => {
                debug!(mask, "restricting message passing to masked edges");
                NeighborSampler::with_mask(fanout, mask.clone())
            }
            _ => NeighborSampler::new(fanout),
        };

        let batcher = if config.balance_etypes {
            LinkBatcher::Balanced(AllEtypeEdgeBatcher::new(
                target_eidx,
                config.batch_size,
                config.train_task,
                config.drop_last,
                config.seed,
            )?)
        } else {
            LinkBatcher::Flat(FlatBatcher::new(
                target_eidx,
                config.batch_size,
                config.train_task,
                config.seed,
            )?)
        };

        let mut loader = Self {
            graph,
            batcher,
            sampler,
            negative: NegativeSampler::new(policy, config.num_negative_edges)?,
            reverse_etypes,
            exclude_training_targets: config.exclude_training_targets,
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

    /// Pull the next minibatch, or `None` when the epoch is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<LinkPredictMinibatch>> {
        let Some(batch_eids) = self.batcher.next_batch() else {
            return Ok(None);
        };
        let mut edges = HashMap::new();
        for (etype, eids) in &batch_eids {
            edges.insert(etype.clone(), self.graph.find_edges(etype, eids)?);
        }

        let seed = batch_seed(self.seed, self.epoch, self.step);
        self.step += 1;

        let neg_edges = self.negative.sample(self.graph, &edges, seed)?;

        // Negative destinations need embeddings too, so they join the
        // seed set before block sampling.
        let mut seeds = seeds_from_edges(&edges);
        for (etype, neg) in &neg_edges {
            let (NegativeEdges::PerPositive { dsts, .. } | NegativeEdges::Shared { dsts, .. }) =
                neg;
            merge_node_ids(&mut seeds, &etype.dst_type, dsts.iter().copied());
        }

        let exclude = self
            .exclude_training_targets
            .then(|| exclude_with_reverse(&edges, &self.reverse_etypes));
        let (input_nodes, blocks) =
            self.sampler
                .sample_blocks(self.graph, &seeds, exclude.as_ref(), seed.rotate_left(23));

        Ok(Some(LinkPredictMinibatch {
            input_nodes,
            pos_edges: EdgeSubgraph {
                eids: batch_eids,
                edges,
            },
            neg_edges,
            blocks,
        }))
    }
}

impl Iterator for LinkPredictDataLoader<'_> {
    type Item = Result<LinkPredictMinibatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// One evaluation batch: ranked candidates for a slice of one edge
/// type's positives.
#[derive(Debug, Clone)]
pub struct LinkPredictTestBatch {
    /// The edge type this batch scores.
    pub etype: EdgeType,
    /// Positive pairs and their candidate negatives.
    pub pairs: PosNegTuple,
    /// The policy the negatives were drawn with.
    pub policy: NegativePolicy,
}

/// Evaluation loader walking target edge types one at a time, in
/// canonical order, without shuffling or trimming.
pub struct LinkPredictTestDataLoader<'a> {
    graph: &'a dyn DistGraph,
    targets: Vec<(EdgeType, Vec<u64>)>,
    batch_size: usize,
    negative: NegativeSampler,
    cur_etype: usize,
    pos: usize,
    seed: u64,
    step: u64,
}

impl std::fmt::Debug for LinkPredictTestDataLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPredictTestDataLoader").finish_non_exhaustive()
    }
}

impl<'a> LinkPredictTestDataLoader<'a> {
    /// Build an evaluation loader.
    ///
    /// Only [`NegativePolicy::GlobalUniform`] and
    /// [`NegativePolicy::Joint`] rank against the full destination
    /// population; other policies are rejected.
    pub fn new(
        graph: &'a dyn DistGraph,
        target_eidx: HashMap<EdgeType, Vec<u64>>,
        batch_size: usize,
        policy: NegativePolicy,
        num_negative_edges: usize,
        seed: u64,
    ) -> Result<Self> {
        if !matches!(
            policy,
            NegativePolicy::GlobalUniform | NegativePolicy::Joint
        ) {
            return Err(Error::Configuration(format!(
                "evaluation supports global uniform or joint negatives, got {policy}"
            )));
        }
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be positive".into()));
        }
        let canonical: HashSet<EdgeType> = graph.canonical_etypes().into_iter().collect();
        for etype in target_eidx.keys() {
            if !canonical.contains(etype) {
                return Err(Error::UnknownEdgeType(etype.to_string()));
            }
        }
        let mut targets: Vec<(EdgeType, Vec<u64>)> = target_eidx
            .into_iter()
            .filter(|(_, eids)| !eids.is_empty())
            .collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            graph,
            targets,
            batch_size,
            negative: NegativeSampler::new(policy, num_negative_edges)?,
            cur_etype: 0,
            pos: 0,
            seed,
            step: 0,
        })
    }

    /// Rewind to the first edge type.
    pub fn reset(&mut self) {
        self.cur_etype = 0;
        self.pos = 0;
        self.step = 0;
    }

    /// Pull the next evaluation batch, or `None` when every edge type
    /// is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<LinkPredictTestBatch>> {
        let Some((etype, eids)) = self.targets.get(self.cur_etype) else {
            return Ok(None);
        };
        let end = (self.pos + self.batch_size).min(eids.len());
        let slice = &eids[self.pos..end];
        let pos_pairs = self.graph.find_edges(etype, slice)?;

        let seed = batch_seed(self.seed, 0, self.step);
        self.step += 1;

        let positives = HashMap::from([(etype.clone(), pos_pairs)]);
        let mut tuples = self.negative.gen_neg_pairs(self.graph, &positives, seed)?;
        let pairs = tuples
            .remove(etype)
            .ok_or_else(|| Error::UnknownEdgeType(etype.to_string()))?;
        let batch = LinkPredictTestBatch {
            etype: etype.clone(),
            pairs,
            policy: self.negative.policy(),
        };

        if end >= eids.len() {
            self.cur_etype += 1;
            self.pos = 0;
        } else {
            self.pos = end;
        }
        Ok(Some(batch))
    }
}

impl Iterator for LinkPredictTestDataLoader<'_> {
    type Item = Result<LinkPredictTestBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
