//! Minibatch loader for edge-level tasks (classification, regression).
//!
//! Each batch is a slice of target edges, the message-passing blocks
//! for their endpoint nodes, and the input node set the blocks consume.
//! Target edges can be hidden from message passing in two ways that
//! compose: zeroing the target edge types out of every hop's fanout,
//! and excluding the batch's own edges (plus declared reverses) from
//! sampling.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::batch::{seeds_from_edges, Block, EdgeSubgraph, NodeSet};
use crate::dataloading::{batch_seed, exclude_with_reverse, trim_target_index, FlatBatcher};
use crate::error::{Error, Result};
use crate::fanout::{modify_fanout_for_target_etype, FanoutSpec};
use crate::hetero::{EdgeType, NodeType};
use crate::sampler::{FeatureReconstructSampler, NeighborSampler, ReconstructFanout};
use crate::store::DistGraph;

/// Knobs for [`EdgeDataLoader`].
#[derive(Debug, Clone)]
pub struct EdgeLoaderConfig {
    /// Target edges per minibatch.
    pub batch_size: usize,
    /// Training mode: shuffle every epoch and trim the target index to
    /// divide evenly across workers. Evaluation mode does neither.
    pub train_task: bool,
    /// Zero the target edge types (and declared reverses) out of every
    /// hop's fanout.
    pub remove_target_edge_type: bool,
    /// Exclude each batch's own target edges (and declared reverses)
    /// from neighbor sampling.
    pub exclude_training_targets: bool,
    /// Fanout for the feature-reconstruction hop, when one is asked for.
    pub construct_feat_fanout: ReconstructFanout,
    /// Distributed worker count used for index trimming.
    pub num_workers: usize,
    /// Base RNG seed; batches are deterministic given seed and epoch.
    pub seed: u64,
}

impl Default for EdgeLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            train_task: true,
            remove_target_edge_type: true,
            exclude_training_targets: false,
            construct_feat_fanout: ReconstructFanout::Limit(5),
            num_workers: 1,
            seed: 42,
        }
    }
}

/// One minibatch from an [`EdgeDataLoader`].
#[derive(Debug, Clone)]
pub struct EdgeMinibatch {
    /// Nodes whose features feed the outermost layer.
    pub input_nodes: NodeSet,
    /// The batch's target edges with their endpoints.
    pub target_edges: EdgeSubgraph,
    /// Message-passing blocks, outermost first.
    pub blocks: Vec<Block>,
}

/// Cycles a target edge index in shuffled minibatches, sampling the
/// surrounding computation graph for each one.
pub struct EdgeDataLoader<'a> {
    graph: &'a dyn DistGraph,
    batcher: FlatBatcher<EdgeType>,
    sampler: NeighborSampler,
    reconstruct: Option<FeatureReconstructSampler>,
    reverse_etypes: HashMap<EdgeType, EdgeType>,
    exclude_training_targets: bool,
    seed: u64,
    epoch: u64,
    step: u64,
}

impl std::fmt::Debug for EdgeDataLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDataLoader").finish_non_exhaustive()
    }
}

impl<'a> EdgeDataLoader<'a> {
    /// Build a loader over `target_eidx` (edge IDs per type).
    ///
    /// `reverse_etypes` declares which edge type mirrors each target
    /// type; it widens both fanout removal and per-batch exclusion.
    /// `construct_feat_ntypes` lists featureless node types whose
    /// inputs must be reconstructed from neighbors, adding one extra
    /// block in front of the regular ones.
    pub fn new(
        graph: &'a dyn DistGraph,
        mut target_eidx: HashMap<EdgeType, Vec<u64>>,
        fanout: FanoutSpec,
        reverse_etypes: HashMap<EdgeType, EdgeType>,
        construct_feat_ntypes: &[NodeType],
        config: EdgeLoaderConfig,
    ) -> Result<Self> {
        let canonical: HashSet<EdgeType> = graph.canonical_etypes().into_iter().collect();
        for etype in target_eidx.keys() {
            if !canonical.contains(etype) {
                return Err(Error::UnknownEdgeType(etype.to_string()));
            }
        }
        if config.remove_target_edge_type && reverse_etypes.is_empty() {
            return Err(Error::Configuration(
                "remove_target_edge_type needs a reverse edge type map; \
                 pass one or disable the removal"
                    .into(),
            ));
        }

        if config.train_task {
            trim_target_index(&mut target_eidx, config.num_workers);
        }

        let fanout = if config.remove_target_edge_type {
            let mut removed: HashSet<EdgeType> = target_eidx.keys().cloned().collect();
            for etype in target_eidx.keys() {
                if let Some(rev) = reverse_etypes.get(etype) {
                    removed.insert(rev.clone());
                }
            }
            let all_etypes = graph.canonical_etypes();
            modify_fanout_for_target_etype(&fanout, &all_etypes, &removed)
        } else {
            fanout
        };

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
            target_eidx,
            config.batch_size,
            config.train_task,
            config.seed,
        )?;
        debug!(
            targets = batcher.num_items(),
            batches = batcher.num_batches(),
            "edge dataloader ready"
        );

        let mut loader = Self {
            graph,
            batcher,
            sampler: NeighborSampler::new(fanout),
            reconstruct,
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
    pub fn next_batch(&mut self) -> Result<Option<EdgeMinibatch>> {
        let Some(batch_eids) = self.batcher.next_batch() else {
            return Ok(None);
        };
        let mut edges = HashMap::new();
        for (etype, eids) in &batch_eids {
            edges.insert(etype.clone(), self.graph.find_edges(etype, eids)?);
        }
        let seeds = seeds_from_edges(&edges);

        let exclude = self
            .exclude_training_targets
            .then(|| exclude_with_reverse(&edges, &self.reverse_etypes));
        let seed = batch_seed(self.seed, self.epoch, self.step);
        self.step += 1;

        let (mut input_nodes, mut blocks) =
            self.sampler
                .sample_blocks(self.graph, &seeds, exclude.as_ref(), seed);
        if let Some(rc) = &self.reconstruct {
            if !blocks.is_empty() {
                let (block, expanded) = rc.sample(self.graph, &input_nodes, seed.rotate_left(17));
                blocks.insert(0, block);
                input_nodes = expanded;
            }
        }

        Ok(Some(EdgeMinibatch {
            input_nodes,
            target_edges: EdgeSubgraph {
                eids: batch_eids,
                edges,
            },
            blocks,
        }))
    }
}

impl Iterator for EdgeDataLoader<'_> {
    type Item = Result<EdgeMinibatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::ALL_NEIGHBORS;
    use crate::hetero::HeteroGraph;

    fn review_graph() -> (HeteroGraph, EdgeType, EdgeType) {
        let user = NodeType::new("user");
        let item = NodeType::new("item");
        let buys = EdgeType::new("user", "buys", "item");
        let rev = buys.reverse();

        let mut g = HeteroGraph::new();
        g.add_nodes(user.clone(), 6);
        g.add_nodes(item.clone(), 6);
        let pairs: Vec<(u64, u64)> = (0..6)
            .flat_map(|s| (0..3).map(move |j| (s, (s + j) % 6)))
            .collect();
        let rev_pairs: Vec<(u64, u64)> = pairs.iter().map(|&(s, d)| (d, s)).collect();
        g.add_edges(buys.clone(), &pairs);
        g.add_edges(rev.clone(), &rev_pairs);
        (g, buys, rev)
    }

    #[test]
    fn test_epoch_covers_all_targets() {
        let (g, buys, _) = review_graph();
        let targets = HashMap::from([(buys.clone(), (0..18u64).collect::<Vec<_>>())]);
        let mut loader = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(2, 2).unwrap(),
            HashMap::new(),
            &[],
            EdgeLoaderConfig {
                batch_size: 5,
                remove_target_edge_type: false,
                ..Default::default()
            },
        )
        .unwrap();

        let mut seen = HashSet::new();
        let mut batches = 0;
        while let Some(mb) = loader.next_batch().unwrap() {
            batches += 1;
            assert_eq!(mb.blocks.len(), 2);
            for &eid in &mb.target_edges.eids[&buys] {
                assert!(seen.insert(eid));
            }
        }
        assert_eq!(seen.len(), 18);
        assert_eq!(batches, 4);
        assert_eq!(loader.num_batches(), 4);
    }

    #[test]
    fn test_remove_target_edge_type_hides_targets_and_reverse() {
        let (g, buys, rev) = review_graph();
        let targets = HashMap::from([(buys.clone(), (0..18u64).collect::<Vec<_>>())]);
        let reverse_map = HashMap::from([(buys.clone(), rev.clone())]);
        let mut loader = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(ALL_NEIGHBORS, 2).unwrap(),
            reverse_map,
            &[],
            EdgeLoaderConfig {
                batch_size: 6,
                ..Default::default()
            },
        )
        .unwrap();

        while let Some(mb) = loader.next_batch().unwrap() {
            for block in &mb.blocks {
                assert!(!block.edges.contains_key(&buys));
                assert!(!block.edges.contains_key(&rev));
            }
        }
    }

    #[test]
    fn test_exclude_training_targets_drops_batch_edges() {
        let (g, buys, rev) = review_graph();
        let targets = HashMap::from([(buys.clone(), (0..18u64).collect::<Vec<_>>())]);
        let reverse_map = HashMap::from([(buys.clone(), rev.clone())]);
        let mut loader = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(ALL_NEIGHBORS, 1).unwrap(),
            reverse_map,
            &[],
            EdgeLoaderConfig {
                batch_size: 4,
                remove_target_edge_type: false,
                exclude_training_targets: true,
                ..Default::default()
            },
        )
        .unwrap();

        while let Some(mb) = loader.next_batch().unwrap() {
            let batch_pairs: HashSet<(u64, u64)> =
                mb.target_edges.edges[&buys].iter().copied().collect();
            for block in &mb.blocks {
                if let Some(pairs) = block.edges.get(&buys) {
                    for pair in pairs {
                        assert!(!batch_pairs.contains(pair));
                    }
                }
                if let Some(pairs) = block.edges.get(&rev) {
                    for &(s, d) in pairs {
                        assert!(!batch_pairs.contains(&(d, s)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_unknown_etype_rejected() {
        let (g, _, _) = review_graph();
        let bogus = EdgeType::new("user", "hates", "item");
        let targets = HashMap::from([(bogus, vec![0u64])]);
        let err = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(2, 1).unwrap(),
            HashMap::new(),
            &[],
            EdgeLoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownEdgeType(_)));
    }

    #[test]
    fn test_remove_target_requires_reverse_map() {
        let (g, buys, _) = review_graph();
        let targets = HashMap::from([(buys, (0..18u64).collect::<Vec<_>>())]);
        let err = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(2, 2).unwrap(),
            HashMap::new(),
            &[],
            EdgeLoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_eval_mode_keeps_order_and_full_index() {
        let (g, buys, _) = review_graph();
        let targets = HashMap::from([(buys.clone(), (0..17u64).collect::<Vec<_>>())]);
        let mut loader = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(2, 1).unwrap(),
            HashMap::new(),
            &[],
            EdgeLoaderConfig {
                batch_size: 5,
                train_task: false,
                remove_target_edge_type: false,
                num_workers: 4,
                ..Default::default()
            },
        )
        .unwrap();

        // No trimming in evaluation mode even with num_workers > 1,
        // and IDs come back in index order.
        let mut seen = Vec::new();
        while let Some(mb) = loader.next_batch().unwrap() {
            seen.extend(mb.target_edges.eids[&buys].iter().copied());
        }
        assert_eq!(seen, (0..17u64).collect::<Vec<_>>());
    }

    #[test]
    fn test_reconstruct_block_prepended() {
        let (mut g, buys, rev) = review_graph();
        // Items carry features, users do not; user inputs get
        // reconstructed from their item neighbors over rev_buys.
        g.set_node_feats(NodeType::new("item"), true);
        let targets = HashMap::from([(buys.clone(), (0..18u64).collect::<Vec<_>>())]);
        let mut loader = EdgeDataLoader::new(
            &g,
            targets,
            FanoutSpec::uniform(2, 2).unwrap(),
            HashMap::new(),
            &[NodeType::new("user")],
            EdgeLoaderConfig {
                batch_size: 6,
                remove_target_edge_type: false,
                ..Default::default()
            },
        )
        .unwrap();

        let mb = loader.next_batch().unwrap().unwrap();
        assert_eq!(mb.blocks.len(), 3);
        for etype in mb.blocks[0].edges.keys() {
            assert_eq!(etype, &rev);
        }
    }
}
