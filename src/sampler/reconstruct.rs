//! Feature-reconstruction sampling.
//!
//! Some node types store no input features; their features are
//! synthesized at runtime by projecting the stored features of one
//! extra hop of neighbors. This sampler draws that hop: it follows only
//! edge types whose *source* type carries stored features, converts the
//! result into a single block, and hands back the expanded input node
//! set. The caller prepends the block so it is consumed before every
//! other layer, and the block is used only to compute projected
//! features, never for label propagation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::batch::{Block, NodeSet};
use crate::error::{Error, Result};
use crate::fanout::ALL_NEIGHBORS;
use crate::hetero::{EdgeType, NodeType};
use crate::store::DistGraph;

/// Fanout of the reconstruction hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructFanout {
    /// Take every feature-bearing neighbor.
    All,
    /// Sample up to this many neighbors; must be positive.
    Limit(usize),
}

impl ReconstructFanout {
    fn as_k(self) -> usize {
        match self {
            Self::All => ALL_NEIGHBORS,
            Self::Limit(k) => k,
        }
    }
}

/// Samples the extra input hop for feature reconstruction.
#[derive(Debug, Clone)]
pub struct FeatureReconstructSampler {
    /// Fanout per feature-bearing edge type; every other type is 0.
    fanout: HashMap<EdgeType, usize>,
}

impl FeatureReconstructSampler {
    /// Create a sampler for the node types that need reconstructed
    /// features.
    ///
    /// Fails with a configuration error when the fanout is
    /// `Limit(0)`, when `target_ntypes` is empty, or when some target
    /// type has no incoming edge type with a feature-bearing source --
    /// its features cannot be reconstructed.
    pub fn new(
        graph: &dyn DistGraph,
        target_ntypes: &[NodeType],
        fanout: ReconstructFanout,
    ) -> Result<Self> {
        if fanout == ReconstructFanout::Limit(0) {
            return Err(Error::Configuration(
                "feature reconstruction requires a positive fanout or All".into(),
            ));
        }
        if target_ntypes.is_empty() {
            return Err(Error::Configuration(
                "no node types given for feature reconstruction".into(),
            ));
        }

        let mut subg_etypes = Vec::new();
        let mut covered: HashSet<NodeType> = HashSet::new();
        for etype in graph.canonical_etypes() {
            if target_ntypes.contains(&etype.dst_type) && graph.has_node_feats(&etype.src_type) {
                covered.insert(etype.dst_type.clone());
                subg_etypes.push(etype);
            }
        }

        let missing: Vec<&NodeType> = target_ntypes
            .iter()
            .filter(|nt| !covered.contains(nt))
            .collect();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|nt| nt.as_str()).collect();
            return Err(Error::Configuration(format!(
                "features of node types [{}] cannot be reconstructed: no incoming edge type \
                 with stored source features",
                names.join(", ")
            )));
        }

        debug!(
            etypes = subg_etypes.len(),
            "feature reconstruction hop configured"
        );
        let k = fanout.as_k();
        Ok(Self {
            fanout: subg_etypes.into_iter().map(|et| (et, k)).collect(),
        })
    }

    /// The edge types the reconstruction hop follows.
    pub fn subgraph_etypes(&self) -> impl Iterator<Item = &EdgeType> {
        self.fanout.keys()
    }

    /// Sample the extra hop for the current input layer's seed set.
    ///
    /// Returns the reconstruction block and the expanded input node
    /// set (the block's source nodes).
    pub fn sample(&self, graph: &dyn DistGraph, seeds: &NodeSet, seed: u64) -> (Block, NodeSet) {
        let sampled = graph.sample_in_neighbors(seeds, &self.fanout, None, None, seed);
        let block = Block::from_sampled(sampled, seeds);
        let input_nodes = block.src_nodes.clone();
        (block, input_nodes)
    }
}
