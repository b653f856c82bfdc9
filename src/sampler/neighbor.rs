//! Multi-layer neighbor sampling.
//!
//! Builds the message-passing block sequence for a seed set: one block
//! per GNN layer, sampled innermost-out so each layer's source nodes
//! become the seeds of the next hop. The returned list is ordered
//! outermost layer first, matching the order a model consumes it.

use crate::batch::{Block, NodeSet};
use crate::fanout::FanoutSpec;
use crate::store::{DistGraph, ExcludedEdges};

/// Samples a fixed fanout of in-neighbors at every layer.
///
/// An optional edge-mask name restricts sampling to edges where the
/// named boolean attribute is set (on edge types that carry it), which
/// is how link-prediction training keeps evaluation edges out of the
/// learned representations.
#[derive(Debug, Clone)]
pub struct NeighborSampler {
    fanouts: FanoutSpec,
    mask: Option<String>,
}

impl NeighborSampler {
    /// Create a sampler over the given layer fanouts.
    pub fn new(fanouts: FanoutSpec) -> Self {
        Self {
            fanouts,
            mask: None,
        }
    }

    /// Create a sampler that only follows edges with the named mask.
    pub fn with_mask(fanouts: FanoutSpec, mask: impl Into<String>) -> Self {
        Self {
            fanouts,
            mask: Some(mask.into()),
        }
    }

    /// Number of message-passing layers sampled.
    pub fn num_layers(&self) -> usize {
        self.fanouts.num_layers()
    }

    /// Sample the block sequence for a seed set.
    ///
    /// Returns the input node set (the outermost block's source nodes)
    /// and the blocks, outermost first. `exclude` edges are skipped at
    /// every hop.
    pub fn sample_blocks(
        &self,
        graph: &dyn DistGraph,
        seeds: &NodeSet,
        exclude: Option<&ExcludedEdges>,
        seed: u64,
    ) -> (NodeSet, Vec<Block>) {
        let etypes = graph.canonical_etypes();
        let mut cur_seeds = seeds.clone();
        let mut blocks = Vec::with_capacity(self.fanouts.num_layers());

        // Innermost layer first; prepending keeps outermost-first order.
        for (hop, layer) in self.fanouts.layers().iter().enumerate().rev() {
            let fanout = layer.for_etypes(&etypes);
            let sampled = graph.sample_in_neighbors(
                &cur_seeds,
                &fanout,
                self.mask.as_deref(),
                exclude,
                seed.wrapping_add(hop as u64),
            );
            let block = Block::from_sampled(sampled, &cur_seeds);
            cur_seeds = block.src_nodes.clone();
            blocks.insert(0, block);
        }

        (cur_seeds, blocks)
    }
}
