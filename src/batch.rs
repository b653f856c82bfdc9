//! Minibatch building blocks.
//!
//! A GNN minibatch is assembled from *blocks*: bipartite one-hop
//! subgraphs connecting a layer's source node set to its destination
//! (seed) node set. Blocks are ordered outermost layer first, so a
//! model consumes `blocks[0]` at its input layer.
//!
//! # Key Types
//!
//! - [`NodeSet`] - node IDs grouped by node type
//! - [`Block`] - one message-passing hop
//! - [`EdgeSubgraph`] - the target edges of an edge-level minibatch

use std::collections::{HashMap, HashSet};

use crate::hetero::{EdgeType, NodeType};

/// Node IDs grouped by node type. IDs are local to their type.
pub type NodeSet = HashMap<NodeType, Vec<u64>>;

/// A bipartite subgraph representing one message-passing hop.
///
/// Invariant: for every node type, the destination nodes are a prefix
/// of the source node list. This is the usual block layout, letting
/// consumers slice destination rows out of source feature matrices.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// Source nodes per type (destination nodes first, then sampled
    /// neighbors in sampling order).
    pub src_nodes: NodeSet,
    /// Destination (seed) nodes per type.
    pub dst_nodes: NodeSet,
    /// Edges per canonical edge type, as (src, dst) ID pairs.
    pub edges: HashMap<EdgeType, Vec<(u64, u64)>>,
}

impl Block {
    /// Build a block from sampled in-edges and the seed set they were
    /// sampled for.
    pub fn from_sampled(edges: HashMap<EdgeType, Vec<(u64, u64)>>, seeds: &NodeSet) -> Self {
        let mut src_nodes: NodeSet = HashMap::new();
        let mut seen: HashMap<NodeType, HashSet<u64>> = HashMap::new();

        // Destination nodes become the prefix of each source list.
        for (ntype, ids) in seeds {
            let set = seen.entry(ntype.clone()).or_default();
            let list = src_nodes.entry(ntype.clone()).or_default();
            for &id in ids {
                if set.insert(id) {
                    list.push(id);
                }
            }
        }

        // Sorted edge-type iteration keeps source order deterministic.
        let mut etypes: Vec<&EdgeType> = edges.keys().collect();
        etypes.sort();
        for etype in etypes {
            let set = seen.entry(etype.src_type.clone()).or_default();
            let list = src_nodes.entry(etype.src_type.clone()).or_default();
            for &(src, _) in &edges[etype] {
                if set.insert(src) {
                    list.push(src);
                }
            }
        }

        Self {
            src_nodes,
            dst_nodes: seeds.clone(),
            edges,
        }
    }

    /// Number of source nodes of a given type.
    pub fn num_src(&self, ntype: &NodeType) -> usize {
        self.src_nodes.get(ntype).map_or(0, Vec::len)
    }

    /// Number of destination nodes of a given type.
    pub fn num_dst(&self, ntype: &NodeType) -> usize {
        self.dst_nodes.get(ntype).map_or(0, Vec::len)
    }

    /// Number of edges of a given edge type.
    pub fn num_edges(&self, etype: &EdgeType) -> usize {
        self.edges.get(etype).map_or(0, Vec::len)
    }

    /// Total edges across all edge types.
    pub fn total_edges(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

/// The target edges of an edge-level minibatch: edge IDs and their
/// endpoint pairs, grouped by canonical edge type.
#[derive(Debug, Clone, Default)]
pub struct EdgeSubgraph {
    /// Edge IDs per type.
    pub eids: HashMap<EdgeType, Vec<u64>>,
    /// (src, dst) endpoint pairs per type, aligned with `eids`.
    pub edges: HashMap<EdgeType, Vec<(u64, u64)>>,
}

impl EdgeSubgraph {
    /// Total number of target edges.
    pub fn num_edges(&self) -> usize {
        self.eids.values().map(Vec::len).sum()
    }
}

/// Collect the unique endpoints of a set of typed edges into a seed
/// node set, preserving first-seen order.
pub fn seeds_from_edges(edges: &HashMap<EdgeType, Vec<(u64, u64)>>) -> NodeSet {
    let mut seeds: NodeSet = HashMap::new();
    let mut seen: HashMap<NodeType, HashSet<u64>> = HashMap::new();
    let mut push = |ntype: &NodeType, id: u64, seeds: &mut NodeSet, seen: &mut HashMap<NodeType, HashSet<u64>>| {
        if seen.entry(ntype.clone()).or_default().insert(id) {
            seeds.entry(ntype.clone()).or_default().push(id);
        }
    };
    let mut etypes: Vec<&EdgeType> = edges.keys().collect();
    etypes.sort();
    for etype in etypes {
        for &(src, dst) in &edges[etype] {
            push(&etype.src_type, src, &mut seeds, &mut seen);
            push(&etype.dst_type, dst, &mut seeds, &mut seen);
        }
    }
    seeds
}
