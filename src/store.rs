//! The graph storage collaborator interface.
//!
//! The storage engine that partitions and serves the graph is external
//! to this crate. Dataloaders talk to it exclusively through the
//! [`DistGraph`] trait: neighbor sampling, edge lookup and type
//! enumeration. Calls are synchronous RPCs from the loader's point of
//! view; the loader performs no internal scheduling of its own.
//!
//! [`crate::hetero::HeteroGraph`] is the in-process reference
//! implementation used by tests and single-machine runs.

use std::collections::{HashMap, HashSet};

use crate::batch::NodeSet;
use crate::error::Result;
use crate::hetero::{EdgeType, NodeType};

/// Edges to leave out of neighbor sampling, per edge type.
///
/// Used to keep a minibatch's own target edges (and their declared
/// reverses) out of the message-passing neighborhood.
pub type ExcludedEdges = HashMap<EdgeType, HashSet<(u64, u64)>>;

/// Read-only view of a (possibly partitioned) heterogeneous graph.
///
/// Node and edge IDs are `u64` and local to their type. Implementations
/// must be deterministic for a fixed `seed` argument so that one worker
/// produces a reproducible batch sequence.
pub trait DistGraph {
    /// All node types in the graph.
    fn node_types(&self) -> Vec<NodeType>;

    /// All canonical edge types in the graph.
    fn canonical_etypes(&self) -> Vec<EdgeType>;

    /// Number of nodes of a type (0 if the type is unknown).
    fn num_nodes(&self, ntype: &NodeType) -> usize;

    /// Number of edges of a type (0 if the type is unknown).
    fn num_edges(&self, etype: &EdgeType) -> usize;

    /// Node IDs of a type colocated in this process's partition.
    ///
    /// Local negative-sampling policies draw from this set to avoid
    /// cross-machine fetches. A single-partition store returns every
    /// node of the type.
    fn local_nodes(&self, ntype: &NodeType) -> Vec<u64>;

    /// Whether nodes of this type carry stored input features.
    fn has_node_feats(&self, ntype: &NodeType) -> bool;

    /// Whether edges of this type carry the named boolean mask
    /// (e.g. `train_mask`).
    fn has_edge_mask(&self, etype: &EdgeType, mask: &str) -> bool;

    /// Sample up to `fanout[etype]` in-edges for every seed node, per
    /// edge type. A fanout of 0 skips the type entirely; `usize::MAX`
    /// means "all neighbors". When `mask` is given, edge types carrying
    /// that mask only contribute edges where it is set. Edges listed in
    /// `exclude` are never returned.
    fn sample_in_neighbors(
        &self,
        seeds: &NodeSet,
        fanout: &HashMap<EdgeType, usize>,
        mask: Option<&str>,
        exclude: Option<&ExcludedEdges>,
        seed: u64,
    ) -> HashMap<EdgeType, Vec<(u64, u64)>>;

    /// Look up the (src, dst) endpoints of edges by ID.
    fn find_edges(&self, etype: &EdgeType, eids: &[u64]) -> Result<Vec<(u64, u64)>>;
}
