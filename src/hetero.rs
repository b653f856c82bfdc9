//! Heterogeneous graph typing and the in-process reference store.
//!
//! A heterogeneous graph has multiple node types and *canonical* edge
//! types: (source-type, relation, destination-type) triples. The
//! dataloaders in this crate only see graphs through the
//! [`DistGraph`](crate::store::DistGraph) trait; [`HeteroGraph`] is the
//! single-partition, in-memory implementation used by tests and
//! single-machine runs.
//!
//! # Example
//!
//! ```rust
//! use graphbatch::hetero::{EdgeType, HeteroGraph, NodeType};
//! use graphbatch::store::DistGraph;
//!
//! let mut g = HeteroGraph::new();
//! g.add_nodes(NodeType::new("user"), 3);
//! g.add_nodes(NodeType::new("item"), 2);
//!
//! let buys = EdgeType::new("user", "buys", "item");
//! g.add_edges(buys.clone(), &[(0, 0), (1, 0), (2, 1)]);
//!
//! assert_eq!(g.num_edges(&buys), 3);
//! ```

use std::collections::HashMap;
use std::fmt;

use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};

use crate::batch::NodeSet;
use crate::error::{Error, Result};
use crate::store::{DistGraph, ExcludedEdges};

/// A node type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeType(pub String);

impl NodeType {
    /// Create a new node type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical edge type: (src_type, relation, dst_type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeType {
    /// Source node type.
    pub src_type: NodeType,
    /// Relation name.
    pub relation: String,
    /// Destination node type.
    pub dst_type: NodeType,
}

impl EdgeType {
    /// Create a new canonical edge type.
    pub fn new(
        src_type: impl Into<NodeType>,
        relation: impl Into<String>,
        dst_type: impl Into<NodeType>,
    ) -> Self {
        Self {
            src_type: src_type.into(),
            relation: relation.into(),
            dst_type: dst_type.into(),
        }
    }

    /// The semantic reverse of this edge type.
    pub fn reverse(&self) -> Self {
        Self {
            src_type: self.dst_type.clone(),
            relation: format!("rev_{}", self.relation),
            dst_type: self.src_type.clone(),
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.src_type, self.relation, self.dst_type
        )
    }
}

#[derive(Debug, Clone, Default)]
struct NodeData {
    num_nodes: usize,
    has_feats: bool,
    /// Partition-local node IDs; `None` means the whole type is local.
    local: Option<Vec<u64>>,
}

/// COO edge storage for one canonical edge type, with optional named
/// boolean masks aligned to edge IDs.
#[derive(Debug, Clone, Default)]
struct EdgeData {
    src: Vec<u64>,
    dst: Vec<u64>,
    masks: HashMap<String, Vec<bool>>,
}

impl EdgeData {
    fn num_edges(&self) -> usize {
        self.src.len()
    }
}

/// A single-partition heterogeneous graph.
///
/// Edge IDs of a type are assigned densely in insertion order. Split
/// masks follow the `train_mask`/`val_mask`/`test_mask` naming
/// convention; mask editing lives here because the distributed engine
/// treats masks as opaque named edge attributes.
#[derive(Debug, Clone, Default)]
pub struct HeteroGraph {
    nodes: HashMap<NodeType, NodeData>,
    edges: HashMap<EdgeType, EdgeData>,
}

impl HeteroGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` nodes of a type, returning the new node count.
    pub fn add_nodes(&mut self, ntype: impl Into<NodeType>, count: usize) -> usize {
        let data = self.nodes.entry(ntype.into()).or_default();
        data.num_nodes += count;
        data.num_nodes
    }

    /// Mark whether nodes of a type carry stored input features.
    pub fn set_node_feats(&mut self, ntype: impl Into<NodeType>, has_feats: bool) {
        self.nodes.entry(ntype.into()).or_default().has_feats = has_feats;
    }

    /// Restrict the partition-local node set of a type.
    pub fn set_local_nodes(&mut self, ntype: impl Into<NodeType>, local: Vec<u64>) {
        self.nodes.entry(ntype.into()).or_default().local = Some(local);
    }

    /// Add edges of a type, growing endpoint node counts as needed.
    /// Returns the edge IDs assigned to `pairs`, in order.
    pub fn add_edges(&mut self, etype: EdgeType, pairs: &[(u64, u64)]) -> Vec<u64> {
        let max_src = pairs.iter().map(|&(s, _)| s + 1).max().unwrap_or(0) as usize;
        let max_dst = pairs.iter().map(|&(_, d)| d + 1).max().unwrap_or(0) as usize;
        {
            let src_data = self.nodes.entry(etype.src_type.clone()).or_default();
            src_data.num_nodes = src_data.num_nodes.max(max_src);
        }
        {
            let dst_data = self.nodes.entry(etype.dst_type.clone()).or_default();
            dst_data.num_nodes = dst_data.num_nodes.max(max_dst);
        }

        let data = self.edges.entry(etype).or_default();
        let first = data.num_edges() as u64;
        for &(s, d) in pairs {
            data.src.push(s);
            data.dst.push(d);
        }
        (first..first + pairs.len() as u64).collect()
    }

    /// Attach a named boolean mask to an edge type. The mask length
    /// must equal the edge count of the type.
    pub fn set_edge_mask(
        &mut self,
        etype: &EdgeType,
        name: impl Into<String>,
        mask: Vec<bool>,
    ) -> Result<()> {
        let data = self
            .edges
            .get_mut(etype)
            .ok_or_else(|| Error::UnknownEdgeType(etype.to_string()))?;
        if mask.len() != data.num_edges() {
            return Err(Error::Configuration(format!(
                "mask length {} does not match {} edges of type {}",
                mask.len(),
                data.num_edges(),
                etype
            )));
        }
        data.masks.insert(name.into(), mask);
        Ok(())
    }

    /// Edge IDs of a type for which the named mask is set.
    pub fn masked_eids(&self, etype: &EdgeType, name: &str) -> Option<Vec<u64>> {
        let mask = self.edges.get(etype)?.masks.get(name)?;
        Some(
            mask.iter()
                .enumerate()
                .filter(|(_, &m)| m)
                .map(|(i, _)| i as u64)
                .collect(),
        )
    }
}

impl DistGraph for HeteroGraph {
    fn node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.nodes.keys().cloned().collect();
        types.sort();
        types
    }

    fn canonical_etypes(&self) -> Vec<EdgeType> {
        let mut types: Vec<EdgeType> = self.edges.keys().cloned().collect();
        types.sort();
        types
    }

    fn num_nodes(&self, ntype: &NodeType) -> usize {
        self.nodes.get(ntype).map_or(0, |d| d.num_nodes)
    }

    fn num_edges(&self, etype: &EdgeType) -> usize {
        self.edges.get(etype).map_or(0, EdgeData::num_edges)
    }

    fn local_nodes(&self, ntype: &NodeType) -> Vec<u64> {
        match self.nodes.get(ntype) {
            Some(data) => match &data.local {
                Some(local) => local.clone(),
                None => (0..data.num_nodes as u64).collect(),
            },
            None => Vec::new(),
        }
    }

    fn has_node_feats(&self, ntype: &NodeType) -> bool {
        self.nodes.get(ntype).is_some_and(|d| d.has_feats)
    }

    fn has_edge_mask(&self, etype: &EdgeType, mask: &str) -> bool {
        self.edges
            .get(etype)
            .is_some_and(|d| d.masks.contains_key(mask))
    }

    fn sample_in_neighbors(
        &self,
        seeds: &NodeSet,
        fanout: &HashMap<EdgeType, usize>,
        mask: Option<&str>,
        exclude: Option<&ExcludedEdges>,
        seed: u64,
    ) -> HashMap<EdgeType, Vec<(u64, u64)>> {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let mut out = HashMap::new();

        // Sorted etype order keeps sampling deterministic per seed.
        let mut etypes: Vec<&EdgeType> = self.edges.keys().collect();
        etypes.sort();

        for etype in etypes {
            let k = fanout.get(etype).copied().unwrap_or(0);
            if k == 0 {
                continue;
            }
            let Some(seed_ids) = seeds.get(&etype.dst_type) else {
                continue;
            };
            let data = &self.edges[etype];
            let mask_bits = mask.and_then(|m| data.masks.get(m));
            let excluded = exclude.and_then(|e| e.get(etype));

            let mut by_dst: HashMap<u64, Vec<usize>> = HashMap::new();
            for i in 0..data.num_edges() {
                if mask_bits.is_some_and(|m| !m[i]) {
                    continue;
                }
                if excluded.is_some_and(|x| x.contains(&(data.src[i], data.dst[i]))) {
                    continue;
                }
                by_dst.entry(data.dst[i]).or_default().push(i);
            }

            let mut pairs = Vec::new();
            for &dst in seed_ids {
                let Some(cands) = by_dst.get(&dst) else {
                    continue;
                };
                if cands.len() <= k {
                    pairs.extend(cands.iter().map(|&i| (data.src[i], dst)));
                } else {
                    pairs.extend(
                        cands
                            .choose_multiple(&mut rng, k)
                            .map(|&i| (data.src[i], dst)),
                    );
                }
            }
            if !pairs.is_empty() {
                out.insert(etype.clone(), pairs);
            }
        }
        out
    }

    fn find_edges(&self, etype: &EdgeType, eids: &[u64]) -> Result<Vec<(u64, u64)>> {
        let data = self
            .edges
            .get(etype)
            .ok_or_else(|| Error::UnknownEdgeType(etype.to_string()))?;
        let mut pairs = Vec::with_capacity(eids.len());
        for &eid in eids {
            let i = eid as usize;
            if i >= data.num_edges() {
                return Err(Error::EdgeIdOutOfRange {
                    etype: etype.to_string(),
                    eid,
                    num_edges: data.num_edges(),
                });
            }
            pairs.push((data.src[i], data.dst[i]));
        }
        Ok(pairs)
    }
}
