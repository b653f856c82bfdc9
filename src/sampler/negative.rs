//! Negative-edge sampling for link prediction.
//!
//! Given a batch of positive (src, dst) pairs per edge type, produce
//! corrupt destination candidates under one of five policies:
//!
//! | Policy | Pool | Shape |
//! |--------|------|-------|
//! | Uniform | full dst population | k per positive |
//! | Joint | full dst population | k shared per batch |
//! | LocalUniform | partition-local dsts | k per positive |
//! | LocalJoint | partition-local dsts | k shared per batch |
//! | GlobalUniform | full graph, test-time only | k per positive |
//!
//! Joint policies trade within-batch negative correlation for sampling
//! cost; local policies trade statistical uniformity for network
//! locality (no cross-machine candidate fetches).

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::prelude::*;
use rand_xorshift::XorShiftRng;

use crate::error::{Error, Result};
use crate::hetero::{EdgeType, NodeType};
use crate::store::DistGraph;

/// The negative-sampling policy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativePolicy {
    /// Independent draws from the full destination population.
    Uniform,
    /// One shared pool per batch from the full destination population.
    Joint,
    /// Independent draws from the local partition.
    LocalUniform,
    /// One shared pool per batch from the local partition.
    LocalJoint,
    /// Independent draws from the entire graph; test-time only.
    GlobalUniform,
}

impl NegativePolicy {
    /// Whether candidates come from the local partition only.
    pub fn is_local(self) -> bool {
        matches!(self, Self::LocalUniform | Self::LocalJoint)
    }

    /// Whether the batch shares one candidate pool.
    pub fn is_joint(self) -> bool {
        matches!(self, Self::Joint | Self::LocalJoint)
    }
}

impl fmt::Display for NegativePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uniform => "uniform",
            Self::Joint => "joint",
            Self::LocalUniform => "localuniform",
            Self::LocalJoint => "localjoint",
            Self::GlobalUniform => "globaluniform",
        };
        f.write_str(name)
    }
}

/// Negative destinations generated for one edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegativeEdges {
    /// `k` corrupt destinations per positive; `srcs[i]` pairs with
    /// `dsts[i]`, giving `k * n` entries for `n` positives.
    PerPositive { srcs: Vec<u64>, dsts: Vec<u64> },
    /// One pool of `k` destinations paired with every positive source.
    Shared { srcs: Vec<u64>, dsts: Vec<u64> },
}

impl NegativeEdges {
    /// Number of negative destination entries.
    pub fn num_negatives(&self) -> usize {
        match self {
            Self::PerPositive { dsts, .. } | Self::Shared { dsts, .. } => dsts.len(),
        }
    }
}

/// Positive pairs and their negatives, as consumed by the
/// link-prediction test loader.
#[derive(Debug, Clone)]
pub struct PosNegTuple {
    /// The positive (src, dst) pairs.
    pub pos: Vec<(u64, u64)>,
    /// The generated negatives.
    pub neg: NegativeEdges,
}

/// Draws negative destinations under a fixed policy.
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    policy: NegativePolicy,
    num_negatives: usize,
}

impl NegativeSampler {
    /// Create a sampler drawing `num_negatives` candidates.
    ///
    /// Fails with a configuration error when `num_negatives` is 0.
    pub fn new(policy: NegativePolicy, num_negatives: usize) -> Result<Self> {
        if num_negatives == 0 {
            return Err(Error::Configuration(
                "number of negative edges must be positive".into(),
            ));
        }
        Ok(Self {
            policy,
            num_negatives,
        })
    }

    /// The sampling policy.
    pub fn policy(&self) -> NegativePolicy {
        self.policy
    }

    /// Negatives requested per positive (or per batch for joint
    /// policies).
    pub fn num_negatives(&self) -> usize {
        self.num_negatives
    }

    fn candidate_pool(&self, graph: &dyn DistGraph, ntype: &NodeType) -> Result<Vec<u64>> {
        let pool = if self.policy.is_local() {
            graph.local_nodes(ntype)
        } else {
            (0..graph.num_nodes(ntype) as u64).collect()
        };
        if pool.is_empty() {
            return Err(Error::Configuration(format!(
                "no negative candidate destinations of type {ntype}"
            )));
        }
        Ok(pool)
    }

    /// Generate negatives for a batch of positive edges.
    ///
    /// Returns one [`NegativeEdges`] per requested edge type. Fails if
    /// a requested type is not a canonical edge type of the graph.
    pub fn sample(
        &self,
        graph: &dyn DistGraph,
        positives: &HashMap<EdgeType, Vec<(u64, u64)>>,
        seed: u64,
    ) -> Result<HashMap<EdgeType, NegativeEdges>> {
        let canonical: HashSet<EdgeType> = graph.canonical_etypes().into_iter().collect();
        let mut etypes: Vec<&EdgeType> = positives.keys().collect();
        etypes.sort();

        let mut out = HashMap::new();
        for (i, etype) in etypes.into_iter().enumerate() {
            if !canonical.contains(etype) {
                return Err(Error::UnknownEdgeType(etype.to_string()));
            }
            let pos = &positives[etype];
            let pool = self.candidate_pool(graph, &etype.dst_type)?;
            let mut rng = XorShiftRng::seed_from_u64(seed.wrapping_add(i as u64));

            let neg = if self.policy.is_joint() {
                let dsts = (0..self.num_negatives)
                    .map(|_| pool[rng.gen_range(0..pool.len())])
                    .collect();
                NegativeEdges::Shared {
                    srcs: pos.iter().map(|&(s, _)| s).collect(),
                    dsts,
                }
            } else {
                let mut srcs = Vec::with_capacity(pos.len() * self.num_negatives);
                let mut dsts = Vec::with_capacity(pos.len() * self.num_negatives);
                for &(src, _) in pos {
                    for _ in 0..self.num_negatives {
                        srcs.push(src);
                        dsts.push(pool[rng.gen_range(0..pool.len())]);
                    }
                }
                NegativeEdges::PerPositive { srcs, dsts }
            };
            out.insert(etype.clone(), neg);
        }
        Ok(out)
    }

    /// Generate (positive, negative) pair tuples for evaluation.
    ///
    /// Only the GlobalUniform and Joint policies support this form;
    /// locality-restricted pools would bias test metrics.
    pub fn gen_neg_pairs(
        &self,
        graph: &dyn DistGraph,
        positives: &HashMap<EdgeType, Vec<(u64, u64)>>,
        seed: u64,
    ) -> Result<HashMap<EdgeType, PosNegTuple>> {
        if !matches!(
            self.policy,
            NegativePolicy::GlobalUniform | NegativePolicy::Joint
        ) {
            return Err(Error::Configuration(format!(
                "policy {} cannot generate test-time pos/neg pairs",
                self.policy
            )));
        }
        let neg = self.sample(graph, positives, seed)?;
        Ok(neg
            .into_iter()
            .map(|(etype, neg)| {
                let pos = positives[&etype].clone();
                (etype, PosNegTuple { pos, neg })
            })
            .collect())
    }
}
