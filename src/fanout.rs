//! Layer-wise neighbor fanout specification.
//!
//! Each GNN layer samples up to *fanout* neighbors per node per hop.
//! A layer's fanout is either one integer applied to every edge type or
//! a per-edge-type map; [`FanoutSpec`] holds one entry per
//! message-passing layer, outermost layer first.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hetero::EdgeType;

/// Fanout sentinel meaning "take every neighbor".
pub const ALL_NEIGHBORS: usize = usize::MAX;

/// Fanout for one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Fanout {
    /// The same fanout for every edge type.
    Uniform(usize),
    /// A fanout per edge type; absent types are not sampled.
    PerEdgeType(HashMap<EdgeType, usize>),
}

impl Fanout {
    /// The fanout applied to one edge type.
    pub fn resolve(&self, etype: &EdgeType) -> usize {
        match self {
            Fanout::Uniform(k) => *k,
            Fanout::PerEdgeType(map) => map.get(etype).copied().unwrap_or(0),
        }
    }

    /// Expand to an explicit per-edge-type map over the given types.
    pub fn for_etypes(&self, etypes: &[EdgeType]) -> HashMap<EdgeType, usize> {
        etypes
            .iter()
            .map(|et| (et.clone(), self.resolve(et)))
            .collect()
    }
}

/// Fanouts for every message-passing layer, outermost first.
///
/// Invariant: the number of entries equals the number of GNN layers,
/// which is why construction through [`FanoutSpec::new`] rejects an
/// empty list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutSpec {
    layers: Vec<Fanout>,
}

impl FanoutSpec {
    /// Create a spec from per-layer fanouts.
    pub fn new(layers: Vec<Fanout>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Configuration(
                "fanout spec must cover at least one layer".into(),
            ));
        }
        Ok(Self { layers })
    }

    /// A uniform fanout of `k` for `num_layers` layers.
    pub fn uniform(k: usize, num_layers: usize) -> Result<Self> {
        Self::new(vec![Fanout::Uniform(k); num_layers])
    }

    /// Number of message-passing layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Per-layer fanouts, outermost first.
    pub fn layers(&self) -> &[Fanout] {
        &self.layers
    }
}

/// Rewrite a fanout spec so that every hop samples 0 edges of the
/// target edge types.
///
/// Used when the target edge type (and its declared reverse) must be
/// excluded from message passing, so the model cannot observe the label
/// edge it is asked to predict.
pub fn modify_fanout_for_target_etype(
    spec: &FanoutSpec,
    etypes: &[EdgeType],
    target_etypes: &HashSet<EdgeType>,
) -> FanoutSpec {
    let layers = spec
        .layers
        .iter()
        .map(|layer| {
            let map = etypes
                .iter()
                .map(|et| {
                    let k = if target_etypes.contains(et) {
                        0
                    } else {
                        layer.resolve(et)
                    };
                    (et.clone(), k)
                })
                .collect();
            Fanout::PerEdgeType(map)
        })
        .collect();
    // Non-empty input implies non-empty output.
    FanoutSpec { layers }
}
