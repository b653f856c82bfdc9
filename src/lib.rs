//! `graphbatch` is a minibatch sampling and dataloading layer for GNN
//! training over distributed heterogeneous graphs.
//!
//! The distributed graph itself lives behind the [`store::DistGraph`]
//! trait; everything here composes on top of it:
//!
//! - [`sampler`]: neighbor sampling, negative sampling for link
//!   prediction, feature reconstruction hops, and per-edge-type
//!   balanced batching.
//! - [`dataloading`]: epoch-oriented loaders for node, edge and
//!   link-prediction tasks, each yielding self-contained minibatches
//!   (input nodes, targets, message-passing blocks).
//! - [`convert`]: normalization of GConstruct-dialect graph configs
//!   into the `gsprocessing-v1.0` schema.
//!
//! All sampling is seeded and deterministic per worker: the same seed,
//! epoch and step always reproduce the same batch. [`hetero`] provides
//! an in-memory [`hetero::HeteroGraph`] used as the reference store
//! implementation and as the test harness.

pub mod batch;
pub mod convert;
pub mod dataloading;
pub mod error;
pub mod fanout;
pub mod hetero;
pub mod sampler;
pub mod store;

pub use batch::{Block, EdgeSubgraph, NodeSet};
pub use convert::GConstructConverter;
pub use dataloading::{
    EdgeDataLoader, EdgeLoaderConfig, EdgeMinibatch, LinkLoaderConfig, LinkPredictDataLoader,
    LinkPredictMinibatch, LinkPredictTestBatch, LinkPredictTestDataLoader, NodeDataLoader,
    NodeLoaderConfig, NodeMinibatch, SemiSupervisedNodeDataLoader,
};
pub use error::{Error, Result};
pub use fanout::{Fanout, FanoutSpec, ALL_NEIGHBORS};
pub use hetero::{EdgeType, HeteroGraph, NodeType};
pub use sampler::{
    AllEtypeEdgeBatcher, FeatureReconstructSampler, NegativeEdges, NegativePolicy,
    NegativeSampler, NeighborSampler, PosNegTuple, ReconstructFanout,
};
pub use store::{DistGraph, ExcludedEdges};
