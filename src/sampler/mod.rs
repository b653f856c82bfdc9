//! Sampling primitives behind the dataloaders.
//!
//! - [`neighbor`] - multi-layer neighbor sampling into message-passing
//!   blocks
//! - [`negative`] - negative-edge generation for link prediction
//! - [`reconstruct`] - the extra input hop that synthesizes features
//!   for node types without stored features
//! - [`balanced`] - per-edge-type balanced positive-edge batching

pub mod balanced;
pub mod negative;
pub mod neighbor;
pub mod reconstruct;

pub use balanced::AllEtypeEdgeBatcher;
pub use negative::{NegativeEdges, NegativePolicy, NegativeSampler, PosNegTuple};
pub use neighbor::NeighborSampler;
pub use reconstruct::{FeatureReconstructSampler, ReconstructFanout};
