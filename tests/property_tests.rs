//! Property-based tests for the sampling and batching layer.
//!
//! These verify invariants that should hold for any graph and any
//! target index:
//! - balanced batching covers every edge ID exactly once per epoch
//! - negative-sample shapes follow the policy contract
//! - block layouts keep destination nodes as a prefix of the sources

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use graphbatch::hetero::{EdgeType, HeteroGraph, NodeType};
use graphbatch::sampler::{AllEtypeEdgeBatcher, NegativeEdges, NegativePolicy, NegativeSampler};
use graphbatch::{FanoutSpec, NeighborSampler};

mod balanced_props {
    use super::*;

    /// Per-type edge counts: between one and four types, each with
    /// 1..=60 edges.
    fn arb_type_sizes() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(1usize..=60, 1..=4)
    }

    fn target_index(sizes: &[usize]) -> HashMap<EdgeType, Vec<u64>> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let etype = EdgeType::new("user", format!("rel{i}"), "item");
                (etype, (0..n as u64).collect())
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn every_epoch_covers_every_edge_once(
            sizes in arb_type_sizes(),
            batch_size in 1usize..=32,
            seed in any::<u64>(),
        ) {
            let targets = target_index(&sizes);
            let mut batcher =
                AllEtypeEdgeBatcher::new(targets.clone(), batch_size, true, false, seed).unwrap();
            batcher.reset(0);

            let mut seen: HashMap<EdgeType, HashSet<u64>> = HashMap::new();
            let mut batches = 0;
            while let Some(batch) = batcher.next_batch() {
                batches += 1;
                prop_assert!(batches <= batcher.expected_idxs());
                // Balanced mode always draws from every type.
                prop_assert_eq!(batch.len(), targets.len());
                for (etype, eids) in batch {
                    seen.entry(etype).or_default().extend(eids);
                }
            }
            prop_assert_eq!(batches, batcher.expected_idxs());

            // Redraws can repeat edges but never invent them, and the
            // epoch must touch every edge of every type.
            for (etype, eids) in &targets {
                let all: HashSet<u64> = eids.iter().copied().collect();
                prop_assert_eq!(&seen[etype], &all);
            }
        }

        #[test]
        fn drop_last_never_yields_partial_tail(
            sizes in arb_type_sizes(),
            batch_size in 1usize..=32,
            seed in any::<u64>(),
        ) {
            let targets = target_index(&sizes);
            let mut batcher =
                AllEtypeEdgeBatcher::new(targets.clone(), batch_size, false, true, seed).unwrap();
            batcher.reset(0);

            // With drop_last a type only ever contributes full batches,
            // so all its contributions have the same size and their sum
            // never exceeds the type's edge count.
            let mut part_sizes: HashMap<EdgeType, Vec<usize>> = HashMap::new();
            while let Some(batch) = batcher.next_batch() {
                for (etype, eids) in batch {
                    prop_assert!(!eids.is_empty());
                    part_sizes.entry(etype).or_default().push(eids.len());
                }
            }
            for (etype, sizes) in &part_sizes {
                prop_assert!(sizes.windows(2).all(|w| w[0] == w[1]));
                prop_assert!(sizes.iter().sum::<usize>() <= targets[etype].len());
            }
        }
    }
}

mod negative_props {
    use super::*;

    fn ring_graph(num_users: usize, num_items: usize) -> (HeteroGraph, EdgeType) {
        let etype = EdgeType::new("user", "buys", "item");
        let mut g = HeteroGraph::new();
        g.add_nodes(NodeType::new("user"), num_users);
        g.add_nodes(NodeType::new("item"), num_items);
        let pairs: Vec<(u64, u64)> = (0..num_users as u64)
            .map(|u| (u, u % num_items as u64))
            .collect();
        g.add_edges(etype.clone(), &pairs);
        (g, etype)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn per_positive_policies_scale_with_batch(
            num_pos in 1usize..=20,
            k in 1usize..=8,
            seed in any::<u64>(),
        ) {
            let (g, etype) = ring_graph(20, 12);
            let pos: Vec<(u64, u64)> = (0..num_pos as u64).map(|i| (i, i % 12)).collect();
            let positives = HashMap::from([(etype.clone(), pos)]);

            let sampler = NegativeSampler::new(NegativePolicy::Uniform, k).unwrap();
            let neg = &sampler.sample(&g, &positives, seed).unwrap()[&etype];
            let NegativeEdges::PerPositive { srcs, dsts } = neg else {
                panic!("uniform policy must yield per-positive negatives");
            };
            prop_assert_eq!(srcs.len(), num_pos * k);
            prop_assert_eq!(dsts.len(), num_pos * k);
            for &d in dsts {
                prop_assert!(d < 12);
            }
        }

        #[test]
        fn joint_policies_share_one_pool(
            num_pos in 1usize..=20,
            k in 1usize..=8,
            seed in any::<u64>(),
        ) {
            let (g, etype) = ring_graph(20, 12);
            let pos: Vec<(u64, u64)> = (0..num_pos as u64).map(|i| (i, i % 12)).collect();
            let positives = HashMap::from([(etype.clone(), pos)]);

            let sampler = NegativeSampler::new(NegativePolicy::Joint, k).unwrap();
            let neg = &sampler.sample(&g, &positives, seed).unwrap()[&etype];
            let NegativeEdges::Shared { srcs, dsts } = neg else {
                panic!("joint policy must yield a shared pool");
            };
            prop_assert_eq!(srcs.len(), num_pos);
            prop_assert_eq!(dsts.len(), k);
        }

        #[test]
        fn local_policies_stay_in_partition(
            k in 1usize..=8,
            seed in any::<u64>(),
        ) {
            let (mut g, etype) = ring_graph(20, 12);
            let local: Vec<u64> = vec![0, 3, 7, 11];
            g.set_local_nodes(NodeType::new("item"), local.clone());
            let local_set: HashSet<u64> = local.into_iter().collect();

            let positives = HashMap::from([(etype.clone(), vec![(0u64, 0u64), (1, 1)])]);
            let sampler = NegativeSampler::new(NegativePolicy::LocalUniform, k).unwrap();
            let neg = &sampler.sample(&g, &positives, seed).unwrap()[&etype];
            let NegativeEdges::PerPositive { dsts, .. } = neg else {
                panic!("local uniform policy must yield per-positive negatives");
            };
            for d in dsts {
                prop_assert!(local_set.contains(d));
            }
        }
    }
}

mod block_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn dst_nodes_prefix_src_nodes(
            num_seeds in 1usize..=10,
            fanout in 1usize..=5,
            seed in any::<u64>(),
        ) {
            let paper = NodeType::new("paper");
            let cites = EdgeType::new("paper", "cites", "paper");
            let mut g = HeteroGraph::new();
            g.add_nodes(paper.clone(), 30);
            let pairs: Vec<(u64, u64)> = (0..90u64).map(|i| ((i * 7) % 30, i % 30)).collect();
            g.add_edges(cites, &pairs);

            let sampler = NeighborSampler::new(FanoutSpec::uniform(fanout, 2).unwrap());
            let seeds = HashMap::from([(paper.clone(), (0..num_seeds as u64).collect::<Vec<_>>())]);
            let (input_nodes, blocks) = sampler.sample_blocks(&g, &seeds, None, seed);

            prop_assert_eq!(blocks.len(), 2);
            // Outermost sources are exactly the loader's input nodes.
            prop_assert_eq!(&blocks[0].src_nodes, &input_nodes);
            for block in &blocks {
                for (ntype, dsts) in &block.dst_nodes {
                    let srcs = &block.src_nodes[ntype];
                    prop_assert!(dsts.len() <= srcs.len());
                    prop_assert_eq!(&srcs[..dsts.len()], &dsts[..]);
                }
            }
            // Each block's sources feed the next block's destinations.
            prop_assert_eq!(&blocks[1].dst_nodes, &seeds);
            prop_assert_eq!(&blocks[0].dst_nodes, &blocks[1].src_nodes);
        }
    }
}
