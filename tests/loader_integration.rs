//! End-to-end loader tests over an in-memory heterogeneous graph.

use std::collections::{HashMap, HashSet};

use graphbatch::dataloading::{
    EdgeDataLoader, EdgeLoaderConfig, LinkLoaderConfig, LinkPredictDataLoader,
    LinkPredictTestDataLoader, NodeDataLoader, NodeLoaderConfig,
};
use graphbatch::hetero::{EdgeType, HeteroGraph, NodeType};
use graphbatch::sampler::{NegativeEdges, NegativePolicy};
use graphbatch::{FanoutSpec, ALL_NEIGHBORS};

/// A small bipartite review graph with explicit reverse edges and
/// item-side features.
fn review_graph() -> (HeteroGraph, EdgeType, EdgeType) {
    let user = NodeType::new("user");
    let item = NodeType::new("item");
    let buys = EdgeType::new("user", "buys", "item");
    let rev = buys.reverse();

    let mut g = HeteroGraph::new();
    g.add_nodes(user, 10);
    g.add_nodes(item.clone(), 10);
    let pairs: Vec<(u64, u64)> = (0..10u64)
        .flat_map(|u| (0..4u64).map(move |j| (u, (u + j) % 10)))
        .collect();
    let rev_pairs: Vec<(u64, u64)> = pairs.iter().map(|&(s, d)| (d, s)).collect();
    g.add_edges(buys.clone(), &pairs);
    g.add_edges(rev.clone(), &rev_pairs);
    g.set_node_feats(item, true);
    (g, buys, rev)
}

#[test]
fn edge_loader_never_leaks_target_or_reverse_edges() {
    let (g, buys, rev) = review_graph();
    let targets = HashMap::from([(buys.clone(), (0..40u64).collect::<Vec<_>>())]);
    let reverse_map = HashMap::from([(buys.clone(), rev.clone())]);

    let mut loader = EdgeDataLoader::new(
        &g,
        targets,
        FanoutSpec::uniform(ALL_NEIGHBORS, 2).unwrap(),
        reverse_map,
        &[],
        EdgeLoaderConfig {
            batch_size: 8,
            remove_target_edge_type: true,
            exclude_training_targets: true,
            ..Default::default()
        },
    )
    .unwrap();

    let mut batches = 0;
    while let Some(mb) = loader.next_batch().unwrap() {
        batches += 1;
        // With the target type zeroed out of every hop, no block may
        // carry a target or reverse-target edge at all.
        for block in &mb.blocks {
            assert!(!block.edges.contains_key(&buys));
            assert!(!block.edges.contains_key(&rev));
        }
    }
    assert_eq!(batches, 5);
}

#[test]
fn edge_loader_epochs_reshuffle_but_cover_the_same_index() {
    let (g, buys, _) = review_graph();
    let targets = HashMap::from([(buys.clone(), (0..40u64).collect::<Vec<_>>())]);

    let mut loader = EdgeDataLoader::new(
        &g,
        targets,
        FanoutSpec::uniform(3, 1).unwrap(),
        HashMap::new(),
        &[],
        EdgeLoaderConfig {
            batch_size: 8,
            remove_target_edge_type: false,
            ..Default::default()
        },
    )
    .unwrap();

    let mut first = Vec::new();
    while let Some(mb) = loader.next_batch().unwrap() {
        first.extend(mb.target_edges.eids[&buys].iter().copied());
    }
    loader.reset();
    let mut second = Vec::new();
    while let Some(mb) = loader.next_batch().unwrap() {
        second.extend(mb.target_edges.eids[&buys].iter().copied());
    }

    assert_ne!(first, second);
    let sorted = |mut v: Vec<u64>| {
        v.sort_unstable();
        v
    };
    assert_eq!(sorted(first), sorted(second));
}

#[test]
fn node_loader_with_feature_reconstruction() {
    let (g, _, rev) = review_graph();
    let user = NodeType::new("user");
    let targets = HashMap::from([(user.clone(), (0..10u64).collect::<Vec<_>>())]);

    let mut loader = NodeDataLoader::new(
        &g,
        targets,
        FanoutSpec::uniform(2, 2).unwrap(),
        &[user.clone()],
        NodeLoaderConfig {
            batch_size: 4,
            ..Default::default()
        },
    )
    .unwrap();

    while let Some(mb) = loader.next_batch().unwrap() {
        // Two message-passing blocks plus the reconstruction hop.
        assert_eq!(mb.blocks.len(), 3);
        // The reconstruction hop only draws feature-bearing neighbors,
        // which in this graph means items over the reverse relation.
        for (etype, pairs) in &mb.blocks[0].edges {
            assert_eq!(etype, &rev);
            assert!(!pairs.is_empty());
        }
        // Input nodes cover everything downstream blocks consume.
        for (ntype, ids) in &mb.blocks[0].dst_nodes {
            let inputs: HashSet<u64> = mb.input_nodes[ntype].iter().copied().collect();
            assert!(ids.iter().all(|id| inputs.contains(id)));
        }
    }
}

#[test]
fn link_loader_batches_are_reproducible_per_seed() {
    let (g, buys, _) = review_graph();
    let targets = HashMap::from([(buys.clone(), (0..40u64).collect::<Vec<_>>())]);
    let config = LinkLoaderConfig {
        batch_size: 10,
        num_negative_edges: 4,
        seed: 99,
        ..Default::default()
    };

    let collect = || {
        let mut loader = LinkPredictDataLoader::new(
            &g,
            targets.clone(),
            FanoutSpec::uniform(2, 2).unwrap(),
            NegativePolicy::Uniform,
            HashMap::new(),
            config.clone(),
        )
        .unwrap();
        let mut eids = Vec::new();
        let mut negs = Vec::new();
        while let Some(mb) = loader.next_batch().unwrap() {
            eids.push(mb.pos_edges.eids[&buys].clone());
            let NegativeEdges::PerPositive { dsts, .. } = &mb.neg_edges[&buys] else {
                panic!("uniform policy yields per-positive negatives");
            };
            negs.push(dsts.clone());
        }
        (eids, negs)
    };

    assert_eq!(collect(), collect());
}

#[test]
fn link_test_loader_covers_every_positive_exactly_once() {
    let (g, buys, rev) = review_graph();
    let targets = HashMap::from([
        (buys.clone(), (0..40u64).collect::<Vec<_>>()),
        (rev.clone(), (0..12u64).collect::<Vec<_>>()),
    ]);

    let mut loader =
        LinkPredictTestDataLoader::new(&g, targets, 16, NegativePolicy::GlobalUniform, 8, 5)
            .unwrap();

    let mut per_type: HashMap<EdgeType, usize> = HashMap::new();
    let mut boundary_ok = true;
    while let Some(batch) = loader.next_batch().unwrap() {
        // Each batch belongs to exactly one edge type.
        *per_type.entry(batch.etype.clone()).or_default() += batch.pairs.pos.len();
        boundary_ok &= batch.pairs.pos.len() <= 16;
        assert_eq!(batch.pairs.neg.num_negatives(), 8 * batch.pairs.pos.len());
    }
    assert!(boundary_ok);
    assert_eq!(per_type[&buys], 40);
    assert_eq!(per_type[&rev], 12);
}
