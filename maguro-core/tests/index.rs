//! End-to-end build and search behaviour through the public API.

use maguro_core::{
    DistanceKind, HnswConfig, HnswIndex, NeighbourPolicy, PostProcessing,
};
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rstest::rstest;
use std::collections::{HashSet, VecDeque};

fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0_f32..1.0)).collect())
        .collect()
}

/// Ten well-separated Gaussian blobs, a worst case for graph connectivity.
fn clustered_vectors(per_blob: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut vectors = Vec::new();
    for blob in 0..10 {
        let centre = blob as f32 * 100.0;
        for _ in 0..per_blob {
            vectors.push(
                (0..dim)
                    .map(|_| centre + rng.gen_range(-1.0_f32..1.0))
                    .collect(),
            );
        }
    }
    vectors
}

fn build_index(vectors: &[Vec<f32>], kind: DistanceKind, config: HnswConfig) -> HnswIndex {
    let dim = vectors[0].len();
    let mut index = HnswIndex::new(dim, kind).expect("index");
    for vector in vectors {
        index.add_vector(vector).expect("add");
    }
    index.build(config).expect("build");
    index
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn exact_nearest(vectors: &[Vec<f32>], query: &[f32], k: usize) -> HashSet<usize> {
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.sort_by(|&a, &b| {
        squared_l2(&vectors[a], query).total_cmp(&squared_l2(&vectors[b], query))
    });
    order.into_iter().take(k).collect()
}

fn layer0_component_count(index: &HnswIndex) -> usize {
    let count = index.len();
    let mut seen = vec![false; count];
    let mut components = 0;
    for start in 0..count {
        if seen[start] {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(node) = queue.pop_front() {
            for next in index.neighbours_of(node, 0).expect("layer 0") {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    components
}

#[test]
fn recall_exceeds_ninety_percent_on_uniform_data() {
    let vectors = random_vectors(1000, 128, 11);
    let config = HnswConfig::new(16, 200).expect("config").with_rng_seed(7);
    let index = build_index(&vectors, DistanceKind::L2, config);

    let queries = random_vectors(50, 128, 99);
    let k = 10;
    let mut found = 0;
    for query in &queries {
        let truth = exact_nearest(&vectors, query, k);
        let hits = index.search(query, k, 100).expect("search");
        found += hits.iter().filter(|n| truth.contains(&n.id)).count();
    }
    let recall = found as f64 / (queries.len() * k) as f64;
    assert!(recall >= 0.9, "recall {recall:.3} below threshold");
}

#[rstest]
#[case::naive(NeighbourPolicy::Naive)]
#[case::heuristic(NeighbourPolicy::Heuristic)]
#[case::save_remains(NeighbourPolicy::HeuristicSaveRemains)]
fn degree_caps_and_layer_structure_hold(#[case] policy: NeighbourPolicy) {
    let vectors = random_vectors(300, 8, 21);
    let config = HnswConfig::new(6, 40)
        .expect("config")
        .with_neighbour_policy(policy)
        .with_rng_seed(3);
    let m0 = config.m0();
    let m = config.m();
    let index = build_index(&vectors, DistanceKind::L2, config);

    let max_level = index.max_level().expect("entry level");
    for node in 0..index.len() {
        let top = index.node_level(node).expect("node level");
        assert!(top <= max_level, "node {node} above the entry level");
        for level in 0..=top {
            let neighbours = index.neighbours_of(node, level).expect("list");
            let cap = if level == 0 { m0 } else { m };
            assert!(
                neighbours.len() <= cap,
                "node {node} layer {level}: {} > {cap}",
                neighbours.len()
            );
            for other in neighbours {
                assert_ne!(other, node, "node {node} links to itself");
                assert!(
                    index.node_level(other).expect("level") >= level,
                    "node {node} links to {other} below its layer"
                );
            }
        }
    }
}

#[test]
fn merge_pass_never_worsens_layer0_connectivity() {
    let vectors = clustered_vectors(200, 8, 5);
    let base = HnswConfig::new(4, 20).expect("config").with_rng_seed(17);
    let skip = build_index(&vectors, DistanceKind::L2, base.clone());
    let merged = build_index(
        &vectors,
        DistanceKind::L2,
        base.with_post_processing(PostProcessing::MergeLevel0),
    );
    assert!(layer0_component_count(&merged) <= layer0_component_count(&skip));
}

#[test]
fn single_threaded_builds_with_one_seed_are_identical() {
    let vectors = random_vectors(200, 8, 31);
    let config = HnswConfig::new(6, 40)
        .expect("config")
        .with_neighbour_policy(NeighbourPolicy::Naive)
        .with_n_threads(1)
        .with_rng_seed(77);
    let first = build_index(&vectors, DistanceKind::L2, config.clone());
    let second = build_index(&vectors, DistanceKind::L2, config);
    for node in 0..vectors.len() {
        assert_eq!(
            first.node_level(node).expect("level"),
            second.node_level(node).expect("level")
        );
        for level in 0..=first.node_level(node).expect("level") {
            assert_eq!(
                first.neighbours_of(node, level).expect("list"),
                second.neighbours_of(node, level).expect("list"),
                "node {node} layer {level} diverged"
            );
        }
    }
}

#[test]
fn dot_metric_ranks_by_inner_product() {
    let vectors = vec![
        vec![0.1, 0.1],
        vec![1.0, 1.0],
        vec![3.0, 3.0],
        vec![-2.0, -2.0],
    ];
    let config = HnswConfig::new(2, 8).expect("config");
    let index = build_index(&vectors, DistanceKind::Dot, config);
    let hits = index.search(&[1.0, 1.0], 4, 10).expect("search");
    assert_eq!(hits[0].id, 2, "largest inner product must rank first");
    assert_eq!(hits[3].id, 3, "most negative inner product must rank last");
}

#[test]
fn angular_metric_ignores_magnitude() {
    let vectors = vec![
        vec![1.0, 0.0],
        vec![100.0, 1.0],
        vec![0.0, 1.0],
    ];
    let config = HnswConfig::new(2, 8).expect("config");
    let index = build_index(&vectors, DistanceKind::Angular, config);
    let hits = index.search(&[2.0, 0.0], 3, 10).expect("search");
    assert_eq!(hits[0].id, 0, "same direction must rank first");
    assert_eq!(hits[2].id, 2, "orthogonal vector must rank last");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn search_results_are_sorted_deduplicated_and_in_range(
        seed in any::<u64>(),
        count in 10_usize..80,
        dim in 2_usize..6,
        k in 1_usize..12,
    ) {
        let vectors = random_vectors(count, dim, seed);
        let config = HnswConfig::new(4, 16).expect("config").with_rng_seed(seed);
        let index = build_index(&vectors, DistanceKind::L2, config);
        let query = random_vectors(1, dim, seed.wrapping_add(1)).remove(0);

        let hits = index.search(&query, k, 32).expect("search");
        prop_assert!(hits.len() <= k);
        prop_assert!(!hits.is_empty());
        let mut ids = HashSet::new();
        for window in hits.windows(2) {
            prop_assert!(window[0].distance <= window[1].distance);
        }
        for hit in &hits {
            prop_assert!(hit.id < count);
            prop_assert!(ids.insert(hit.id), "duplicate id {}", hit.id);
        }
    }
}
