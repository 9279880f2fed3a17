//! Greedy seed-based similarity clustering.

use crate::core::cosine_similarity;

/// Groups vectors into clusters of at most `capacity` members.
///
/// Inputs of `capacity` or fewer vectors form a single cluster. Otherwise
/// each unvisited vector, in input order, seeds a new cluster and pulls in
/// later unvisited vectors whose similarity to the seed is at least
/// `threshold`, until the cluster is full. Clusters are returned as index
/// lists in seed order; every input index appears exactly once.
///
/// The seed, not a centroid, defines each cluster, so the result depends on
/// input order and is deterministic for a given order.
#[must_use]
pub fn greedy_clusters<V: AsRef<[f32]>>(
    vectors: &[V],
    capacity: usize,
    threshold: f32,
) -> Vec<Vec<usize>> {
    let capacity = capacity.max(1);
    if vectors.is_empty() {
        return Vec::new();
    }
    if vectors.len() <= capacity {
        return vec![(0..vectors.len()).collect()];
    }

    let mut visited = vec![false; vectors.len()];
    let mut clusters = Vec::new();

    for seed in 0..vectors.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut cluster = vec![seed];

        for candidate in seed + 1..vectors.len() {
            if cluster.len() >= capacity {
                break;
            }
            if visited[candidate] {
                continue;
            }
            let sim = cosine_similarity(vectors[seed].as_ref(), vectors[candidate].as_ref());
            if sim >= threshold {
                visited[candidate] = true;
                cluster.push(candidate);
            }
        }

        clusters.push(cluster);
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_similar_one_outlier() {
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.95, 0.05, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let clusters = greedy_clusters(&vectors, 3, 0.5);
        assert_eq!(clusters, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_small_input_is_one_cluster() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(greedy_clusters(&vectors, 2, 0.99), vec![vec![0, 1]]);
    }

    #[test]
    fn test_capacity_bounds_cluster() {
        let vectors = vec![vec![1.0, 0.0]; 5];
        let clusters = greedy_clusters(&vectors, 2, 0.5);
        assert_eq!(clusters, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_seed_not_centroid() {
        // 1 is close to the seed; 2 is close to 1 but not to the seed.
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.8, 0.6],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
        ];
        let clusters = greedy_clusters(&vectors, 3, 0.7);
        assert_eq!(clusters, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn test_empty_input() {
        let vectors: Vec<Vec<f32>> = Vec::new();
        assert!(greedy_clusters(&vectors, 3, 0.5).is_empty());
    }

    proptest! {
        #[test]
        fn prop_partition_within_capacity(
            vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..40),
            capacity in 1usize..8,
            threshold in 0.05f32..1.0,
        ) {
            let clusters = greedy_clusters(&vectors, capacity, threshold);
            let mut seen: Vec<usize> = clusters.iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..vectors.len()).collect::<Vec<_>>());
            for cluster in &clusters {
                prop_assert!(!cluster.is_empty());
                prop_assert!(cluster.len() <= capacity);
            }
        }

        #[test]
        fn prop_deterministic(
            vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 3), 0..20),
        ) {
            prop_assert_eq!(
                greedy_clusters(&vectors, 3, 0.5),
                greedy_clusters(&vectors, 3, 0.5)
            );
        }
    }
}
