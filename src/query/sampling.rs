//! Index selection helpers shared by the query backends

use std::cmp::Ordering;

use rand::seq::index;
use rand::RngCore;

/// Pick `n` distinct indices out of `total`, uniformly at random
///
/// When `n` reaches `total` every index is returned exactly once, in order.
pub fn sample_indices(total: usize, n: usize, rng: &mut dyn RngCore) -> Vec<usize> {
    if n >= total {
        return (0..total).collect();
    }
    index::sample(rng, total, n).into_vec()
}

/// Euclidean distance between two feature vectors
///
/// Components that are not finite on either side (a NaN, or the infinite
/// coefficient of variation of a zero-mean patch) are left out.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Indices of the `k` smallest distances; ties keep their original order
///
/// NaN distances rank after every number.
pub fn nearest(distances: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| rank(distances[a], distances[b]));
    order.truncate(k);
    order
}

fn rank(a: f64, b: f64) -> Ordering {
    a.is_nan().cmp(&b.is_nan()).then_with(|| a.total_cmp(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn oversized_sample_returns_everything_once() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_indices(5, 9, &mut rng), vec![0, 1, 2, 3, 4]);
        assert_eq!(sample_indices(5, 5, &mut rng), vec![0, 1, 2, 3, 4]);
        assert!(sample_indices(0, 3, &mut rng).is_empty());
    }

    #[test]
    fn sample_is_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        let picked = sample_indices(100, 30, &mut rng);
        assert_eq!(picked.len(), 30);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 30);
        assert!(picked.iter().all(|&i| i < 100));
    }

    #[test]
    fn nearest_keeps_ties_in_order() {
        assert_eq!(nearest(&[3.0, 1.0, 1.0, 0.5], 3), vec![3, 1, 2]);
        assert_eq!(euclidean_distance(&[0.0, 3.0, f64::NAN], &[4.0, 0.0, 1.0]), 5.0);
    }

    #[test]
    fn infinite_components_are_ignored() {
        let zero_mean = [0.0, f64::INFINITY];
        assert_eq!(euclidean_distance(&zero_mean, &zero_mean), 0.0);
        assert_eq!(euclidean_distance(&[3.0, f64::NEG_INFINITY], &[0.0, 2.0]), 3.0);
    }

    #[test]
    fn nan_distances_rank_last() {
        let distances: Vec<f64> = (0..64)
            .map(|i| if i % 5 == 0 { f64::NAN } else { (64 - i) as f64 })
            .collect();
        let order = nearest(&distances, distances.len());
        assert_eq!(&order[..3], &[63, 62, 61]);
        let nan_count = distances.iter().filter(|d| d.is_nan()).count();
        assert!(order[order.len() - nan_count..].iter().all(|&i| distances[i].is_nan()));
        assert!(order[..order.len() - nan_count].windows(2).all(|w| distances[w[0]] <= distances[w[1]]));
    }
}
