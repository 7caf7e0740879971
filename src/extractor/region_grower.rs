//! Connected-component growth of above-threshold regions
//!
//! The grower labels contiguous samples that pass a threshold test and
//! reports the size of the largest region together with the total number of
//! passing samples. It walks an explicit worklist, so memory is bounded by
//! the patch size and deep regions cannot overflow the stack.

use std::collections::VecDeque;

use super::raster::Tile;

/// How a sample is compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// `sample > threshold`
    #[default]
    Above,
    /// `sample >= threshold`
    AtOrAbove,
    /// `sample < threshold`
    Below,
    /// `sample <= threshold`
    AtOrBelow,
}

impl Comparison {
    /// Test a sample; NaN never passes
    pub fn test(self, sample: f64, threshold: f64) -> bool {
        match self {
            Comparison::Above => sample > threshold,
            Comparison::AtOrAbove => sample >= threshold,
            Comparison::Below => sample < threshold,
            Comparison::AtOrBelow => sample <= threshold,
        }
    }

    /// Parse a comparison from its operator or name
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            ">" | "above" => Some(Comparison::Above),
            ">=" | "at-or-above" => Some(Comparison::AtOrAbove),
            "<" | "below" => Some(Comparison::Below),
            "<=" | "at-or-below" => Some(Comparison::AtOrBelow),
            _ => None,
        }
    }
}

/// Neighbourhood used when growing a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and corner neighbours
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(i64, i64); 8] = [
            (-1, -1), (0, -1), (1, -1),
            (-1, 0), (1, 0),
            (-1, 1), (0, 1), (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Outcome of a region growing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrowthResult {
    /// Size of the largest connected region
    pub max_cluster_size: usize,
    /// Number of samples passing the threshold, over all regions
    pub samples_over_threshold: usize,
    /// Number of distinct regions found
    pub cluster_count: usize,
}

/// Connected-component labelling over one patch of samples
pub struct RegionGrower<'a> {
    width: usize,
    height: usize,
    samples: &'a [f64],
    comparison: Comparison,
    connectivity: Connectivity,
}

impl<'a> RegionGrower<'a> {
    /// Create a grower over a tile with `>` comparison and 8-connectivity
    pub fn new(tile: &'a Tile) -> Self {
        Self::from_samples(tile.width() as usize, tile.height() as usize, &tile.data)
    }

    /// Create a grower over a raw row-major sample grid
    ///
    /// # Arguments
    /// * `width` - Grid width
    /// * `height` - Grid height
    /// * `samples` - Row-major samples; only the first `width * height` are used
    pub fn from_samples(width: usize, height: usize, samples: &'a [f64]) -> Self {
        let height = if width == 0 { 0 } else { height.min(samples.len() / width) };
        RegionGrower {
            width,
            height,
            samples: &samples[..width * height],
            comparison: Comparison::default(),
            connectivity: Connectivity::default(),
        }
    }

    /// Select the threshold comparison
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Select the neighbourhood
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Label all regions passing the threshold
    ///
    /// # Arguments
    /// * `threshold` - Threshold value
    /// * `out` - Receives the samples of every passing pixel, in visiting order
    ///
    /// # Returns
    /// The largest region size and the total count of passing samples
    pub fn run(&self, threshold: f64, out: &mut Vec<f64>) -> GrowthResult {
        let size = self.width * self.height;
        let mut visited = vec![false; size];
        let mut queue = VecDeque::new();
        let mut result = GrowthResult::default();

        for seed in 0..size {
            if visited[seed] || !self.passes(seed, threshold) {
                continue;
            }

            visited[seed] = true;
            queue.push_back(seed);
            let mut cluster_size = 0;

            while let Some(index) = queue.pop_front() {
                cluster_size += 1;
                out.push(self.samples[index]);

                let x = (index % self.width) as i64;
                let y = (index / self.width) as i64;
                for (dx, dy) in self.connectivity.offsets() {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                        continue;
                    }
                    let neighbour = ny as usize * self.width + nx as usize;
                    if !visited[neighbour] && self.passes(neighbour, threshold) {
                        visited[neighbour] = true;
                        queue.push_back(neighbour);
                    }
                }
            }

            result.cluster_count += 1;
            result.samples_over_threshold += cluster_size;
            result.max_cluster_size = result.max_cluster_size.max(cluster_size);
        }

        result
    }

    fn passes(&self, index: usize, threshold: f64) -> bool {
        self.comparison.test(self.samples[index], threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> (usize, usize, Vec<f64>) {
        let width = rows[0].len();
        let data = rows.iter()
            .flat_map(|r| r.chars().map(|c| if c == '#' { 2.0 } else { 0.0 }))
            .collect();
        (width, rows.len(), data)
    }

    #[test]
    fn all_below_threshold_is_empty() {
        let data = vec![0.5; 12];
        let mut out = Vec::new();
        let result = RegionGrower::from_samples(4, 3, &data).run(1.0, &mut out);
        assert_eq!(result.max_cluster_size, 0);
        assert_eq!(result.samples_over_threshold, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn all_above_threshold_is_one_region() {
        let data = vec![5.0; 7 * 5];
        let mut out = Vec::new();
        let result = RegionGrower::from_samples(7, 5, &data).run(1.0, &mut out);
        assert_eq!(result.max_cluster_size, 35);
        assert_eq!(result.samples_over_threshold, 35);
        assert_eq!(result.cluster_count, 1);
        assert_eq!(out.len(), 35);
    }

    #[test]
    fn diagonal_contact_depends_on_connectivity() {
        let (w, h, data) = grid(&[
            "#...",
            ".#..",
            "..##",
            "....",
        ]);
        let mut out = Vec::new();
        let eight = RegionGrower::from_samples(w, h, &data).run(1.0, &mut out);
        assert_eq!(eight.max_cluster_size, 4);
        assert_eq!(eight.cluster_count, 1);

        let four = RegionGrower::from_samples(w, h, &data)
            .with_connectivity(Connectivity::Four)
            .run(1.0, &mut Vec::new());
        assert_eq!(four.max_cluster_size, 2);
        assert_eq!(four.samples_over_threshold, 4);
        assert_eq!(four.cluster_count, 3);
    }

    #[test]
    fn comparison_at_threshold() {
        let data = vec![1.0, 1.0, 0.0, 2.0];
        let strict = RegionGrower::from_samples(2, 2, &data).run(1.0, &mut Vec::new());
        assert_eq!(strict.samples_over_threshold, 1);

        let inclusive = RegionGrower::from_samples(2, 2, &data)
            .with_comparison(Comparison::AtOrAbove)
            .run(1.0, &mut Vec::new());
        assert_eq!(inclusive.samples_over_threshold, 3);
        assert_eq!(inclusive.max_cluster_size, 3);
    }

    #[test]
    fn nan_samples_never_pass() {
        let data = vec![f64::NAN, 3.0, f64::NAN, 3.0];
        let below = RegionGrower::from_samples(2, 2, &data)
            .with_comparison(Comparison::Below)
            .run(10.0, &mut Vec::new());
        assert_eq!(below.samples_over_threshold, 2);
    }

    #[test]
    fn large_region_does_not_overflow() {
        let data = vec![1.0; 300 * 300];
        let result = RegionGrower::from_samples(300, 300, &data)
            .with_connectivity(Connectivity::Four)
            .run(0.0, &mut Vec::new());
        assert_eq!(result.max_cluster_size, 90_000);
    }

    #[test]
    fn result_is_deterministic() {
        let (w, h, data) = grid(&[
            "##..#",
            "#...#",
            "..#..",
            "#.###",
        ]);
        let first = RegionGrower::from_samples(w, h, &data).run(1.0, &mut Vec::new());
        let second = RegionGrower::from_samples(w, h, &data).run(1.0, &mut Vec::new());
        assert_eq!(first, second);
        assert_eq!(first.samples_over_threshold, 10);
    }
}
