//! Summary statistics over band samples

/// Names and descriptions of the statistics attributes, in record order
pub const STATISTICS_ATTRIBUTES: [(&str, &str); 10] = [
    ("mean", "Mean of the valid pixels"),
    ("stdev", "Standard deviation of the valid pixels"),
    ("cvar", "Coefficient of variation of the valid pixels"),
    ("min", "Minimum of the valid pixels"),
    ("max", "Maximum of the valid pixels"),
    ("p10", "10th percentile of the valid pixels"),
    ("p50", "Median of the valid pixels"),
    ("p90", "90th percentile of the valid pixels"),
    ("skewness", "Percentile skewness (p90 - 2 p50 + p10) / (p90 - p10)"),
    ("count", "Number of valid pixels"),
];

/// Statistics of a set of samples
///
/// Percentiles use the nearest-rank rule on the sorted samples. All values
/// are NaN when there are no samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl Statistics {
    /// Compute statistics; the caller filters out invalid samples
    pub fn compute(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Statistics {
                count: 0,
                mean: f64::NAN,
                stdev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                p10: f64::NAN,
                p50: f64::NAN,
                p90: f64::NAN,
            };
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Statistics {
            count: samples.len(),
            mean,
            stdev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p10: percentile(&sorted, 0.10),
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
        }
    }

    /// Coefficient of variation (stdev / mean)
    pub fn cvar(&self) -> f64 {
        self.stdev / self.mean
    }

    /// Percentile-based skewness, (p90 - 2 p50 + p10) / (p90 - p10)
    pub fn skewness(&self) -> f64 {
        (self.p90 - 2.0 * self.p50 + self.p10) / (self.p90 - self.p10)
    }

    /// Attribute values in the order of [`STATISTICS_ATTRIBUTES`]
    pub fn attribute_values(&self) -> Vec<(String, f64)> {
        let values = [
            self.mean,
            self.stdev,
            self.cvar(),
            self.min,
            self.max,
            self.p10,
            self.p50,
            self.p90,
            self.skewness(),
            self.count as f64,
        ];
        STATISTICS_ATTRIBUTES.iter()
            .zip(values.iter())
            .map(|((name, _), v)| (name.to_string(), *v))
            .collect()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
