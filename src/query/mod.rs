//! Query access to populated patch archives
//!
//! [`QueryInterface`] is the read-side contract used by retrieval and
//! relevance-feedback callers. [`ScanQuery`] keeps a whole archive in memory;
//! [`IndexedQuery`] reads patches on demand from a binary index written by
//! [`IndexBuilder`]. Both answer the same calls identically.

mod sampling;
mod scan;
mod index;

use rand::RngCore;

use crate::errors::{FexError, FexResult};
use crate::model::{FeatureType, Patch, PatchId};

// Public exports
pub use sampling::{euclidean_distance, nearest, sample_indices};
pub use scan::ScanQuery;
pub use index::{IndexBuilder, IndexedQuery, FEATURE_DB_FILE, NAME_DB_FILE};

/// Backend-independent patch queries
pub trait QueryInterface: Send + Sync {
    /// Number of patches available
    fn count(&self) -> usize;

    /// Patch at a position in archive order
    fn get(&self, index: usize) -> FexResult<Patch>;

    /// Position of a patch identity, if known
    fn position(&self, id: &PatchId) -> Option<usize>;

    /// Numeric feature types used for similarity queries
    fn feature_types(&self) -> &[FeatureType];

    /// Values of the patch at `index` in the order of [`feature_types`](Self::feature_types)
    fn feature_vector(&self, index: usize) -> FexResult<Vec<f64>> {
        Ok(self.get(index)?.numeric_vector(self.feature_types()))
    }

    /// Patch by identity
    fn fetch(&self, id: &PatchId) -> FexResult<Patch> {
        let index = self.position(id)
            .ok_or_else(|| FexError::NotFound(format!("Patch {}", id)))?;
        self.get(index)
    }

    /// Up to `n` distinct patches drawn uniformly at random
    ///
    /// When `n` reaches the archive size every patch is returned once.
    fn sample(&self, n: usize) -> FexResult<Vec<Patch>> {
        self.sample_with(n, &mut rand::thread_rng())
    }

    /// [`sample`](Self::sample) using the given random source
    fn sample_with(&self, n: usize, rng: &mut dyn RngCore) -> FexResult<Vec<Patch>> {
        sample_indices(self.count(), n, rng)
            .into_iter()
            .map(|i| self.get(i))
            .collect()
    }

    /// The `k` patches closest to a feature vector, nearest first
    ///
    /// # Arguments
    /// * `vector` - Values in the order of [`feature_types`](Self::feature_types)
    /// * `k` - Maximum number of patches to return
    ///
    /// # Returns
    /// Patches with their `distance` set; equal distances keep archive order
    fn query(&self, vector: &[f64], k: usize) -> FexResult<Vec<Patch>> {
        let types = self.feature_types();
        if vector.len() != types.len() {
            return Err(FexError::Configuration(format!(
                "Query vector has {} values, expected {}", vector.len(), types.len())));
        }

        let mut distances = Vec::with_capacity(self.count());
        for i in 0..self.count() {
            distances.push(euclidean_distance(&self.feature_vector(i)?, vector));
        }

        nearest(&distances, k)
            .into_iter()
            .map(|i| {
                let mut patch = self.get(i)?;
                patch.distance = distances[i];
                Ok(patch)
            })
            .collect()
    }
}
