//! In-memory linear scan backend

use std::collections::{HashMap, HashSet};

use log::info;

use super::QueryInterface;
use crate::archive::ArchiveResolver;
use crate::errors::{FexError, FexResult};
use crate::model::{numeric_feature_types, FeatureType, Patch, PatchId, PatchLabel};

/// Holds every patch of an archive in memory
pub struct ScanQuery {
    feature_types: Vec<FeatureType>,
    patches: Vec<Patch>,
    positions: HashMap<PatchId, usize>,
}

impl ScanQuery {
    /// Create a backend over already loaded patches
    ///
    /// # Arguments
    /// * `feature_types` - Numeric types used for similarity queries
    /// * `patches` - Patches in archive order
    pub fn new(feature_types: Vec<FeatureType>, patches: Vec<Patch>) -> Self {
        let mut positions = HashMap::with_capacity(patches.len());
        for (i, patch) in patches.iter().enumerate() {
            positions.entry(patch.id()).or_insert(i);
        }
        ScanQuery { feature_types, patches, positions }
    }

    /// Load every patch of every product below the resolver's root
    ///
    /// Products are read in name order, patches by row then column.
    pub fn from_archive(resolver: &ArchiveResolver, allowed: Option<&HashSet<String>>) -> FexResult<Self> {
        let mut patches = Vec::new();
        for product in resolver.list_products()? {
            for (x, y) in resolver.list_patches(&product)? {
                patches.push(resolver.load_patch(&product, x, y, PatchLabel::None)?);
            }
        }
        info!("Loaded {} patch(es) from {}", patches.len(), resolver.root().display());
        Ok(Self::new(numeric_feature_types(resolver.feature_types(), allowed), patches))
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }
}

impl QueryInterface for ScanQuery {
    fn count(&self) -> usize {
        self.patches.len()
    }

    fn get(&self, index: usize) -> FexResult<Patch> {
        self.patches.get(index)
            .cloned()
            .ok_or_else(|| FexError::NotFound(format!("Patch index {} of {}", index, self.patches.len())))
    }

    fn position(&self, id: &PatchId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    fn feature_vector(&self, index: usize) -> FexResult<Vec<f64>> {
        self.patches.get(index)
            .map(|p| p.numeric_vector(&self.feature_types))
            .ok_or_else(|| FexError::NotFound(format!("Patch index {} of {}", index, self.patches.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Region;
    use crate::model::{Feature, FeatureValue, ValueType};

    fn backend(n: u32) -> ScanQuery {
        let mean = FeatureType::new("mean", "Mean", ValueType::Number);
        let patches = (0..n)
            .map(|i| {
                let mut patch = Patch::new("P", i, 0, Region::new(0, 0, 1, 1));
                patch.add_feature(Feature::new(mean.clone(), FeatureValue::Number(i as f64)).unwrap());
                patch
            })
            .collect();
        ScanQuery::new(vec![mean], patches)
    }

    #[test]
    fn sample_covers_archive_when_oversized() {
        let q = backend(4);
        let mut xs: Vec<u32> = q.sample(10).unwrap().iter().map(|p| p.patch_x()).collect();
        xs.sort();
        assert_eq!(xs, vec![0, 1, 2, 3]);
        assert_eq!(q.sample(2).unwrap().len(), 2);
    }

    #[test]
    fn fetch_by_identity() {
        let q = backend(3);
        assert_eq!(q.fetch(&PatchId::new("P", 2, 0)).unwrap().patch_x(), 2);
        assert!(matches!(q.fetch(&PatchId::new("P", 9, 9)), Err(FexError::NotFound(_))));
        assert!(q.get(3).is_err());
    }

    #[test]
    fn query_ranks_by_distance() {
        let q = backend(5);
        let found = q.query(&[2.9], 2).unwrap();
        assert_eq!(found.iter().map(|p| p.patch_x()).collect::<Vec<_>>(), vec![3, 2]);
        assert!((found[0].distance - 0.1).abs() < 1e-9);
        assert!(q.query(&[1.0, 2.0], 1).is_err());
    }
}
