//! Patch archive resolution
//!
//! Finds a product's patch collection below an archive root and reads
//! records and images out of it, for both directory and zip archives.
//!
//! A product is looked up as:
//! 1. `<root>/<product>.fex` directory
//! 2. `<root>/<product>.fex.zip` archive
//! 3. the configured data access pattern, resolved for the product and
//!    tried as a zip archive
//!
//! Resolved locations and zip listings are cached for the lifetime of the
//! resolver; archives are assumed not to change once published.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::debug;
use zip::ZipArchive;

use super::location::{ArchiveLocation, PatchLocation};
use super::naming::{parse_patch_dir_name, CoordinateWidth};
use super::template::{DateTokenResolver, ProductNameResolver};
use crate::errors::{FexError, FexResult};
use crate::extractor::Region;
use crate::model::{parse_features_text, FeatureType, Patch, PatchLabel};
use crate::output::{ARCHIVE_DIR_SUFFIX, ARCHIVE_ZIP_SUFFIX, FEATURES_FILE_NAME, PRODUCT_FILE_NAME};

/// Read access to the patch archives below one root directory
pub struct ArchiveResolver {
    root: PathBuf,
    pattern: Option<String>,
    name_resolver: Box<dyn ProductNameResolver>,
    feature_types: Vec<FeatureType>,
    locations: RwLock<HashMap<String, ArchiveLocation>>,
    zip_entries: RwLock<HashMap<PathBuf, Arc<BTreeSet<String>>>>,
}

impl ArchiveResolver {
    /// Create a resolver for an archive root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArchiveResolver {
            root: root.into(),
            pattern: None,
            name_resolver: Box::new(DateTokenResolver),
            feature_types: Vec::new(),
            locations: RwLock::new(HashMap::new()),
            zip_entries: RwLock::new(HashMap::new()),
        }
    }

    /// Use a data access pattern such as `/data/${yyyy}/${MM}/${dd}/${name}`
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Replace the token resolver used for the data access pattern
    pub fn with_name_resolver(mut self, resolver: Box<dyn ProductNameResolver>) -> Self {
        self.name_resolver = resolver;
        self
    }

    /// Feature types used to read patch records
    pub fn with_feature_types(mut self, feature_types: Vec<FeatureType>) -> Self {
        self.feature_types = feature_types;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    /// Locate the patch collection of a product
    ///
    /// # Arguments
    /// * `product_name` - Name of the source product
    ///
    /// # Returns
    /// The archive location, or `ArchiveNotFound` listing every path tried
    pub fn locate_archive(&self, product_name: &str) -> FexResult<ArchiveLocation> {
        if let Some(location) = self.locations.read().ok().and_then(|c| c.get(product_name).cloned()) {
            return Ok(location);
        }

        let location = self.find_archive(product_name)?;
        if let Ok(mut cache) = self.locations.write() {
            cache.insert(product_name.to_string(), location.clone());
        }
        Ok(location)
    }

    fn find_archive(&self, product_name: &str) -> FexResult<ArchiveLocation> {
        let mut attempted = Vec::new();

        let dir = self.root.join(format!("{}{}", product_name, ARCHIVE_DIR_SUFFIX));
        debug!("Looking for patch directory {}", dir.display());
        if dir.is_dir() {
            return Ok(ArchiveLocation::Directory { path: dir });
        }
        attempted.push(dir);

        let zip = self.root.join(format!("{}{}", product_name, ARCHIVE_ZIP_SUFFIX));
        debug!("Looking for patch archive {}", zip.display());
        if zip.is_file() {
            return self.zip_location(zip, product_name);
        }
        attempted.push(zip);

        if let Some(pattern) = &self.pattern {
            match self.name_resolver.resolve(pattern, product_name) {
                Ok(resolved) => {
                    let templated = if resolved.ends_with(".zip") {
                        PathBuf::from(resolved)
                    } else {
                        PathBuf::from(format!("{}{}", resolved, ARCHIVE_ZIP_SUFFIX))
                    };
                    debug!("Looking for templated patch archive {}", templated.display());
                    if templated.is_file() {
                        return self.zip_location(templated, product_name);
                    }
                    attempted.push(templated);
                }
                Err(e) => {
                    debug!("Pattern {} does not apply to '{}': {}", pattern, product_name, e);
                    attempted.push(PathBuf::from(pattern));
                }
            }
        }

        Err(FexError::ArchiveNotFound { product: product_name.to_string(), attempted })
    }

    fn zip_location(&self, zip_path: PathBuf, product_name: &str) -> FexResult<ArchiveLocation> {
        let nested = format!("{}{}/", product_name, ARCHIVE_DIR_SUFFIX);
        let entries = self.zip_entries(&zip_path)?;
        let inner_root = if entries.iter().any(|e| e.starts_with(&nested)) {
            debug!("Using nested layout {} in {}", nested, zip_path.display());
            nested
        } else {
            String::new()
        };
        Ok(ArchiveLocation::Zip { zip_path, inner_root })
    }

    fn zip_entries(&self, zip_path: &Path) -> FexResult<Arc<BTreeSet<String>>> {
        if let Some(entries) = self.zip_entries.read().ok().and_then(|c| c.get(zip_path).cloned()) {
            return Ok(entries);
        }

        let archive = ZipArchive::new(File::open(zip_path)?)?;
        let mut entries = BTreeSet::new();
        for name in archive.file_names() {
            // Directories are implied by the files they contain
            let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
            let mut prefix = String::new();
            for (i, part) in parts.iter().enumerate() {
                prefix.push_str(part);
                if i + 1 < parts.len() || name.ends_with('/') {
                    prefix.push('/');
                }
                entries.insert(prefix.clone());
            }
        }
        let entries = Arc::new(entries);
        if let Ok(mut cache) = self.zip_entries.write() {
            cache.insert(zip_path.to_path_buf(), Arc::clone(&entries));
        }
        Ok(entries)
    }

    /// Whether a container-relative path exists; directories end with `/`
    fn exists(&self, location: &ArchiveLocation, relative: &str) -> FexResult<bool> {
        match location {
            ArchiveLocation::Directory { path } => {
                let target = path.join(relative.trim_end_matches('/'));
                Ok(if relative.ends_with('/') { target.is_dir() } else { target.is_file() })
            }
            ArchiveLocation::Zip { zip_path, inner_root } => {
                let entries = self.zip_entries(zip_path)?;
                Ok(entries.contains(&format!("{}{}", inner_root, relative)))
            }
        }
    }

    /// Names directly below a container-relative directory
    fn list_dir(&self, location: &ArchiveLocation, relative: &str) -> FexResult<Vec<(String, bool)>> {
        match location {
            ArchiveLocation::Directory { path } => {
                let mut names = Vec::new();
                for entry in fs::read_dir(path.join(relative))? {
                    let entry = entry?;
                    names.push((entry.file_name().to_string_lossy().into_owned(), entry.path().is_dir()));
                }
                Ok(names)
            }
            ArchiveLocation::Zip { zip_path, inner_root } => {
                let prefix = if relative.is_empty() {
                    inner_root.clone()
                } else {
                    format!("{}{}/", inner_root, relative.trim_end_matches('/'))
                };
                let entries = self.zip_entries(zip_path)?;
                Ok(entries.iter()
                    .filter_map(|e| e.strip_prefix(&prefix))
                    .filter(|rest| !rest.is_empty())
                    .filter_map(|rest| match rest.split_once('/') {
                        None => Some((rest.to_string(), false)),
                        Some((dir, "")) => Some((dir.to_string(), true)),
                        Some(_) => None,
                    })
                    .collect())
            }
        }
    }

    fn read_bytes(&self, location: &ArchiveLocation, relative: &str) -> FexResult<Vec<u8>> {
        match location {
            ArchiveLocation::Directory { path } => Ok(fs::read(path.join(relative))?),
            ArchiveLocation::Zip { zip_path, inner_root } => {
                let mut archive = ZipArchive::new(File::open(zip_path)?)?;
                let mut entry = archive.by_name(&format!("{}{}", inner_root, relative))?;
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }

    /// Locate the directory of one patch
    ///
    /// Tries the naming conventions of [`CoordinateWidth::LOOKUP_ORDER`];
    /// the first existing directory wins.
    pub fn locate_patch(&self, product_name: &str, x: u32, y: u32) -> FexResult<PatchLocation> {
        let archive = self.locate_archive(product_name)?;
        let mut attempted = Vec::new();
        for width in CoordinateWidth::LOOKUP_ORDER {
            let dir_name = width.dir_name(x, y);
            if attempted.contains(&dir_name) {
                continue;
            }
            if self.exists(&archive, &format!("{}/", dir_name))? {
                return Ok(PatchLocation { archive, dir_name });
            }
            attempted.push(dir_name);
        }

        Err(FexError::PatchNotFound {
            product: product_name.to_string(),
            x,
            y,
            attempted: attempted.iter().map(|d| archive.reference(d)).collect(),
        })
    }

    /// Raw `features.txt` record of a patch
    pub fn read_feature_text(&self, product_name: &str, x: u32, y: u32) -> FexResult<String> {
        let patch = self.locate_patch(product_name, x, y)?;
        self.read_record(&patch)
    }

    fn read_record(&self, patch: &PatchLocation) -> FexResult<String> {
        let reference = patch.reference(FEATURES_FILE_NAME);
        let bytes = self.read_bytes(&patch.archive, &patch.relative(FEATURES_FILE_NAME))
            .map_err(|e| FexError::format(reference.clone(), format!("Cannot read feature record: {}", e)))?;
        String::from_utf8(bytes).map_err(|_| FexError::format(reference, "Feature record is not UTF-8"))
    }

    /// Load a patch with the features of its record
    pub fn load_patch(&self, product_name: &str, x: u32, y: u32, label: PatchLabel) -> FexResult<Patch> {
        let location = self.locate_patch(product_name, x, y)?;
        let text = self.read_record(&location)?;

        let mut patch = Patch::new(product_name, x, y, Region::new(0, 0, 0, 0));
        patch.set_features(parse_features_text(&text, &self.feature_types, &location.reference(FEATURES_FILE_NAME))?);
        patch.label = label;
        Ok(patch)
    }

    /// File names of the quicklook images of a patch, sorted
    pub fn list_quicklooks(&self, product_name: &str, x: u32, y: u32) -> FexResult<Vec<String>> {
        let patch = self.locate_patch(product_name, x, y)?;
        let mut names: Vec<String> = self.list_dir(&patch.archive, &patch.dir_name)?
            .into_iter()
            .filter(|(name, is_dir)| !is_dir && name.to_ascii_lowercase().ends_with(".png"))
            .map(|(name, _)| name)
            .collect();
        names.sort();
        Ok(names)
    }

    fn image_name(&self, product_name: &str, x: u32, y: u32, image_name: Option<&str>) -> FexResult<String> {
        match image_name {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => self.list_quicklooks(product_name, x, y)?
                .into_iter()
                .next()
                .ok_or_else(|| FexError::NotFound(format!(
                    "No quicklook image for patch x{:03}y{:03} of '{}'", x, y, product_name))),
        }
    }

    /// Reference to a quicklook image; the first one when no name is given
    ///
    /// Images in zip archives are referenced as `<zip>!/<entry>`.
    pub fn resolve_image_path(&self, product_name: &str, x: u32, y: u32, image_name: Option<&str>) -> FexResult<String> {
        let name = self.image_name(product_name, x, y, image_name)?;
        Ok(self.locate_patch(product_name, x, y)?.reference(&name))
    }

    /// Encoded bytes of a quicklook image
    pub fn read_image_bytes(&self, product_name: &str, x: u32, y: u32, image_name: Option<&str>) -> FexResult<Vec<u8>> {
        let name = self.image_name(product_name, x, y, image_name)?;
        let patch = self.locate_patch(product_name, x, y)?;
        if !self.exists(&patch.archive, &patch.relative(&name))? {
            return Err(FexError::NotFound(patch.reference(&name)));
        }
        self.read_bytes(&patch.archive, &patch.relative(&name))
    }

    /// Reference to the patch sub-product header, if one was written
    pub fn patch_product_path(&self, product_name: &str, x: u32, y: u32) -> FexResult<Option<String>> {
        let patch = self.locate_patch(product_name, x, y)?;
        if self.exists(&patch.archive, &patch.relative(PRODUCT_FILE_NAME))? {
            Ok(Some(patch.reference(PRODUCT_FILE_NAME)))
        } else {
            Ok(None)
        }
    }

    /// Coordinates of every patch of a product, sorted by row then column
    pub fn list_patches(&self, product_name: &str) -> FexResult<Vec<(u32, u32)>> {
        let archive = self.locate_archive(product_name)?;
        let mut patches: Vec<(u32, u32)> = self.list_dir(&archive, "")?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .filter_map(|(name, _)| parse_patch_dir_name(&name))
            .collect();
        patches.sort_by_key(|&(x, y)| (y, x));
        patches.dedup();
        Ok(patches)
    }

    /// Names of every product archived directly below the root, sorted
    pub fn list_products(&self) -> FexResult<Vec<String>> {
        let mut products = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if path.is_dir() {
                if let Some(product) = name.strip_suffix(ARCHIVE_DIR_SUFFIX) {
                    products.insert(product.to_string());
                }
            } else if let Some(product) = name.strip_suffix(ARCHIVE_ZIP_SUFFIX) {
                products.insert(product.to_string());
            }
        }
        Ok(products.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_dir_archive(root: &Path, product: &str, patch_dir: &str) {
        let dir = root.join(format!("{}.fex", product)).join(patch_dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("features.txt"), "mean = 1.5\n").unwrap();
        fs::write(dir.join("rgb_ql.png"), b"png").unwrap();
        fs::write(dir.join("a_ql.png"), b"png").unwrap();
    }

    fn write_zip_archive(path: &Path, prefix: &str, patch_dir: &str) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file(format!("{}{}/features.txt", prefix, patch_dir), options).unwrap();
        zip.write_all(b"mean = 2.5\n").unwrap();
        zip.start_file(format!("{}{}/chl_ql.png", prefix, patch_dir), options).unwrap();
        zip.write_all(b"png-bytes").unwrap();
        zip.finish().unwrap();
    }

    fn resolver(root: &Path) -> ArchiveResolver {
        ArchiveResolver::new(root)
            .with_feature_types(vec![FeatureType::new("mean", "Mean", ValueType::Number)])
    }

    #[test]
    fn directory_is_preferred_over_zip() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_archive(dir.path(), "P", "x001y002");
        write_zip_archive(&dir.path().join("P.fex.zip"), "", "x001y002");

        let location = resolver(dir.path()).locate_archive("P").unwrap();
        assert_eq!(location, ArchiveLocation::Directory { path: dir.path().join("P.fex") });
    }

    #[test]
    fn reads_directory_archive() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_archive(dir.path(), "P", "x001y002");
        let resolver = resolver(dir.path());

        let patch = resolver.load_patch("P", 1, 2, PatchLabel::Relevant).unwrap();
        assert_eq!(patch.feature("mean").unwrap().number(), Some(1.5));
        assert_eq!(patch.label, PatchLabel::Relevant);
        assert_eq!(resolver.list_quicklooks("P", 1, 2).unwrap(), vec!["a_ql.png", "rgb_ql.png"]);
        assert!(resolver.resolve_image_path("P", 1, 2, None).unwrap().ends_with("x001y002/a_ql.png"));
        assert_eq!(resolver.patch_product_path("P", 1, 2).unwrap(), None);
        assert_eq!(resolver.list_patches("P").unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn legacy_two_digit_names_are_found() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_archive(dir.path(), "P", "x01y02");
        let location = resolver(dir.path()).locate_patch("P", 1, 2).unwrap();
        assert_eq!(location.dir_name, "x01y02");
    }

    #[test]
    fn missing_patch_reports_attempts() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_archive(dir.path(), "P", "x001y002");
        let err = resolver(dir.path()).locate_patch("P", 7, 8).unwrap_err();
        match err {
            FexError::PatchNotFound { product, x, y, attempted } => {
                assert_eq!((product.as_str(), x, y), ("P", 7, 8));
                assert_eq!(attempted.len(), 2);
                assert!(attempted[1].ends_with("x07y08"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn reads_zip_archive_with_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("Q.fex.zip");
        write_zip_archive(&zip_path, "Q.fex/", "x000y008");
        let resolver = resolver(dir.path());

        let location = resolver.locate_archive("Q").unwrap();
        assert_eq!(location, ArchiveLocation::Zip { zip_path: zip_path.clone(), inner_root: "Q.fex/".to_string() });
        assert_eq!(resolver.read_feature_text("Q", 0, 8).unwrap(), "mean = 2.5\n");
        assert_eq!(resolver.read_image_bytes("Q", 0, 8, Some("chl_ql.png")).unwrap(), b"png-bytes");
        assert_eq!(resolver.resolve_image_path("Q", 0, 8, None).unwrap(),
                   format!("{}!/Q.fex/x000y008/chl_ql.png", zip_path.display()));
        assert_eq!(resolver.list_patches("Q").unwrap(), vec![(0, 8)]);
    }

    #[test]
    fn templated_location_is_tried_last() {
        let dir = tempfile::tempdir().unwrap();
        let product = "MER_RR__1PRACR20080713_184950_000026382070_00185_33305_0000.N1";
        let dated = dir.path().join("2008/07/13");
        fs::create_dir_all(&dated).unwrap();
        write_zip_archive(&dated.join(format!("{}.fex.zip", product)), "", "x000y000");

        let pattern = format!("{}/${{yyyy}}/${{MM}}/${{dd}}/${{name}}", dir.path().display());
        let root = dir.path().join("empty");
        fs::create_dir_all(&root).unwrap();
        let resolver = resolver(&root).with_pattern(&pattern);
        assert!(resolver.locate_archive(product).unwrap().is_zip());

        let err = resolver.locate_archive("MER_RR__1PRACR20090101_0").unwrap_err();
        match err {
            FexError::ArchiveNotFound { attempted, .. } => assert_eq!(attempted.len(), 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn undated_product_ends_in_archive_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path()).with_pattern("/nowhere/${yyyy}/${name}");

        match resolver.locate_archive("plain_product").unwrap_err() {
            FexError::ArchiveNotFound { product, attempted } => {
                assert_eq!(product, "plain_product");
                assert_eq!(attempted, vec![
                    dir.path().join("plain_product.fex"),
                    dir.path().join("plain_product.fex.zip"),
                    PathBuf::from("/nowhere/${yyyy}/${name}"),
                ]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn lists_products_of_both_kinds() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_archive(dir.path(), "A", "x000y000");
        write_zip_archive(&dir.path().join("B.fex.zip"), "", "x000y000");
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(resolver(dir.path()).list_products().unwrap(), vec!["A", "B"]);
    }
}
