//! Binary patch index
//!
//! An index directory holds three files:
//!
//! * `simple.DB.productnames`: i32 name count, then per name a u16 byte
//!   length followed by the UTF-8 bytes
//! * `simple.DB.features`: i32 record count, then fixed-size records of
//!   i32 product index, i32 patch x, i32 patch y and one f64 per feature
//! * `ds-descriptor.xml`: the flattened numeric feature types, in record order
//!
//! All integers and floats are big-endian.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};

use super::QueryInterface;
use crate::archive::ArchiveResolver;
use crate::errors::{FexError, FexResult};
use crate::extractor::Region;
use crate::model::{
    numeric_feature_types, DatasetDescriptor, Feature, FeatureType, FeatureValue, Patch, PatchId, PatchLabel,
    DESCRIPTOR_FILE_NAME,
};

/// Feature record file of an index
pub const FEATURE_DB_FILE: &str = "simple.DB.features";
/// Product name file of an index
pub const NAME_DB_FILE: &str = "simple.DB.productnames";

const HEADER_SIZE: u64 = 4;

fn record_size(feature_count: usize) -> usize {
    3 * 4 + feature_count * 8
}

fn to_i32(value: usize, what: &str) -> FexResult<i32> {
    i32::try_from(value).map_err(|_| FexError::GenericError(format!("Too many {} for the index: {}", what, value)))
}

/// Collects patches and writes them as a binary index
pub struct IndexBuilder {
    descriptor: DatasetDescriptor,
    products: Vec<String>,
    product_index: HashMap<String, usize>,
    records: Vec<(usize, u32, u32, Vec<f64>)>,
}

impl IndexBuilder {
    /// Start an index over the numeric features of a descriptor
    ///
    /// # Arguments
    /// * `descriptor` - Application feature schema
    /// * `allowed` - Optional feature set restricting the indexed features
    pub fn new(descriptor: &DatasetDescriptor, allowed: Option<&HashSet<String>>) -> FexResult<Self> {
        let feature_types = numeric_feature_types(descriptor.feature_types(), allowed);
        Ok(IndexBuilder {
            descriptor: DatasetDescriptor::new(&descriptor.name, &descriptor.version, feature_types)?,
            products: Vec::new(),
            product_index: HashMap::new(),
            records: Vec::new(),
        })
    }

    /// Feature types in record order
    pub fn feature_types(&self) -> &[FeatureType] {
        self.descriptor.feature_types()
    }

    /// Number of patches added so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one patch; missing features are stored as NaN
    pub fn add_patch(&mut self, patch: &Patch) {
        let product = patch.parent_product_name();
        let index = match self.product_index.get(product) {
            Some(&index) => index,
            None => {
                self.products.push(product.to_string());
                self.product_index.insert(product.to_string(), self.products.len() - 1);
                self.products.len() - 1
            }
        };
        let values = patch.numeric_vector(self.descriptor.feature_types());
        self.records.push((index, patch.patch_x(), patch.patch_y(), values));
    }

    /// Add every patch of every product below the resolver's root
    ///
    /// # Returns
    /// The number of patches added
    pub fn add_archive(&mut self, resolver: &ArchiveResolver) -> FexResult<usize> {
        let before = self.records.len();
        for product in resolver.list_products()? {
            for (x, y) in resolver.list_patches(&product)? {
                let patch = resolver.load_patch(&product, x, y, PatchLabel::None)?;
                self.add_patch(&patch);
            }
            debug!("Indexed product '{}'", product);
        }
        Ok(self.records.len() - before)
    }

    /// Write the index files into a directory, creating it if needed
    pub fn write(&self, dir: &Path) -> FexResult<()> {
        fs::create_dir_all(dir)?;

        let mut names = BufWriter::new(File::create(dir.join(NAME_DB_FILE))?);
        names.write_i32::<BigEndian>(to_i32(self.products.len(), "products")?)?;
        for name in &self.products {
            let bytes = name.as_bytes();
            let len = u16::try_from(bytes.len()).map_err(|_| FexError::GenericError(format!(
                "Product name too long for the index: '{}'", name)))?;
            names.write_u16::<BigEndian>(len)?;
            names.write_all(bytes)?;
        }
        names.flush()?;

        let mut features = BufWriter::new(File::create(dir.join(FEATURE_DB_FILE))?);
        features.write_i32::<BigEndian>(to_i32(self.records.len(), "patches")?)?;
        for (product, x, y, values) in &self.records {
            features.write_i32::<BigEndian>(to_i32(*product, "products")?)?;
            features.write_i32::<BigEndian>(to_i32(*x as usize, "patch columns")?)?;
            features.write_i32::<BigEndian>(to_i32(*y as usize, "patch rows")?)?;
            for value in values {
                features.write_f64::<BigEndian>(*value)?;
            }
        }
        features.flush()?;

        self.descriptor.write(&dir.join(DESCRIPTOR_FILE_NAME))?;
        info!("Wrote index of {} patch(es) from {} product(s) to {}",
              self.records.len(), self.products.len(), dir.display());
        Ok(())
    }
}

/// Random-access backend over a binary index
pub struct IndexedQuery {
    feature_types: Vec<FeatureType>,
    product_names: Vec<String>,
    file: Mutex<File>,
    count: usize,
    record_size: usize,
    positions: HashMap<PatchId, usize>,
}

impl IndexedQuery {
    /// Open an index directory
    pub fn open(dir: &Path) -> FexResult<Self> {
        let descriptor = DatasetDescriptor::read(&dir.join(DESCRIPTOR_FILE_NAME))?;
        let feature_types = numeric_feature_types(descriptor.feature_types(), None);
        let product_names = read_product_names(&dir.join(NAME_DB_FILE))?;

        let path = dir.join(FEATURE_DB_FILE);
        let location = path.display().to_string();
        let mut file = File::open(&path)?;
        let count = file.read_i32::<BigEndian>()?;
        let count = usize::try_from(count)
            .map_err(|_| FexError::format(location.clone(), format!("Negative record count {}", count)))?;

        let record_size = record_size(feature_types.len());
        let expected = HEADER_SIZE + (count * record_size) as u64;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(FexError::format(location, format!(
                "Index holds {} bytes, {} records need {}", actual, count, expected)));
        }

        let mut query = IndexedQuery {
            feature_types,
            product_names,
            file: Mutex::new(file),
            count,
            record_size,
            positions: HashMap::with_capacity(count),
        };
        for i in 0..count {
            let (product, x, y, _) = query.read_record(i)?;
            query.positions.entry(PatchId::new(&product, x, y)).or_insert(i);
        }
        info!("Opened index {} with {} patch(es)", dir.display(), count);
        Ok(query)
    }

    pub fn product_names(&self) -> &[String] {
        &self.product_names
    }

    fn check_index(&self, index: usize) -> FexResult<()> {
        if index >= self.count {
            return Err(FexError::NotFound(format!("Patch index {} of {}", index, self.count)));
        }
        Ok(())
    }

    fn read_record(&self, index: usize) -> FexResult<(String, u32, u32, Vec<f64>)> {
        let mut buffer = vec![0u8; self.record_size];
        {
            let mut file = self.file.lock()
                .map_err(|_| FexError::GenericError("Index file lock poisoned".to_string()))?;
            file.seek(SeekFrom::Start(HEADER_SIZE + (index * self.record_size) as u64))?;
            file.read_exact(&mut buffer)?;
        }

        let mut cursor = Cursor::new(buffer);
        let product = cursor.read_i32::<BigEndian>()?;
        let x = cursor.read_i32::<BigEndian>()?;
        let y = cursor.read_i32::<BigEndian>()?;
        let product = usize::try_from(product).ok()
            .and_then(|p| self.product_names.get(p))
            .ok_or_else(|| FexError::format(FEATURE_DB_FILE, format!(
                "Record {} refers to unknown product {}", index, product)))?;
        let (x, y) = match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => (x, y),
            _ => return Err(FexError::format(FEATURE_DB_FILE, format!(
                "Record {} has negative coordinates {}, {}", index, x, y))),
        };

        let mut values = Vec::with_capacity(self.feature_types.len());
        for _ in &self.feature_types {
            values.push(cursor.read_f64::<BigEndian>()?);
        }
        Ok((product.clone(), x, y, values))
    }
}

fn read_product_names(path: &Path) -> FexResult<Vec<String>> {
    let location = path.display().to_string();
    let mut reader = BufReader::new(File::open(path)?);
    let count = reader.read_i32::<BigEndian>()?;
    let count = usize::try_from(count)
        .map_err(|_| FexError::format(location.clone(), format!("Negative name count {}", count)))?;

    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u16::<BigEndian>()? as usize;
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        names.push(String::from_utf8(bytes)
            .map_err(|_| FexError::format(location.clone(), "Product name is not UTF-8"))?);
    }
    Ok(names)
}

impl QueryInterface for IndexedQuery {
    fn count(&self) -> usize {
        self.count
    }

    fn get(&self, index: usize) -> FexResult<Patch> {
        self.check_index(index)?;
        let (product, x, y, values) = self.read_record(index)?;

        let mut patch = Patch::new(&product, x, y, Region::new(0, 0, 0, 0));
        for (feature_type, value) in self.feature_types.iter().zip(values) {
            patch.add_feature(Feature::new(feature_type.clone(), FeatureValue::Number(value))?);
        }
        Ok(patch)
    }

    fn position(&self, id: &PatchId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    fn feature_vector(&self, index: usize) -> FexResult<Vec<f64>> {
        self.check_index(index)?;
        Ok(self.read_record(index)?.3)
    }
}
