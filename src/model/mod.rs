//! Feature model
//!
//! Value types shared by extraction, archive access and queries: feature
//! types and values, patches and the dataset descriptor.

mod descriptor;
mod feature;
mod patch;

pub use self::descriptor::{DatasetDescriptor, DESCRIPTOR_FILE_NAME};
pub use self::feature::{
    effective_feature_types, format_number, numeric_feature_types, parse_number,
    statistics_attributes, AttributeType, Feature, FeatureType, FeatureValue, ValueType,
};
pub use self::patch::{
    features_to_text, parse_features_text, patch_name, Patch, PatchId, PatchLabel,
};
