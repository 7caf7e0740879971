//! Patch archive access
//!
//! Locating product archives (directory, zip or templated path), resolving
//! patch directories across naming conventions and reading their contents.

mod naming;
mod template;
mod location;
mod resolver;

// Public exports
pub use naming::{parse_patch_dir_name, CoordinateWidth};
pub use template::{product_date, DateTokenResolver, ProductNameResolver};
pub use location::{ArchiveLocation, PatchLocation};
pub use resolver::ArchiveResolver;
