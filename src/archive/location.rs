//! Resolved archive and patch locations

use std::fmt;
use std::path::{Path, PathBuf};

/// Where one product's patch collection lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLocation {
    /// A plain `<product>.fex` directory
    Directory { path: PathBuf },
    /// A `<product>.fex.zip` archive
    Zip {
        zip_path: PathBuf,
        /// Entry prefix of the patch container, empty for the archive root
        /// or `<product>.fex/` for the nested legacy layout
        inner_root: String,
    },
}

impl ArchiveLocation {
    /// File holding the archive
    pub fn path(&self) -> &Path {
        match self {
            ArchiveLocation::Directory { path } => path,
            ArchiveLocation::Zip { zip_path, .. } => zip_path,
        }
    }

    pub fn is_zip(&self) -> bool {
        matches!(self, ArchiveLocation::Zip { .. })
    }

    /// Printable reference to a path relative to the container
    ///
    /// Directory archives give a filesystem path, zip archives the
    /// `<zip>!/<entry>` form.
    pub fn reference(&self, relative: &str) -> String {
        match self {
            ArchiveLocation::Directory { path } => path.join(relative).display().to_string(),
            ArchiveLocation::Zip { zip_path, inner_root } => {
                format!("{}!/{}{}", zip_path.display(), inner_root, relative)
            }
        }
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveLocation::Directory { path } => write!(f, "{}", path.display()),
            ArchiveLocation::Zip { zip_path, inner_root } if inner_root.is_empty() => {
                write!(f, "{}", zip_path.display())
            }
            ArchiveLocation::Zip { zip_path, inner_root } => {
                write!(f, "{}!/{}", zip_path.display(), inner_root.trim_end_matches('/'))
            }
        }
    }
}

/// A resolved patch directory inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLocation {
    pub archive: ArchiveLocation,
    /// Patch directory name, e.g. `x003y012`
    pub dir_name: String,
}

impl PatchLocation {
    /// Container-relative path of a file in the patch directory
    pub fn relative(&self, file_name: &str) -> String {
        format!("{}/{}", self.dir_name, file_name)
    }

    /// Printable reference to a file in the patch directory
    pub fn reference(&self, file_name: &str) -> String {
        self.archive.reference(&self.relative(file_name))
    }
}

impl fmt::Display for PatchLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.archive.reference(&self.dir_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_references_use_bang_separator() {
        let location = ArchiveLocation::Zip {
            zip_path: PathBuf::from("/data/P.fex.zip"),
            inner_root: "P.fex/".to_string(),
        };
        let patch = PatchLocation { archive: location.clone(), dir_name: "x000y008".to_string() };
        assert_eq!(patch.reference("chl_ql.png"), "/data/P.fex.zip!/P.fex/x000y008/chl_ql.png");
        assert_eq!(location.to_string(), "/data/P.fex.zip!/P.fex");
    }
}
