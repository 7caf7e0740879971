//! Output container for one product's patches
//!
//! Patches go either into a plain `<product>.fex` directory or into a
//! `<product>.fex.zip` archive. Paths inside the container are relative and
//! always use `/` separators.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{FexError, FexResult};

/// Directory or zip archive receiving patch files
pub enum OutputContainer {
    Directory {
        root: PathBuf,
    },
    Zip {
        path: PathBuf,
        writer: Option<ZipWriter<File>>,
        directories: BTreeSet<String>,
    },
}

impl OutputContainer {
    /// Open a directory container, creating it if needed
    pub fn directory(root: &Path) -> FexResult<Self> {
        fs::create_dir_all(root)?;
        debug!("Writing patches to directory {}", root.display());
        Ok(OutputContainer::Directory { root: root.to_path_buf() })
    }

    /// Create a zip container, replacing an existing file
    pub fn zip(path: &Path) -> FexResult<Self> {
        let file = File::create(path)?;
        debug!("Writing patches to archive {}", path.display());
        Ok(OutputContainer::Zip {
            path: path.to_path_buf(),
            writer: Some(ZipWriter::new(file)),
            directories: BTreeSet::new(),
        })
    }

    /// Location of the container on disk
    pub fn location(&self) -> &Path {
        match self {
            OutputContainer::Directory { root } => root,
            OutputContainer::Zip { path, .. } => path,
        }
    }

    pub fn is_zip(&self) -> bool {
        matches!(self, OutputContainer::Zip { .. })
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Create a directory and its parents inside the container
    pub fn create_dir(&mut self, relative: &str) -> FexResult<()> {
        match self {
            OutputContainer::Directory { root } => {
                fs::create_dir_all(root.join(relative))?;
                Ok(())
            }
            OutputContainer::Zip { path, writer, directories } => {
                let writer = writer.as_mut().ok_or_else(|| closed_error(path))?;
                let mut prefix = String::new();
                for part in relative.split('/').filter(|p| !p.is_empty()) {
                    prefix.push_str(part);
                    prefix.push('/');
                    if directories.insert(prefix.clone()) {
                        writer.add_directory(prefix.as_str(), Self::options())?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Write a file, creating its parent directories
    pub fn write_file(&mut self, relative: &str, bytes: &[u8]) -> FexResult<()> {
        if let Some((parent, _)) = relative.rsplit_once('/') {
            self.create_dir(parent)?;
        }
        match self {
            OutputContainer::Directory { root } => {
                fs::write(root.join(relative), bytes)?;
                Ok(())
            }
            OutputContainer::Zip { path, writer, .. } => {
                let writer = writer.as_mut().ok_or_else(|| closed_error(path))?;
                writer.start_file(relative, Self::options())?;
                writer.write_all(bytes)?;
                Ok(())
            }
        }
    }

    /// Complete the container; a zip archive gets its central directory
    ///
    /// Calling this again does nothing.
    pub fn finish(&mut self) -> FexResult<()> {
        if let OutputContainer::Zip { path, writer, .. } = self {
            if let Some(writer) = writer.take() {
                let file = writer.finish()?;
                file.sync_all()?;
                debug!("Finished archive {}", path.display());
            }
        }
        Ok(())
    }
}

fn closed_error(path: &Path) -> FexError {
    FexError::GenericError(format!("Archive {} is already closed", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn directory_container_writes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = OutputContainer::directory(&dir.path().join("P.fex")).unwrap();
        container.write_file("x000y001/features.txt", b"a = 1\n").unwrap();
        container.finish().unwrap();

        let text = fs::read_to_string(dir.path().join("P.fex/x000y001/features.txt")).unwrap();
        assert_eq!(text, "a = 1\n");
    }

    #[test]
    fn zip_container_holds_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P.fex.zip");
        let mut container = OutputContainer::zip(&path).unwrap();
        container.write_file("x000y001/features.txt", b"a = 1\n").unwrap();
        container.write_file("x000y001/rgb.png", b"png").unwrap();
        container.finish().unwrap();
        container.finish().unwrap();
        assert!(container.write_file("late.txt", b"").is_err());

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert!(archive.by_name("x000y001/").unwrap().is_dir());
        let mut text = String::new();
        archive.by_name("x000y001/features.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "a = 1\n");
    }
}
