//! Error types for patch extraction, archive access and queries

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the patch extraction and retrieval core
#[derive(Debug, Error)]
pub enum FexError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Invalid configuration; fatal for a whole extraction run
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No patch container exists for a product
    #[error("Patch source not found for product '{product}' (tried: {})", AttemptedPaths(.attempted))]
    ArchiveNotFound {
        product: String,
        attempted: Vec<PathBuf>,
    },

    /// The product archive exists but holds no directory for the requested cell
    #[error("Patch not found: product '{product}' x={x} y={y} (tried: {})", .attempted.join(", "))]
    PatchNotFound {
        product: String,
        x: u32,
        y: u32,
        attempted: Vec<String>,
    },

    /// A feature record or descriptor could not be read
    #[error("Format error in {location}: {message}")]
    Format { location: String, message: String },

    /// Unknown patch identity in a query backend
    #[error("Not found: {0}")]
    NotFound(String),

    /// Zip archive error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Image encoding or decoding error
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    GenericError(String),
}

impl FexError {
    /// Shorthand for a format error at a location
    pub fn format(location: impl Into<String>, message: impl Into<String>) -> Self {
        FexError::Format {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl From<String> for FexError {
    fn from(msg: String) -> Self {
        FexError::GenericError(msg)
    }
}

/// Result type for patch extraction operations
pub type FexResult<T> = Result<T, FexError>;

struct AttemptedPaths<'a>(&'a [PathBuf]);

impl fmt::Display for AttemptedPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_not_found_lists_attempted_paths() {
        let err = FexError::ArchiveNotFound {
            product: "P1".to_string(),
            attempted: vec![PathBuf::from("/a/P1.fex"), PathBuf::from("/a/P1.fex.zip")],
        };
        let msg = err.to_string();
        assert!(msg.contains("P1"));
        assert!(msg.contains("/a/P1.fex, /a/P1.fex.zip"));
    }

    #[test]
    fn patch_not_found_names_coordinates() {
        let err = FexError::PatchNotFound {
            product: "P1".to_string(),
            x: 3,
            y: 12,
            attempted: vec!["x003y012".to_string(), "x03y12".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("x=3 y=12"));
        assert!(msg.contains("x003y012, x03y12"));
    }
}
