//! CSV summary output
//!
//! Collects one row per written patch and stores them as `features.csv` in
//! the product container when the writer is closed.

use std::collections::HashMap;

use csv::{Writer, WriterBuilder};

use super::container::OutputContainer;
use super::default_writer::PartWriter;
use crate::errors::{FexError, FexResult};
use crate::extractor::RasterSource;
use crate::model::{effective_feature_types, Feature, FeatureType, Patch};

/// Summary table file name
pub const CSV_FILE_NAME: &str = "features.csv";

/// Writes a per-product table of the record features
#[derive(Debug, Default)]
pub struct CsvPatchWriter {
    columns: Vec<String>,
    /// Rows buffered until close; `None` before initialize and after close
    table: Option<Writer<Vec<u8>>>,
}

impl CsvPatchWriter {
    pub fn new() -> Self {
        CsvPatchWriter::default()
    }

    fn table(&mut self) -> FexResult<&mut Writer<Vec<u8>>> {
        self.table.as_mut()
            .ok_or_else(|| FexError::GenericError("CSV writer is not open".to_string()))
    }
}

impl PartWriter for CsvPatchWriter {
    fn initialize(&mut self, _container: &mut OutputContainer, _source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()> {
        self.columns = effective_feature_types(feature_types, None)
            .into_iter()
            .filter(|t| t.value_type.is_textual())
            .map(|t| t.name)
            .collect();

        let mut table = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        table.write_record(std::iter::once("patch").chain(self.columns.iter().map(String::as_str)))?;
        self.table = Some(table);
        Ok(())
    }

    fn write_patch(&mut self, _container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        let values: HashMap<String, String> = features.iter()
            .flat_map(|f| f.record_entries())
            .collect();

        let mut row = Vec::with_capacity(self.columns.len() + 1);
        row.push(patch.patch_name());
        row.extend(self.columns.iter().map(|c| values.get(c).cloned().unwrap_or_default()));
        self.table()?.write_record(&row)?;
        Ok(())
    }

    fn close(&mut self, container: &mut OutputContainer) -> FexResult<()> {
        let table = match self.table.take() {
            Some(table) => table,
            None => return Ok(()),
        };
        let bytes = table.into_inner().map_err(|e| FexError::IoError(e.into_error()))?;
        container.write_file(CSV_FILE_NAME, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{InMemoryRaster, Region};
    use crate::model::{FeatureValue, ValueType};

    #[test]
    fn fields_with_separators_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = OutputContainer::directory(dir.path()).unwrap();
        let note = FeatureType::new("note", "Remark", ValueType::Text);
        let pct = FeatureType::new("pct", "Coverage", ValueType::Number);
        let source = InMemoryRaster::new("P", 1, 1);

        let mut writer = CsvPatchWriter::new();
        writer.initialize(&mut container, &source, &[note.clone(), pct]).unwrap();
        let patch = Patch::new("P", 1, 2, Region::new(0, 0, 1, 1));
        let features = [Feature::new(note, FeatureValue::Text("say \"hi\", twice".to_string())).unwrap()];
        writer.write_patch(&mut container, &patch, &features).unwrap();
        writer.close(&mut container).unwrap();
        writer.close(&mut container).unwrap();

        let text = std::fs::read_to_string(dir.path().join(CSV_FILE_NAME)).unwrap();
        assert_eq!(text, "patch,note,pct\nx001y002,\"say \"\"hi\"\", twice\",\n");
    }

    #[test]
    fn rows_need_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = OutputContainer::directory(dir.path()).unwrap();
        let patch = Patch::new("P", 0, 0, Region::new(0, 0, 1, 1));
        assert!(CsvPatchWriter::new().write_patch(&mut container, &patch, &[]).is_err());
    }
}
