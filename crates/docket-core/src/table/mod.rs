//! Delimited table format for extraction results.
//!
//! A table is UTF-8 CSV whose first row holds a single header cell, followed
//! by one `key,value` row per extracted keyword.

use std::io::Read;

use tracing::{debug, info};

use crate::error::{DocketError, InputError, TableError};
use crate::extract::ExtractionResult;
use crate::models::config::{DEFAULT_TABLE_HEADER, OutputConfig};
use crate::models::document::{DocumentFile, DocumentType, RunId};
use crate::storage::write_atomic;

/// Writes and reads extraction tables.
#[derive(Debug, Clone)]
pub struct TableCodec {
    header: String,
}

impl TableCodec {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.table_header.clone())
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Write `data` to `<stem>.csv` next to `target`.
    pub fn write(
        &self,
        data: &ExtractionResult,
        target: &DocumentFile,
    ) -> Result<DocumentFile, DocketError> {
        self.write_for_run(data, target, None)
    }

    /// Like [`write`](Self::write), with the output name namespaced by `run`.
    pub fn write_for_run(
        &self,
        data: &ExtractionResult,
        target: &DocumentFile,
        run: Option<&RunId>,
    ) -> Result<DocumentFile, DocketError> {
        let table = target.derive(DocumentType::Csv, run);
        let bytes = self.encode(data)?;
        write_atomic(table.path(), &bytes)?;

        info!("Wrote {} rows to {}", data.len(), table.path().display());
        Ok(table)
    }

    /// Encode `data` with the header row first.
    pub fn encode(&self, data: &ExtractionResult) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record([self.header.as_str()])?;
        for (key, value) in data.iter() {
            writer.write_record([key, value])?;
        }

        writer
            .into_inner()
            .map_err(|e| TableError::Csv(e.into_error().into()))
    }

    /// Read a table back. The header cell maps to an empty value.
    pub fn read(&self, table: &DocumentFile) -> Result<ExtractionResult, DocketError> {
        if table.doc_type() != DocumentType::Csv {
            return Err(InputError::WrongType {
                stage: "table",
                doc_type: table.doc_type().to_string(),
            }
            .into());
        }

        let file = std::fs::File::open(table.path())?;
        let data = self.decode(file)?;
        debug!("Read {} entries from {}", data.len(), table.path().display());
        Ok(data)
    }

    /// Decode a table from any reader.
    pub fn decode<R: Read>(&self, reader: R) -> Result<ExtractionResult, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = reader.records();
        let header = records.next().ok_or(TableError::MissingHeader)??;
        let header = header.get(0).unwrap_or_default();
        if header != self.header {
            debug!("Table header {:?} differs from {:?}", header, self.header);
        }

        let mut data = ExtractionResult::new();
        data.insert(header, "");

        for record in records {
            let record = record?;
            if record.len() < 2 {
                return Err(TableError::MalformedRow {
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    columns: record.len(),
                });
            }
            data.insert(&record[0], &record[1]);
        }

        Ok(data)
    }
}

impl Default for TableCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_HEADER)
    }
}
