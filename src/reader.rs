//! Reads vertex and edge record files produced by the loader.
//!
//! Vertex files carry `LABEL` and `KEY` columns, edge files `START_KEY`,
//! `END_KEY`, `TYPE` and `REVERSE_TYPE` (plus optional `START_LABEL` and
//! `END_LABEL`). Every other column is a typed property, `name:type`.

use crate::error::{GraphError, Result};
use crate::schema::{
    is_reserved_column, PropertyColumn, END_KEY_COLUMN, END_LABEL_COLUMN, KEY_COLUMN, LABEL_COLUMN,
    REVERSE_TYPE_COLUMN, START_KEY_COLUMN, START_LABEL_COLUMN, TYPE_COLUMN,
};
use std::path::{Path, PathBuf};

/// Limits applied while reading record files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Largest accepted field in bytes; `None` accepts any size
    pub max_field_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRecord {
    pub label: String,
    pub key: String,
    /// Property values, in the file's column order
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub start_label: Option<String>,
    pub end_label: Option<String>,
    pub start_key: String,
    pub end_key: String,
    pub relation_type: String,
    pub reverse_type: String,
    pub values: Vec<String>,
}

/// One record file: its property columns and rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFile<R> {
    pub path: PathBuf,
    pub columns: Vec<PropertyColumn>,
    pub records: Vec<R>,
}

/// Positions of the structural columns plus the typed property columns.
struct Header {
    structural: Vec<(&'static str, usize)>,
    properties: Vec<(usize, PropertyColumn)>,
}

impl Header {
    fn parse(path: &Path, headers: &csv::StringRecord, structural: &[&'static str]) -> Result<Self> {
        let mut found = Vec::new();
        let mut properties = Vec::new();

        for (idx, name) in headers.iter().enumerate() {
            let name = name.trim();
            if let Some(column) = structural.iter().find(|c| **c == name) {
                found.push((*column, idx));
            } else {
                let column = PropertyColumn::parse(name).ok_or_else(|| {
                    GraphError::record(path, format!("column {:?} has no property type", name))
                })?;
                if is_reserved_column(&column.name) {
                    return Err(GraphError::record(
                        path,
                        format!("column {:?} uses a reserved name", name),
                    ));
                }
                properties.push((idx, column));
            }
        }

        Ok(Self {
            structural: found,
            properties,
        })
    }

    fn index(&self, column: &str) -> Option<usize> {
        self.structural
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, idx)| *idx)
    }

    fn require(&self, path: &Path, column: &str) -> Result<usize> {
        self.index(column)
            .ok_or_else(|| GraphError::record(path, format!("missing required column {}", column)))
    }

    fn columns(&self) -> Vec<PropertyColumn> {
        self.properties.iter().map(|(_, c)| c.clone()).collect()
    }

    fn values(&self, record: &csv::StringRecord) -> Vec<String> {
        self.properties
            .iter()
            .map(|(idx, _)| record.get(*idx).unwrap_or("").to_string())
            .collect()
    }
}

/// Reads record files under a [`ReaderConfig`]
#[derive(Debug, Clone, Default)]
pub struct RecordReader {
    config: ReaderConfig,
}

impl RecordReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// `*.csv` files directly under `dir`, sorted by name
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn read_vertices(&self, dir: &Path) -> Result<Vec<RecordFile<VertexRecord>>> {
        self.list_files(dir)?
            .iter()
            .map(|path| self.read_vertex_file(path))
            .collect()
    }

    pub fn read_edges(&self, dir: &Path) -> Result<Vec<RecordFile<EdgeRecord>>> {
        self.list_files(dir)?
            .iter()
            .map(|path| self.read_edge_file(path))
            .collect()
    }

    pub fn read_vertex_file(&self, path: &Path) -> Result<RecordFile<VertexRecord>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let header = Header::parse(path, reader.headers()?, &[LABEL_COLUMN, KEY_COLUMN])?;
        let label_idx = header.require(path, LABEL_COLUMN)?;
        let key_idx = header.require(path, KEY_COLUMN)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            self.check_field_sizes(path, &row)?;
            records.push(VertexRecord {
                label: required_field(path, &row, label_idx, LABEL_COLUMN)?,
                key: required_field(path, &row, key_idx, KEY_COLUMN)?,
                values: header.values(&row),
            });
        }

        tracing::debug!(path = %path.display(), records = records.len(), "read vertex file");

        Ok(RecordFile {
            path: path.to_path_buf(),
            columns: header.columns(),
            records,
        })
    }

    pub fn read_edge_file(&self, path: &Path) -> Result<RecordFile<EdgeRecord>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let header = Header::parse(
            path,
            reader.headers()?,
            &[
                START_LABEL_COLUMN,
                END_LABEL_COLUMN,
                START_KEY_COLUMN,
                END_KEY_COLUMN,
                TYPE_COLUMN,
                REVERSE_TYPE_COLUMN,
            ],
        )?;
        let start_key_idx = header.require(path, START_KEY_COLUMN)?;
        let end_key_idx = header.require(path, END_KEY_COLUMN)?;
        let type_idx = header.require(path, TYPE_COLUMN)?;
        let reverse_idx = header.require(path, REVERSE_TYPE_COLUMN)?;
        let start_label_idx = header.index(START_LABEL_COLUMN);
        let end_label_idx = header.index(END_LABEL_COLUMN);

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            self.check_field_sizes(path, &row)?;
            records.push(EdgeRecord {
                start_label: start_label_idx.and_then(|i| row.get(i)).map(String::from),
                end_label: end_label_idx.and_then(|i| row.get(i)).map(String::from),
                start_key: required_field(path, &row, start_key_idx, START_KEY_COLUMN)?,
                end_key: required_field(path, &row, end_key_idx, END_KEY_COLUMN)?,
                relation_type: required_field(path, &row, type_idx, TYPE_COLUMN)?,
                reverse_type: required_field(path, &row, reverse_idx, REVERSE_TYPE_COLUMN)?,
                values: header.values(&row),
            });
        }

        tracing::debug!(path = %path.display(), records = records.len(), "read edge file");

        Ok(RecordFile {
            path: path.to_path_buf(),
            columns: header.columns(),
            records,
        })
    }

    fn check_field_sizes(&self, path: &Path, row: &csv::StringRecord) -> Result<()> {
        let Some(max) = self.config.max_field_size else {
            return Ok(());
        };

        match row.iter().position(|field| field.len() > max) {
            Some(idx) => Err(GraphError::record(
                path,
                format!(
                    "field {} on line {} exceeds the maximum field size of {} bytes",
                    idx,
                    row.position().map(|p| p.line()).unwrap_or(0),
                    max
                ),
            )),
            None => Ok(()),
        }
    }
}

fn required_field(path: &Path, row: &csv::StringRecord, idx: usize, column: &str) -> Result<String> {
    match row.get(idx) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(GraphError::record(
            path,
            format!(
                "empty {} on line {}",
                column,
                row.position().map(|p| p.line()).unwrap_or(0)
            ),
        )),
    }
}
