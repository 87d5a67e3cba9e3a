//! Writes graph record streams into vertex and edge record files.
//!
//! One file is opened per label and attribute header. Files are named
//! `<Label>_<n>.csv` for vertices and `<StartLabel>_<EndLabel>_<TYPE>_<n>.csv`
//! for edges, where `n` counts distinct headers seen for that name.

use crate::error::Result;
use crate::graph::{Attributes, GraphSerializable, Node, Relationship};
use crate::schema::{
    END_KEY_COLUMN, END_LABEL_COLUMN, KEY_COLUMN, LABEL_COLUMN, REVERSE_TYPE_COLUMN,
    START_KEY_COLUMN, START_LABEL_COLUMN, TYPE_COLUMN,
};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Counts of what a loader wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub vertex_files: usize,
    pub edge_files: usize,
    pub vertices: usize,
    pub edges: usize,
}

pub struct CsvLoader {
    vertex_dir: PathBuf,
    edge_dir: PathBuf,
    vertex_writers: HashMap<(String, Vec<String>), csv::Writer<File>>,
    edge_writers: HashMap<(String, Vec<String>), csv::Writer<File>>,
    file_counts: HashMap<String, usize>,
    summary: LoadSummary,
}

impl CsvLoader {
    /// Create both output directories if they do not exist.
    pub fn new(vertex_dir: impl Into<PathBuf>, edge_dir: impl Into<PathBuf>) -> Result<Self> {
        let vertex_dir = vertex_dir.into();
        let edge_dir = edge_dir.into();
        std::fs::create_dir_all(&vertex_dir)?;
        std::fs::create_dir_all(&edge_dir)?;

        Ok(Self {
            vertex_dir,
            edge_dir,
            vertex_writers: HashMap::new(),
            edge_writers: HashMap::new(),
            file_counts: HashMap::new(),
            summary: LoadSummary::default(),
        })
    }

    /// Drain a stream: all of its nodes, then all of its relationships.
    pub fn load(&mut self, stream: &mut dyn GraphSerializable) -> Result<()> {
        while let Some(node) = stream.next_node() {
            self.write_node(&node)?;
        }
        while let Some(relation) = stream.next_relation() {
            self.write_relation(&relation)?;
        }
        Ok(())
    }

    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        let properties = property_headers(&node.attributes);
        let writer_key = (node.label.clone(), properties);

        if !self.vertex_writers.contains_key(&writer_key) {
            let path = next_file(&self.vertex_dir, &node.label, &mut self.file_counts);
            let mut writer = csv::Writer::from_path(&path)?;
            let mut header = vec![LABEL_COLUMN.to_string(), KEY_COLUMN.to_string()];
            header.extend(writer_key.1.iter().cloned());
            writer.write_record(&header)?;
            tracing::debug!(path = %path.display(), "opened vertex file");
            self.vertex_writers.insert(writer_key.clone(), writer);
            self.summary.vertex_files += 1;
        }

        let mut row = vec![node.label.clone(), node.key.clone()];
        row.extend(node.attributes.values().map(ToString::to_string));
        if let Some(writer) = self.vertex_writers.get_mut(&writer_key) {
            writer.write_record(&row)?;
        }
        self.summary.vertices += 1;
        Ok(())
    }

    pub fn write_relation(&mut self, relation: &Relationship) -> Result<()> {
        let name = format!(
            "{}_{}_{}",
            relation.start_label, relation.end_label, relation.relation_type
        );
        let properties = property_headers(&relation.attributes);
        let writer_key = (name, properties);

        if !self.edge_writers.contains_key(&writer_key) {
            let path = next_file(&self.edge_dir, &writer_key.0, &mut self.file_counts);
            let mut writer = csv::Writer::from_path(&path)?;
            let mut header: Vec<String> = [
                START_LABEL_COLUMN,
                END_LABEL_COLUMN,
                START_KEY_COLUMN,
                END_KEY_COLUMN,
                TYPE_COLUMN,
                REVERSE_TYPE_COLUMN,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect();
            header.extend(writer_key.1.iter().cloned());
            writer.write_record(&header)?;
            tracing::debug!(path = %path.display(), "opened edge file");
            self.edge_writers.insert(writer_key.clone(), writer);
            self.summary.edge_files += 1;
        }

        let mut row = vec![
            relation.start_label.clone(),
            relation.end_label.clone(),
            relation.start_key.clone(),
            relation.end_key.clone(),
            relation.relation_type.clone(),
            relation.reverse_type.clone(),
        ];
        row.extend(relation.attributes.values().map(ToString::to_string));
        if let Some(writer) = self.edge_writers.get_mut(&writer_key) {
            writer.write_record(&row)?;
        }
        self.summary.edges += 1;
        Ok(())
    }

    /// Flush every open file.
    pub fn close(mut self) -> Result<LoadSummary> {
        for writer in self
            .vertex_writers
            .values_mut()
            .chain(self.edge_writers.values_mut())
        {
            writer.flush()?;
        }

        tracing::info!(
            vertex_files = self.summary.vertex_files,
            edge_files = self.summary.edge_files,
            vertices = self.summary.vertices,
            edges = self.summary.edges,
            "record files written"
        );

        Ok(self.summary)
    }
}

/// `name:type` headers in attribute order.
fn property_headers(attributes: &Attributes) -> Vec<String> {
    attributes
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value.property_type()))
        .collect()
}

fn next_file(dir: &Path, name: &str, counts: &mut HashMap<String, usize>) -> PathBuf {
    let count = counts.entry(name.to_string()).or_insert(0);
    let path = dir.join(format!("{}_{}.csv", name, count));
    *count += 1;
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphRecords, TraversalMode};
    use crate::model::{ColumnMetadata, QueryMetadata, TableMetadata};
    use crate::reader::RecordReader;
    use tempfile::tempdir;

    #[test]
    fn test_load_table_files() {
        let dir = tempdir().unwrap();
        let nodes = dir.path().join("nodes");
        let edges = dir.path().join("relationships");

        let table = TableMetadata::new("hive", "gold", "core", "orders").with_columns(vec![
            ColumnMetadata::new("id", "bigint", 0),
            ColumnMetadata::new("total", "decimal(10,2)", 1),
        ]);

        let mut loader = CsvLoader::new(&nodes, &edges).unwrap();
        loader.load(&mut table.into_stream()).unwrap();
        let summary = loader.close().unwrap();

        // Table, Database, Cluster, Schema, two columns
        assert_eq!(summary.vertices, 6);
        // three chain edges and two column edges
        assert_eq!(summary.edges, 5);

        let reader = RecordReader::default();
        let column_file = reader.read_vertex_file(&nodes.join("Column_0.csv")).unwrap();
        let headers: Vec<String> = column_file.columns.iter().map(|c| c.header()).collect();
        assert_eq!(headers, vec!["col_type:string", "name:string", "sort_order:int64"]);
        assert_eq!(column_file.records.len(), 2);
        assert_eq!(column_file.records[1].values[0], "decimal(10,2)");

        let column_edges = reader
            .read_edge_file(&edges.join("Table_Column_COLUMN_0.csv"))
            .unwrap();
        assert_eq!(column_edges.records.len(), 2);
        assert_eq!(column_edges.records[0].reverse_type, "COLUMN_OF");
    }

    #[test]
    fn test_distinct_headers_get_distinct_files() {
        let dir = tempdir().unwrap();
        let mut loader = CsvLoader::new(dir.path().join("n"), dir.path().join("r")).unwrap();

        loader
            .write_node(&Node::new("a@example.com", "User").attr("email", "a@example.com"))
            .unwrap();
        loader
            .write_node(
                &Node::new("b@example.com", "User")
                    .attr("email", "b@example.com")
                    .attr("full_name", "B"),
            )
            .unwrap();
        let summary = loader.close().unwrap();

        assert_eq!(summary.vertex_files, 2);
        assert!(dir.path().join("n/User_0.csv").exists());
        assert!(dir.path().join("n/User_1.csv").exists());
    }

    #[test]
    fn test_load_query_links() {
        let dir = tempdir().unwrap();
        let query = QueryMetadata::new(
            "SELECT * FROM orders",
            vec![TableMetadata::new("hive", "gold", "core", "orders")],
            TraversalMode::LinkOnly,
        );

        let mut loader = CsvLoader::new(dir.path().join("n"), dir.path().join("r")).unwrap();
        loader.load(&mut query.into_stream()).unwrap();
        let summary = loader.close().unwrap();

        assert_eq!(summary.vertices, 1);
        assert_eq!(summary.edges, 1);
        assert!(dir.path().join("r/Table_Query_HAS_QUERY_0.csv").exists());
    }
}
