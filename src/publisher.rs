use crate::backend::{GraphStore, QueryResult};
use crate::builder::{InsertEdgeBuilder, InsertVertexBuilder};
use crate::config::PublisherConfig;
use crate::error::{GraphError, Result};
use crate::reader::{EdgeRecord, RecordFile, RecordReader, VertexRecord};
use crate::retry::{with_retry, RetryPolicy};
use crate::schema::{LabelSchema, PropertyColumn, SchemaCatalog, SchemaKind};
use std::collections::BTreeMap;
use std::fmt;

/// Phase of a publish run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    SchemaReconciliation,
    VertexImport,
    EdgeImport,
    Done,
    Failed,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::SchemaReconciliation => "schema_reconciliation",
            PublishState::VertexImport => "vertex_import",
            PublishState::EdgeImport => "edge_import",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub labels_created: usize,
    pub labels_altered: usize,
    pub vertex_statements: usize,
    pub edge_statements: usize,
    pub vertices_written: usize,
    pub edges_written: usize,
}

/// Publishes record files into a graph store.
///
/// A run reconciles every label's schema, then upserts vertices, then edges,
/// all on one session and one statement at a time. Nothing is rolled back on
/// failure; batches already written stay, and a re-run converges because
/// every element is upserted and stamped with the run's tag.
pub struct Publisher<S: GraphStore> {
    store: S,
    config: PublisherConfig,
    retry: RetryPolicy,
    reader: RecordReader,
    state: PublishState,
}

impl<S: GraphStore> Publisher<S> {
    /// Create a publisher; rejects an invalid configuration before any I/O.
    pub fn new(store: S, config: PublisherConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            retry: config.retry_policy(),
            reader: RecordReader::new(config.reader.clone()),
            store,
            config,
            state: PublishState::Idle,
        })
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the store session.
    pub async fn close(self) -> Result<()> {
        self.store
            .close()
            .await
            .map_err(|e| GraphError::from_store("close", e))
    }

    /// Run every phase over the configured record directories.
    pub async fn publish(&mut self) -> Result<PublishReport> {
        self.state = PublishState::Idle;
        let mut report = PublishReport::default();

        match self.run(&mut report).await {
            Ok(()) => {
                self.transition(PublishState::Done);
                tracing::info!(
                    publish_tag = %self.config.publish_tag,
                    labels_created = report.labels_created,
                    labels_altered = report.labels_altered,
                    vertices = report.vertices_written,
                    edges = report.edges_written,
                    statements = report.vertex_statements + report.edge_statements,
                    "publish finished"
                );
                Ok(report)
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(PublishState::Failed);
                tracing::error!(
                    phase = %failed_in,
                    publish_tag = %self.config.publish_tag,
                    error = %e,
                    "publish failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&mut self, report: &mut PublishReport) -> Result<()> {
        let vertex_files = self.reader.read_vertices(&self.config.vertex_dir)?;
        let edge_files = self.reader.read_edges(&self.config.edge_dir)?;

        self.transition(PublishState::SchemaReconciliation);
        let catalog = build_catalog(&vertex_files, &edge_files);
        for schema in catalog.schemas() {
            self.reconcile(schema, report).await?;
        }

        self.transition(PublishState::VertexImport);
        for file in &vertex_files {
            self.import_vertices(file, &catalog, report).await?;
        }

        self.transition(PublishState::EdgeImport);
        for file in &edge_files {
            self.import_edges(file, &catalog, report).await?;
        }

        Ok(())
    }

    fn transition(&mut self, next: PublishState) {
        tracing::info!(from = %self.state, to = %next, "publish phase");
        self.state = next;
    }

    /// Execute one statement under the retry policy.
    async fn execute(&self, statement: &str) -> Result<QueryResult> {
        tracing::debug!(statement = %statement, "executing");
        let store = &self.store;
        with_retry(&self.retry, statement, || store.execute(statement))
            .await
            .map_err(|e| GraphError::from_store(statement, e))
    }

    /// Create a label, or bring an existing one in line with the incoming properties.
    async fn reconcile(&self, schema: &LabelSchema, report: &mut PublishReport) -> Result<()> {
        let create = schema.create_statement();
        let store = &self.store;

        let created = with_retry(&self.retry, &create, || store.execute(&create)).await;
        match created {
            Ok(_) => {
                tracing::info!(kind = %schema.kind, label = %schema.label, "created");
                report.labels_created += 1;
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                let described = self.execute(&schema.describe_statement()).await?;
                let delta = schema.delta_from_described(&described);
                if delta.is_empty() {
                    tracing::debug!(kind = %schema.kind, label = %schema.label, "schema up to date");
                    return Ok(());
                }

                tracing::info!(
                    kind = %schema.kind,
                    label = %schema.label,
                    added = delta.added.len(),
                    changed = delta.changed.len(),
                    deleted = delta.deleted.len(),
                    "altering schema"
                );
                for statement in schema.alter_statements(&delta) {
                    self.execute(&statement).await?;
                }
                report.labels_altered += 1;
                Ok(())
            }
            Err(e) => Err(GraphError::SchemaConflict {
                label: schema.label.clone(),
                statement: create,
                source: e,
            }),
        }
    }

    async fn import_vertices(
        &self,
        file: &RecordFile<VertexRecord>,
        catalog: &SchemaCatalog,
        report: &mut PublishReport,
    ) -> Result<()> {
        let mut by_label: BTreeMap<&str, Vec<&VertexRecord>> = BTreeMap::new();
        for record in &file.records {
            by_label.entry(record.label.as_str()).or_default().push(record);
        }

        for (label, records) in by_label {
            let columns = encoding_columns(catalog, SchemaKind::Tag, label, file);
            for batch in records.chunks(self.config.batch_size) {
                let mut builder = InsertVertexBuilder::new(
                    label,
                    columns.clone(),
                    self.config.publish_tag.as_str(),
                );
                for record in batch {
                    builder.push_row(record.key.as_str(), record.values.clone());
                }

                if let Some(statement) = builder.build() {
                    self.execute(&statement).await?;
                    report.vertex_statements += 1;
                    report.vertices_written += batch.len();
                }
            }
        }

        tracing::debug!(path = %file.path.display(), records = file.records.len(), "vertex file imported");
        Ok(())
    }

    async fn import_edges(
        &self,
        file: &RecordFile<EdgeRecord>,
        catalog: &SchemaCatalog,
        report: &mut PublishReport,
    ) -> Result<()> {
        let mut by_type: BTreeMap<(&str, &str), Vec<&EdgeRecord>> = BTreeMap::new();
        for record in &file.records {
            by_type
                .entry((record.relation_type.as_str(), record.reverse_type.as_str()))
                .or_default()
                .push(record);
        }

        for ((relation_type, reverse_type), records) in by_type {
            let columns = encoding_columns(catalog, SchemaKind::Edge, relation_type, file);
            for batch in records.chunks(self.config.batch_size) {
                let mut forward = InsertEdgeBuilder::new(
                    relation_type,
                    columns.clone(),
                    self.config.publish_tag.as_str(),
                );
                for record in batch {
                    forward.push_row(
                        record.start_key.as_str(),
                        record.end_key.as_str(),
                        record.values.clone(),
                    );
                }
                let reverse = forward.reversed(reverse_type);

                for builder in [&forward, &reverse] {
                    if let Some(statement) = builder.build() {
                        self.execute(&statement).await?;
                        report.edge_statements += 1;
                    }
                }
                report.edges_written += batch.len();
            }
        }

        tracing::debug!(path = %file.path.display(), records = file.records.len(), "edge file imported");
        Ok(())
    }
}

/// A file's columns typed the way the label's schema declares them.
fn encoding_columns<R>(
    catalog: &SchemaCatalog,
    kind: SchemaKind,
    label: &str,
    file: &RecordFile<R>,
) -> Vec<PropertyColumn> {
    match catalog.get(kind, label) {
        Some(schema) => schema.reconcile_columns(&file.columns),
        None => file.columns.clone(),
    }
}

/// Union the property columns of every file under each label it writes.
///
/// Edge files declare both their forward and reverse types.
fn build_catalog(vertex_files: &[RecordFile<VertexRecord>], edge_files: &[RecordFile<EdgeRecord>]) -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new();

    for file in vertex_files {
        let mut labels: Vec<&str> = file.records.iter().map(|r| r.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        for label in labels {
            catalog.register(SchemaKind::Tag, label, &file.columns);
        }
    }

    for file in edge_files {
        let mut types: Vec<&str> = file
            .records
            .iter()
            .flat_map(|r| [r.relation_type.as_str(), r.reverse_type.as_str()])
            .collect();
        types.sort_unstable();
        types.dedup();
        for edge_type in types {
            catalog.register(SchemaKind::Edge, edge_type, &file.columns);
        }
    }

    catalog
}
