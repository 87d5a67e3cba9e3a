//! Tables, their columns, and the database/cluster/schema chain above them.

use crate::graph::{GraphRecords, Node, RecordIter, Relationship};
use crate::model::type_metadata::TypeMetadata;
use crate::model::{description_records, Badge};

pub const DATABASE_LABEL: &str = "Database";
pub const CLUSTER_LABEL: &str = "Cluster";
pub const SCHEMA_LABEL: &str = "Schema";
pub const TABLE_LABEL: &str = "Table";
pub const COLUMN_LABEL: &str = "Column";

pub const CLUSTER_RELATION_TYPE: &str = "CLUSTER";
pub const INVERSE_CLUSTER_RELATION_TYPE: &str = "CLUSTER_OF";
pub const SCHEMA_RELATION_TYPE: &str = "SCHEMA";
pub const INVERSE_SCHEMA_RELATION_TYPE: &str = "SCHEMA_OF";
pub const TABLE_RELATION_TYPE: &str = "TABLE";
pub const INVERSE_TABLE_RELATION_TYPE: &str = "TABLE_OF";
pub const COLUMN_RELATION_TYPE: &str = "COLUMN";
pub const INVERSE_COLUMN_RELATION_TYPE: &str = "COLUMN_OF";

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub col_type: String,
    pub sort_order: u32,
    pub description: Option<String>,
    pub badges: Vec<Badge>,
    pub type_metadata: Option<TypeMetadata>,
}

impl ColumnMetadata {
    /// Nested column types get a type-metadata tree; scalar types do not.
    pub fn new(name: impl Into<String>, col_type: impl Into<String>, sort_order: u32) -> Self {
        let name = name.into();
        let col_type = col_type.into();

        let type_metadata = match TypeMetadata::parse(&name, &col_type) {
            Ok(tm) if tm.is_nested() => Some(tm),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    column = %name,
                    col_type = %col_type,
                    error = %e,
                    "column type not parseable, skipping type metadata"
                );
                None
            }
        };

        Self {
            name,
            col_type,
            sort_order,
            description: None,
            badges: Vec::new(),
            type_metadata,
        }
    }

    /// A column known only by name, such as one referenced by a join.
    ///
    /// Its node carries just the name, so upserting it leaves the type and
    /// position written by the table's own records alone.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            col_type: String::new(),
            sort_order: 0,
            description: None,
            badges: Vec::new(),
            type_metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_badges(mut self, badges: Vec<Badge>) -> Self {
        self.badges = badges;
        self
    }

    pub fn with_type_metadata(mut self, type_metadata: TypeMetadata) -> Self {
        self.type_metadata = Some(type_metadata);
        self
    }

    pub fn key(&self, table_key: &str) -> String {
        format!("{}/{}", table_key, self.name)
    }

    fn records(&self, table_key: &str) -> (Vec<Node>, Vec<Relationship>) {
        let key = self.key(table_key);

        let mut node = Node::new(&key, COLUMN_LABEL).attr("name", self.name.as_str());
        if !self.col_type.is_empty() {
            node = node
                .attr("col_type", self.col_type.as_str())
                .attr("sort_order", self.sort_order);
        }
        let mut nodes = vec![node];
        let mut relations = vec![Relationship::new(
            (TABLE_LABEL, table_key),
            (COLUMN_LABEL, &key),
            COLUMN_RELATION_TYPE,
            INVERSE_COLUMN_RELATION_TYPE,
        )];

        if let Some(description) = &self.description {
            let (node, relation) = description_records(COLUMN_LABEL, &key, description);
            nodes.push(node);
            relations.push(relation);
        }

        for badge in &self.badges {
            nodes.push(badge.node());
            relations.push(badge.relation(COLUMN_LABEL, &key));
        }

        if let Some(type_metadata) = &self.type_metadata {
            let (type_nodes, type_relations) = type_metadata.flatten(COLUMN_LABEL, &key);
            nodes.extend(type_nodes);
            relations.extend(type_relations);
        }

        (nodes, relations)
    }
}

/// A table keyed `<database>://<cluster>.<schema>/<table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub database: String,
    pub cluster: String,
    pub schema: String,
    pub name: String,
    pub description: Option<String>,
    pub is_view: bool,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn new(
        database: impl Into<String>,
        cluster: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            cluster: cluster.into(),
            schema: schema.into(),
            name: name.into(),
            description: None,
            is_view: false,
            columns: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnMetadata>) -> Self {
        self.columns = columns;
        self
    }

    /// This table with `column` among its columns, added by name if missing.
    pub fn with_column_declared(mut self, column: &str) -> Self {
        if !self.columns.iter().any(|c| c.name == column) {
            self.columns.push(ColumnMetadata::named(column));
        }
        self
    }

    pub fn view(mut self, is_view: bool) -> Self {
        self.is_view = is_view;
        self
    }

    pub fn database_key(&self) -> String {
        format!("database://{}", self.database)
    }

    pub fn cluster_key(&self) -> String {
        format!("{}://{}", self.database, self.cluster)
    }

    pub fn schema_key(&self) -> String {
        format!("{}://{}.{}", self.database, self.cluster, self.schema)
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.schema_key(), self.name)
    }

    /// Key of a column of this table, whether or not it is declared in `columns`.
    pub fn column_key(&self, column: &str) -> String {
        format!("{}/{}", self.key(), column)
    }

    fn head_records(&self) -> (Vec<Node>, Vec<Relationship>) {
        let key = self.key();
        let database_key = self.database_key();
        let cluster_key = self.cluster_key();
        let schema_key = self.schema_key();

        let mut nodes = vec![
            Node::new(&key, TABLE_LABEL)
                .attr("name", self.name.as_str())
                .attr("is_view", self.is_view),
            Node::new(&database_key, DATABASE_LABEL).attr("name", self.database.as_str()),
            Node::new(&cluster_key, CLUSTER_LABEL).attr("name", self.cluster.as_str()),
            Node::new(&schema_key, SCHEMA_LABEL).attr("name", self.schema.as_str()),
        ];
        let mut relations = vec![
            Relationship::new(
                (DATABASE_LABEL, &database_key),
                (CLUSTER_LABEL, &cluster_key),
                CLUSTER_RELATION_TYPE,
                INVERSE_CLUSTER_RELATION_TYPE,
            ),
            Relationship::new(
                (CLUSTER_LABEL, &cluster_key),
                (SCHEMA_LABEL, &schema_key),
                SCHEMA_RELATION_TYPE,
                INVERSE_SCHEMA_RELATION_TYPE,
            ),
            Relationship::new(
                (SCHEMA_LABEL, &schema_key),
                (TABLE_LABEL, &key),
                TABLE_RELATION_TYPE,
                INVERSE_TABLE_RELATION_TYPE,
            ),
        ];

        if let Some(description) = &self.description {
            let (node, relation) = description_records(TABLE_LABEL, &key, description);
            nodes.push(node);
            relations.push(relation);
        }

        (nodes, relations)
    }
}

impl GraphRecords for TableMetadata {
    fn node_records(&self) -> RecordIter<Node> {
        let table_key = self.key();
        let columns = self.columns.clone();
        let (head, _) = self.head_records();

        Box::new(
            head.into_iter()
                .chain(columns.into_iter().flat_map(move |column| column.records(&table_key).0)),
        )
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        let table_key = self.key();
        let columns = self.columns.clone();
        let (_, head) = self.head_records();

        Box::new(
            head.into_iter()
                .chain(columns.into_iter().flat_map(move |column| column.records(&table_key).1)),
        )
    }
}
