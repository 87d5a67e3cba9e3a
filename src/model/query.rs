use crate::graph::{GraphRecords, Node, RecordIter, Relationship, TraversalMode};
use crate::keys::sql_hash;
use crate::model::table::{TableMetadata, TABLE_LABEL};
use crate::model::user::{User, USER_LABEL};

pub const QUERY_LABEL: &str = "Query";

pub const TABLE_QUERY_RELATION_TYPE: &str = "HAS_QUERY";
pub const INVERSE_TABLE_QUERY_RELATION_TYPE: &str = "QUERY_FOR";
pub const USER_QUERY_RELATION_TYPE: &str = "EXECUTED_QUERY";
pub const INVERSE_USER_QUERY_RELATION_TYPE: &str = "EXECUTED_BY";

/// A SQL statement, keyed by the MD5 of its normalized text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMetadata {
    sql: String,
    clean_sql: Option<String>,
    sql_hash: String,
    tables: Vec<TableMetadata>,
    user: Option<User>,
    mode: TraversalMode,
}

impl QueryMetadata {
    pub fn new(sql: impl Into<String>, tables: Vec<TableMetadata>, mode: TraversalMode) -> Self {
        let sql = sql.into();
        let sql_hash = sql_hash(&sql);
        Self {
            sql,
            clean_sql: None,
            sql_hash,
            tables,
            user: None,
            mode,
        }
    }

    /// Hash a cleaned variant instead of the raw text, e.g. with volatile
    /// date literals removed so scheduled runs map to one node.
    pub fn with_clean_sql(mut self, clean_sql: impl Into<String>) -> Self {
        let clean_sql = clean_sql.into();
        self.sql_hash = sql_hash(&clean_sql);
        self.clean_sql = Some(clean_sql);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn key(&self) -> &str {
        &self.sql_hash
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn clean_sql(&self) -> Option<&str> {
        self.clean_sql.as_deref()
    }

    pub fn tables(&self) -> &[TableMetadata] {
        &self.tables
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    pub fn table_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tables.iter().map(TableMetadata::key).collect();
        keys.sort();
        keys
    }

    pub fn node(&self) -> Node {
        Node::new(&self.sql_hash, QUERY_LABEL)
            .attr("sql", self.sql.as_str())
            .attr("tables", self.table_keys().join(","))
    }

    fn link_relations(&self) -> Vec<Relationship> {
        let mut relations: Vec<Relationship> = self
            .tables
            .iter()
            .map(|table| {
                Relationship::new(
                    (TABLE_LABEL, &table.key()),
                    (QUERY_LABEL, &self.sql_hash),
                    TABLE_QUERY_RELATION_TYPE,
                    INVERSE_TABLE_QUERY_RELATION_TYPE,
                )
            })
            .collect();

        if let Some(user) = &self.user {
            relations.push(Relationship::new(
                (USER_LABEL, user.key()),
                (QUERY_LABEL, &self.sql_hash),
                USER_QUERY_RELATION_TYPE,
                INVERSE_USER_QUERY_RELATION_TYPE,
            ));
        }

        relations
    }
}

impl GraphRecords for QueryMetadata {
    fn node_records(&self) -> RecordIter<Node> {
        let own = std::iter::once(self.node());
        if !self.mode.expands() {
            return Box::new(own);
        }

        let user = self.user.clone();
        let tables = self.tables.clone();
        Box::new(
            own.chain(user.into_iter().flat_map(|u| u.node_records()))
                .chain(tables.into_iter().flat_map(|t| t.node_records())),
        )
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        let links = self.link_relations().into_iter();
        if !self.mode.expands() {
            return Box::new(links);
        }

        let tables = self.tables.clone();
        Box::new(links.chain(tables.into_iter().flat_map(|t| t.relation_records())))
    }
}
