use crate::graph::{GraphRecords, Node, RecordIter, Relationship, TraversalMode};
use crate::keys::{sql_hash, table_set_hash};
use crate::model::query::{QueryMetadata, QUERY_LABEL};
use crate::model::table::{TableMetadata, TABLE_LABEL};

pub const WHERE_LABEL: &str = "Where";

pub const TABLE_WHERE_RELATION_TYPE: &str = "USES_WHERE_CLAUSE";
pub const INVERSE_TABLE_WHERE_RELATION_TYPE: &str = "WHERE_CLAUSE_USED_ON";
pub const QUERY_WHERE_RELATION_TYPE: &str = "HAS_WHERE_CLAUSE";
pub const INVERSE_QUERY_WHERE_RELATION_TYPE: &str = "WHERE_CLAUSE_OF";

/// A filter predicate over one or more tables.
///
/// Keyed by the table set and the normalized clause, so the same predicate
/// over the same tables collapses to one node whatever order the tables came in.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWhere {
    pub tables: Vec<TableMetadata>,
    pub where_clause: String,
    pub left_arg: Option<String>,
    pub operator: Option<String>,
    pub right_arg: Option<String>,
    pub query: Option<QueryMetadata>,
    pub mode: TraversalMode,
}

impl QueryWhere {
    pub fn new(tables: Vec<TableMetadata>, where_clause: impl Into<String>, mode: TraversalMode) -> Self {
        Self {
            tables,
            where_clause: where_clause.into(),
            left_arg: None,
            operator: None,
            right_arg: None,
            query: None,
            mode,
        }
    }

    /// Record the decomposed `left operator right` form of a simple predicate.
    pub fn with_arguments(
        mut self,
        left_arg: impl Into<String>,
        operator: impl Into<String>,
        right_arg: impl Into<String>,
    ) -> Self {
        self.left_arg = Some(left_arg.into());
        self.operator = Some(operator.into());
        self.right_arg = Some(right_arg.into());
        self
    }

    pub fn with_query(mut self, query: QueryMetadata) -> Self {
        self.query = Some(query);
        self
    }

    pub fn table_keys(&self) -> Vec<String> {
        self.tables.iter().map(TableMetadata::key).collect()
    }

    pub fn key(&self) -> String {
        format!(
            "{}-{}",
            table_set_hash(&self.table_keys()),
            sql_hash(&self.where_clause)
        )
    }

    pub fn node(&self) -> Node {
        Node::new(self.key(), WHERE_LABEL)
            .attr("where_clause", self.where_clause.as_str())
            .attr_opt("left_arg", self.left_arg.clone())
            .attr_opt("operator", self.operator.clone())
            .attr_opt("right_arg", self.right_arg.clone())
    }

    fn link_relations(&self) -> Vec<Relationship> {
        let key = self.key();
        let mut relations: Vec<Relationship> = self
            .table_keys()
            .iter()
            .map(|table_key| {
                Relationship::new(
                    (TABLE_LABEL, table_key),
                    (WHERE_LABEL, &key),
                    TABLE_WHERE_RELATION_TYPE,
                    INVERSE_TABLE_WHERE_RELATION_TYPE,
                )
            })
            .collect();

        if let Some(query) = &self.query {
            relations.push(Relationship::new(
                (QUERY_LABEL, query.key()),
                (WHERE_LABEL, &key),
                QUERY_WHERE_RELATION_TYPE,
                INVERSE_QUERY_WHERE_RELATION_TYPE,
            ));
        }

        relations
    }
}

impl GraphRecords for QueryWhere {
    fn node_records(&self) -> RecordIter<Node> {
        let own = std::iter::once(self.node());
        if !self.mode.expands() {
            return Box::new(own);
        }

        let tables = self.tables.clone();
        let query = self.query.clone();
        Box::new(
            own.chain(tables.into_iter().flat_map(|t| t.node_records()))
                .chain(query.into_iter().flat_map(|q| q.node_records())),
        )
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        let links = self.link_relations().into_iter();
        if !self.mode.expands() {
            return Box::new(links);
        }

        let tables = self.tables.clone();
        let query = self.query.clone();
        Box::new(
            links
                .chain(tables.into_iter().flat_map(|t| t.relation_records()))
                .chain(query.into_iter().flat_map(|q| q.relation_records())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{collect_nodes, collect_relations};

    fn orders() -> TableMetadata {
        TableMetadata::new("hive", "gold", "core", "orders")
    }

    fn customers() -> TableMetadata {
        TableMetadata::new("hive", "gold", "core", "customers")
    }

    #[test]
    fn test_key_ignores_table_order_and_formatting() {
        let a = QueryWhere::new(vec![orders(), customers()], "o.id = c.id", TraversalMode::LinkOnly);
        let b = QueryWhere::new(vec![customers(), orders()], "o.id  =  c.id", TraversalMode::LinkOnly);
        assert_eq!(a.key(), b.key());

        let c = QueryWhere::new(vec![orders()], "o.id = c.id", TraversalMode::LinkOnly);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_where_node_and_links() {
        let query = QueryMetadata::new(
            "SELECT * FROM orders WHERE amount > 100",
            vec![orders()],
            TraversalMode::LinkOnly,
        );
        let mut stream = QueryWhere::new(vec![orders()], "amount > 100", TraversalMode::LinkOnly)
            .with_arguments("amount", ">", "100")
            .with_query(query)
            .into_stream();

        let nodes = collect_nodes(&mut stream);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attributes["operator"].to_string(), ">");
        assert_eq!(nodes[0].attributes["right_arg"].to_string(), "100");

        let relations = collect_relations(&mut stream);
        let types: Vec<&str> = relations.iter().map(|r| r.relation_type.as_str()).collect();
        assert_eq!(types, vec!["USES_WHERE_CLAUSE", "HAS_WHERE_CLAUSE"]);
    }

    #[test]
    fn test_expand_closure_emits_tables_and_query() {
        let query = QueryMetadata::new("SELECT 1 FROM orders", vec![orders()], TraversalMode::LinkOnly);
        let mut stream = QueryWhere::new(vec![orders()], "1 = 1", TraversalMode::ExpandClosure)
            .with_query(query)
            .into_stream();

        let nodes = collect_nodes(&mut stream);
        let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels[0], "Where");
        assert!(labels.contains(&"Table"));
        assert!(labels.contains(&"Query"));

        let relations = collect_relations(&mut stream);
        assert!(relations.iter().any(|r| r.relation_type == "HAS_QUERY"));
    }
}
