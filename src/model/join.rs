use crate::graph::{GraphRecords, Node, RecordIter, Relationship, TraversalMode};
use crate::keys::{join_key, should_swap_join_sides};
use crate::model::query::{QueryMetadata, QUERY_LABEL};
use crate::model::table::{TableMetadata, COLUMN_LABEL};

pub const JOIN_LABEL: &str = "Join";

pub const COLUMN_JOIN_RELATION_TYPE: &str = "COLUMN_JOINS_WITH";
pub const INVERSE_COLUMN_JOIN_RELATION_TYPE: &str = "JOIN_OF_COLUMN";
pub const QUERY_JOIN_RELATION_TYPE: &str = "HAS_JOIN";
pub const INVERSE_QUERY_JOIN_RELATION_TYPE: &str = "JOIN_OF_QUERY";

/// A join between two columns, observed in one or more queries.
///
/// Equi inner joins are stored with their sides in canonical order, so the
/// same join written either way round maps to a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryJoin {
    left_table: TableMetadata,
    left_column: String,
    right_table: TableMetadata,
    right_column: String,
    join_type: String,
    operator: String,
    join_sql: String,
    query: Option<QueryMetadata>,
    mode: TraversalMode,
}

impl QueryJoin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        left_table: TableMetadata,
        left_column: impl Into<String>,
        right_table: TableMetadata,
        right_column: impl Into<String>,
        join_type: impl Into<String>,
        operator: impl Into<String>,
        join_sql: impl Into<String>,
        mode: TraversalMode,
    ) -> Self {
        let mut join = Self {
            left_table,
            left_column: left_column.into(),
            right_table,
            right_column: right_column.into(),
            join_type: join_type.into(),
            operator: operator.into(),
            join_sql: join_sql.into(),
            query: None,
            mode,
        };

        if should_swap_join_sides(
            &join.left_table.key(),
            &join.right_table.key(),
            &join.operator,
            &join.join_type,
        ) {
            std::mem::swap(&mut join.left_table, &mut join.right_table);
            std::mem::swap(&mut join.left_column, &mut join.right_column);
        }

        join
    }

    pub fn with_query(mut self, query: QueryMetadata) -> Self {
        self.query = Some(query);
        self
    }

    pub fn left_table(&self) -> &TableMetadata {
        &self.left_table
    }

    pub fn right_table(&self) -> &TableMetadata {
        &self.right_table
    }

    pub fn left_column_key(&self) -> String {
        self.left_table.column_key(&self.left_column)
    }

    pub fn right_column_key(&self) -> String {
        self.right_table.column_key(&self.right_column)
    }

    pub fn query(&self) -> Option<&QueryMetadata> {
        self.query.as_ref()
    }

    pub fn key(&self) -> String {
        join_key(
            &self.join_type,
            &self.left_column_key(),
            &self.operator,
            &self.right_column_key(),
        )
    }

    pub fn node(&self) -> Node {
        Node::new(self.key(), JOIN_LABEL)
            .attr("join_type", self.join_type.as_str())
            .attr("operator", self.operator.as_str())
            .attr("join_sql", self.join_sql.as_str())
            .attr("left_table_key", self.left_table.key())
            .attr("right_table_key", self.right_table.key())
    }

    fn link_relations(&self) -> Vec<Relationship> {
        let key = self.key();
        let mut relations: Vec<Relationship> = [self.left_column_key(), self.right_column_key()]
            .iter()
            .map(|column_key| {
                Relationship::new(
                    (COLUMN_LABEL, column_key),
                    (JOIN_LABEL, &key),
                    COLUMN_JOIN_RELATION_TYPE,
                    INVERSE_COLUMN_JOIN_RELATION_TYPE,
                )
            })
            .collect();

        if let Some(query) = &self.query {
            relations.push(Relationship::new(
                (QUERY_LABEL, query.key()),
                (JOIN_LABEL, &key),
                QUERY_JOIN_RELATION_TYPE,
                INVERSE_QUERY_JOIN_RELATION_TYPE,
            ));
        }

        relations
    }

    /// Both tables, each declaring its joined column so the link has endpoints.
    fn tables(&self) -> Vec<TableMetadata> {
        let left = self.left_table.clone().with_column_declared(&self.left_column);
        if self.left_table.key() == self.right_table.key() {
            vec![left.with_column_declared(&self.right_column)]
        } else {
            let right = self.right_table.clone().with_column_declared(&self.right_column);
            vec![left, right]
        }
    }
}

impl GraphRecords for QueryJoin {
    fn node_records(&self) -> RecordIter<Node> {
        let own = std::iter::once(self.node());
        if !self.mode.expands() {
            return Box::new(own);
        }

        let query = self.query.clone();
        Box::new(
            own.chain(self.tables().into_iter().flat_map(|t| t.node_records()))
                .chain(query.into_iter().flat_map(|q| q.node_records())),
        )
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        let links = self.link_relations().into_iter();
        if !self.mode.expands() {
            return Box::new(links);
        }

        let query = self.query.clone();
        Box::new(
            links
                .chain(self.tables().into_iter().flat_map(|t| t.relation_records()))
                .chain(query.into_iter().flat_map(|q| q.relation_records())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{collect_nodes, collect_relations};
    use crate::model::table::ColumnMetadata;

    fn orders() -> TableMetadata {
        TableMetadata::new("hive", "gold", "core", "orders")
            .with_columns(vec![ColumnMetadata::new("customer_id", "bigint", 0)])
    }

    fn customers() -> TableMetadata {
        TableMetadata::new("hive", "gold", "core", "customers")
            .with_columns(vec![ColumnMetadata::new("id", "bigint", 0)])
    }

    fn join(left: TableMetadata, lc: &str, right: TableMetadata, rc: &str, ty: &str, op: &str) -> QueryJoin {
        QueryJoin::new(left, lc, right, rc, ty, op, "o.customer_id = c.id", TraversalMode::LinkOnly)
    }

    #[test]
    fn test_inner_equi_join_is_order_independent() {
        let a = join(orders(), "customer_id", customers(), "id", "inner join", "=");
        let b = join(customers(), "id", orders(), "customer_id", "inner join", "=");
        assert_eq!(a.key(), b.key());
        assert_eq!(
            a.key(),
            "inner join-hive://gold.core/customers/id-=-hive://gold.core/orders/customer_id"
        );
        assert_eq!(a.left_table().name, "customers");
        assert_eq!(b.right_column_key(), "hive://gold.core/orders/customer_id");
    }

    #[test]
    fn test_swap_compares_table_keys() {
        // "a-x" < "a" is false, but "a-x/id" < "a/id" is true.
        let a = TableMetadata::new("hive", "gold", "core", "a");
        let ax = TableMetadata::new("hive", "gold", "core", "a-x");
        let join = join(a, "id", ax, "id", "INNER JOIN", "=");
        assert_eq!(join.left_table().name, "a");
    }

    #[test]
    fn test_outer_join_keeps_argument_order() {
        let a = join(orders(), "customer_id", customers(), "id", "left join", "=");
        let b = join(customers(), "id", orders(), "customer_id", "left join", "=");
        assert_ne!(a.key(), b.key());

        let c = join(orders(), "customer_id", customers(), "id", "inner join", "<");
        assert_eq!(c.left_table().name, "orders");
    }

    #[test]
    fn test_link_relations() {
        let query = QueryMetadata::new(
            "SELECT * FROM orders o JOIN customers c ON o.customer_id = c.id",
            vec![orders(), customers()],
            TraversalMode::LinkOnly,
        );
        let mut stream = join(orders(), "customer_id", customers(), "id", "inner join", "=")
            .with_query(query.clone())
            .into_stream();

        let nodes = collect_nodes(&mut stream);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attributes["left_table_key"].to_string(), "hive://gold.core/customers");

        let relations = collect_relations(&mut stream);
        assert_eq!(relations.len(), 3);
        assert_eq!(relations[0].start_key, "hive://gold.core/customers/id");
        assert_eq!(relations[0].relation_type, "COLUMN_JOINS_WITH");
        assert_eq!(relations[2].start_key, query.key());
        assert_eq!(relations[2].reverse_type, "JOIN_OF_QUERY");
    }

    #[test]
    fn test_expand_closure() {
        let mut stream = QueryJoin::new(
            orders(),
            "customer_id",
            customers(),
            "id",
            "inner join",
            "=",
            "o.customer_id = c.id",
            TraversalMode::ExpandClosure,
        )
        .into_stream();

        let nodes = collect_nodes(&mut stream);
        let keys: Vec<&str> = nodes.iter().map(|n| n.key.as_str()).collect();
        assert!(keys.contains(&"hive://gold.core/orders/customer_id"));
        assert!(keys.contains(&"hive://gold.core/customers/id"));

        for relation in collect_relations(&mut stream) {
            assert!(keys.contains(&relation.start_key.as_str()), "{:?}", relation);
            assert!(keys.contains(&relation.end_key.as_str()), "{:?}", relation);
        }
    }

    fn assert_closed(join: QueryJoin) {
        let mut stream = join.into_stream();
        let nodes = collect_nodes(&mut stream);
        let keys: Vec<&str> = nodes.iter().map(|n| n.key.as_str()).collect();

        let relations = collect_relations(&mut stream);
        assert!(!relations.is_empty());
        for relation in relations {
            assert!(keys.contains(&relation.start_key.as_str()), "{:?}", relation);
            assert!(keys.contains(&relation.end_key.as_str()), "{:?}", relation);
        }
    }

    #[test]
    fn test_expand_closure_with_undeclared_columns() {
        let orders = TableMetadata::new("hive", "gold", "core", "orders");
        let customers = TableMetadata::new("hive", "gold", "core", "customers");

        assert_closed(QueryJoin::new(
            orders.clone(),
            "customer_id",
            customers,
            "id",
            "inner join",
            "=",
            "o.customer_id = c.id",
            TraversalMode::ExpandClosure,
        ));

        // Self join on two columns of one table
        assert_closed(QueryJoin::new(
            orders.clone(),
            "id",
            orders,
            "parent_id",
            "left join",
            "=",
            "o.id = p.parent_id",
            TraversalMode::ExpandClosure,
        ));
    }
}
