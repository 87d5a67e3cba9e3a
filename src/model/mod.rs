//! Catalog entities and the graph records they emit.

pub mod execution;
pub mod join;
pub mod query;
pub mod table;
pub mod type_metadata;
pub mod user;
pub mod where_clause;

pub use execution::{QueryExecutionWindow, WindowDuration};
pub use join::QueryJoin;
pub use query::QueryMetadata;
pub use table::{ColumnMetadata, TableMetadata};
pub use type_metadata::{TypeMetadata, TypeShape};
pub use user::User;
pub use where_clause::QueryWhere;

use crate::graph::{Node, Relationship};
use crate::keys::child_key;

pub const DESCRIPTION_LABEL: &str = "Description";
pub const DESCRIPTION_RELATION_TYPE: &str = "DESCRIPTION";
pub const INVERSE_DESCRIPTION_RELATION_TYPE: &str = "DESCRIPTION_OF";

pub const BADGE_LABEL: &str = "Badge";
pub const BADGE_RELATION_TYPE: &str = "HAS_BADGE";
pub const INVERSE_BADGE_RELATION_TYPE: &str = "BADGE_FOR";

/// Description node keyed under its owner, plus the edge linking them.
pub(crate) fn description_records(owner_label: &str, owner_key: &str, text: &str) -> (Node, Relationship) {
    let key = child_key(owner_key, "_description");
    let relation = Relationship::new(
        (owner_label, owner_key),
        (DESCRIPTION_LABEL, &key),
        DESCRIPTION_RELATION_TYPE,
        INVERSE_DESCRIPTION_RELATION_TYPE,
    );
    let node = Node::new(key, DESCRIPTION_LABEL).attr("description", text);
    (node, relation)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub category: String,
}

impl Badge {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    pub fn node(&self) -> Node {
        Node::new(&self.name, BADGE_LABEL).attr("category", self.category.as_str())
    }

    pub fn relation(&self, owner_label: &str, owner_key: &str) -> Relationship {
        Relationship::new(
            (owner_label, owner_key),
            (BADGE_LABEL, &self.name),
            BADGE_RELATION_TYPE,
            INVERSE_BADGE_RELATION_TYPE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_records() {
        let (node, relation) = description_records("Table", "hive://gold.core/orders", "All orders");
        assert_eq!(node.key, "hive://gold.core/orders/_description");
        assert_eq!(node.label, "Description");
        assert_eq!(relation.start_key, "hive://gold.core/orders");
        assert_eq!(relation.end_key, node.key);
        assert_eq!(relation.reverse_type, "DESCRIPTION_OF");
    }

    #[test]
    fn test_badge_records() {
        let badge = Badge::new("pii", "column");
        assert_eq!(badge.node().key, "pii");
        let relation = badge.relation("Column", "hive://gold.core/orders/email");
        assert_eq!(relation.end_label, "Badge");
        assert_eq!(relation.relation_type, "HAS_BADGE");
    }
}
