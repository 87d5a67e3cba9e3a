use crate::graph::{GraphRecords, Node, RecordIter, Relationship};

pub const USER_LABEL: &str = "User";

/// A person who executes queries, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub full_name: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.email
    }

    pub fn node(&self) -> Node {
        Node::new(&self.email, USER_LABEL)
            .attr("email", self.email.as_str())
            .attr_opt("full_name", self.full_name.clone())
    }
}

impl GraphRecords for User {
    fn node_records(&self) -> RecordIter<Node> {
        Box::new(std::iter::once(self.node()))
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        Box::new(std::iter::empty())
    }
}
