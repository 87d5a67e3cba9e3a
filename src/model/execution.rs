//! Aggregated execution counts of a query over a time window.
//!
//! Windows are not checked for overlap. The extraction job is expected to
//! produce deterministic, non-overlapping windows between runs.

use std::fmt;

use crate::graph::{GraphRecords, Node, RecordIter, Relationship, TraversalMode};
use crate::model::query::{QueryMetadata, QUERY_LABEL};

pub const EXECUTION_LABEL: &str = "Execution";

pub const QUERY_EXECUTION_RELATION_TYPE: &str = "HAS_EXECUTION";
pub const INVERSE_QUERY_EXECUTION_RELATION_TYPE: &str = "EXECUTION_OF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDuration {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl WindowDuration {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowDuration::Hourly => "hourly",
            WindowDuration::Daily => "daily",
            WindowDuration::Weekly => "weekly",
            WindowDuration::Monthly => "monthly",
        }
    }
}

impl fmt::Display for WindowDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryExecutionWindow {
    pub query: QueryMetadata,
    /// Window start, epoch seconds.
    pub start_time: i64,
    pub execution_count: i64,
    pub window_duration: WindowDuration,
    pub mode: TraversalMode,
}

impl QueryExecutionWindow {
    pub fn new(
        query: QueryMetadata,
        start_time: i64,
        execution_count: i64,
        window_duration: WindowDuration,
        mode: TraversalMode,
    ) -> Self {
        Self {
            query,
            start_time,
            execution_count,
            window_duration,
            mode,
        }
    }

    pub fn key(&self) -> String {
        format!("{}-{}", self.query.key(), self.start_time)
    }

    pub fn node(&self) -> Node {
        Node::new(self.key(), EXECUTION_LABEL)
            .attr("start_time", self.start_time)
            .attr("execution_count", self.execution_count)
            .attr("window_duration", self.window_duration.as_str())
    }

    fn link_relation(&self) -> Relationship {
        Relationship::new(
            (QUERY_LABEL, self.query.key()),
            (EXECUTION_LABEL, &self.key()),
            QUERY_EXECUTION_RELATION_TYPE,
            INVERSE_QUERY_EXECUTION_RELATION_TYPE,
        )
    }
}

impl GraphRecords for QueryExecutionWindow {
    fn node_records(&self) -> RecordIter<Node> {
        let own = std::iter::once(self.node());
        if !self.mode.expands() {
            return Box::new(own);
        }
        Box::new(own.chain(self.query.node_records()))
    }

    fn relation_records(&self) -> RecordIter<Relationship> {
        let link = std::iter::once(self.link_relation());
        if !self.mode.expands() {
            return Box::new(link);
        }
        Box::new(link.chain(self.query.relation_records()))
    }
}
