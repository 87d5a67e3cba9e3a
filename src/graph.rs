//! Graph records and the lazy production contract shared by every entity.

use std::collections::BTreeMap;
use std::fmt;

/// Scalar attribute value carried by nodes and relationships.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttributeValue {
    /// Property type declared for this value in the graph store.
    pub fn property_type(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Int(_) => "int64",
            AttributeValue::Float(_) => "double",
            AttributeValue::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Int(n) => write!(f, "{}", n),
            AttributeValue::Float(n) => write!(f, "{}", n),
            AttributeValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// A labeled vertex with a content-derived key.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: String,
    pub label: String,
    pub attributes: Attributes,
}

impl Node {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Set an attribute only when a value is present.
    pub fn attr_opt<V: Into<AttributeValue>>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.attributes.insert(name.to_string(), value.into());
        }
        self
    }
}

/// A directed, typed edge that always declares its reverse type.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub start_label: String,
    pub end_label: String,
    pub start_key: String,
    pub end_key: String,
    pub relation_type: String,
    pub reverse_type: String,
    pub attributes: Attributes,
}

impl Relationship {
    pub fn new(
        start: (&str, &str),
        end: (&str, &str),
        relation_type: &str,
        reverse_type: &str,
    ) -> Self {
        Self {
            start_label: start.0.to_string(),
            start_key: start.1.to_string(),
            end_label: end.0.to_string(),
            end_key: end.1.to_string(),
            relation_type: relation_type.to_string(),
            reverse_type: reverse_type.to_string(),
            attributes: Attributes::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}

/// How far an entity's stream reaches into the entities it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    /// Referenced entities are assumed present; only connecting edges are emitted.
    #[default]
    LinkOnly,
    /// Referenced entities are emitted too, recursing into their own records.
    ExpandClosure,
}

impl TraversalMode {
    pub fn expands(self) -> bool {
        matches!(self, TraversalMode::ExpandClosure)
    }
}

pub type RecordIter<T> = Box<dyn Iterator<Item = T> + Send>;

/// An entity that can describe itself as node and relationship records.
///
/// The returned iterators own what they need, so they can be opened lazily
/// and outlive the borrow of the entity.
pub trait GraphRecords {
    fn node_records(&self) -> RecordIter<Node>;

    fn relation_records(&self) -> RecordIter<Relationship>;

    fn into_stream(self) -> GraphStream<Self>
    where
        Self: Sized,
    {
        GraphStream::new(self)
    }
}

/// Cursor contract consumed by loaders: pull records until `None`.
///
/// Once a stream returns `None` it keeps returning `None`.
pub trait GraphSerializable {
    fn next_node(&mut self) -> Option<Node>;

    fn next_relation(&mut self) -> Option<Relationship>;
}

enum Cursor<T> {
    Pending,
    Active(RecordIter<T>),
    Exhausted,
}

impl<T> Cursor<T> {
    fn advance(&mut self, open: impl FnOnce() -> RecordIter<T>) -> Option<T> {
        if let Cursor::Pending = self {
            *self = Cursor::Active(open());
        }

        let next = match self {
            Cursor::Active(iter) => iter.next(),
            _ => return None,
        };

        if next.is_none() {
            *self = Cursor::Exhausted;
        }

        next
    }
}

/// Adapts a [`GraphRecords`] entity to the [`GraphSerializable`] cursor contract.
pub struct GraphStream<E> {
    entity: E,
    nodes: Cursor<Node>,
    relations: Cursor<Relationship>,
}

impl<E: GraphRecords> GraphStream<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entity,
            nodes: Cursor::Pending,
            relations: Cursor::Pending,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }
}

impl<E: GraphRecords> GraphSerializable for GraphStream<E> {
    fn next_node(&mut self) -> Option<Node> {
        let entity = &self.entity;
        self.nodes.advance(|| entity.node_records())
    }

    fn next_relation(&mut self) -> Option<Relationship> {
        let entity = &self.entity;
        self.relations.advance(|| entity.relation_records())
    }
}

/// Drain every node of a stream.
pub fn collect_nodes(stream: &mut dyn GraphSerializable) -> Vec<Node> {
    std::iter::from_fn(|| stream.next_node()).collect()
}

/// Drain every relationship of a stream.
pub fn collect_relations(stream: &mut dyn GraphSerializable) -> Vec<Relationship> {
    std::iter::from_fn(|| stream.next_relation()).collect()
}
