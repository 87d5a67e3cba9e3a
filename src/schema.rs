use crate::backend::QueryResult;
use std::collections::BTreeMap;
use std::fmt;

pub const LABEL_COLUMN: &str = "LABEL";
pub const KEY_COLUMN: &str = "KEY";
pub const START_LABEL_COLUMN: &str = "START_LABEL";
pub const END_LABEL_COLUMN: &str = "END_LABEL";
pub const START_KEY_COLUMN: &str = "START_KEY";
pub const END_KEY_COLUMN: &str = "END_KEY";
pub const TYPE_COLUMN: &str = "TYPE";
pub const REVERSE_TYPE_COLUMN: &str = "REVERSE_TYPE";

/// Properties the publisher stamps on every element it writes.
pub const PUBLISHED_TAG_PROPERTY: &str = "published_tag";
pub const LAST_UPDATED_PROPERTY: &str = "publisher_last_updated_epoch_ms";

const STRUCTURAL_COLUMNS: [&str; 8] = [
    LABEL_COLUMN,
    KEY_COLUMN,
    START_LABEL_COLUMN,
    END_LABEL_COLUMN,
    START_KEY_COLUMN,
    END_KEY_COLUMN,
    TYPE_COLUMN,
    REVERSE_TYPE_COLUMN,
];

/// Whether a column is managed by the publisher rather than declared by data.
pub fn is_reserved_column(name: &str) -> bool {
    STRUCTURAL_COLUMNS.contains(&name) || name == PUBLISHED_TAG_PROPERTY || name == LAST_UPDATED_PROPERTY
}

/// Property name to store type.
pub type PropertySet = BTreeMap<String, String>;

/// Schema element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaKind {
    Tag,
    Edge,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Tag => "TAG",
            SchemaKind::Edge => "EDGE",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed property column from a record header, written `name:type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyColumn {
    pub name: String,
    pub prop_type: String,
}

impl PropertyColumn {
    pub fn new(name: impl Into<String>, prop_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prop_type: prop_type.into(),
        }
    }

    pub fn parse(header: &str) -> Option<Self> {
        let (name, prop_type) = header.split_once(':')?;
        let (name, prop_type) = (name.trim(), prop_type.trim());
        if name.is_empty() || prop_type.is_empty() {
            return None;
        }
        Some(Self::new(name, prop_type.to_lowercase()))
    }

    pub fn header(&self) -> String {
        format!("{}:{}", self.name, self.prop_type)
    }
}

/// Difference between a live schema and an incoming one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyDelta {
    /// Only in the incoming set
    pub added: PropertySet,
    /// In both sets with a different type; holds the incoming type
    pub changed: PropertySet,
    /// Only in the live set
    pub deleted: PropertySet,
}

impl PropertyDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Compare a live property set against the incoming one.
///
/// Reserved columns are ignored on both sides. Types compare case-insensitively.
pub fn diff_properties(live: &PropertySet, incoming: &PropertySet) -> PropertyDelta {
    let mut delta = PropertyDelta::default();

    for (name, prop_type) in incoming.iter().filter(|(n, _)| !is_reserved_column(n)) {
        match live.get(name) {
            None => {
                delta.added.insert(name.clone(), prop_type.clone());
            }
            Some(live_type) if !live_type.eq_ignore_ascii_case(prop_type) => {
                delta.changed.insert(name.clone(), prop_type.clone());
            }
            Some(_) => {}
        }
    }

    for (name, prop_type) in live.iter().filter(|(n, _)| !is_reserved_column(n)) {
        if !incoming.contains_key(name) {
            delta.deleted.insert(name.clone(), prop_type.clone());
        }
    }

    delta
}

/// Schema of one tag or edge type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSchema {
    pub kind: SchemaKind,
    pub label: String,
    pub properties: PropertySet,
}

impl LabelSchema {
    pub fn new(kind: SchemaKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            properties: PropertySet::new(),
        }
    }

    /// Add columns, keeping the first declared type of any property.
    ///
    /// Returns the columns whose type disagreed with an earlier declaration.
    pub fn merge(&mut self, columns: &[PropertyColumn]) -> Vec<PropertyColumn> {
        let mut conflicts = Vec::new();

        for column in columns.iter().filter(|c| !is_reserved_column(&c.name)) {
            match self.properties.get(&column.name) {
                Some(existing) if existing != &column.prop_type => conflicts.push(column.clone()),
                Some(_) => {}
                None => {
                    self.properties
                        .insert(column.name.clone(), column.prop_type.clone());
                }
            }
        }

        conflicts
    }

    /// `columns` with each type replaced by the one this schema settled on.
    pub fn reconcile_columns(&self, columns: &[PropertyColumn]) -> Vec<PropertyColumn> {
        columns
            .iter()
            .map(|column| match self.properties.get(&column.name) {
                Some(prop_type) => PropertyColumn::new(column.name.as_str(), prop_type.as_str()),
                None => column.clone(),
            })
            .collect()
    }

    /// Generate the CREATE statement, system properties last
    pub fn create_statement(&self) -> String {
        let mut defs: Vec<String> = self
            .properties
            .iter()
            .map(|(name, prop_type)| column_def(name, prop_type))
            .collect();
        defs.push(column_def(PUBLISHED_TAG_PROPERTY, "string"));
        defs.push(column_def(LAST_UPDATED_PROPERTY, "int64"));

        format!("CREATE {} {}({})", self.kind, self.label, defs.join(", "))
    }

    pub fn describe_statement(&self) -> String {
        format!("DESCRIBE {} {}", self.kind, self.label)
    }

    /// Generate ALTER statements in ADD, CHANGE, DROP order.
    ///
    /// An empty delta yields no statements.
    pub fn alter_statements(&self, delta: &PropertyDelta) -> Vec<String> {
        let mut statements = Vec::new();

        if !delta.added.is_empty() {
            statements.push(format!(
                "ALTER {} {} ADD({})",
                self.kind,
                self.label,
                column_defs(&delta.added)
            ));
        }

        if !delta.changed.is_empty() {
            statements.push(format!(
                "ALTER {} {} CHANGE({})",
                self.kind,
                self.label,
                column_defs(&delta.changed)
            ));
        }

        if !delta.deleted.is_empty() {
            let names: Vec<&str> = delta.deleted.keys().map(String::as_str).collect();
            statements.push(format!(
                "ALTER {} {} DROP({})",
                self.kind,
                self.label,
                names.join(", ")
            ));
        }

        statements
    }

    /// Diff this schema against the rows returned by its DESCRIBE statement.
    pub fn delta_from_described(&self, rows: &QueryResult) -> PropertyDelta {
        diff_properties(&described_properties(rows), &self.properties)
    }
}

/// Read the property set out of DESCRIBE rows (`Field` and `Type` columns).
pub fn described_properties(rows: &QueryResult) -> PropertySet {
    rows.iter()
        .filter_map(|row| Some((row.get_string("Field")?, row.get_string("Type")?)))
        .map(|(name, prop_type)| (name, prop_type.to_lowercase()))
        .collect()
}

fn column_def(name: &str, prop_type: &str) -> String {
    format!("{} {} NULL", name, prop_type)
}

fn column_defs(properties: &PropertySet) -> String {
    properties
        .iter()
        .map(|(name, prop_type)| column_def(name, prop_type))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Label schemas collected from record headers, tags before edges.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<(SchemaKind, String), LabelSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the columns of one record file under a label.
    pub fn register(&mut self, kind: SchemaKind, label: &str, columns: &[PropertyColumn]) {
        let schema = self
            .schemas
            .entry((kind, label.to_string()))
            .or_insert_with(|| LabelSchema::new(kind, label));

        for conflict in schema.merge(columns) {
            tracing::warn!(
                kind = %kind,
                label = %label,
                property = %conflict.name,
                ignored_type = %conflict.prop_type,
                "conflicting property type across record files, keeping first"
            );
        }
    }

    pub fn get(&self, kind: SchemaKind, label: &str) -> Option<&LabelSchema> {
        self.schemas.get(&(kind, label.to_string()))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &LabelSchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryRow;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn props(pairs: &[(&str, &str)]) -> PropertySet {
        pairs
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_property_column() {
        assert_eq!(
            PropertyColumn::parse("sort_order:Int64"),
            Some(PropertyColumn::new("sort_order", "int64"))
        );
        assert_eq!(PropertyColumn::parse("KEY"), None);
        assert_eq!(PropertyColumn::parse(":string"), None);
        assert_eq!(PropertyColumn::parse("name:"), None);
    }

    #[test]
    fn test_diff_added_and_deleted() {
        let live = props(&[("a", "int"), ("b", "string")]);
        let incoming = props(&[("b", "string"), ("c", "int")]);
        let delta = diff_properties(&live, &incoming);

        assert_eq!(delta.added, props(&[("c", "int")]));
        assert_eq!(delta.deleted, props(&[("a", "int")]));
        assert!(delta.changed.is_empty());
    }

    #[test]
    fn test_diff_changed() {
        let delta = diff_properties(&props(&[("a", "int")]), &props(&[("a", "string")]));
        assert_eq!(delta.changed, props(&[("a", "string")]));
        assert!(delta.added.is_empty());
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn test_diff_ignores_system_properties() {
        let live = props(&[
            ("name", "string"),
            ("published_tag", "string"),
            ("publisher_last_updated_epoch_ms", "int64"),
        ]);
        let incoming = props(&[("name", "STRING")]);
        assert!(diff_properties(&live, &incoming).is_empty());
    }

    #[test]
    fn test_create_statement() {
        let mut schema = LabelSchema::new(SchemaKind::Tag, "Column");
        schema.merge(&[
            PropertyColumn::new("name", "string"),
            PropertyColumn::new("sort_order", "int64"),
        ]);

        assert_eq!(
            schema.create_statement(),
            "CREATE TAG Column(name string NULL, sort_order int64 NULL, \
             published_tag string NULL, publisher_last_updated_epoch_ms int64 NULL)"
        );
        assert_eq!(schema.describe_statement(), "DESCRIBE TAG Column");
    }

    #[test]
    fn test_create_statement_without_properties() {
        let schema = LabelSchema::new(SchemaKind::Edge, "COLUMN_OF");
        assert_eq!(
            schema.create_statement(),
            "CREATE EDGE COLUMN_OF(published_tag string NULL, publisher_last_updated_epoch_ms int64 NULL)"
        );
    }

    #[test]
    fn test_alter_statements_order() {
        let schema = LabelSchema::new(SchemaKind::Tag, "Table");
        let delta = PropertyDelta {
            added: props(&[("c", "int")]),
            changed: props(&[("b", "double")]),
            deleted: props(&[("a", "int"), ("z", "string")]),
        };

        assert_eq!(
            schema.alter_statements(&delta),
            vec![
                "ALTER TAG Table ADD(c int NULL)".to_string(),
                "ALTER TAG Table CHANGE(b double NULL)".to_string(),
                "ALTER TAG Table DROP(a, z)".to_string(),
            ]
        );
        assert!(schema.alter_statements(&PropertyDelta::default()).is_empty());
    }

    #[test]
    fn test_delta_from_described_rows() {
        let mut schema = LabelSchema::new(SchemaKind::Tag, "Table");
        schema.merge(&[PropertyColumn::new("name", "string"), PropertyColumn::new("is_view", "bool")]);

        let rows: QueryResult = [("name", "string"), ("published_tag", "string"), ("legacy", "int64")]
            .iter()
            .map(|(field, ty)| {
                let mut row = QueryRow::new();
                row.insert("Field", json!(field));
                row.insert("Type", json!(ty));
                row.insert("Null", json!("YES"));
                row
            })
            .collect();

        let delta = schema.delta_from_described(&rows);
        assert_eq!(delta.added, props(&[("is_view", "bool")]));
        assert_eq!(delta.deleted, props(&[("legacy", "int64")]));
    }

    #[test]
    fn test_catalog_unions_headers_first_type_wins() {
        let mut catalog = SchemaCatalog::new();
        catalog.register(SchemaKind::Tag, "Column", &[PropertyColumn::new("name", "string")]);
        catalog.register(
            SchemaKind::Tag,
            "Column",
            &[PropertyColumn::new("name", "int64"), PropertyColumn::new("col_type", "string")],
        );
        catalog.register(SchemaKind::Edge, "COLUMN", &[]);

        assert_eq!(catalog.len(), 2);
        let column = catalog.get(SchemaKind::Tag, "Column").unwrap();
        assert_eq!(column.properties, props(&[("col_type", "string"), ("name", "string")]));

        let kinds: Vec<SchemaKind> = catalog.schemas().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SchemaKind::Tag, SchemaKind::Edge]);
    }
}
