use crate::schema::{PropertyColumn, LAST_UPDATED_PROPERTY, PUBLISHED_TAG_PROPERTY};

/// Property types emitted as bare literals
pub const UNQUOTED_TYPES: [&str; 8] = [
    "int", "int8", "int16", "int32", "int64", "float", "double", "bool",
];

/// Store-side expression stamped into the last-updated property.
pub const TIMESTAMP_EXPRESSION: &str = "timestamp() * 1000";

/// Escape and double-quote a string literal.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a raw record value for a property of the given type.
///
/// Numeric and boolean values are emitted literally, with an empty value
/// becoming `NULL`. Everything else is a quoted string.
pub fn encode_value(prop_type: &str, raw: &str) -> String {
    let prop_type = prop_type.trim().to_lowercase();
    if !UNQUOTED_TYPES.contains(&prop_type.as_str()) {
        return quote_string(raw);
    }

    let raw = raw.trim();
    if raw.is_empty() {
        "NULL".to_string()
    } else if prop_type == "bool" {
        raw.to_lowercase()
    } else {
        raw.to_string()
    }
}

fn property_list(columns: &[PropertyColumn]) -> String {
    columns
        .iter()
        .map(|c| c.name.as_str())
        .chain([PUBLISHED_TAG_PROPERTY, LAST_UPDATED_PROPERTY])
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_tuple(columns: &[PropertyColumn], values: &[String], publish_tag: &str) -> String {
    let mut encoded: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let raw = values.get(i).map(String::as_str).unwrap_or("");
            encode_value(&column.prop_type, raw)
        })
        .collect();
    encoded.push(quote_string(publish_tag));
    encoded.push(TIMESTAMP_EXPRESSION.to_string());
    format!("({})", encoded.join(", "))
}

/// Multi-row vertex upsert for a single tag
#[derive(Debug, Clone)]
pub struct InsertVertexBuilder {
    label: String,
    columns: Vec<PropertyColumn>,
    publish_tag: String,
    rows: Vec<(String, Vec<String>)>,
}

impl InsertVertexBuilder {
    pub fn new(label: impl Into<String>, columns: Vec<PropertyColumn>, publish_tag: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            columns,
            publish_tag: publish_tag.into(),
            rows: Vec::new(),
        }
    }

    /// Add a row; `values` follow the column order given at construction
    pub fn row(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.push_row(key, values);
        self
    }

    pub fn push_row(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.rows.push((key.into(), values));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Build the statement, or `None` when no rows were added
    pub fn build(&self) -> Option<String> {
        if self.rows.is_empty() {
            return None;
        }

        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|(key, values)| {
                format!(
                    "{}:{}",
                    quote_string(key),
                    value_tuple(&self.columns, values, &self.publish_tag)
                )
            })
            .collect();

        Some(format!(
            "INSERT VERTEX {}({}) VALUES {}",
            self.label,
            property_list(&self.columns),
            rows.join(", ")
        ))
    }
}

/// Multi-row edge upsert for a single edge type
#[derive(Debug, Clone)]
pub struct InsertEdgeBuilder {
    edge_type: String,
    columns: Vec<PropertyColumn>,
    publish_tag: String,
    rows: Vec<(String, String, Vec<String>)>,
}

impl InsertEdgeBuilder {
    pub fn new(edge_type: impl Into<String>, columns: Vec<PropertyColumn>, publish_tag: impl Into<String>) -> Self {
        Self {
            edge_type: edge_type.into(),
            columns,
            publish_tag: publish_tag.into(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, start_key: impl Into<String>, end_key: impl Into<String>, values: Vec<String>) -> Self {
        self.push_row(start_key, end_key, values);
        self
    }

    pub fn push_row(&mut self, start_key: impl Into<String>, end_key: impl Into<String>, values: Vec<String>) {
        self.rows.push((start_key.into(), end_key.into(), values));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn edge_type(&self) -> &str {
        &self.edge_type
    }

    /// The same rows under another edge type with endpoints swapped
    pub fn reversed(&self, reverse_type: impl Into<String>) -> Self {
        Self {
            edge_type: reverse_type.into(),
            columns: self.columns.clone(),
            publish_tag: self.publish_tag.clone(),
            rows: self
                .rows
                .iter()
                .map(|(start, end, values)| (end.clone(), start.clone(), values.clone()))
                .collect(),
        }
    }

    /// Build the statement, or `None` when no rows were added
    pub fn build(&self) -> Option<String> {
        if self.rows.is_empty() {
            return None;
        }

        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|(start, end, values)| {
                format!(
                    "{}->{}:{}",
                    quote_string(start),
                    quote_string(end),
                    value_tuple(&self.columns, values, &self.publish_tag)
                )
            })
            .collect();

        Some(format!(
            "INSERT EDGE {}({}) VALUES {}",
            self.edge_type,
            property_list(&self.columns),
            rows.join(", ")
        ))
    }
}
