//! Nested column types flattened into a subtype graph.
//!
//! A composite type such as `array<map<string,array<string>>>` becomes one
//! `Type_Metadata` node per nesting level. Keys are path concatenations under
//! the owning column:
//!
//! | Parent   | Child        | Segment       |
//! |----------|--------------|---------------|
//! | column   | root         | `type/<name>` |
//! | array    | element      | `_inner_`     |
//! | map      | key type     | `_map_key`    |
//! | map      | value type   | `_map_value`  |
//! | struct   | field `f`    | `f`           |

use crate::error::{GraphError, Result};
use crate::graph::{Node, Relationship};
use crate::keys::child_key;
use crate::model::{description_records, Badge};

pub const TYPE_METADATA_LABEL: &str = "Type_Metadata";
pub const SUBTYPE_RELATION_TYPE: &str = "SUBTYPE";
pub const INVERSE_SUBTYPE_RELATION_TYPE: &str = "SUBTYPE_OF";

pub const ARRAY_INNER_SEGMENT: &str = "_inner_";
pub const MAP_KEY_SEGMENT: &str = "_map_key";
pub const MAP_VALUE_SEGMENT: &str = "_map_value";

/// Deepest nesting a parsed type may have, counting the root level.
pub const MAX_TYPE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Scalar,
    Array(Box<TypeMetadata>),
    Map {
        key: Box<TypeMetadata>,
        value: Box<TypeMetadata>,
    },
    Struct(Vec<TypeMetadata>),
}

/// One level of a (possibly nested) column type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMetadata {
    pub name: String,
    pub data_type: String,
    pub shape: TypeShape,
    pub description: Option<String>,
    pub badges: Vec<Badge>,
    /// Position among the fields of a parent struct.
    pub sort_order: Option<u32>,
}

impl TypeMetadata {
    fn with_shape(name: impl Into<String>, data_type: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            shape,
            description: None,
            badges: Vec::new(),
            sort_order: None,
        }
    }

    pub fn scalar(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::with_shape(name, data_type, TypeShape::Scalar)
    }

    pub fn array(name: impl Into<String>, data_type: impl Into<String>, mut element: TypeMetadata) -> Self {
        element.name = ARRAY_INNER_SEGMENT.to_string();
        Self::with_shape(name, data_type, TypeShape::Array(Box::new(element)))
    }

    pub fn map(
        name: impl Into<String>,
        data_type: impl Into<String>,
        mut key: TypeMetadata,
        mut value: TypeMetadata,
    ) -> Self {
        key.name = MAP_KEY_SEGMENT.to_string();
        value.name = MAP_VALUE_SEGMENT.to_string();
        Self::with_shape(
            name,
            data_type,
            TypeShape::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
        )
    }

    /// Fields without an explicit `sort_order` take their position in `fields`.
    pub fn structure(name: impl Into<String>, data_type: impl Into<String>, mut fields: Vec<TypeMetadata>) -> Self {
        for (idx, field) in fields.iter_mut().enumerate() {
            if field.sort_order.is_none() {
                field.sort_order = Some(idx as u32);
            }
        }
        Self::with_shape(name, data_type, TypeShape::Struct(fields))
    }

    /// Parse a Hive-style type string into a tree rooted at `name`.
    pub fn parse(name: &str, type_str: &str) -> Result<Self> {
        let mut parser = TypeParser::new(type_str);
        let parsed = parser.parse_type(name.to_string())?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(parsed)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_badges(mut self, badges: Vec<Badge>) -> Self {
        self.badges = badges;
        self
    }

    pub fn kind(&self) -> &'static str {
        match self.shape {
            TypeShape::Scalar => "scalar",
            TypeShape::Array(_) => "array",
            TypeShape::Map { .. } => "map",
            TypeShape::Struct(_) => "struct",
        }
    }

    pub fn is_nested(&self) -> bool {
        !matches!(self.shape, TypeShape::Scalar)
    }

    /// Children with their path segments, in emission order.
    pub fn children(&self) -> Vec<(&str, &TypeMetadata)> {
        match &self.shape {
            TypeShape::Scalar => Vec::new(),
            TypeShape::Array(element) => vec![(ARRAY_INNER_SEGMENT, element.as_ref())],
            TypeShape::Map { key, value } => vec![
                (MAP_KEY_SEGMENT, key.as_ref()),
                (MAP_VALUE_SEGMENT, value.as_ref()),
            ],
            TypeShape::Struct(fields) => {
                let mut ordered: Vec<&TypeMetadata> = fields.iter().collect();
                ordered.sort_by_key(|f| f.sort_order.unwrap_or(u32::MAX));
                ordered.into_iter().map(|f| (f.name.as_str(), f)).collect()
            }
        }
    }

    /// Mutable child by path segment.
    pub fn child_mut(&mut self, segment: &str) -> Option<&mut TypeMetadata> {
        match &mut self.shape {
            TypeShape::Scalar => None,
            TypeShape::Array(element) if segment == ARRAY_INNER_SEGMENT => Some(element.as_mut()),
            TypeShape::Map { key, .. } if segment == MAP_KEY_SEGMENT => Some(key.as_mut()),
            TypeShape::Map { value, .. } if segment == MAP_VALUE_SEGMENT => Some(value.as_mut()),
            TypeShape::Struct(fields) => fields.iter_mut().find(|f| f.name == segment),
            _ => None,
        }
    }

    /// Follow a path of segments below this node.
    pub fn descendant_mut(&mut self, path: &[&str]) -> Option<&mut TypeMetadata> {
        path.iter()
            .try_fold(self, |node, segment| node.child_mut(segment))
    }

    /// Key of the tree root under the owning column.
    pub fn root_key(&self, column_key: &str) -> String {
        child_key(column_key, &format!("type/{}", self.name))
    }

    /// Pre-order records for the whole tree, linked below `column_key`.
    pub fn flatten(&self, column_label: &str, column_key: &str) -> (Vec<Node>, Vec<Relationship>) {
        let mut nodes = Vec::new();
        let mut relations = Vec::new();
        let segment = format!("type/{}", self.name);
        self.collect(column_label, column_key, &segment, &mut nodes, &mut relations);
        (nodes, relations)
    }

    fn collect(
        &self,
        parent_label: &str,
        parent_key: &str,
        segment: &str,
        nodes: &mut Vec<Node>,
        relations: &mut Vec<Relationship>,
    ) {
        let key = child_key(parent_key, segment);

        nodes.push(
            Node::new(&key, TYPE_METADATA_LABEL)
                .attr("kind", self.kind())
                .attr("name", self.name.as_str())
                .attr("data_type", self.data_type.as_str())
                .attr_opt("sort_order", self.sort_order),
        );
        relations.push(Relationship::new(
            (parent_label, parent_key),
            (TYPE_METADATA_LABEL, &key),
            SUBTYPE_RELATION_TYPE,
            INVERSE_SUBTYPE_RELATION_TYPE,
        ));

        if let Some(description) = &self.description {
            let (node, relation) = description_records(TYPE_METADATA_LABEL, &key, description);
            nodes.push(node);
            relations.push(relation);
        }

        for badge in &self.badges {
            nodes.push(badge.node());
            relations.push(badge.relation(TYPE_METADATA_LABEL, &key));
        }

        for (child_segment, child) in self.children() {
            child.collect(TYPE_METADATA_LABEL, &key, child_segment, nodes, relations);
        }
    }
}

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> TypeParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: &str) -> GraphError {
        GraphError::TypeParse(format!("{} at position {} in `{}`", message, self.pos, self.src))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            _ => Err(self.error(&format!("expected `{}`", expected))),
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn field_name(&mut self) -> Result<String> {
        self.skip_ws();
        if self.peek() == Some('`') {
            self.pos += 1;
            let start = self.pos;
            let end = self.src[start..]
                .find('`')
                .map(|offset| start + offset)
                .ok_or_else(|| self.error("unterminated quoted field name"))?;
            self.pos = end + 1;
            return Ok(self.src[start..end].to_string());
        }

        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("expected field name"));
        }
        Ok(name.to_string())
    }

    fn parse_type(&mut self, name: String) -> Result<TypeMetadata> {
        if self.depth >= MAX_TYPE_DEPTH {
            return Err(self.error(&format!("type nested deeper than {} levels", MAX_TYPE_DEPTH)));
        }
        self.depth += 1;
        let parsed = self.parse_level(name);
        self.depth -= 1;
        parsed
    }

    fn parse_level(&mut self, name: String) -> Result<TypeMetadata> {
        self.skip_ws();
        let start = self.pos;
        let ident = self.ident();
        if ident.is_empty() {
            return Err(self.error("expected type name"));
        }

        match ident.to_ascii_lowercase().as_str() {
            "array" => {
                self.expect('<')?;
                let element = self.parse_type(ARRAY_INNER_SEGMENT.to_string())?;
                self.expect('>')?;
                Ok(TypeMetadata::array(name, &self.src[start..self.pos], element))
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse_type(MAP_KEY_SEGMENT.to_string())?;
                self.expect(',')?;
                let value = self.parse_type(MAP_VALUE_SEGMENT.to_string())?;
                self.expect('>')?;
                Ok(TypeMetadata::map(name, &self.src[start..self.pos], key, value))
            }
            "struct" => {
                self.expect('<')?;
                let mut fields = Vec::new();
                self.skip_ws();
                if self.peek() != Some('>') {
                    loop {
                        let field_name = self.field_name()?;
                        self.expect(':')?;
                        fields.push(self.parse_type(field_name)?);
                        self.skip_ws();
                        if self.peek() == Some(',') {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect('>')?;
                Ok(TypeMetadata::structure(name, &self.src[start..self.pos], fields))
            }
            _ => {
                let before_params = self.pos;
                self.skip_ws();
                if self.peek() == Some('(') {
                    let close = self.src[self.pos..]
                        .find(')')
                        .map(|offset| self.pos + offset)
                        .ok_or_else(|| self.error("unterminated type parameters"))?;
                    self.pos = close + 1;
                } else {
                    self.pos = before_params;
                }
                Ok(TypeMetadata::scalar(name, &self.src[start..self.pos]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COLUMN_KEY: &str = "hive://gold.test_schema1/test_table1/col1";

    fn type_nodes(tm: &TypeMetadata) -> Vec<(String, String, String)> {
        let (nodes, _) = tm.flatten("Column", COLUMN_KEY);
        nodes
            .into_iter()
            .filter(|n| n.label == TYPE_METADATA_LABEL)
            .map(|n| {
                let kind = n.attributes["kind"].to_string();
                let data_type = n.attributes["data_type"].to_string();
                (n.key, kind, data_type)
            })
            .collect()
    }

    #[test]
    fn test_nested_array_map_fixture() {
        let tm = TypeMetadata::parse("col1", "array<map<string,array<string>>>").unwrap();

        let expected = vec![
            (
                format!("{}/type/col1", COLUMN_KEY),
                "array".to_string(),
                "array<map<string,array<string>>>".to_string(),
            ),
            (
                format!("{}/type/col1/_inner_", COLUMN_KEY),
                "map".to_string(),
                "map<string,array<string>>".to_string(),
            ),
            (
                format!("{}/type/col1/_inner_/_map_key", COLUMN_KEY),
                "scalar".to_string(),
                "string".to_string(),
            ),
            (
                format!("{}/type/col1/_inner_/_map_value", COLUMN_KEY),
                "array".to_string(),
                "array<string>".to_string(),
            ),
            (
                format!("{}/type/col1/_inner_/_map_value/_inner_", COLUMN_KEY),
                "scalar".to_string(),
                "string".to_string(),
            ),
        ];

        assert_eq!(type_nodes(&tm), expected);
    }

    #[test]
    fn test_one_subtype_relation_per_node() {
        let tm = TypeMetadata::parse("col1", "array<map<string,array<string>>>").unwrap();
        let (nodes, relations) = tm.flatten("Column", COLUMN_KEY);

        assert_eq!(nodes.len(), relations.len());
        assert_eq!(relations[0].start_label, "Column");
        assert_eq!(relations[0].start_key, COLUMN_KEY);
        assert_eq!(relations[0].end_key, format!("{}/type/col1", COLUMN_KEY));
        assert!(relations
            .iter()
            .all(|r| r.relation_type == "SUBTYPE" && r.reverse_type == "SUBTYPE_OF"));
        for (node, relation) in nodes.iter().zip(&relations) {
            assert_eq!(node.key, relation.end_key);
        }
    }

    #[test]
    fn test_struct_fields_ordered_by_sort_order() {
        let mut tm = TypeMetadata::parse("col2", "struct<b:int,a:array<string>>").unwrap();
        if let TypeShape::Struct(fields) = &mut tm.shape {
            fields.reverse();
        }

        let keys: Vec<String> = type_nodes(&tm).into_iter().map(|(k, _, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                format!("{}/type/col2", COLUMN_KEY),
                format!("{}/type/col2/b", COLUMN_KEY),
                format!("{}/type/col2/a", COLUMN_KEY),
                format!("{}/type/col2/a/_inner_", COLUMN_KEY),
            ]
        );

        let (nodes, _) = tm.flatten("Column", COLUMN_KEY);
        assert_eq!(nodes[1].attributes["sort_order"].to_string(), "0");
        assert!(!nodes[0].attributes.contains_key("sort_order"));
    }

    #[test]
    fn test_description_and_badges_on_nested_node() {
        let mut tm = TypeMetadata::parse("col3", "struct<inner:map<string,int>>").unwrap();
        let node = tm.descendant_mut(&["inner", "_map_value"]).unwrap();
        node.description = Some("the counts".to_string());
        node.badges.push(Badge::new("pii", "column"));

        let (nodes, relations) = tm.flatten("Column", COLUMN_KEY);
        let value_key = format!("{}/type/col3/inner/_map_value", COLUMN_KEY);

        let description = nodes
            .iter()
            .find(|n| n.label == "Description")
            .unwrap();
        assert_eq!(description.key, format!("{}/_description", value_key));
        assert!(relations.iter().any(|r| r.relation_type == "DESCRIPTION"
            && r.start_key == value_key
            && r.end_key == description.key));

        assert!(nodes.iter().any(|n| n.label == "Badge" && n.key == "pii"));
        assert!(relations
            .iter()
            .any(|r| r.relation_type == "HAS_BADGE" && r.start_key == value_key));
    }

    #[test]
    fn test_parse_scalar_with_params() {
        let tm = TypeMetadata::parse("amount", "decimal(10, 2)").unwrap();
        assert!(!tm.is_nested());
        assert_eq!(tm.data_type, "decimal(10, 2)");

        let tm = TypeMetadata::parse("c", "map<string, struct<`x y`:decimal(4,1)>>").unwrap();
        let field = tm.children()[1].1.children()[0].1.clone();
        assert_eq!(field.name, "x y");
        assert_eq!(field.data_type, "decimal(4,1)");
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeMetadata::parse("c", "array<string").is_err());
        assert!(TypeMetadata::parse("c", "map<string>").is_err());
        assert!(TypeMetadata::parse("c", "struct<a int>").is_err());
        assert!(TypeMetadata::parse("c", "string extra").is_err());
        assert!(TypeMetadata::parse("c", "").is_err());
    }

    fn nested_arrays(levels: usize) -> String {
        format!("{}string{}", "array<".repeat(levels), ">".repeat(levels))
    }

    #[test]
    fn test_nesting_limit() {
        let tm = TypeMetadata::parse("c", &nested_arrays(MAX_TYPE_DEPTH - 1)).unwrap();
        let (nodes, _) = tm.flatten("Column", COLUMN_KEY);
        assert_eq!(nodes.len(), MAX_TYPE_DEPTH);

        let err = TypeMetadata::parse("c", &nested_arrays(MAX_TYPE_DEPTH)).unwrap_err();
        assert!(matches!(err, GraphError::TypeParse(_)));
        assert!(TypeMetadata::parse("c", &nested_arrays(500)).is_err());
    }

    #[test]
    fn test_root_key() {
        let tm = TypeMetadata::parse("col1", "array<string>").unwrap();
        assert_eq!(tm.root_key(COLUMN_KEY), format!("{}/type/col1", COLUMN_KEY));
    }
}
