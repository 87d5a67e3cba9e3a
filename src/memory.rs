//! In-process graph store that executes the publisher's statement dialect.
//!
//! Useful for tests and dry runs: it enforces tag and edge schemas, so an
//! insert into an undeclared element or property fails the way a live store
//! would. Clones share state.

use crate::backend::{GraphStore, QueryResult, QueryRow, StoreResult};
use crate::error::StoreError;
use crate::schema::{PropertySet, SchemaKind};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Stored property values; strings unescaped, other literals verbatim.
pub type PropertyValues = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct State {
    schemas: HashMap<(SchemaKind, String), PropertySet>,
    vertices: BTreeMap<(String, String), PropertyValues>,
    edges: BTreeMap<(String, String, String), PropertyValues>,
    executed: Vec<String>,
    attempts: usize,
    failures: VecDeque<StoreError>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic mid-statement leaves no partial state worth discarding.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare an element up front, as if an earlier run had created it.
    pub fn with_schema(self, kind: SchemaKind, label: &str, properties: &[(&str, &str)]) -> Self {
        let properties = properties
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect();
        self.lock().schemas.insert((kind, label.to_string()), properties);
        self
    }

    /// Make the next statement fail with `err` instead of executing.
    pub fn fail_next(&self, err: StoreError) {
        self.lock().failures.push_back(err);
    }

    /// Successfully executed statements, in order
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Every execute call, including injected failures
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn schema(&self, kind: SchemaKind, label: &str) -> Option<PropertySet> {
        self.lock().schemas.get(&(kind, label.to_string())).cloned()
    }

    pub fn vertex(&self, label: &str, key: &str) -> Option<PropertyValues> {
        self.lock()
            .vertices
            .get(&(label.to_string(), key.to_string()))
            .cloned()
    }

    pub fn edge(&self, edge_type: &str, start: &str, end: &str) -> Option<PropertyValues> {
        self.lock()
            .edges
            .get(&(edge_type.to_string(), start.to_string(), end.to_string()))
            .cloned()
    }

    pub fn vertex_count(&self, label: &str) -> usize {
        self.lock().vertices.keys().filter(|(l, _)| l == label).count()
    }

    pub fn edge_count(&self, edge_type: &str) -> usize {
        self.lock().edges.keys().filter(|(t, _, _)| t == edge_type).count()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn execute(&self, statement: &str) -> StoreResult<QueryResult> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.closed {
            return Err(StoreError::Unreachable("session closed".to_string()));
        }
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let result = apply(&mut state, statement)?;
        state.executed.push(statement.to_string());
        Ok(result)
    }

    fn is_connected(&self) -> bool {
        !self.lock().closed
    }

    async fn close(&self) -> StoreResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}

fn apply(state: &mut State, statement: &str) -> StoreResult<QueryResult> {
    let mut scan = Scanner::new(statement);
    let verb = scan.word()?;

    match verb.to_uppercase().as_str() {
        "CREATE" => {
            let kind = scan.kind()?;
            let label = scan.word()?;
            let defs = scan.column_defs()?;
            let key = (kind, label);
            if state.schemas.contains_key(&key) {
                return Err(StoreError::AlreadyExists("Existed!".to_string()));
            }
            state.schemas.insert(key, defs.into_iter().collect());
            Ok(Vec::new())
        }
        "DESCRIBE" => {
            let kind = scan.kind()?;
            let label = scan.word()?;
            let properties = state
                .schemas
                .get(&(kind, label.clone()))
                .ok_or_else(|| not_found(kind, &label))?;
            Ok(properties
                .iter()
                .map(|(name, prop_type)| {
                    let mut row = QueryRow::new();
                    row.insert("Field", json!(name));
                    row.insert("Type", json!(prop_type));
                    row.insert("Null", json!("YES"));
                    row
                })
                .collect())
        }
        "ALTER" => {
            let kind = scan.kind()?;
            let label = scan.word()?;
            let action = scan.word()?.to_uppercase();
            let properties = state
                .schemas
                .get_mut(&(kind, label.clone()))
                .ok_or_else(|| not_found(kind, &label))?;
            match action.as_str() {
                "ADD" => {
                    for (name, prop_type) in scan.column_defs()? {
                        if properties.contains_key(&name) {
                            return Err(execution(format!("property {} already exists", name)));
                        }
                        properties.insert(name, prop_type);
                    }
                }
                "CHANGE" => {
                    for (name, prop_type) in scan.column_defs()? {
                        if !properties.contains_key(&name) {
                            return Err(execution(format!("property {} not found", name)));
                        }
                        properties.insert(name, prop_type);
                    }
                }
                "DROP" => {
                    for name in scan.name_list()? {
                        if properties.remove(&name).is_none() {
                            return Err(execution(format!("property {} not found", name)));
                        }
                    }
                }
                other => return Err(execution(format!("unsupported ALTER action {}", other))),
            }
            Ok(Vec::new())
        }
        "INSERT" => {
            let target = scan.word()?.to_uppercase();
            let kind = match target.as_str() {
                "VERTEX" => SchemaKind::Tag,
                "EDGE" => SchemaKind::Edge,
                other => return Err(execution(format!("cannot insert {}", other))),
            };
            let label = scan.word()?;
            let names = scan.name_list()?;
            let declared = state
                .schemas
                .get(&(kind, label.clone()))
                .ok_or_else(|| not_found(kind, &label))?;
            if let Some(unknown) = names.iter().find(|n| !declared.contains_key(*n)) {
                return Err(execution(format!("unknown property {} on {}", unknown, label)));
            }

            scan.keyword("VALUES")?;
            loop {
                let start = scan.string()?;
                let end = if kind == SchemaKind::Edge {
                    scan.punct("->")?;
                    Some(scan.string()?)
                } else {
                    None
                };
                scan.punct(":")?;
                let values = scan.value_list()?;
                if values.len() != names.len() {
                    return Err(execution(format!(
                        "{} values for {} properties",
                        values.len(),
                        names.len()
                    )));
                }
                let row: PropertyValues = names.iter().cloned().zip(values).collect();

                match end {
                    Some(end) => state.edges.insert((label.clone(), start, end), row),
                    None => state.vertices.insert((label.clone(), start), row),
                };

                if !scan.try_punct(",") {
                    break;
                }
            }
            scan.finish()?;
            Ok(Vec::new())
        }
        other => Err(execution(format!("unsupported statement {}", other))),
    }
}

fn execution(message: String) -> StoreError {
    StoreError::Execution(message)
}

fn not_found(kind: SchemaKind, label: &str) -> StoreError {
    StoreError::Execution(format!("{} {} not found", kind, label))
}

/// Tokenizer over one statement.
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn syntax(&self, expected: &str) -> StoreError {
        StoreError::Execution(format!("syntax error: expected {} at offset {}", expected, self.pos))
    }

    fn word(&mut self) -> StoreResult<String> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.syntax("identifier"));
        }
        let word = self.rest()[..len].to_string();
        self.pos += len;
        Ok(word)
    }

    fn keyword(&mut self, keyword: &str) -> StoreResult<()> {
        let word = self.word()?;
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(self.syntax(keyword))
        }
    }

    fn kind(&mut self) -> StoreResult<SchemaKind> {
        match self.word()?.to_uppercase().as_str() {
            "TAG" => Ok(SchemaKind::Tag),
            "EDGE" => Ok(SchemaKind::Edge),
            _ => Err(self.syntax("TAG or EDGE")),
        }
    }

    fn try_punct(&mut self, punct: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(punct) {
            self.pos += punct.len();
            true
        } else {
            false
        }
    }

    fn punct(&mut self, punct: &str) -> StoreResult<()> {
        if self.try_punct(punct) {
            Ok(())
        } else {
            Err(self.syntax(punct))
        }
    }

    fn string(&mut self) -> StoreResult<String> {
        self.skip_ws();
        let mut chars = self.rest().char_indices();
        if !matches!(chars.next(), Some((_, '"'))) {
            return Err(self.syntax("string literal"));
        }

        let mut out = String::new();
        while let Some((idx, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += idx + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(self.syntax("closing quote"))
    }

    /// `(name type NULL, ...)`
    fn column_defs(&mut self) -> StoreResult<Vec<(String, String)>> {
        self.punct("(")?;
        let mut defs = Vec::new();
        if self.try_punct(")") {
            return Ok(defs);
        }
        loop {
            let name = self.word()?;
            let prop_type = self.word()?.to_lowercase();
            self.keyword("NULL")?;
            defs.push((name, prop_type));
            if self.try_punct(")") {
                return Ok(defs);
            }
            self.punct(",")?;
        }
    }

    /// `(name, ...)`
    fn name_list(&mut self) -> StoreResult<Vec<String>> {
        self.punct("(")?;
        let mut names = Vec::new();
        if self.try_punct(")") {
            return Ok(names);
        }
        loop {
            names.push(self.word()?);
            if self.try_punct(")") {
                return Ok(names);
            }
            self.punct(",")?;
        }
    }

    /// `(value, ...)` where a value is a string literal or a bare expression.
    fn value_list(&mut self) -> StoreResult<Vec<String>> {
        self.punct("(")?;
        let mut values = Vec::new();
        loop {
            self.skip_ws();
            if self.rest().starts_with('"') {
                values.push(self.string()?);
            } else {
                values.push(self.expression()?);
            }
            if self.try_punct(")") {
                return Ok(values);
            }
            self.punct(",")?;
        }
    }

    /// Raw text up to the next top-level `,` or `)`.
    fn expression(&mut self) -> StoreResult<String> {
        let mut depth = 0usize;
        for (idx, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' if depth > 0 => depth -= 1,
                ',' | ')' if depth == 0 => {
                    let expr = self.rest()[..idx].trim().to_string();
                    if expr.is_empty() {
                        return Err(self.syntax("value"));
                    }
                    self.pos += idx;
                    return Ok(expr);
                }
                _ => {}
            }
        }
        Err(self.syntax(")"))
    }

    fn finish(&mut self) -> StoreResult<()> {
        self.skip_ws();
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(self.syntax("end of statement"))
        }
    }
}
