//! Query template engine
//!
//! Templates are Cypher text with `${name}` placeholders for structural tokens
//! (labels, relationship patterns, optional clauses). Data never goes through a
//! placeholder: every value is collected into the statement's parameter map and
//! referenced as `$param` in the rendered text.

use super::models::{Model, NodeType};
use super::packer::{self, Properties, WireMap};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Placeholders that render as nothing when no substitution is given.
const OPTIONAL_PLACEHOLDERS: &[&str] = &["type", "predicate", "page"];

/// Errors raised while rendering a template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("no substitution for placeholder `{0}`")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("parameter `{0}` bound twice")]
    ParameterConflict(String),
}

/// A rendered statement ready to be sent to the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub statement: String,
    pub parameters: WireMap,
}

/// Quote a label, relationship type or property key as a Cypher identifier.
pub fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Caller-supplied boolean expression with its own parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub clause: String,
    pub parameters: WireMap,
}

/// Filter over node (or edge) properties.
///
/// Equality terms are keyed by wire key, so framework fields use the
/// `origins:` namespace (see [`Predicate::field`]). A `Null` value matches an
/// absent key. An optional expression is AND-ed to the equality terms; it
/// refers to the matched entity through the alias the template uses (`n` for
/// nodes, `r` for edges).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    pub equals: WireMap,
    pub expression: Option<Expression>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality over a set of domain properties
    pub fn properties(properties: Properties) -> Self {
        Self {
            equals: properties,
            expression: None,
        }
    }

    /// Equality over a framework field (`id` -> `origins:id`)
    pub fn field(name: &str, value: impl Into<Value>) -> Self {
        Self::new().and_field(name, value)
    }

    /// Equality over a single domain property
    pub fn property(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and_property(name, value)
    }

    /// Caller-supplied Cypher expression
    pub fn expression(clause: impl Into<String>, parameters: WireMap) -> Self {
        Self {
            equals: WireMap::new(),
            expression: Some(Expression {
                clause: clause.into(),
                parameters,
            }),
        }
    }

    pub fn and_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.equals.insert(packer::key(name), value.into());
        self
    }

    pub fn and_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.expression.is_none()
    }

    /// Evaluate the equality terms against a property map.
    ///
    /// Returns `None` when the predicate carries an expression, which only a
    /// Cypher-speaking store can evaluate.
    pub fn matches(&self, wire: &WireMap) -> Option<bool> {
        if self.expression.is_some() {
            return None;
        }
        Some(self.equals.iter().all(|(k, v)| match (wire.get(k), v) {
            (None, Value::Null) => true,
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }))
    }
}

/// Common filter options for match operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOptions {
    pub node_type: Option<NodeType>,
    pub predicate: Option<Predicate>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl MatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Fail early when the options cannot be rendered against `alias`,
    /// e.g. an expression binding a parameter the page also binds.
    pub fn validate(&self, alias: &str) -> Result<(), TemplateError> {
        Substitutions::new().options(alias, self).map(|_| ())
    }
}

/// Runtime substitutions for a [`QueryTemplate`].
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    tokens: BTreeMap<String, String>,
    conditions: Vec<String>,
    parameters: WireMap,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw structural token. Callers must only pass quoted identifiers or
    /// fixed Cypher fragments here.
    pub fn token(mut self, name: &str, rendered: impl Into<String>) -> Self {
        self.tokens.insert(name.to_string(), rendered.into());
        self
    }

    /// `${model}` as a label qualifier
    pub fn model(self, model: Model) -> Self {
        let rendered = format!(":{}", quote(model.label()));
        self.token("model", rendered)
    }

    /// `${type}` as an optional label qualifier
    pub fn node_type(self, node_type: Option<NodeType>) -> Self {
        match node_type {
            Some(t) => {
                let rendered = format!(":{}", quote(t.as_str()));
                self.token("type", rendered)
            }
            None => self,
        }
    }

    /// Bind a data value
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Result<Self, TemplateError> {
        if self.parameters.contains_key(name) {
            return Err(TemplateError::ParameterConflict(name.to_string()));
        }
        self.parameters.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Add the predicate's terms to `${predicate}`, applied to `alias`.
    pub fn filter(
        mut self,
        alias: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Self, TemplateError> {
        let Some(predicate) = predicate else {
            return Ok(self);
        };

        for (i, (k, v)) in predicate.equals.iter().enumerate() {
            if v.is_null() {
                self.conditions
                    .push(format!("{}.{} IS NULL", alias, quote(k)));
                continue;
            }
            let name = format!("{}_{}", alias, i);
            self.conditions
                .push(format!("{}.{} = ${}", alias, quote(k), name));
            self = self.param(&name, v.clone())?;
        }

        if let Some(expr) = &predicate.expression {
            self.conditions.push(format!("({})", expr.clause));
            for (k, v) in &expr.parameters {
                self = self.param(k, v.clone())?;
            }
        }

        Ok(self)
    }

    /// `${page}` as `SKIP $skip LIMIT $limit`, each part only when given.
    pub fn page(mut self, limit: Option<u64>, skip: Option<u64>) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        if let Some(skip) = skip {
            parts.push("SKIP $skip");
            self = self.param("skip", skip)?;
        }
        if let Some(limit) = limit {
            parts.push("LIMIT $limit");
            self = self.param("limit", limit)?;
        }
        if parts.is_empty() {
            Ok(self)
        } else {
            Ok(self.token("page", parts.join(" ")))
        }
    }

    /// Shorthand for the type/predicate/page trio of [`MatchOptions`].
    pub fn options(self, alias: &str, options: &MatchOptions) -> Result<Self, TemplateError> {
        self.node_type(options.node_type)
            .filter(alias, options.predicate.as_ref())?
            .page(options.limit, options.skip)
    }

    fn lookup(&self, name: &str) -> Result<String, TemplateError> {
        if name == "predicate" {
            return Ok(if self.conditions.is_empty() {
                String::new()
            } else {
                format!("WHERE {}\n", self.conditions.join(" AND "))
            });
        }
        match self.tokens.get(name) {
            Some(rendered) => Ok(rendered.clone()),
            None if OPTIONAL_PLACEHOLDERS.contains(&name) => Ok(String::new()),
            None => Err(TemplateError::UnknownPlaceholder(name.to_string())),
        }
    }
}

/// Cypher text with `${name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct QueryTemplate {
    source: &'static str,
}

impl QueryTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Render the template into a statement plus its bound parameters.
    pub fn render(&self, subs: Substitutions) -> Result<Statement, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source;
        let mut offset = 0;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or(TemplateError::Unterminated(offset + start))?;
            out.push_str(&subs.lookup(&after[..end])?);
            let consumed = start + 2 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);

        Ok(Statement {
            statement: out.trim_end().to_string(),
            parameters: subs.parameters,
        })
    }
}
