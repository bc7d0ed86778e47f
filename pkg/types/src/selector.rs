use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One requirement of a label selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `key=value` / `key==value`
    Equal(String, String),
    /// `key!=value` — also matches objects without the key.
    NotEqual(String, String),
    /// `key in (a,b)`
    In(String, Vec<String>),
    /// `key notin (a,b)` — also matches objects without the key.
    NotIn(String, Vec<String>),
    /// `key`
    Exists(String),
    /// `!key`
    NotExists(String),
}

/// A parsed label selector: a conjunction of requirements.
///
/// Supports the Kubernetes selector grammar: equality (`=`, `==`, `!=`),
/// set membership (`in`, `notin`), and existence (`key`, `!key`) clauses
/// joined by commas. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to parse label selector {selector:?}: {reason}")]
pub struct ParseError {
    pub selector: String,
    pub reason: String,
}

impl Selector {
    /// A selector matching every label set.
    pub fn everything() -> Self {
        Selector::default()
    }

    /// Build an equality selector from a label map, keys in sorted order.
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        let mut keys: Vec<&String> = labels.keys().collect();
        keys.sort();
        Selector {
            requirements: keys
                .into_iter()
                .map(|k| Requirement::Equal(k.clone(), labels[k].clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Whether the given label map satisfies every requirement.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equal(key, value) => labels.get(key) == Some(value),
            Requirement::NotEqual(key, value) => labels.get(key) != Some(value),
            Requirement::In(key, values) => {
                labels.get(key).is_some_and(|v| values.contains(v))
            }
            Requirement::NotIn(key, values) => {
                !labels.get(key).is_some_and(|v| values.contains(v))
            }
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::NotExists(key) => !labels.contains_key(key),
        })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn parse_requirement(clause: &str, full: &str) -> Result<Requirement, ParseError> {
        let error = |reason: &str| ParseError {
            selector: full.to_string(),
            reason: reason.to_string(),
        };

        let clause = clause.trim();
        if let Some(key) = clause.strip_prefix('!') {
            let key = key.trim();
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::NotExists(key.to_string()));
        }
        if let Some((key, rest)) = split_set_clause(clause, " notin ") {
            let values = parse_value_set(rest).ok_or_else(|| error("malformed notin set"))?;
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::NotIn(key.to_string(), values));
        }
        if let Some((key, rest)) = split_set_clause(clause, " in ") {
            let values = parse_value_set(rest).ok_or_else(|| error("malformed in set"))?;
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::In(key.to_string(), values));
        }
        if let Some((key, value)) = clause.split_once("!=") {
            let key = key.trim();
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::NotEqual(key.to_string(), value.trim().to_string()));
        }
        if let Some((key, value)) = clause.split_once("==") {
            let key = key.trim();
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::Equal(key.to_string(), value.trim().to_string()));
        }
        if let Some((key, value)) = clause.split_once('=') {
            let key = key.trim();
            validate_key(key).map_err(|r| error(&r))?;
            return Ok(Requirement::Equal(key.to_string(), value.trim().to_string()));
        }
        validate_key(clause).map_err(|r| error(&r))?;
        Ok(Requirement::Exists(clause.to_string()))
    }
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Selector::everything());
        }

        let mut requirements = Vec::new();
        for clause in split_top_level(trimmed) {
            requirements.push(Selector::parse_requirement(clause, input)?);
        }
        Ok(Selector { requirements })
    }
}

/// Split on commas that are not inside a `(...)` value set.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    clauses.push(&input[start..]);
    clauses
}

/// Split `key <op> (values)` at the operator keyword, if present.
fn split_set_clause<'a>(clause: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let idx = clause.find(op)?;
    let key = clause[..idx].trim();
    let rest = clause[idx + op.len()..].trim();
    Some((key, rest))
}

fn parse_value_set(rest: &str) -> Option<Vec<String>> {
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    let values: Vec<String> = inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values)
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty label key".to_string());
    }
    if key.contains(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',' || c == '!') {
        return Err(format!("invalid label key {:?}", key));
    }
    Ok(())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for req in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match req {
                Requirement::Equal(k, v) => write!(f, "{}={}", k, v)?,
                Requirement::NotEqual(k, v) => write!(f, "{}!={}", k, v)?,
                Requirement::In(k, vs) => write!(f, "{} in ({})", k, vs.join(","))?,
                Requirement::NotIn(k, vs) => write!(f, "{} notin ({})", k, vs.join(","))?,
                Requirement::Exists(k) => write!(f, "{}", k)?,
                Requirement::NotExists(k) => write!(f, "!{}", k)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Selector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
