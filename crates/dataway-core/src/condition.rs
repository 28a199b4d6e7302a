//! Structured filter clauses.
//!
//! A [`Clause`] is a closed variant: empty, a single `column op value`
//! comparison, or an And/Or combination of child clauses. The constructors
//! collapse malformed input (blank column name, null or empty value) to
//! [`Clause::Empty`] so that absent filters never reach SQL generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Comparison operators supported by the SQL compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// How child clauses of a combination are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Combinator {
    And,
    Or,
}

/// Errors raised while constructing or compiling clauses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClauseError {
    #[error("invalid value for column {0}")]
    InvalidValue(String),
}

/// A structured filter expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Clause {
    /// The absent filter. Compiles to an empty fragment; callers must omit
    /// the WHERE keyword entirely.
    #[default]
    Empty,
    #[serde(rename_all = "camelCase")]
    Single { name: String, op: Op, value: Value },
    #[serde(rename_all = "camelCase")]
    Combine {
        combinator: Combinator,
        clauses: Vec<Clause>,
    },
}

fn single(name: &str, op: Op, value: Value) -> Clause {
    if name.trim().is_empty() || value.is_null() {
        return Clause::Empty;
    }
    Clause::Single {
        name: name.to_string(),
        op,
        value,
    }
}

impl Clause {
    pub fn eq(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::Eq, value.into())
    }

    pub fn not_eq(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::NotEq, value.into())
    }

    pub fn gt(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::Gt, value.into())
    }

    pub fn gte(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::Gte, value.into())
    }

    pub fn lt(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::Lt, value.into())
    }

    pub fn lte(name: &str, value: impl Into<Value>) -> Clause {
        single(name, Op::Lte, value.into())
    }

    pub fn like(name: &str, value: &str) -> Clause {
        if value.is_empty() {
            return Clause::Empty;
        }
        single(name, Op::Like, Value::String(value.to_string()))
    }

    pub fn not_like(name: &str, value: &str) -> Clause {
        if value.is_empty() {
            return Clause::Empty;
        }
        single(name, Op::NotLike, Value::String(value.to_string()))
    }

    pub fn is_in(name: &str, values: Vec<Value>) -> Clause {
        if values.is_empty() {
            return Clause::Empty;
        }
        single(name, Op::In, Value::Array(values))
    }

    pub fn not_in(name: &str, values: Vec<Value>) -> Clause {
        if values.is_empty() {
            return Clause::Empty;
        }
        single(name, Op::NotIn, Value::Array(values))
    }

    pub fn is_null(name: &str) -> Clause {
        if name.trim().is_empty() {
            return Clause::Empty;
        }
        Clause::Single {
            name: name.to_string(),
            op: Op::IsNull,
            value: Value::Null,
        }
    }

    pub fn is_not_null(name: &str) -> Clause {
        if name.trim().is_empty() {
            return Clause::Empty;
        }
        Clause::Single {
            name: name.to_string(),
            op: Op::IsNotNull,
            value: Value::Null,
        }
    }

    pub fn and(clauses: Vec<Clause>) -> Clause {
        Clause::Combine {
            combinator: Combinator::And,
            clauses,
        }
    }

    pub fn or(clauses: Vec<Clause>) -> Clause {
        Clause::Combine {
            combinator: Combinator::Or,
            clauses,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Clause::Empty => true,
            Clause::Single { .. } => false,
            Clause::Combine { clauses, .. } => clauses.iter().all(Clause::is_empty),
        }
    }
}
