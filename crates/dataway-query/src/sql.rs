//! Clause-to-SQL compilation, parameterized per backend dialect.
//!
//! Compilation never emits a dangling `WHERE`: an empty clause compiles to
//! an empty fragment and callers omit the keyword entirely. Malformed
//! single clauses (blank column, null value) compile to empty as well, the
//! safety valve against misuse producing broken SQL text.

use dataway_core::{Clause, ClauseError, Combinator, Op};
use serde_json::Value;

/// Identifier quoting, placeholder style and LIMIT syntax for one backend
/// family.
#[derive(Debug, Clone, Copy)]
pub struct SqlDialect {
    quote_open: char,
    quote_close: char,
    /// `$1, $2, ...` instead of `?`.
    numbered_placeholders: bool,
    /// `LIMIT offset, size` instead of `LIMIT size OFFSET offset`.
    comma_limit: bool,
}

pub const MYSQL: SqlDialect = SqlDialect {
    quote_open: '`',
    quote_close: '`',
    numbered_placeholders: false,
    comma_limit: true,
};

pub const POSTGRES: SqlDialect = SqlDialect {
    quote_open: '"',
    quote_close: '"',
    numbered_placeholders: true,
    comma_limit: false,
};

impl SqlDialect {
    pub fn quote(&self, ident: &str) -> String {
        format!("{}{}{}", self.quote_open, ident, self.quote_close)
    }

    fn placeholder(&self, n: &mut usize) -> String {
        *n += 1;
        if self.numbered_placeholders {
            format!("${}", n)
        } else {
            "?".to_string()
        }
    }

    fn limit_clause(&self, offset: u64, size: u64) -> String {
        if self.comma_limit {
            format!("LIMIT {}, {}", offset, size)
        } else {
            format!("LIMIT {} OFFSET {}", size, offset)
        }
    }

    /// Compile a clause into a WHERE fragment plus its bound parameters, in
    /// placeholder order. An empty clause yields `("", [])`.
    pub fn compile(&self, clause: &Clause) -> Result<(String, Vec<Value>), ClauseError> {
        let mut n = 0;
        Ok(self.compile_inner(clause, &mut n)?.unwrap_or_default())
    }

    fn compile_inner(
        &self,
        clause: &Clause,
        n: &mut usize,
    ) -> Result<Option<(String, Vec<Value>)>, ClauseError> {
        match clause {
            Clause::Empty => Ok(None),
            Clause::Single { name, op, value } => self.compile_single(name, *op, value, n),
            Clause::Combine {
                combinator,
                clauses,
            } => {
                let mut fragments = Vec::with_capacity(clauses.len());
                let mut params = Vec::new();
                for child in clauses {
                    // Children that compile to empty are silently dropped.
                    if let Some((frag, mut vals)) = self.compile_inner(child, n)? {
                        fragments.push(format!("({})", frag));
                        params.append(&mut vals);
                    }
                }
                if fragments.is_empty() {
                    return Ok(None);
                }
                let joiner = match combinator {
                    Combinator::And => " AND ",
                    Combinator::Or => " OR ",
                };
                Ok(Some((fragments.join(joiner), params)))
            }
        }
    }

    fn compile_single(
        &self,
        name: &str,
        op: Op,
        value: &Value,
        n: &mut usize,
    ) -> Result<Option<(String, Vec<Value>)>, ClauseError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let col = self.quote(name);
        let needs_value = !matches!(op, Op::IsNull | Op::IsNotNull);
        if needs_value && value.is_null() {
            return Ok(None);
        }
        let compiled = match op {
            Op::Eq => (format!("{} = {}", col, self.placeholder(n)), vec![value.clone()]),
            Op::NotEq => (
                format!("{} <> {}", col, self.placeholder(n)),
                vec![value.clone()],
            ),
            Op::Gt => (format!("{} > {}", col, self.placeholder(n)), vec![value.clone()]),
            Op::Gte => (
                format!("{} >= {}", col, self.placeholder(n)),
                vec![value.clone()],
            ),
            Op::Lt => (format!("{} < {}", col, self.placeholder(n)), vec![value.clone()]),
            Op::Lte => (
                format!("{} <= {}", col, self.placeholder(n)),
                vec![value.clone()],
            ),
            Op::Like => (
                format!("{} LIKE {}", col, self.placeholder(n)),
                vec![Value::String(format!("%{}%", scalar_text(name, value)?))],
            ),
            Op::NotLike => (
                format!("{} NOT LIKE {}", col, self.placeholder(n)),
                vec![Value::String(format!("%{}%", scalar_text(name, value)?))],
            ),
            Op::In | Op::NotIn => {
                let items = match value {
                    Value::Array(items) if !items.is_empty() => items.clone(),
                    Value::Array(_) => return Ok(None),
                    _ => return Err(ClauseError::InvalidValue(name.to_string())),
                };
                let placeholders: Vec<String> =
                    items.iter().map(|_| self.placeholder(n)).collect();
                let keyword = if op == Op::In { "IN" } else { "NOT IN" };
                (
                    format!("{} {} ({})", col, keyword, placeholders.join(", ")),
                    items,
                )
            }
            Op::IsNull => (format!("{} IS NULL", col), vec![]),
            Op::IsNotNull => (format!("{} IS NOT NULL", col), vec![]),
        };
        Ok(Some(compiled))
    }

    /// `SELECT COUNT(*)` over the expression as a derived subquery.
    pub fn count_expression_sql(&self, expression: &str) -> String {
        format!("SELECT COUNT(*) FROM ({}) TMP_COUNT", expression)
    }

    /// Bounded page over the expression as a derived subquery.
    pub fn page_expression_sql(&self, expression: &str, offset: u64, size: u64) -> String {
        format!(
            "SELECT * FROM ({}) TMP_PAGE {}",
            expression,
            self.limit_clause(offset, size)
        )
    }

    /// Single-limit select used for the unpaged sentinel.
    pub fn limit_expression_sql(&self, expression: &str, limit: u64) -> String {
        format!("SELECT * FROM ({}) TMP_PAGE LIMIT {}", expression, limit)
    }

    /// `SELECT COUNT(*)` over a table with an optional pre-compiled WHERE
    /// fragment.
    pub fn count_table_sql(&self, table: &str, where_fragment: &str) -> String {
        if where_fragment.is_empty() {
            format!("SELECT COUNT(*) FROM {}", self.quote(table))
        } else {
            format!(
                "SELECT COUNT(*) FROM {} WHERE {}",
                self.quote(table),
                where_fragment
            )
        }
    }

    /// Bounded page over a table with an optional pre-compiled WHERE
    /// fragment.
    pub fn select_table_sql(
        &self,
        table: &str,
        where_fragment: &str,
        offset: u64,
        size: u64,
    ) -> String {
        let limit = self.limit_clause(offset, size);
        if where_fragment.is_empty() {
            format!("SELECT * FROM {} {}", self.quote(table), limit)
        } else {
            format!(
                "SELECT * FROM {} WHERE {} {}",
                self.quote(table),
                where_fragment,
                limit
            )
        }
    }
}

fn scalar_text(name: &str, value: &Value) -> Result<String, ClauseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ClauseError::InvalidValue(name.to_string())),
    }
}
