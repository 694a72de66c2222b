//! Eligibility predicates
//!
//! Configuration accepts conditions in several loose shapes. They are
//! normalised into [`Predicate`] once, when settings are built. An entry that
//! cannot be understood is kept as [`Predicate::Unusable`], which matches no
//! rows: conditions are ANDed, so dropping one would widen the filter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::value::SqlValue;

/// Comparison operators accepted in `[column, operator, value]` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl ComparisonOp {
    /// SQL spelling of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ComparisonOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        match normalised.as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            _ => Err(format!("Invalid ComparisonOp: {s}")),
        }
    }
}

/// A filter that is ANDed with the cutoff comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Equals { column: String, value: SqlValue },
    Compare { column: String, op: ComparisonOp, value: SqlValue },
    /// A configured condition that could not be parsed. Never matches.
    Unusable { entry: String, reason: String },
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::Equals { column: column.into(), value: value.into() }
    }

    pub fn compare(column: impl Into<String>, op: ComparisonOp, value: impl Into<SqlValue>) -> Self {
        Self::Compare { column: column.into(), op, value: value.into() }
    }

    fn unusable(entry: impl fmt::Display, reason: impl Into<String>) -> Self {
        let entry = entry.to_string();
        let reason = reason.into();
        warn!(condition = %entry, reason = %reason, "condition cannot be applied; the table will not be archived");
        Self::Unusable { entry, reason }
    }

    /// `(column, operator, value)` as rendered; `Equals` is plain `=`.
    /// `None` for an unusable condition.
    pub fn comparison(&self) -> Option<(&str, ComparisonOp, &SqlValue)> {
        match self {
            Self::Equals { column, value } => Some((column, ComparisonOp::Eq, value)),
            Self::Compare { column, op, value } => Some((column, *op, value)),
            Self::Unusable { .. } => None,
        }
    }

    pub const fn is_usable(&self) -> bool {
        !matches!(self, Self::Unusable { .. })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { column, value } => write!(f, "{column} = {value}"),
            Self::Compare { column, op, value } => write!(f, "{column} {op} {value}"),
            Self::Unusable { entry, reason } => write!(f, "{entry} ({reason})"),
        }
    }
}

/// Condition exactly as written in a configuration file.
///
/// `["status", "=", "closed"]`, `["status", "closed"]` and
/// `{ status = "closed" }` are all accepted; anything else lands in
/// `Other` and becomes [`Predicate::Unusable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCondition {
    Positional(Vec<SqlValue>),
    Keyed(BTreeMap<String, SqlValue>),
    Other(serde_json::Value),
}

impl RawCondition {
    /// Normalise into predicates. Never fails and never loses an entry.
    pub fn into_predicates(self) -> Vec<Predicate> {
        match self {
            Self::Keyed(pairs) if pairs.is_empty() => {
                vec![Predicate::unusable("{}", "empty condition table")]
            }
            Self::Keyed(pairs) => pairs
                .into_iter()
                .map(|(column, value)| {
                    if column.trim().is_empty() {
                        Predicate::unusable(format!("{{ \"{column}\" = {value} }}"), "empty column name")
                    } else {
                        Predicate::Equals { column, value }
                    }
                })
                .collect(),
            Self::Positional(parts) => vec![positional_predicate(parts)],
            Self::Other(value) => vec![Predicate::unusable(value, "unsupported condition shape")],
        }
    }
}

fn positional_predicate(parts: Vec<SqlValue>) -> Predicate {
    let entry = format!(
        "[{}]",
        parts.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    let arity = parts.len();
    let mut parts = parts.into_iter();
    let column = match parts.next() {
        Some(SqlValue::Text(column)) if !column.trim().is_empty() => column,
        _ => return Predicate::unusable(entry, "first element must be a column name"),
    };

    match (arity, parts.next(), parts.next()) {
        (2, Some(value), None) => Predicate::Equals { column, value },
        (3, Some(SqlValue::Text(op)), Some(value)) => match op.parse::<ComparisonOp>() {
            Ok(op) => Predicate::Compare { column, op, value },
            Err(err) => Predicate::unusable(entry, err),
        },
        (3, _, _) => Predicate::unusable(entry, "operator must be a string"),
        _ => Predicate::unusable(entry, "expected [column, value] or [column, operator, value]"),
    }
}

/// Normalise a list of raw conditions, preserving declaration order.
pub fn normalise_conditions(raw: Vec<RawCondition>) -> Vec<Predicate> {
    raw.into_iter().flat_map(RawCondition::into_predicates).collect()
}
