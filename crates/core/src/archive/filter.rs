//! Eligibility filter shared by the engine and the storage adapters.

use std::cmp::Ordering;

use dbarchive_domain::{ArchiveConfig, ArchiveRow, ComparisonOp, Predicate, SqlValue};

/// `date_column < cutoff AND all(conditions)` for one source table, plus the
/// ordering rows are taken in.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityFilter {
    pub table: String,
    pub date_column: String,
    pub cutoff: SqlValue,
    pub conditions: Vec<Predicate>,
    pub primary_key_column: String,
}

impl EligibilityFilter {
    pub fn new(table: impl Into<String>, config: &ArchiveConfig, cutoff: SqlValue) -> Self {
        Self {
            table: table.into(),
            date_column: config.date_column.clone(),
            cutoff,
            conditions: config.conditions.clone(),
            primary_key_column: config.primary_key_column.clone(),
        }
    }

    /// Columns rows are ordered by, ascending.
    pub fn order_columns(&self) -> [&str; 2] {
        [self.date_column.as_str(), self.primary_key_column.as_str()]
    }

    /// Evaluate the filter against an in-memory row with SQL semantics:
    /// a missing column or a NULL comparison never matches.
    pub fn matches(&self, row: &ArchiveRow) -> bool {
        let before_cutoff = row
            .get(&self.date_column)
            .and_then(|value| value.compare(&self.cutoff))
            .is_some_and(Ordering::is_lt);

        before_cutoff && self.conditions.iter().all(|predicate| predicate_matches(predicate, row))
    }
}

fn predicate_matches(predicate: &Predicate, row: &ArchiveRow) -> bool {
    let Some((column, op, expected)) = predicate.comparison() else {
        return false;
    };
    let Some(actual) = row.get(column) else {
        return false;
    };

    match op {
        ComparisonOp::Like => like_text(actual)
            .zip(like_text(expected))
            .is_some_and(|(text, pattern)| like_matches(&text, &pattern)),
        ComparisonOp::NotLike => like_text(actual)
            .zip(like_text(expected))
            .is_some_and(|(text, pattern)| !like_matches(&text, &pattern)),
        op => actual.compare(expected).is_some_and(|ordering| match op {
            ComparisonOp::Eq => ordering.is_eq(),
            ComparisonOp::NotEq => ordering.is_ne(),
            ComparisonOp::Lt => ordering.is_lt(),
            ComparisonOp::Le => ordering.is_le(),
            ComparisonOp::Gt => ordering.is_gt(),
            ComparisonOp::Ge => ordering.is_ge(),
            ComparisonOp::Like | ComparisonOp::NotLike => false,
        }),
    }
}

fn like_text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null | SqlValue::Blob(_) => None,
        SqlValue::Integer(v) => Some(v.to_string()),
        SqlValue::Real(v) => Some(v.to_string()),
        SqlValue::Text(v) => Some(v.clone()),
        SqlValue::RawText(v) => Some(String::from_utf8_lossy(v).into_owned()),
    }
}

/// SQLite `LIKE`: `%` matches any run, `_` one character, ASCII case folded.
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    // matched[j]: pattern[..j] matches the text prefix consumed so far.
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for (j, p) in pattern.iter().enumerate() {
        matched[j + 1] = matched[j] && *p == '%';
    }

    for t in &text {
        let mut next = vec![false; pattern.len() + 1];
        for (j, p) in pattern.iter().enumerate() {
            next[j + 1] = match p {
                '%' => next[j] || matched[j + 1],
                '_' => matched[j],
                literal => matched[j] && literal == t,
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}
