//! SQL text rendering and value conversion for the SQLite adapter.
//!
//! Identifiers are always double-quoted; values are always bound
//! parameters.

use dbarchive_core::EligibilityFilter;
use dbarchive_domain::SqlValue;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

/// Most bound parameters put into a single `IN (...)` list.
pub const MAX_IN_LIST_PARAMS: usize = 500;

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Binds a [`SqlValue`] without copying it. TEXT goes to SQLite as the
/// stored bytes, so invalid UTF-8 survives the round trip.
#[derive(Debug, Clone, Copy)]
pub struct Bound<'a>(pub &'a SqlValue);

impl ToSql for Bound<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self.0 {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(v) => ValueRef::Integer(*v),
            SqlValue::Real(v) => ValueRef::Real(*v),
            SqlValue::Text(v) => ValueRef::Text(v.as_bytes()),
            SqlValue::RawText(v) => ValueRef::Text(v),
            SqlValue::Blob(v) => ValueRef::Blob(v),
        }))
    }
}

pub fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(v) => SqlValue::text_from_bytes(v),
        ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
    }
}

/// `WHERE` clause (without the keyword) and its parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl WhereClause {
    /// Parameters ready for `params_from_iter`.
    pub fn bound(&self) -> impl Iterator<Item = Bound<'_>> {
        self.params.iter().map(Bound)
    }
}

/// Render `date_column < cutoff AND <conditions>`. An unusable condition
/// renders as a false term.
pub fn eligibility_clause(filter: &EligibilityFilter) -> WhereClause {
    let mut parts = vec![format!("{} < ?", quote_ident(&filter.date_column))];
    let mut params = vec![filter.cutoff.clone()];

    for predicate in &filter.conditions {
        match predicate.comparison() {
            Some((column, op, value)) => {
                parts.push(format!("{} {} ?", quote_ident(column), op.as_sql()));
                params.push(value.clone());
            }
            None => parts.push("0 = 1".to_string()),
        }
    }

    WhereClause { sql: parts.join(" AND "), params }
}

/// `SELECT COUNT(*)` of the rows matching `filter` in `schema`.
pub fn count_query(schema: &str, filter: &EligibilityFilter) -> WhereClause {
    let clause = eligibility_clause(filter);
    WhereClause {
        sql: format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            qualified(schema, &filter.table),
            clause.sql
        ),
        params: clause.params,
    }
}

/// Ordered, limited selection of full rows matching `filter`.
pub fn select_query(schema: &str, filter: &EligibilityFilter, limit: u64) -> WhereClause {
    let clause = eligibility_clause(filter);
    let order = filter
        .order_columns()
        .iter()
        .map(|column| format!("{} ASC", quote_ident(column)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = clause.params;
    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    WhereClause {
        sql: format!(
            "SELECT * FROM {} WHERE {} ORDER BY {} LIMIT ?",
            qualified(schema, &filter.table),
            clause.sql,
            order
        ),
        params,
    }
}

pub fn insert_statement<'a>(
    schema: &str,
    table: &str,
    columns: impl Iterator<Item = &'a str>,
) -> String {
    let columns: Vec<String> = columns.map(quote_ident).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified(schema, table),
        columns.join(", "),
        placeholders
    )
}

pub fn delete_statement(schema: &str, table: &str, key_column: &str, key_count: usize) -> String {
    let placeholders = vec!["?"; key_count].join(", ");
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        qualified(schema, table),
        quote_ident(key_column),
        placeholders
    )
}

/// Point a source `CREATE TABLE` statement at `schema.archive_table`.
///
/// Everything from the opening parenthesis on (columns, constraints and
/// table options) is kept verbatim.
pub fn retarget_create_table(create_sql: &str, schema: &str, archive_table: &str) -> Option<String> {
    let body = &create_sql[create_sql.find('(')?..];
    Some(format!("CREATE TABLE {} {}", qualified(schema, archive_table), body))
}

/// Point a source `CREATE [UNIQUE] INDEX ... ON table (...)` statement at the
/// archive table, renaming the index after it.
pub fn retarget_create_index(
    create_sql: &str,
    index_name: &str,
    schema: &str,
    archive_table: &str,
) -> Option<String> {
    let upper = create_sql.to_ascii_uppercase();
    let unique = upper.trim_start().starts_with("CREATE UNIQUE");
    let on = upper.find(" ON ")?;
    let columns = &create_sql[on + create_sql[on..].find('(')?..];

    Some(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} {}",
        if unique { "UNIQUE " } else { "" },
        qualified(schema, &format!("{archive_table}__{index_name}")),
        quote_ident(archive_table),
        columns
    ))
}
