//! Declaration-ordered list of configured tables.

use serde::{Deserialize, Serialize};

/// Tables in the order they were configured. Drives "next table" lookups in
/// sequential mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSequence {
    tables: Vec<String>,
}

impl TableSequence {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tables: tables.into_iter().map(Into::into).collect() }
    }

    pub fn first(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    /// The entry strictly after the first occurrence of `table`; `None` when
    /// `table` is last or not configured.
    pub fn next_after(&self, table: &str) -> Option<&str> {
        let position = self.tables.iter().position(|candidate| candidate == table)?;
        self.tables.get(position + 1).map(String::as_str)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|candidate| candidate == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
