// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Statements accepted by a store session.
//!
//! Row data never appears in statement text: inserts and selects carry
//! `?` placeholders and the values travel separately as bound parameters.
//! `Statement::cql` renders the text a CQL driver would receive.

use crate::{ColumnType, Result, StoreError};

/// A column name and its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Physical layout of a table: primary key plus typed columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check names and key membership before anything is sent to a store.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        if self.partition_key.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "table {} has no partition key",
                self.name
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            validate_identifier(&column.name)?;
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(StoreError::InvalidQuery(format!(
                    "table {} declares column {} twice",
                    self.name, column.name
                )));
            }
        }
        for key in self.partition_key.iter().chain(&self.clustering_key) {
            if self.column(key).is_none() {
                return Err(StoreError::InvalidQuery(format!(
                    "key column {} is not a column of table {}",
                    key, self.name
                )));
            }
        }
        Ok(())
    }

    fn primary_key_cql(&self) -> String {
        let partition = if self.partition_key.len() == 1 {
            self.partition_key[0].clone()
        } else {
            format!("({})", self.partition_key.join(", "))
        };
        std::iter::once(partition)
            .chain(self.clustering_key.iter().cloned())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything the loader asks of a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE KEYSPACE IF NOT EXISTS` with SimpleStrategy replication
    CreateKeyspace {
        name: String,
        replication_factor: u32,
    },
    /// `DROP KEYSPACE IF EXISTS`
    DropKeyspace { name: String },
    /// `CREATE TABLE IF NOT EXISTS`
    CreateTable(TableSchema),
    /// `DROP TABLE IF EXISTS`
    DropTable { name: String },
    /// Single-row insert; one bound value per column, in column order
    Insert { table: String, columns: Vec<String> },
    /// Equality lookup; one bound value per predicate column
    Select {
        table: String,
        columns: Vec<String>,
        predicates: Vec<String>,
    },
}

impl Statement {
    /// Number of `?` placeholders in the rendered statement
    pub fn placeholder_count(&self) -> usize {
        match self {
            Statement::Insert { columns, .. } => columns.len(),
            Statement::Select { predicates, .. } => predicates.len(),
            _ => 0,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateKeyspace { .. } => "CREATE KEYSPACE",
            Statement::DropKeyspace { .. } => "DROP KEYSPACE",
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::DropTable { .. } => "DROP TABLE",
            Statement::Insert { .. } => "INSERT",
            Statement::Select { .. } => "SELECT",
        }
    }

    /// Keyspace or table the statement addresses
    pub fn target(&self) -> &str {
        match self {
            Statement::CreateKeyspace { name, .. }
            | Statement::DropKeyspace { name }
            | Statement::DropTable { name } => name,
            Statement::CreateTable(schema) => &schema.name,
            Statement::Insert { table, .. } | Statement::Select { table, .. } => table,
        }
    }

    pub fn cql(&self) -> String {
        match self {
            Statement::CreateKeyspace {
                name,
                replication_factor,
            } => format!(
                "CREATE KEYSPACE IF NOT EXISTS {name} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
            ),
            Statement::DropKeyspace { name } => format!("DROP KEYSPACE IF EXISTS {name}"),
            Statement::CreateTable(schema) => {
                let columns = schema
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.ty.cql()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
                    schema.name,
                    columns,
                    schema.primary_key_cql()
                )
            }
            Statement::DropTable { name } => format!("DROP TABLE IF EXISTS {name}"),
            Statement::Insert { table, columns } => format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            ),
            Statement::Select {
                table,
                columns,
                predicates,
            } => {
                let mut cql = format!("SELECT {} FROM {}", columns.join(", "), table);
                if !predicates.is_empty() {
                    let clause = predicates
                        .iter()
                        .map(|p| format!("{p} = ?"))
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    cql.push_str(" WHERE ");
                    cql.push_str(&clause);
                }
                cql
            }
        }
    }
}

/// Accept unquoted CQL identifiers only: `[A-Za-z][A-Za-z0-9_]*`, at most 48 chars.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = name.len() <= 48
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!(
            "'{name}' is not a valid identifier"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_schema() -> TableSchema {
        TableSchema {
            name: "user_playlist_session".to_string(),
            partition_key: vec!["user_id".to_string(), "session_id".to_string()],
            clustering_key: vec!["item_in_session".to_string()],
            columns: vec![
                ColumnSpec::new("user_id", ColumnType::Int),
                ColumnSpec::new("session_id", ColumnType::Int),
                ColumnSpec::new("item_in_session", ColumnType::Int),
                ColumnSpec::new("artist", ColumnType::Text),
            ],
        }
    }

    #[test]
    fn test_create_table_cql() {
        let cql = Statement::CreateTable(playlist_schema()).cql();
        assert_eq!(
            cql,
            "CREATE TABLE IF NOT EXISTS user_playlist_session (user_id int, session_id int, \
             item_in_session int, artist text, PRIMARY KEY ((user_id, session_id), item_in_session))"
        );
    }

    #[test]
    fn test_insert_and_select_are_parameterized() {
        let insert = Statement::Insert {
            table: "song_user".to_string(),
            columns: vec!["song".to_string(), "user_id".to_string()],
        };
        assert_eq!(insert.cql(), "INSERT INTO song_user (song, user_id) VALUES (?, ?)");
        assert_eq!(insert.placeholder_count(), 2);

        let select = Statement::Select {
            table: "song_user".to_string(),
            columns: vec!["first_name".to_string(), "last_name".to_string()],
            predicates: vec!["song".to_string()],
        };
        assert_eq!(
            select.cql(),
            "SELECT first_name, last_name FROM song_user WHERE song = ?"
        );
    }

    #[test]
    fn test_validate_schema() {
        assert!(playlist_schema().validate().is_ok());

        let mut missing_key = playlist_schema();
        missing_key.clustering_key.push("ts".to_string());
        assert!(missing_key.validate().is_err());

        let mut no_partition = playlist_schema();
        no_partition.partition_key.clear();
        assert!(no_partition.validate().is_err());

        assert!(validate_identifier("sparkify_ks").is_ok());
        assert!(validate_identifier("drop table x;").is_err());
        assert!(validate_identifier("_x").is_err());
    }
}
