// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Table definitions and their lifecycle in the store.
//!
//! Each definition is laid out for exactly one read query: the partition key
//! is what the query restricts, the clustering key orders (and uniquifies)
//! rows inside a partition.

use crate::error::{Error, Result};
use crate::record::{CanonicalRecord, Field};
use diagnostics::{debug, info};
use widestore::{ColumnSpec, ColumnType, Statement, Store, TableSchema, validate_identifier};

/// Which canonical records a table stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    All,
    /// Skip records whose field is the empty string
    NonEmpty(Field),
}

impl Inclusion {
    pub fn admits(self, record: &CanonicalRecord) -> bool {
        match self {
            Inclusion::All => true,
            Inclusion::NonEmpty(field) => !record.value(field).is_empty_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub partition_key: Vec<Field>,
    pub clustering_key: Vec<Field>,
    /// Every stored column: keys first, then payload, in insert order
    pub columns: Vec<Field>,
    pub inclusion: Inclusion,
}

impl TableDefinition {
    /// Define a table; `payload` lists the non-key columns.
    pub fn new(
        name: &str,
        partition_key: &[Field],
        clustering_key: &[Field],
        payload: &[Field],
        inclusion: Inclusion,
    ) -> Self {
        let columns = partition_key
            .iter()
            .chain(clustering_key)
            .chain(payload)
            .copied()
            .collect();
        Self {
            name: name.to_string(),
            partition_key: partition_key.to_vec(),
            clustering_key: clustering_key.to_vec(),
            columns,
            inclusion,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|f| f.name().to_string()).collect()
    }

    /// Physical layout sent with `CREATE TABLE`
    pub fn schema(&self) -> TableSchema {
        TableSchema {
            name: self.name.clone(),
            partition_key: self.partition_key.iter().map(|f| f.name().to_string()).collect(),
            clustering_key: self
                .clustering_key
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|f| ColumnSpec::new(f.name(), f.column_type()))
                .collect(),
        }
    }

    pub fn insert_statement(&self) -> Statement {
        Statement::Insert {
            table: self.name.clone(),
            columns: self.column_names(),
        }
    }

    /// Reject layouts the store would refuse or that could emit a row with
    /// an empty partition key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |detail: String| Error::InvalidDefinition {
            table: self.name.clone(),
            detail,
        };

        self.schema()
            .validate()
            .map_err(|e| invalid(e.to_string()))?;

        for field in &self.partition_key {
            let guarded = self.inclusion == Inclusion::NonEmpty(*field);
            if field.column_type() == ColumnType::Text && !guarded {
                return Err(invalid(format!(
                    "text partition key {field} needs a non-empty inclusion rule"
                )));
            }
        }
        Ok(())
    }
}

/// The session-item lookup: artist, song and length by session and item.
pub fn session_item_table() -> TableDefinition {
    TableDefinition::new(
        "length_playlist_session",
        &[Field::SessionId],
        &[Field::ItemInSession],
        &[Field::Artist, Field::Song, Field::Length],
        Inclusion::All,
    )
}

/// The user-session playlist: songs and user name by user and session,
/// ordered by item.
pub fn user_session_table() -> TableDefinition {
    TableDefinition::new(
        "user_playlist_session",
        &[Field::UserId, Field::SessionId],
        &[Field::ItemInSession],
        &[Field::Artist, Field::Song, Field::FirstName, Field::LastName],
        Inclusion::All,
    )
}

/// The song listeners: every user name that played a song.
pub fn song_listeners_table() -> TableDefinition {
    TableDefinition::new(
        "song_user",
        &[Field::Song],
        &[Field::UserId],
        &[Field::FirstName, Field::LastName],
        Inclusion::NonEmpty(Field::Song),
    )
}

/// The set of tables one run manages
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableDefinition>,
}

impl Catalog {
    pub fn new(tables: Vec<TableDefinition>) -> Result<Self> {
        for (i, table) in tables.iter().enumerate() {
            table.validate()?;
            if tables[..i].iter().any(|t| t.name == table.name) {
                return Err(Error::InvalidDefinition {
                    table: table.name.clone(),
                    detail: "declared twice".to_string(),
                });
            }
        }
        Ok(Self { tables })
    }

    /// The three tables behind the fixed access patterns
    pub fn standard() -> Self {
        Self {
            tables: vec![session_item_table(), user_session_table(), song_listeners_table()],
        }
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Create the keyspace if absent and make it the session's keyspace.
pub async fn ensure_keyspace(store: &dyn Store, keyspace: &str, replication_factor: u32) -> Result<()> {
    let setup_error = |source| Error::KeyspaceSetup {
        keyspace: keyspace.to_string(),
        source,
    };
    validate_identifier(keyspace).map_err(setup_error)?;
    store
        .ensure_keyspace(keyspace, replication_factor)
        .await
        .map_err(setup_error)?;
    store
        .set_active_keyspace(keyspace)
        .await
        .map_err(setup_error)?;
    info!("Keyspace {keyspace} ready", keyspace: keyspace);
    Ok(())
}

pub async fn drop_table(store: &dyn Store, table: &str) -> Result<()> {
    let statement = Statement::DropTable {
        name: table.to_string(),
    };
    store
        .execute(&statement, &[])
        .await
        .map_err(|source| Error::TableDefinition {
            table: table.to_string(),
            source,
        })?;
    info!("Dropping {table} ...", table: table);
    Ok(())
}

pub async fn create_table(store: &dyn Store, definition: &TableDefinition) -> Result<()> {
    let table = definition.name.as_str();
    let statement = Statement::CreateTable(definition.schema());
    let cql = statement.cql();
    debug!("{cql}", cql: cql);
    store
        .execute(&statement, &[])
        .await
        .map_err(|source| Error::TableDefinition {
            table: table.to_string(),
            source,
        })?;
    info!("Created table {table}", table: table);
    Ok(())
}

pub async fn drop_keyspace(store: &dyn Store, keyspace: &str) -> Result<()> {
    let statement = Statement::DropKeyspace {
        name: keyspace.to_string(),
    };
    store
        .execute(&statement, &[])
        .await
        .map_err(|source| Error::Teardown {
            keyspace: keyspace.to_string(),
            source,
        })?;
    info!("Keyspace {keyspace} dropped", keyspace: keyspace);
    Ok(())
}
