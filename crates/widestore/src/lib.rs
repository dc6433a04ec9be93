// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Widestore - the loader's view of a wide-column store
//!
//! A `Store` accepts schema statements and parameterized row statements and
//! returns result sets. `MemoryCluster` implements it in process; the `cql`
//! feature adds `CqlStore` for real Cassandra/Scylla clusters.

mod endpoint;
mod error;
mod memory;
mod result;
mod statement;
mod value;

#[cfg(feature = "cql")]
mod cql;

use async_trait::async_trait;

pub use endpoint::{Endpoint, connect};
pub use error::{Result, StoreError};
pub use memory::{MemoryCluster, MemorySession};
pub use result::ResultSet;
pub use statement::{ColumnSpec, Statement, TableSchema, validate_identifier};
pub use value::{ColumnType, Value};

#[cfg(feature = "cql")]
pub use cql::CqlStore;

/// A connected store session.
///
/// Each call is one bounded request/response. Implementations never retry
/// internally; failures come back as `StoreError`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the keyspace with SimpleStrategy replication if it is absent.
    async fn ensure_keyspace(&self, name: &str, replication_factor: u32) -> Result<()> {
        let statement = Statement::CreateKeyspace {
            name: name.to_string(),
            replication_factor,
        };
        self.execute(&statement, &[]).await.map(|_| ())
    }

    /// Make `name` the keyspace for unqualified table names.
    async fn set_active_keyspace(&self, name: &str) -> Result<()>;

    /// Run one statement with its bound parameters.
    async fn execute(&self, statement: &Statement, params: &[Value]) -> Result<ResultSet>;

    /// Release the session. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> Result<()>;
}
