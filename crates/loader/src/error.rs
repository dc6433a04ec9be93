// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;
use widestore::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Whether the run may continue after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged and counted; the pipeline moves on
    Recovered,
    /// The run stops (after the store session is released)
    Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot reach store at {endpoint}: {source}")]
    Connectivity { endpoint: String, source: StoreError },

    #[error("keyspace {keyspace} setup failed: {source}")]
    KeyspaceSetup { keyspace: String, source: StoreError },

    #[error("schema mismatch in {context}: {detail}")]
    SchemaMismatch { context: String, detail: String },

    #[error("table {table}: {source}")]
    TableDefinition { table: String, source: StoreError },

    #[error("insert into {table} failed for record {record}: {source}")]
    RowInsert {
        table: String,
        record: usize,
        source: StoreError,
    },

    #[error("query {query} failed: {source}")]
    QueryExecution { query: String, source: StoreError },

    #[error("dropping keyspace {keyspace} failed: {source}")]
    Teardown { keyspace: String, source: StoreError },

    #[error("invalid table definition {table}: {detail}")]
    InvalidDefinition { table: String, detail: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        source: arrow_schema::ArrowError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{failed} rows failed to load, more than the allowed {limit}")]
    FailureThreshold { failed: usize, limit: usize },

    #[error("run completed with {recovered} recovered failures")]
    PartialFailure { recovered: usize },
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::TableDefinition { .. }
            | Error::RowInsert { .. }
            | Error::QueryExecution { .. }
            | Error::Teardown { .. } => Severity::Recovered,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Stable name of the error kind, used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connectivity { .. } => "ConnectivityError",
            Error::KeyspaceSetup { .. } => "KeyspaceSetupError",
            Error::SchemaMismatch { .. } => "SchemaMismatchError",
            Error::TableDefinition { .. } => "TableDefinitionError",
            Error::RowInsert { .. } => "RowInsertError",
            Error::QueryExecution { .. } => "QueryExecutionError",
            Error::Teardown { .. } => "TeardownError",
            Error::InvalidDefinition { .. } => "InvalidDefinitionError",
            Error::Io { .. } => "IoError",
            Error::Csv { .. } => "CsvError",
            Error::Config(_) => "ConfigError",
            Error::FailureThreshold { .. } => "FailureThresholdError",
            Error::PartialFailure { .. } => "PartialFailureError",
        }
    }

    pub(crate) fn schema_mismatch(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        let recovered = Error::RowInsert {
            table: "song_user".to_string(),
            record: 3,
            source: StoreError::InvalidQuery("key may not be empty".to_string()),
        };
        assert_eq!(recovered.severity(), Severity::Recovered);
        assert_eq!(recovered.kind(), "RowInsertError");

        let fatal = Error::KeyspaceSetup {
            keyspace: "sparkify_ks".to_string(),
            source: StoreError::Connection("refused".to_string()),
        };
        assert!(fatal.is_fatal());
        assert!(Error::schema_mismatch("row 0", "missing userId").is_fatal());
    }
}
