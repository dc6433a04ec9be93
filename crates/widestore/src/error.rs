// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::ColumnType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a store session. Every variant corresponds to one
/// request/response that the store rejected or could not complete.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("session is closed")]
    Closed,

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("no keyspace has been specified")]
    NoActiveKeyspace,

    #[error("keyspace {0} does not exist")]
    KeyspaceNotFound(String),

    #[error("table {0} does not exist")]
    TableNotFound(String),

    #[error("table {table} already exists with a different definition")]
    ConflictingTable { table: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("expected {expected} bound values, got {found}")]
    BindCount { expected: usize, found: usize },

    #[error("column {column} expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: String,
    },

    #[error("driver error: {0}")]
    Driver(String),
}
