// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cassandra/Scylla session backed by the `scylla` driver.

use crate::{Result, ResultSet, Statement, Store, StoreError, Value};
use async_trait::async_trait;
use diagnostics::{debug, info};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::value::{CqlValue, Row};
use std::time::Duration;

pub struct CqlStore {
    session: Session,
}

impl CqlStore {
    pub async fn connect(nodes: &[String], timeout: Duration) -> Result<Self> {
        let session = SessionBuilder::new()
            .known_nodes(nodes)
            .connection_timeout(timeout)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let contact_points = nodes.join(",");
        info!("Connected to CQL cluster via {contact_points}", contact_points: contact_points);
        Ok(Self { session })
    }
}

fn to_cql(value: &Value) -> Option<CqlValue> {
    match value {
        Value::Null => None,
        Value::Int(v) => Some(CqlValue::Int(*v)),
        Value::Float(v) => Some(CqlValue::Float(*v)),
        Value::Text(v) => Some(CqlValue::Text(v.clone())),
    }
}

fn from_cql(value: Option<CqlValue>) -> Value {
    match value {
        None => Value::Null,
        Some(CqlValue::Int(v)) => Value::Int(v),
        Some(CqlValue::Float(v)) => Value::Float(v),
        Some(CqlValue::Text(v)) | Some(CqlValue::Ascii(v)) => Value::Text(v),
        Some(other) => Value::Text(format!("{other:?}")),
    }
}

fn driver_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Driver(e.to_string())
}

#[async_trait]
impl Store for CqlStore {
    async fn set_active_keyspace(&self, name: &str) -> Result<()> {
        self.session
            .use_keyspace(name, false)
            .await
            .map_err(driver_error)
    }

    async fn execute(&self, statement: &Statement, params: &[Value]) -> Result<ResultSet> {
        let expected = statement.placeholder_count();
        if params.len() != expected {
            return Err(StoreError::BindCount {
                expected,
                found: params.len(),
            });
        }
        let cql = statement.cql();
        debug!("cql: {cql}", cql: cql);

        let values: Vec<Option<CqlValue>> = params.iter().map(to_cql).collect();
        let result = self
            .session
            .query_unpaged(cql, values)
            .await
            .map_err(driver_error)?;
        if !result.is_rows() {
            return Ok(ResultSet::empty());
        }

        let rows = result.into_rows_result().map_err(driver_error)?;
        let columns = rows
            .column_specs()
            .iter()
            .map(|spec| spec.name().to_string())
            .collect();
        let mut out = Vec::new();
        for row in rows.rows::<Row>().map_err(driver_error)? {
            let row = row.map_err(driver_error)?;
            out.push(row.columns.into_iter().map(from_cql).collect());
        }
        Ok(ResultSet::new(columns, out))
    }

    async fn close(&self) -> Result<()> {
        // The driver tears connections down when the session is dropped
        debug!("cql session released");
        Ok(())
    }
}
