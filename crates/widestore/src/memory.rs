// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-process wide-column store.
//!
//! `MemoryCluster` owns the data; every `connect()` hands out an independent
//! `MemorySession` with its own active keyspace, the same split a CQL driver
//! makes between cluster and session. Tables keep rows addressed by
//! partition key and sorted by clustering key, inserts are upserts
//! (last writer wins), and partition keys may not be null or empty.

use crate::statement::validate_identifier;
use crate::{ColumnType, ResultSet, Result, Statement, Store, StoreError, TableSchema, Value};
use async_trait::async_trait;
use diagnostics::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

type Partition = BTreeMap<Vec<Value>, Vec<Value>>;

struct MemoryTable {
    schema: TableSchema,
    // partition key -> clustering key -> full row in schema column order
    partitions: BTreeMap<Vec<Value>, Partition>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: BTreeMap::new(),
        }
    }

    fn row_count(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    fn key_indices(&self, key: &[String]) -> Vec<usize> {
        key.iter()
            .filter_map(|k| self.schema.column_index(k))
            .collect()
    }

    fn insert(&mut self, columns: &[String], params: &[Value]) -> Result<()> {
        let mut assigned = vec![None; self.schema.columns.len()];
        for (name, value) in columns.iter().zip(params) {
            let idx = self.schema.column_index(name).ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "undefined column name {} in table {}",
                    name, self.schema.name
                ))
            })?;
            let ty = self.schema.columns[idx].ty;
            assigned[idx] = Some(coerce(name, value, ty)?);
        }

        let partition_key = self.key_values(&self.schema.partition_key, &assigned, true)?;
        let clustering_key = self.key_values(&self.schema.clustering_key, &assigned, false)?;

        let row = self
            .partitions
            .entry(partition_key)
            .or_default()
            .entry(clustering_key)
            .or_insert_with(|| vec![Value::Null; assigned.len()]);
        for (slot, value) in row.iter_mut().zip(assigned) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(())
    }

    fn key_values(
        &self,
        key: &[String],
        assigned: &[Option<Value>],
        partition: bool,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(key.len());
        for (name, idx) in key.iter().zip(self.key_indices(key)) {
            match &assigned[idx] {
                None => {
                    return Err(StoreError::InvalidQuery(format!(
                        "missing mandatory PRIMARY KEY part {name}"
                    )));
                }
                Some(Value::Null) => {
                    return Err(StoreError::InvalidQuery(format!(
                        "invalid null value for primary key part {name}"
                    )));
                }
                Some(v) if partition && v.is_empty_key() => {
                    return Err(StoreError::InvalidQuery(format!(
                        "key may not be empty (column {name})"
                    )));
                }
                Some(v) => values.push(v.clone()),
            }
        }
        Ok(values)
    }

    fn select(
        &self,
        columns: &[String],
        predicates: &[String],
        params: &[Value],
    ) -> Result<ResultSet> {
        let projection = columns
            .iter()
            .map(|c| {
                self.schema.column_index(c).ok_or_else(|| {
                    StoreError::InvalidQuery(format!(
                        "undefined column name {} in table {}",
                        c, self.schema.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut bound = BTreeMap::new();
        for (name, value) in predicates.iter().zip(params) {
            let spec = self.schema.column(name).ok_or_else(|| {
                StoreError::InvalidQuery(format!("undefined column name {name}"))
            })?;
            bound.insert(name.as_str(), coerce(name, value, spec.ty)?);
        }

        let mut partition_key = Vec::with_capacity(self.schema.partition_key.len());
        for name in &self.schema.partition_key {
            let value = bound.remove(name.as_str()).ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "partition key part {name} must be restricted"
                ))
            })?;
            partition_key.push(value);
        }

        // Remaining restrictions must form a prefix of the clustering key
        let mut clustering_prefix = Vec::new();
        for name in &self.schema.clustering_key {
            match bound.remove(name.as_str()) {
                Some(value) => clustering_prefix.push(value),
                None => break,
            }
        }
        if let Some(name) = bound.keys().next() {
            return Err(StoreError::InvalidQuery(format!(
                "cannot restrict column {name} without ALLOW FILTERING"
            )));
        }

        let rows = self
            .partitions
            .get(&partition_key)
            .into_iter()
            .flat_map(|partition| partition.iter())
            .filter(|(clustering, _)| clustering.starts_with(&clustering_prefix))
            .map(|(_, row)| projection.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(ResultSet::new(columns.to_vec(), rows))
    }
}

fn coerce(column: &str, value: &Value, ty: ColumnType) -> Result<Value> {
    value.coerce_to(ty).ok_or_else(|| StoreError::TypeMismatch {
        column: column.to_string(),
        expected: ty,
        found: value
            .column_type()
            .map_or_else(|| "null".to_string(), |t| t.to_string()),
    })
}

struct Keyspace {
    replication_factor: u32,
    tables: BTreeMap<String, MemoryTable>,
}

#[derive(Default)]
struct State {
    keyspaces: BTreeMap<String, Keyspace>,
    unavailable: bool,
    // (statement kind, target) pairs that fail on purpose
    rejections: HashSet<(String, String)>,
}

impl State {
    fn keyspace_mut(&mut self, keyspace: Option<&str>) -> Result<&mut Keyspace> {
        let name = keyspace.ok_or(StoreError::NoActiveKeyspace)?;
        self.keyspaces
            .get_mut(name)
            .ok_or_else(|| StoreError::KeyspaceNotFound(name.to_string()))
    }

    fn table_mut(&mut self, keyspace: Option<&str>, table: &str) -> Result<&mut MemoryTable> {
        self.keyspace_mut(keyspace)?
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    fn execute(
        &mut self,
        keyspace: Option<&str>,
        statement: &Statement,
        params: &[Value],
    ) -> Result<ResultSet> {
        if self.unavailable {
            return Err(StoreError::Connection("no hosts available".to_string()));
        }
        if self
            .rejections
            .contains(&(statement.kind().to_string(), statement.target().to_string()))
        {
            return Err(StoreError::Driver(format!(
                "{} {} rejected",
                statement.kind(),
                statement.target()
            )));
        }
        let expected = statement.placeholder_count();
        if params.len() != expected {
            return Err(StoreError::BindCount {
                expected,
                found: params.len(),
            });
        }

        match statement {
            Statement::CreateKeyspace {
                name,
                replication_factor,
            } => {
                validate_identifier(name)?;
                self.keyspaces.entry(name.clone()).or_insert_with(|| Keyspace {
                    replication_factor: *replication_factor,
                    tables: BTreeMap::new(),
                });
            }
            Statement::DropKeyspace { name } => {
                self.keyspaces.remove(name);
            }
            Statement::CreateTable(schema) => {
                schema.validate()?;
                let tables = &mut self.keyspace_mut(keyspace)?.tables;
                match tables.get(&schema.name) {
                    Some(existing) if existing.schema != *schema => {
                        return Err(StoreError::ConflictingTable {
                            table: schema.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        tables.insert(schema.name.clone(), MemoryTable::new(schema.clone()));
                    }
                }
            }
            Statement::DropTable { name } => {
                self.keyspace_mut(keyspace)?.tables.remove(name);
            }
            Statement::Insert { table, columns } => {
                self.table_mut(keyspace, table)?.insert(columns, params)?;
            }
            Statement::Select {
                table,
                columns,
                predicates,
            } => {
                return self
                    .table_mut(keyspace, table)?
                    .select(columns, predicates, params);
            }
        }
        Ok(ResultSet::empty())
    }
}

/// Shared in-memory cluster state
#[derive(Clone, Default)]
pub struct MemoryCluster(Arc<Mutex<State>>);

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session. Fails while the cluster is marked unavailable.
    pub async fn connect(&self) -> Result<MemorySession> {
        if self.0.lock().await.unavailable {
            return Err(StoreError::Connection("no hosts available".to_string()));
        }
        Ok(MemorySession {
            cluster: self.clone(),
            keyspace: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Simulate an outage: connects and statements fail until restored.
    pub async fn set_available(&self, available: bool) {
        self.0.lock().await.unavailable = !available;
    }

    /// Make every statement of `kind` (e.g. "INSERT") against `target` fail.
    pub async fn reject(&self, kind: &str, target: &str) {
        self.0
            .lock()
            .await
            .rejections
            .insert((kind.to_string(), target.to_string()));
    }

    pub async fn keyspace_exists(&self, keyspace: &str) -> bool {
        self.0.lock().await.keyspaces.contains_key(keyspace)
    }

    pub async fn replication_factor(&self, keyspace: &str) -> Option<u32> {
        self.0
            .lock()
            .await
            .keyspaces
            .get(keyspace)
            .map(|ks| ks.replication_factor)
    }

    pub async fn table_names(&self, keyspace: &str) -> Vec<String> {
        self.0
            .lock()
            .await
            .keyspaces
            .get(keyspace)
            .map(|ks| ks.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn table_schema(&self, keyspace: &str, table: &str) -> Option<TableSchema> {
        let state = self.0.lock().await;
        let table = state.keyspaces.get(keyspace)?.tables.get(table)?;
        Some(table.schema.clone())
    }

    /// Stored rows in a table, `None` when the table does not exist
    pub async fn row_count(&self, keyspace: &str, table: &str) -> Option<usize> {
        let state = self.0.lock().await;
        let table = state.keyspaces.get(keyspace)?.tables.get(table)?;
        Some(table.row_count())
    }
}

/// One client session against a `MemoryCluster`
pub struct MemorySession {
    cluster: MemoryCluster,
    keyspace: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn cluster(&self) -> &MemoryCluster {
        &self.cluster
    }
}

#[async_trait]
impl Store for MemorySession {
    async fn set_active_keyspace(&self, name: &str) -> Result<()> {
        self.check_open()?;
        let state = self.cluster.0.lock().await;
        if state.unavailable {
            return Err(StoreError::Connection("no hosts available".to_string()));
        }
        if !state.keyspaces.contains_key(name) {
            return Err(StoreError::KeyspaceNotFound(name.to_string()));
        }
        *self.keyspace.lock().await = Some(name.to_string());
        Ok(())
    }

    async fn execute(&self, statement: &Statement, params: &[Value]) -> Result<ResultSet> {
        self.check_open()?;
        let keyspace = self.keyspace.lock().await.clone();
        let cql = statement.cql();
        debug!("memory store: {cql}", cql: cql);
        self.cluster
            .0
            .lock()
            .await
            .execute(keyspace.as_deref(), statement, params)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnSpec;

    fn song_schema() -> TableSchema {
        TableSchema {
            name: "song_user".to_string(),
            partition_key: vec!["song".to_string()],
            clustering_key: vec!["user_id".to_string()],
            columns: vec![
                ColumnSpec::new("song", ColumnType::Text),
                ColumnSpec::new("user_id", ColumnType::Int),
                ColumnSpec::new("first_name", ColumnType::Text),
                ColumnSpec::new("last_name", ColumnType::Text),
            ],
        }
    }

    fn insert() -> Statement {
        Statement::Insert {
            table: "song_user".to_string(),
            columns: vec![
                "song".to_string(),
                "user_id".to_string(),
                "first_name".to_string(),
                "last_name".to_string(),
            ],
        }
    }

    fn select() -> Statement {
        Statement::Select {
            table: "song_user".to_string(),
            columns: vec!["user_id".to_string(), "first_name".to_string()],
            predicates: vec!["song".to_string()],
        }
    }

    async fn session_with_table() -> Result<MemorySession> {
        let cluster = MemoryCluster::new();
        let session = cluster.connect().await?;
        session.ensure_keyspace("ks", 1).await?;
        session.set_active_keyspace("ks").await?;
        session
            .execute(&Statement::CreateTable(song_schema()), &[])
            .await?;
        Ok(session)
    }

    #[tokio::test]
    async fn test_rows_sorted_by_clustering_key() -> Result<()> {
        let session = session_with_table().await?;
        for (user, name) in [(44, "Aleena"), (8, "Kaylee"), (15, "Lily")] {
            session
                .execute(
                    &insert(),
                    &["Home".into(), user.into(), name.into(), "X".into()],
                )
                .await?;
        }
        let rows = session.execute(&select(), &["Home".into()]).await?;
        let users: Vec<_> = rows.column_values("user_id").into_iter().cloned().collect();
        assert_eq!(users, vec![Value::Int(8), Value::Int(15), Value::Int(44)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_last_writer_wins() -> Result<()> {
        let session = session_with_table().await?;
        session
            .execute(&insert(), &["Home".into(), 8.into(), "Kaylee".into(), "A".into()])
            .await?;
        session
            .execute(&insert(), &["Home".into(), 8.into(), "Chloe".into(), "B".into()])
            .await?;
        let rows = session.execute(&select(), &["Home".into()]).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(0, "first_name"), Some(&Value::from("Chloe")));
        assert_eq!(session.cluster().row_count("ks", "song_user").await, Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_partition_key_rejected() -> Result<()> {
        let session = session_with_table().await?;
        let err = session
            .execute(&insert(), &["".into(), 8.into(), "Kaylee".into(), "A".into()])
            .await
            .expect_err("empty partition key must fail");
        assert!(matches!(err, StoreError::InvalidQuery(_)));

        let err = session
            .execute(&insert(), &["Home".into(), "8".into(), "Kaylee".into(), "A".into()])
            .await
            .expect_err("text into int column must fail");
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_select_requires_partition_key() -> Result<()> {
        let session = session_with_table().await?;
        let by_name = Statement::Select {
            table: "song_user".to_string(),
            columns: vec!["song".to_string()],
            predicates: vec!["first_name".to_string()],
        };
        assert!(session.execute(&by_name, &["Kaylee".into()]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_schema_statements_are_idempotent() -> Result<()> {
        let session = session_with_table().await?;
        session.ensure_keyspace("ks", 1).await?;
        session
            .execute(&Statement::CreateTable(song_schema()), &[])
            .await?;

        let mut changed = song_schema();
        changed.clustering_key.clear();
        let err = session
            .execute(&Statement::CreateTable(changed), &[])
            .await
            .expect_err("conflicting definition");
        assert!(matches!(err, StoreError::ConflictingTable { .. }));

        let drop = Statement::DropTable {
            name: "song_user".to_string(),
        };
        session.execute(&drop, &[]).await?;
        session.execute(&drop, &[]).await?;
        assert_eq!(session.cluster().row_count("ks", "song_user").await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_session_and_outage() -> Result<()> {
        let session = session_with_table().await?;
        let cluster = session.cluster().clone();
        session.close().await?;
        assert!(session.is_closed());
        assert_eq!(
            session.execute(&select(), &["Home".into()]).await,
            Err(StoreError::Closed)
        );

        cluster.set_available(false).await;
        assert!(matches!(cluster.connect().await, Err(StoreError::Connection(_))));
        Ok(())
    }
}
