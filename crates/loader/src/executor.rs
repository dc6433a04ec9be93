// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Create tables and insert planned rows, one row per statement.
//!
//! A rejected row is logged, counted and skipped; the rest of the batch
//! still goes in. Nothing is rolled back, so after partial failures the
//! store holds a subset of the planned rows.

use crate::catalog::{self, Catalog, TableDefinition};
use crate::error::Error;
use crate::planner::{PlannedRow, plan};
use crate::record::CanonicalRecord;
use diagnostics::{debug, info, warn};
use futures::StreamExt;
use widestore::Store;

/// Row failures kept per table for the report; the rest are only counted
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Outcome of loading one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub table: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Planned rows never sent: dry run, or the table could not be created
    pub skipped: usize,
    pub schema_failed: bool,
}

impl InsertReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.schema_failed
    }
}

/// Report plus the recovered errors behind it
#[derive(Debug, Default)]
pub struct TableLoad {
    pub report: InsertReport,
    /// Table creation failure and up to `MAX_ERROR_SAMPLES` row failures
    pub errors: Vec<Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Insert,
    /// Create tables and plan rows, but send no inserts
    DryRun,
}

pub struct LoadExecutor<'a> {
    store: &'a dyn Store,
    mode: LoadMode,
}

impl<'a> LoadExecutor<'a> {
    pub fn new(store: &'a dyn Store, mode: LoadMode) -> Self {
        Self { store, mode }
    }

    pub async fn create(&self, definition: &TableDefinition) -> Result<(), Error> {
        catalog::create_table(self.store, definition).await
    }

    /// Insert rows in iteration order, continuing past failures.
    pub async fn insert_batch<I>(&self, definition: &TableDefinition, rows: I) -> TableLoad
    where
        I: IntoIterator<Item = PlannedRow>,
    {
        let table = definition.name.as_str();
        let statement = definition.insert_statement();
        let mut load = TableLoad {
            report: InsertReport::new(table),
            errors: Vec::new(),
        };

        for row in rows {
            load.report.attempted += 1;
            if self.mode == LoadMode::DryRun {
                load.report.skipped += 1;
                continue;
            }
            match self.store.execute(&statement, &row.values).await {
                Ok(_) => load.report.succeeded += 1,
                Err(source) => {
                    load.report.failed += 1;
                    let err = Error::RowInsert {
                        table: table.to_string(),
                        record: row.record,
                        source,
                    };
                    let message = err.to_string();
                    warn!("{message}", message: message);
                    if load.errors.len() < MAX_ERROR_SAMPLES {
                        load.errors.push(err);
                    }
                }
            }
        }

        let attempted = load.report.attempted;
        let succeeded = load.report.succeeded;
        let failed = load.report.failed;
        if self.mode == LoadMode::DryRun {
            info!(
                "Dry run: planned {attempted} rows for {table}, none inserted",
                attempted: attempted,
                table: table
            );
        } else {
            info!(
                "Inserted into {table}: {succeeded}/{attempted} rows, {failed} failed",
                table: table,
                succeeded: succeeded,
                attempted: attempted,
                failed: failed
            );
        }
        load
    }

    /// Create one table, then insert its planned rows.
    pub async fn load_table(
        &self,
        definition: &TableDefinition,
        records: &[CanonicalRecord],
    ) -> TableLoad {
        let table = definition.name.as_str();
        info!("Creating {table} table", table: table);
        if let Err(err) = self.create(definition).await {
            let message = err.to_string();
            warn!("Skipping inserts into {table}: {message}", table: table, message: message);
            let skipped = plan(definition, records).count();
            let mut report = InsertReport::new(table);
            report.attempted = skipped;
            report.skipped = skipped;
            report.schema_failed = true;
            return TableLoad {
                report,
                errors: vec![err],
            };
        }

        debug!("Inserting into {table}", table: table);
        self.insert_batch(definition, plan(definition, records)).await
    }

    /// Load every catalog table, up to `concurrency` tables at a time.
    ///
    /// Rows inside a table stay sequential; results come back in catalog
    /// order.
    pub async fn load_all(
        &self,
        catalog: &Catalog,
        records: &[CanonicalRecord],
        concurrency: usize,
    ) -> Vec<TableLoad> {
        futures::stream::iter(catalog.tables())
            .map(|definition| self.load_table(definition, records))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
