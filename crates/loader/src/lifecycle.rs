// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end run over one connected store.
//!
//! Only keyspace setup and normalization stop a run. Every later failure is
//! logged, collected into the report and the run moves on to the next stage.

use crate::catalog::{self, Catalog};
use crate::error::{Error, Result};
use crate::executor::{InsertReport, LoadExecutor, LoadMode};
use crate::normalize::normalize;
use crate::record::RawRecord;
use crate::verify::{self, QueryOutcome, VerificationQuery};
use chrono::{DateTime, Utc};
use diagnostics::{debug, info, warn};
use widestore::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    KeyspaceReady,
    TablesDropped,
    DataLoaded,
    Verified,
    TornDown,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub keyspace: String,
    pub replication_factor: u32,
    /// Leave tables and keyspace in place after verification
    pub keep_tables: bool,
    pub dry_run: bool,
    /// Tables loaded at the same time
    pub load_concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            keyspace: "sparkify_ks".to_string(),
            replication_factor: 1,
            keep_tables: false,
            dry_run: false,
            load_concurrency: 1,
        }
    }
}

/// What a run did, stage by stage
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub keyspace: String,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub stages: Vec<Stage>,
    /// Canonical records after normalization
    pub records: usize,
    pub tables: Vec<InsertReport>,
    pub queries: Vec<QueryOutcome>,
    pub recovered: Vec<Error>,
}

impl RunReport {
    fn new(keyspace: &str) -> Self {
        let started = Utc::now();
        Self {
            run_id: uuid7::uuid7().to_string(),
            keyspace: keyspace.to_string(),
            started,
            finished: started,
            stages: vec![Stage::Start],
            records: 0,
            tables: Vec::new(),
            queries: Vec::new(),
            recovered: Vec::new(),
        }
    }

    fn reach(&mut self, stage: Stage) {
        let name = format!("{stage:?}");
        debug!("Stage {name}", name: name);
        self.stages.push(stage);
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn failed_rows(&self) -> usize {
        self.tables.iter().map(|t| t.failed).sum()
    }

    pub fn has_partial_failures(&self) -> bool {
        !self.recovered.is_empty() || self.tables.iter().any(|t| !t.is_clean())
    }

    /// Turn recovered failures into an error when the caller asked for it.
    ///
    /// `strict` fails on any recovered error; `max_failed_rows` fails only
    /// when more rows than the limit were rejected.
    pub fn check_failures(&self, strict: bool, max_failed_rows: Option<usize>) -> Result<()> {
        let failed = self.failed_rows();
        match max_failed_rows {
            Some(limit) if failed > limit => {
                return Err(Error::FailureThreshold { failed, limit });
            }
            _ => {}
        }
        if strict && self.has_partial_failures() {
            return Err(Error::PartialFailure {
                recovered: self.recovered.len().max(1),
            });
        }
        Ok(())
    }
}

/// One load of the catalog's tables through a borrowed store session.
///
/// A dry run skips both the initial drops and the teardown, so it only ever
/// adds missing tables.
pub struct Pipeline<'a> {
    store: &'a dyn Store,
    catalog: Catalog,
    queries: Vec<VerificationQuery>,
    options: RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn Store, options: RunOptions) -> Self {
        Self {
            store,
            catalog: Catalog::standard(),
            queries: verify::standard_queries(),
            options,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_queries(mut self, queries: Vec<VerificationQuery>) -> Self {
        self.queries = queries;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    async fn drop_tables(&self, report: &mut RunReport) {
        for table in self.catalog.table_names() {
            if let Err(err) = catalog::drop_table(self.store, table).await {
                let message = err.to_string();
                warn!("{message}", message: message);
                report.recovered.push(err);
            }
        }
    }

    pub async fn run(&self, raw: &[RawRecord]) -> Result<RunReport> {
        let keyspace = self.options.keyspace.as_str();
        let mut report = RunReport::new(keyspace);
        let run_id = report.run_id.as_str();
        info!("Starting run {run_id} into keyspace {keyspace}", run_id: run_id, keyspace: keyspace);

        catalog::ensure_keyspace(self.store, keyspace, self.options.replication_factor).await?;
        report.reach(Stage::KeyspaceReady);

        let dry_run = self.options.dry_run;
        if dry_run {
            info!("Dry run: existing tables are left in place");
        } else {
            self.drop_tables(&mut report).await;
            report.reach(Stage::TablesDropped);
        }

        let records = normalize(raw)?;
        report.records = records.len();
        let num_records = report.records;
        info!("Normalized {num_records} records", num_records: num_records);

        let mode = if dry_run {
            LoadMode::DryRun
        } else {
            LoadMode::Insert
        };
        let loads = LoadExecutor::new(self.store, mode)
            .load_all(&self.catalog, &records, self.options.load_concurrency)
            .await;
        for load in loads {
            report.tables.push(load.report);
            report.recovered.extend(load.errors);
        }
        report.reach(Stage::DataLoaded);

        for mut outcome in verify::run_all(self.store, &self.queries).await {
            if let Some(err) = outcome.error.take() {
                report.recovered.push(err);
            }
            report.queries.push(outcome);
        }
        report.reach(Stage::Verified);

        // A dry run never deletes anything
        if !self.options.keep_tables && !dry_run {
            self.drop_tables(&mut report).await;
            if let Err(err) = catalog::drop_keyspace(self.store, keyspace).await {
                let message = err.to_string();
                warn!("{message}", message: message);
                report.recovered.push(err);
            }
            report.reach(Stage::TornDown);
        }

        report.reach(Stage::Done);
        report.finished = Utc::now();
        let recovered = report.recovered.len();
        info!("Run finished with {recovered} recovered errors", recovered: recovered);
        Ok(report)
    }
}

/// Run the pipeline on a session this call owns, closing it on every path.
pub async fn run_scoped(
    store: Box<dyn Store>,
    options: RunOptions,
    raw: &[RawRecord],
) -> Result<RunReport> {
    let result = Pipeline::new(store.as_ref(), options).run(raw).await;
    if let Err(err) = store.close().await {
        let message = err.to_string();
        warn!("Closing store session failed: {message}", message: message);
    }
    result
}
