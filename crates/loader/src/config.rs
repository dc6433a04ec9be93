// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Loader configuration, read from YAML and overridden by the command line.

use crate::error::{Error, Result};
use crate::lifecycle::RunOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use widestore::{Endpoint, validate_identifier};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Folder of event CSV files
    pub data_dir: PathBuf,

    /// `memory://` or a comma separated list of `host[:port]`
    pub store_endpoint: String,

    pub keyspace: String,
    pub replication_factor: u32,

    /// Skip teardown after verification
    pub keep_tables: bool,

    /// Create tables and run queries without inserting rows
    pub dry_run: bool,

    pub load_concurrency: usize,
    pub connect_timeout_secs: u64,

    /// Exit non-zero when any failure was recovered from
    pub strict: bool,

    /// Exit non-zero when more rows than this failed to insert
    pub max_failed_rows: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let run = RunOptions::default();
        Self {
            data_dir: PathBuf::from("event_data"),
            store_endpoint: "memory://".to_string(),
            keyspace: run.keyspace,
            replication_factor: run.replication_factor,
            keep_tables: run.keep_tables,
            dry_run: run.dry_run,
            load_concurrency: run.load_concurrency,
            connect_timeout_secs: 10,
            strict: false,
            max_failed_rows: None,
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| Error::Config(format!("invalid config YAML: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.keyspace)
            .map_err(|e| Error::Config(format!("keyspace: {e}")))?;

        if self.replication_factor == 0 {
            return Err(Error::Config(
                "replication_factor must be at least 1".to_string(),
            ));
        }

        if self.load_concurrency == 0 {
            return Err(Error::Config(
                "load_concurrency must be at least 1".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect_timeout_secs must be at least 1".to_string(),
            ));
        }

        self.endpoint()?;
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.store_endpoint)
            .map_err(|e| Error::Config(format!("store_endpoint: {e}")))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            keyspace: self.keyspace.clone(),
            replication_factor: self.replication_factor,
            keep_tables: self.keep_tables,
            dry_run: self.dry_run,
            load_concurrency: self.load_concurrency,
        }
    }
}
