// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::report;
use anyhow::{Context, Result};
use clap::Args;
use diagnostics::{info, warn};
use loader::{CsvEventReader, LoaderConfig, RunReport, read_all, run_scoped};
use std::path::PathBuf;

/// Exit code for a run that finished with failures the caller asked to fail on
pub const EXIT_PARTIAL_FAILURE: u8 = 3;

/// Load options; anything left unset comes from `--config` or the defaults
#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// YAML file with loader settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Folder of event CSV files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// `memory://` or comma separated `host[:port]` contact points
    #[arg(long)]
    pub store_endpoint: Option<String>,

    #[arg(long)]
    pub keyspace: Option<String>,

    #[arg(long)]
    pub replication_factor: Option<u32>,

    /// Leave tables in place after verification
    #[arg(long, overrides_with = "no_keep_tables")]
    pub keep_tables: bool,

    /// Tear tables down even if the config file keeps them
    #[arg(long, overrides_with = "keep_tables")]
    pub no_keep_tables: bool,

    /// Create missing tables and run queries without inserting or dropping
    #[arg(long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    #[arg(long, overrides_with = "dry_run")]
    pub no_dry_run: bool,

    /// Number of tables loaded at the same time
    #[arg(long)]
    pub load_concurrency: Option<usize>,

    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// Exit with code 3 if anything failed along the way
    #[arg(long, overrides_with = "no_strict")]
    pub strict: bool,

    #[arg(long, overrides_with = "strict")]
    pub no_strict: bool,

    /// Exit with code 3 if more rows than this failed to insert
    #[arg(long)]
    pub max_failed_rows: Option<usize>,
}

impl LoadArgs {
    /// Merge the config file (if any) with the flags and validate the result.
    pub fn resolve(&self) -> loader::Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_yaml_file(path)?,
            None => LoaderConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(endpoint) = &self.store_endpoint {
            config.store_endpoint = endpoint.clone();
        }
        if let Some(keyspace) = &self.keyspace {
            config.keyspace = keyspace.clone();
        }
        if let Some(rf) = self.replication_factor {
            config.replication_factor = rf;
        }
        if let Some(n) = self.load_concurrency {
            config.load_concurrency = n;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(limit) = self.max_failed_rows {
            config.max_failed_rows = Some(limit);
        }
        if let Some(keep) = switch(self.keep_tables, self.no_keep_tables) {
            config.keep_tables = keep;
        }
        if let Some(dry_run) = switch(self.dry_run, self.no_dry_run) {
            config.dry_run = dry_run;
        }
        if let Some(strict) = switch(self.strict, self.no_strict) {
            config.strict = strict;
        }

        config.validate()?;
        Ok(config)
    }
}

/// `--flag` / `--no-flag` pair; `None` leaves the config file value alone
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Read the event files, load them and render the summary.
///
/// Fatal errors come back as `Err`; recovered ones are in the report.
pub async fn load_command<F>(config: &LoaderConfig, verbose: bool, mut handler: F) -> Result<RunReport>
where
    F: FnMut(&str),
{
    let data_dir = config.data_dir.display().to_string();
    info!("Reading event files from {data_dir}", data_dir: data_dir);
    let reader = CsvEventReader::new(&config.data_dir);
    let raw = read_all(&reader).await?;

    let endpoint = config.endpoint()?;
    let store = widestore::connect(&endpoint, config.connect_timeout())
        .await
        .map_err(|source| loader::Error::Connectivity {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let report = run_scoped(store, config.run_options(), &raw)
        .await
        .context("load failed")?;

    handler(&report::render(&report, verbose));
    Ok(report)
}

/// Map a finished run to its exit code under the configured failure policy.
pub fn exit_code(config: &LoaderConfig, report: &RunReport) -> u8 {
    match report.check_failures(config.strict, config.max_failed_rows) {
        Ok(()) => 0,
        Err(err) => {
            let message = err.to_string();
            warn!("{message}", message: message);
            EXIT_PARTIAL_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("sparkify.yaml");
        std::fs::write(
            &path,
            "data_dir: /from/file\nkeyspace: from_file\nload_concurrency: 2\n",
        )?;

        let args = LoadArgs {
            config: Some(path),
            keyspace: Some("from_flag".to_string()),
            keep_tables: true,
            ..Default::default()
        };
        let config = args.resolve()?;
        assert_eq!(config.data_dir, PathBuf::from("/from/file"));
        assert_eq!(config.keyspace, "from_flag");
        assert_eq!(config.load_concurrency, 2);
        assert!(config.keep_tables);
        assert!(!config.dry_run);
        Ok(())
    }

    #[derive(clap::Parser)]
    struct Cli {
        #[command(flatten)]
        load: LoadArgs,
    }

    #[test]
    fn test_negated_flags_turn_off_config_file() -> anyhow::Result<()> {
        use clap::Parser;

        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("sparkify.yaml");
        std::fs::write(&path, "keep_tables: true
dry_run: true
strict: true
")?;
        let file = path.display().to_string();
        let file = file.as_str();

        let cli = Cli::try_parse_from(["sparkify", "--config", file])?;
        let config = cli.load.resolve()?;
        assert!(config.keep_tables && config.dry_run && config.strict);

        let cli = Cli::try_parse_from([
            "sparkify",
            "--config",
            file,
            "--no-keep-tables",
            "--no-dry-run",
            "--no-strict",
        ])?;
        let config = cli.load.resolve()?;
        assert!(!config.keep_tables);
        assert!(!config.dry_run);
        assert!(!config.strict);

        // The later of a flag and its negation wins
        let cli = Cli::try_parse_from(["sparkify", "--no-strict", "--strict"])?;
        assert!(cli.load.resolve()?.strict);
        let cli = Cli::try_parse_from(["sparkify", "--keep-tables", "--no-keep-tables"])?;
        assert!(!cli.load.resolve()?.keep_tables);
        Ok(())
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let args = LoadArgs {
            keyspace: Some("no spaces".to_string()),
            ..Default::default()
        };
        let err = args.resolve().expect_err("bad keyspace");
        assert_eq!(err.kind(), "ConfigError");
    }
}
