// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Sparkify event loader
//!
//! Reads music app event files, normalizes each event once and writes it
//! into one table per read query: session items, user sessions and song
//! listeners. The three queries are then run back against the store.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod normalize;
pub mod planner;
pub mod reader;
pub mod record;
pub mod verify;

pub use catalog::{Catalog, Inclusion, TableDefinition};
pub use config::LoaderConfig;
pub use error::{Error, Result, Severity};
pub use executor::{InsertReport, LoadExecutor, LoadMode};
pub use lifecycle::{Pipeline, RunOptions, RunReport, Stage, run_scoped};
pub use normalize::{SOURCE_COLUMNS, normalize};
pub use planner::{PlannedRow, plan, plan_all};
pub use reader::{CsvEventReader, RecordReader, read_all};
pub use record::{CanonicalRecord, Field, RawRecord, RawValue};
pub use verify::{QueryOutcome, VerificationQuery, standard_queries};
