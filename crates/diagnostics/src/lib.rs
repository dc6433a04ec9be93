// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by every crate in the loader workspace.
//!
//! Usage:
//! - Set SPARKIFY_LOG=off - no logs
//! - Set SPARKIFY_LOG=info - stage transitions and summaries
//! - Set SPARKIFY_LOG=debug - per-statement and per-row diagnostics
//!
//! Library crates log through the macros below; only binaries call
//! `init_diagnostics*`.

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted for the log level.
pub const LOG_ENV: &str = "SPARKIFY_LOG";

static INIT: Once = Once::new();

/// Initialize diagnostics from SPARKIFY_LOG, logging nothing when it is unset.
pub fn init_diagnostics() {
    init_diagnostics_with_default("off");
}

/// Initialize diagnostics from SPARKIFY_LOG, falling back to `default_level`.
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_diagnostics_with_default(default_level: &str) {
    INIT.call_once(|| {
        let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| default_level.to_string());

        let min_level = match parse_level(&log_level) {
            Some(None) => return,
            Some(Some(level)) => level,
            None => {
                // Logging is not up yet, so this one goes straight to stderr
                eprintln!("Warning: Unknown {LOG_ENV} value '{log_level}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min_level))
            .init();

        // The runtime lives for the whole process
        std::mem::forget(rt);
    });
}

/// `Some(None)` means logging is switched off; `None` means unrecognized.
fn parse_level(value: &str) -> Option<Option<emit::Level>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "" => Some(None),
        "debug" => Some(Some(emit::Level::Debug)),
        "info" => Some(Some(emit::Level::Info)),
        "warn" => Some(Some(emit::Level::Warn)),
        "error" => Some(Some(emit::Level::Error)),
        _ => None,
    }
}

/// Log stage transitions and summaries.
///
/// Examples: "Keyspace sparkify_ks ready", "Loaded 6820 rows into song_user"
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log per-statement detail useful while debugging a load.
///
/// Examples: "CQL: INSERT INTO ...", "Planned 12 rows for song_user"
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recovered failures: the run continues but something was skipped.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log fatal conditions that abort the run.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}
