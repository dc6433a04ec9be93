// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Plain-text run summary.

use loader::{QueryOutcome, RunReport};
use std::fmt::Write;

const TABLE_HEADER: [&str; 5] = ["table", "attempted", "succeeded", "failed", "skipped"];

pub fn render(report: &RunReport, verbose: bool) -> String {
    let mut out = String::new();
    _ = writeln!(
        out,
        "Run {} into keyspace {}: {} records",
        report.run_id, report.keyspace, report.records
    );
    out.push('\n');

    let rows: Vec<Vec<String>> = report
        .tables
        .iter()
        .map(|t| {
            let mut name = t.table.clone();
            if t.schema_failed {
                name.push_str(" (not created)");
            }
            vec![
                name,
                t.attempted.to_string(),
                t.succeeded.to_string(),
                t.failed.to_string(),
                t.skipped.to_string(),
            ]
        })
        .collect();
    write_grid(&mut out, &TABLE_HEADER, &rows);

    for outcome in &report.queries {
        out.push('\n');
        render_query(&mut out, outcome, verbose);
    }

    if !report.recovered.is_empty() {
        out.push('\n');
        _ = writeln!(out, "{} recovered errors", report.recovered.len());
        if verbose {
            for err in &report.recovered {
                _ = writeln!(out, "  {}: {err}", err.kind());
            }
        }
    }
    out
}

fn render_query(out: &mut String, outcome: &QueryOutcome, verbose: bool) {
    let query = &outcome.query;
    _ = writeln!(out, "{}", query.description);
    if verbose {
        _ = writeln!(out, "  {}", query.statement().cql());
    }

    let result = &outcome.result;
    if result.is_empty() {
        _ = writeln!(out, "  (no rows)");
        return;
    }

    let header: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    write_grid(out, &header, &rows);
    _ = writeln!(out, "  ({} rows)", result.len());
}

/// Left-aligned columns, indented two spaces
fn write_grid(out: &mut String, header: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        format!("  {}", padded.join("  ").trim_end())
    };

    _ = writeln!(out, "{}", line(header.to_vec()));
    for row in rows {
        _ = writeln!(out, "{}", line(row.iter().map(String::as_str).collect()));
    }
}
