// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Fan canonical records out into per-table rows.
//!
//! Plans are lazy and keep source order. Nothing is deduplicated: two
//! records with the same primary key both become rows, and the store keeps
//! the later one.

use crate::catalog::{Catalog, TableDefinition};
use crate::record::CanonicalRecord;
use widestore::Value;

/// One insert's worth of bound values, in the definition's column order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    /// Position of the source record in the canonical record set
    pub record: usize,
    pub values: Vec<Value>,
}

/// Lazily planned rows for one table
pub struct TablePlan<'a> {
    definition: &'a TableDefinition,
    records: std::iter::Enumerate<std::slice::Iter<'a, CanonicalRecord>>,
}

impl<'a> TablePlan<'a> {
    pub fn definition(&self) -> &'a TableDefinition {
        self.definition
    }
}

impl Iterator for TablePlan<'_> {
    type Item = PlannedRow;

    fn next(&mut self) -> Option<PlannedRow> {
        let inclusion = self.definition.inclusion;
        let (index, record) = self.records.find(|(_, r)| inclusion.admits(r))?;
        Some(PlannedRow {
            record: index,
            values: self
                .definition
                .columns
                .iter()
                .map(|field| record.value(*field))
                .collect(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

pub fn plan<'a>(definition: &'a TableDefinition, records: &'a [CanonicalRecord]) -> TablePlan<'a> {
    TablePlan {
        definition,
        records: records.iter().enumerate(),
    }
}

/// One plan per catalog table, in catalog order
pub fn plan_all<'a>(catalog: &'a Catalog, records: &'a [CanonicalRecord]) -> Vec<TablePlan<'a>> {
    catalog.tables().iter().map(|t| plan(t, records)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{session_item_table, song_listeners_table, user_session_table};
    use crate::record::Field;

    fn record(session: i32, item: i32, user: i32, song: &str, first: &str) -> CanonicalRecord {
        CanonicalRecord {
            session_id: session,
            item_in_session: item,
            user_id: user,
            song: song.to_string(),
            first_name: first.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            record(338, 4, 8, "Sweet Home Alabama", "Kaylee"),
            record(139, 0, 0, "", ""),
            record(182, 0, 10, "Keep On Keepin' On", "Sylvie"),
            record(182, 1, 10, "", "Sylvie"),
            record(182, 0, 10, "Keep On Keepin' On", "Sylvie"),
        ]
    }

    #[test]
    fn test_song_listeners_skip_empty_songs() {
        let records = sample();
        let table = song_listeners_table();
        let rows: Vec<_> = plan(&table, &records).collect();

        for (i, r) in records.iter().enumerate() {
            let emitted = rows.iter().filter(|row| row.record == i).count();
            let expected = usize::from(!r.song.is_empty());
            assert_eq!(emitted, expected, "record {i}");
        }
    }

    #[test]
    fn test_all_rows_in_source_order_with_duplicates() {
        let records = sample();
        let table = user_session_table();
        let order: Vec<_> = plan(&table, &records).map(|r| r.record).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_values_follow_column_order() {
        let records = sample();
        let table = song_listeners_table();
        let first = plan(&table, &records).next();
        assert_eq!(
            first.map(|r| r.values),
            Some(vec![
                Value::from("Sweet Home Alabama"),
                Value::Int(8),
                Value::from("Kaylee"),
                Value::from(""),
            ])
        );
    }

    #[test]
    fn test_partition_keys_never_empty() {
        let records = sample();
        let catalog = Catalog::standard();
        for table_plan in plan_all(&catalog, &records) {
            let table = table_plan.definition();
            let key_positions: Vec<usize> = table
                .partition_key
                .iter()
                .filter_map(|k| table.columns.iter().position(|c| c == k))
                .collect();
            for row in table_plan {
                for &pos in &key_positions {
                    assert!(!row.values[pos].is_empty_key(), "{}", table.name);
                }
            }
        }
    }

    #[test]
    fn test_session_item_layout() {
        let records = vec![CanonicalRecord {
            artist: "Lynyrd Skynyrd".to_string(),
            length: Some(234.8),
            ..record(338, 4, 8, "Sweet Home Alabama", "Kaylee")
        }];
        let table = session_item_table();
        let rows: Vec<_> = plan(&table, &records).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(table.columns[4], Field::Length);
        assert_eq!(
            rows[0].values,
            vec![
                Value::Int(338),
                Value::Int(4),
                Value::from("Lynyrd Skynyrd"),
                Value::from("Sweet Home Alabama"),
                Value::Float(234.8),
            ]
        );
    }
}
