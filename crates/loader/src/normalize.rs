// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Raw rows to canonical records.
//!
//! Source columns are looked up by their event-file name first and then by
//! their canonical name, so an already canonical mapping normalizes to
//! itself. Text fields turn null into `""`; `user_id` turns null or NaN into
//! 0 and truncates decimals.

use crate::error::{Error, Result};
use crate::record::{CanonicalRecord, Field, RawRecord, RawValue};
use diagnostics::debug;

/// Columns the record reader must deliver, by event-file name
pub const SOURCE_COLUMNS: [&str; 11] = [
    "artist",
    "firstName",
    "gender",
    "itemInSession",
    "lastName",
    "length",
    "level",
    "location",
    "sessionId",
    "song",
    "userId",
];

/// Normalize every row, failing on the first one that does not fit.
pub fn normalize(records: &[RawRecord]) -> Result<Vec<CanonicalRecord>> {
    let normalized = records
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_record(index, raw))
        .collect::<Result<Vec<_>>>()?;
    let count = normalized.len();
    debug!("Normalized {count} records", count: count);
    Ok(normalized)
}

pub fn normalize_record(index: usize, raw: &RawRecord) -> Result<CanonicalRecord> {
    let row = RowView { index, raw };
    Ok(CanonicalRecord {
        artist: row.text(Field::Artist)?,
        first_name: row.text(Field::FirstName)?,
        gender: row.text(Field::Gender)?,
        item_in_session: row.int(Field::ItemInSession)?,
        last_name: row.text(Field::LastName)?,
        length: row.float(Field::Length)?,
        level: row.text(Field::Level)?,
        location: row.text(Field::Location)?,
        session_id: row.int(Field::SessionId)?,
        song: row.text(Field::Song)?,
        user_id: row.user_id()?,
    })
}

struct RowView<'a> {
    index: usize,
    raw: &'a RawRecord,
}

impl RowView<'_> {
    fn get(&self, field: Field) -> Result<&RawValue> {
        self.raw
            .get(field.source_name())
            .or_else(|| self.raw.get(field.name()))
            .ok_or_else(|| {
                Error::schema_mismatch(
                    format!("record {}", self.index),
                    format!("missing column {}", field.source_name()),
                )
            })
    }

    fn invalid(&self, field: Field, value: &RawValue) -> Error {
        Error::schema_mismatch(
            format!("record {}", self.index),
            format!("cannot use {value:?} as {}", field.name()),
        )
    }

    fn text(&self, field: Field) -> Result<String> {
        Ok(match self.get(field)? {
            RawValue::Null => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Integer(v) => v.to_string(),
            RawValue::Float(v) if v.is_nan() => String::new(),
            RawValue::Float(v) => v.to_string(),
        })
    }

    fn int(&self, field: Field) -> Result<i32> {
        let value = self.get(field)?;
        let parsed = match value {
            RawValue::Integer(v) => Some(*v),
            RawValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            RawValue::Text(s) => parse_integral(s.trim()),
            _ => None,
        };
        parsed
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| self.invalid(field, value))
    }

    fn float(&self, field: Field) -> Result<Option<f32>> {
        let value = self.get(field)?;
        match value {
            RawValue::Null => Ok(None),
            RawValue::Float(v) if v.is_nan() => Ok(None),
            RawValue::Float(v) => Ok(Some(*v as f32)),
            RawValue::Integer(v) => Ok(Some(*v as f32)),
            RawValue::Text(s) if s.trim().is_empty() => Ok(None),
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(|v| Some(v as f32))
                .map_err(|_| self.invalid(field, value)),
        }
    }

    /// Missing users become 0; decimals such as `10.0` are truncated.
    fn user_id(&self) -> Result<i32> {
        let field = Field::UserId;
        let value = self.get(field)?;
        let parsed = match value {
            RawValue::Null => Some(0),
            RawValue::Integer(v) => Some(*v),
            RawValue::Float(v) if v.is_nan() => Some(0),
            RawValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            RawValue::Float(_) => None,
            RawValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                    Some(0)
                } else {
                    s.parse::<i64>().ok().or_else(|| {
                        s.parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .map(|v| v.trunc() as i64)
                    })
                }
            }
        };
        parsed
            .filter(|v| *v >= 0)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| self.invalid(field, value))
    }
}

/// `"4"` and `"4.0"` are both 4; `"4.5"` is not an integer.
fn parse_integral(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}
