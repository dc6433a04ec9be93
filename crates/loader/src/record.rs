// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Raw and canonical shapes of one listening event.

use std::collections::BTreeMap;
use std::fmt;
use widestore::{ColumnType, Value};

/// A scalar exactly as the record reader produced it
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

/// One source row, keyed by column name
pub type RawRecord = BTreeMap<String, RawValue>;

/// Fields of a canonical record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Artist,
    FirstName,
    Gender,
    ItemInSession,
    LastName,
    Length,
    Level,
    Location,
    SessionId,
    Song,
    UserId,
}

impl Field {
    /// Every field, in source column order
    pub const ALL: [Field; 11] = [
        Field::Artist,
        Field::FirstName,
        Field::Gender,
        Field::ItemInSession,
        Field::LastName,
        Field::Length,
        Field::Level,
        Field::Location,
        Field::SessionId,
        Field::Song,
        Field::UserId,
    ];

    /// Column name in the event files
    pub fn source_name(self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::FirstName => "firstName",
            Field::Gender => "gender",
            Field::ItemInSession => "itemInSession",
            Field::LastName => "lastName",
            Field::Length => "length",
            Field::Level => "level",
            Field::Location => "location",
            Field::SessionId => "sessionId",
            Field::Song => "song",
            Field::UserId => "userId",
        }
    }

    /// Column name in the store
    pub fn name(self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::FirstName => "first_name",
            Field::Gender => "gender",
            Field::ItemInSession => "item_in_session",
            Field::LastName => "last_name",
            Field::Length => "length",
            Field::Level => "level",
            Field::Location => "location",
            Field::SessionId => "session_id",
            Field::Song => "song",
            Field::UserId => "user_id",
        }
    }

    pub fn column_type(self) -> ColumnType {
        match self {
            Field::ItemInSession | Field::SessionId | Field::UserId => ColumnType::Int,
            Field::Length => ColumnType::Float,
            _ => ColumnType::Text,
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A normalized listening event. Text fields are never absent (unknown is
/// the empty string) and `user_id` 0 stands for an unknown user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalRecord {
    pub artist: String,
    pub first_name: String,
    pub gender: String,
    pub item_in_session: i32,
    pub last_name: String,
    pub length: Option<f32>,
    pub level: String,
    pub location: String,
    pub session_id: i32,
    pub song: String,
    pub user_id: i32,
}

impl CanonicalRecord {
    /// Store value of one field
    pub fn value(&self, field: Field) -> Value {
        match field {
            Field::Artist => Value::from(self.artist.as_str()),
            Field::FirstName => Value::from(self.first_name.as_str()),
            Field::Gender => Value::from(self.gender.as_str()),
            Field::ItemInSession => Value::Int(self.item_in_session),
            Field::LastName => Value::from(self.last_name.as_str()),
            Field::Length => Value::from(self.length),
            Field::Level => Value::from(self.level.as_str()),
            Field::Location => Value::from(self.location.as_str()),
            Field::SessionId => Value::Int(self.session_id),
            Field::Song => Value::from(self.song.as_str()),
            Field::UserId => Value::Int(self.user_id),
        }
    }

    /// Raw mapping under canonical names; normalizing it gives `self` back.
    pub fn to_raw(&self) -> RawRecord {
        Field::ALL
            .into_iter()
            .map(|field| {
                let raw = match self.value(field) {
                    Value::Null => RawValue::Null,
                    Value::Int(v) => RawValue::Integer(i64::from(v)),
                    Value::Float(v) => RawValue::Float(f64::from(v)),
                    Value::Text(v) => RawValue::Text(v),
                };
                (field.name().to_string(), raw)
            })
            .collect()
    }
}
