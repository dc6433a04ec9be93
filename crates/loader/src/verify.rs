// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The three read queries the tables were designed for.

use crate::error::Error;
use crate::record::Field;
use diagnostics::{info, warn};
use widestore::{ResultSet, Statement, Store, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationQuery {
    pub name: &'static str,
    /// The question the query answers, for the report
    pub description: &'static str,
    pub table: &'static str,
    pub columns: Vec<Field>,
    /// Equality restrictions, bound as parameters
    pub predicates: Vec<(Field, Value)>,
}

impl VerificationQuery {
    pub fn statement(&self) -> Statement {
        Statement::Select {
            table: self.table.to_string(),
            columns: self.columns.iter().map(|f| f.name().to_string()).collect(),
            predicates: self
                .predicates
                .iter()
                .map(|(f, _)| f.name().to_string())
                .collect(),
        }
    }

    pub fn params(&self) -> Vec<Value> {
        self.predicates.iter().map(|(_, v)| v.clone()).collect()
    }
}

/// Result of one verification query; failures yield an empty result
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: VerificationQuery,
    pub result: ResultSet,
    pub error: Option<Error>,
}

impl QueryOutcome {
    pub fn returned_rows(&self) -> bool {
        !self.result.is_empty()
    }
}

/// Artist, song and length heard during session 338, item 4
pub fn session_item_query() -> VerificationQuery {
    VerificationQuery {
        name: "session_item",
        description: "Give me the artist, song title and song's length in the music app \
                      history that was heard during sessionId = 338, and itemInSession = 4",
        table: "length_playlist_session",
        columns: vec![Field::Artist, Field::Song, Field::Length],
        predicates: vec![
            (Field::SessionId, Value::Int(338)),
            (Field::ItemInSession, Value::Int(4)),
        ],
    }
}

/// Artist, song (by item) and user name for user 10, session 182
pub fn user_session_query() -> VerificationQuery {
    VerificationQuery {
        name: "user_session",
        description: "Give me only the following: name of artist, song (sorted by \
                      itemInSession) and user (first and last name) for userid = 10, \
                      sessionid = 182",
        table: "user_playlist_session",
        columns: vec![Field::Artist, Field::Song, Field::FirstName, Field::LastName],
        predicates: vec![
            (Field::UserId, Value::Int(10)),
            (Field::SessionId, Value::Int(182)),
        ],
    }
}

/// Every user who listened to 'All Hands Against His Own'
pub fn song_listeners_query() -> VerificationQuery {
    VerificationQuery {
        name: "song_listeners",
        description: "Give me every user name (first and last) in my music app history \
                      who listened to the song 'All Hands Against His Own'",
        table: "song_user",
        columns: vec![Field::FirstName, Field::LastName],
        predicates: vec![(Field::Song, Value::from("All Hands Against His Own"))],
    }
}

pub fn standard_queries() -> Vec<VerificationQuery> {
    vec![session_item_query(), user_session_query(), song_listeners_query()]
}

/// Run one query; a store failure is logged and returns no rows.
pub async fn run_query(store: &dyn Store, query: &VerificationQuery) -> QueryOutcome {
    let name = query.name;
    match store.execute(&query.statement(), &query.params()).await {
        Ok(result) => {
            let rows = result.len();
            info!("Query {name} returned {rows} rows", name: name, rows: rows);
            QueryOutcome {
                query: query.clone(),
                result,
                error: None,
            }
        }
        Err(source) => {
            let err = Error::QueryExecution {
                query: name.to_string(),
                source,
            };
            let message = err.to_string();
            warn!("{message}", message: message);
            QueryOutcome {
                query: query.clone(),
                result: ResultSet::empty(),
                error: Some(err),
            }
        }
    }
}

pub async fn run_all(store: &dyn Store, queries: &[VerificationQuery]) -> Vec<QueryOutcome> {
    let mut outcomes = Vec::with_capacity(queries.len());
    for query in queries {
        outcomes.push(run_query(store, query).await);
    }
    outcomes
}
