// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use loader::{CsvEventReader, Pipeline, RunOptions, Stage, read_all};
use std::path::Path;
use tempfile::tempdir;
use widestore::{MemoryCluster, Value};

const HEADER: &str = "artist,auth,firstName,gender,itemInSession,lastName,length,level,\
                      location,method,page,registration,sessionId,song,status,ts,userId";

fn write_events(dir: &Path, name: &str, rows: &[&str]) -> std::io::Result<()> {
    let mut text = format!("{HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(dir.join(name), text)
}

fn keep_tables() -> RunOptions {
    RunOptions {
        keep_tables: true,
        ..Default::default()
    }
}

const SKYNYRD: &str = "Lynyrd Skynyrd,Logged In,Kaylee,F,4,Summers,234.8,free,\
                       \"Phoenix-Mesa-Scottsdale, AZ\",PUT,NextSong,1.54E+12,338,Sweet Home Alabama,200,1.54E+12,8";
const HOME: &str = ",Logged In,Kaylee,F,5,Summers,,free,\
                    \"Phoenix-Mesa-Scottsdale, AZ\",GET,Home,1.54E+12,338,,200,1.54E+12,8";
const SYLVIE_0: &str = "Down To The Bone,Logged In,Sylvie,F,0,Cruz,333.57,free,\
                        \"Washington-Arlington-Alexandria, DC-VA-MD-WV\",PUT,NextSong,1.54E+12,182,Keep On Keepin' On,200,1.54E+12,10";
const SYLVIE_1: &str = "Three Drives,Logged In,Sylvie,F,1,Cruz,411.62,free,\
                        \"Washington-Arlington-Alexandria, DC-VA-MD-WV\",PUT,NextSong,1.54E+12,182,Greece 2000,200,1.54E+12,10";

#[tokio::test]
async fn test_session_item_round_trip() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    write_events(tmp.path(), "2018-11-01-events.csv", &[SKYNYRD, HOME, SYLVIE_0])?;

    let raw = read_all(&CsvEventReader::new(tmp.path())).await?;
    assert_eq!(raw.len(), 3);

    let session = MemoryCluster::new().connect().await?;
    let report = Pipeline::new(&session, keep_tables()).run(&raw).await?;
    assert!(report.reached(Stage::Verified));
    assert!(!report.has_partial_failures());

    let result = &report.queries[0].result;
    assert_eq!(result.len(), 1);
    assert_eq!(result.get(0, "artist"), Some(&Value::from("Lynyrd Skynyrd")));
    assert_eq!(result.get(0, "song"), Some(&Value::from("Sweet Home Alabama")));
    let length = result.get(0, "length").and_then(Value::as_float);
    assert!(length.is_some_and(|l| (l - 234.8).abs() < 1e-3));

    // The page view without a song is stored in the session tables only
    let counts: Vec<_> = report.tables.iter().map(|t| t.succeeded).collect();
    assert_eq!(counts, vec![3, 3, 2]);
    Ok(())
}

#[tokio::test]
async fn test_user_session_rows_ordered_by_item() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    // Item 1 arrives in an earlier file than item 0
    write_events(tmp.path(), "a.csv", &[SYLVIE_1])?;
    write_events(tmp.path(), "b.csv", &[SYLVIE_0])?;

    let raw = read_all(&CsvEventReader::new(tmp.path())).await?;
    let session = MemoryCluster::new().connect().await?;
    let report = Pipeline::new(&session, keep_tables()).run(&raw).await?;

    let result = &report.queries[1].result;
    assert_eq!(result.columns, vec!["artist", "song", "first_name", "last_name"]);
    assert_eq!(
        result.column_values("song"),
        vec![&Value::from("Keep On Keepin' On"), &Value::from("Greece 2000")]
    );
    Ok(())
}

#[tokio::test]
async fn test_song_listener_last_writer_wins() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let first = ",Logged In,Jacqueline,F,0,Lynch,200.0,paid,Atlanta,PUT,NextSong,1,559,\
                 All Hands Against His Own,200,1,29";
    let second = ",Logged In,Jackie,F,1,Lynch,200.0,paid,Atlanta,PUT,NextSong,1,559,\
                  All Hands Against His Own,200,1,29";
    write_events(tmp.path(), "events.csv", &[first, second])?;

    let raw = read_all(&CsvEventReader::new(tmp.path())).await?;
    let cluster = MemoryCluster::new();
    let session = cluster.connect().await?;
    let report = Pipeline::new(&session, keep_tables()).run(&raw).await?;

    let result = &report.queries[2].result;
    assert_eq!(result.len(), 1);
    assert_eq!(result.get(0, "first_name"), Some(&Value::from("Jackie")));
    assert_eq!(cluster.row_count("sparkify_ks", "song_user").await, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_yield_same_counts() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    write_events(tmp.path(), "events.csv", &[SKYNYRD, HOME, SYLVIE_0, SYLVIE_1])?;
    let raw = read_all(&CsvEventReader::new(tmp.path())).await?;

    let cluster = MemoryCluster::new();
    let mut counts = Vec::new();
    for _ in 0..2 {
        let session = cluster.connect().await?;
        Pipeline::new(&session, keep_tables()).run(&raw).await?;
        let mut run = Vec::new();
        for table in ["length_playlist_session", "user_playlist_session", "song_user"] {
            run.push(cluster.row_count("sparkify_ks", table).await);
        }
        counts.push(run);
    }
    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[0], vec![Some(4), Some(4), Some(3)]);
    Ok(())
}

#[tokio::test]
async fn test_missing_column_stops_before_store() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    std::fs::write(tmp.path().join("bad.csv"), "artist,song\nMuse,Uprising\n")?;
    let err = read_all(&CsvEventReader::new(tmp.path()))
        .await
        .expect_err("eleven columns are required");
    assert_eq!(err.kind(), "SchemaMismatchError");
    assert!(err.is_fatal());
    Ok(())
}

#[tokio::test]
async fn test_store_outage_is_fatal() -> anyhow::Result<()> {
    let cluster = MemoryCluster::new();
    let session = cluster.connect().await?;
    cluster.set_available(false).await;

    let err = Pipeline::new(&session, RunOptions::default())
        .run(&[])
        .await
        .expect_err("store is down");
    assert_eq!(err.kind(), "KeyspaceSetupError");
    Ok(())
}
