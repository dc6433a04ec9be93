// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use widestore::{
    ColumnSpec, ColumnType, Endpoint, MemoryCluster, Statement, Store, StoreError, TableSchema,
    Value, connect,
};

fn playlist() -> TableSchema {
    TableSchema {
        name: "user_playlist_session".to_string(),
        partition_key: vec!["user_id".to_string(), "session_id".to_string()],
        clustering_key: vec!["item_in_session".to_string()],
        columns: vec![
            ColumnSpec::new("user_id", ColumnType::Int),
            ColumnSpec::new("session_id", ColumnType::Int),
            ColumnSpec::new("item_in_session", ColumnType::Int),
            ColumnSpec::new("song", ColumnType::Text),
        ],
    }
}

fn insert() -> Statement {
    Statement::Insert {
        table: "user_playlist_session".to_string(),
        columns: vec![
            "user_id".to_string(),
            "session_id".to_string(),
            "item_in_session".to_string(),
            "song".to_string(),
        ],
    }
}

async fn exercise(store: &dyn Store) -> widestore::Result<Vec<Value>> {
    store.ensure_keyspace("sparkify_ks", 1).await?;
    store.set_active_keyspace("sparkify_ks").await?;
    store
        .execute(&Statement::CreateTable(playlist()), &[])
        .await?;

    for (item, song) in [(2, "Greece 2000"), (0, "Keep On Keepin' On"), (1, "Uprising")] {
        let params = [Value::Int(10), Value::Int(182), Value::Int(item), Value::from(song)];
        store.execute(&insert(), &params).await?;
    }
    // Another session of the same user stays out of the result
    let other = [Value::Int(10), Value::Int(183), Value::Int(0), Value::from("Yesterday")];
    store.execute(&insert(), &other).await?;

    let select = Statement::Select {
        table: "user_playlist_session".to_string(),
        columns: vec!["song".to_string()],
        predicates: vec!["user_id".to_string(), "session_id".to_string()],
    };
    let result = store
        .execute(&select, &[Value::Int(10), Value::Int(182)])
        .await?;
    Ok(result.column_values("song").into_iter().cloned().collect())
}

#[tokio::test]
async fn test_store_through_trait_object() -> widestore::Result<()> {
    let store = connect(&Endpoint::Memory, Duration::from_secs(1)).await?;
    let songs = exercise(store.as_ref()).await?;
    assert_eq!(
        songs,
        vec![
            Value::from("Keep On Keepin' On"),
            Value::from("Uprising"),
            Value::from("Greece 2000"),
        ]
    );

    store.close().await?;
    let after = store
        .execute(&Statement::DropTable { name: "user_playlist_session".to_string() }, &[])
        .await;
    assert_eq!(after, Err(StoreError::Closed));
    Ok(())
}

#[tokio::test]
async fn test_sessions_share_cluster_data() -> widestore::Result<()> {
    let cluster = MemoryCluster::new();
    let writer = cluster.connect().await?;
    exercise(&writer).await?;

    // A second session must pick its own keyspace
    let reader = cluster.connect().await?;
    let drop = Statement::DropTable {
        name: "user_playlist_session".to_string(),
    };
    assert_eq!(
        reader.execute(&drop, &[]).await,
        Err(StoreError::NoActiveKeyspace)
    );
    reader.set_active_keyspace("sparkify_ks").await?;
    assert_eq!(
        cluster.row_count("sparkify_ks", "user_playlist_session").await,
        Some(4)
    );
    reader.execute(&drop, &[]).await?;
    assert_eq!(cluster.row_count("sparkify_ks", "user_playlist_session").await, None);
    Ok(())
}

#[tokio::test]
async fn test_wrong_bind_count() -> widestore::Result<()> {
    let session = MemoryCluster::new().connect().await?;
    let err = session.execute(&insert(), &[Value::Int(1)]).await;
    assert_eq!(err, Err(StoreError::BindCount { expected: 4, found: 1 }));
    Ok(())
}
