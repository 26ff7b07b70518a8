use chrono::Utc;
use keyserver_models::{FederationSync, FetchState};

use crate::{federation_queries, DbError, DbPool};

/// Inserts an open `federation_syncs` row and returns its assigned
/// `sync_id`. Paired with `finalize` to close the same row.
pub async fn start(pool: &DbPool, query_id: &str) -> Result<i64, DbError> {
    let started = Utc::now();
    let sync_id: i64 = sqlx::query_scalar(
        "INSERT INTO federation_syncs (query_id, started, insertions, max_timestamp, max_revised_timestamp)
         VALUES ($1, $2, 0, 0, 0)
         RETURNING sync_id",
    )
    .bind(query_id)
    .bind(started)
    .fetch_one(pool)
    .await?;
    Ok(sync_id)
}

/// Closes the `federation_syncs` row and, when `insertions > 0`, advances
/// the owning query's cursors — both in one transaction. Cursors never
/// advance past an empty window: a run that inserted nothing must not
/// skip late-arriving keys that could still land in that window.
pub async fn finalize(
    pool: &DbPool,
    sync_id: i64,
    query_id: &str,
    final_state: &FetchState,
    insertions: i64,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE federation_syncs SET
             completed = $2, insertions = $3, max_timestamp = $4, max_revised_timestamp = $5
         WHERE sync_id = $1",
    )
    .bind(sync_id)
    .bind(Utc::now())
    .bind(insertions)
    .bind(final_state.key_cursor.timestamp)
    .bind(final_state.revised_key_cursor.timestamp)
    .execute(&mut *tx)
    .await?;

    if insertions > 0 {
        federation_queries::advance_cursors(
            &mut *tx,
            query_id,
            &final_state.key_cursor.next_token,
            final_state.key_cursor.timestamp,
            &final_state.revised_key_cursor.next_token,
            final_state.revised_key_cursor.timestamp,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get(pool: &DbPool, sync_id: i64) -> Result<Option<FederationSync>, DbError> {
    let row = sqlx::query_as::<_, FederationSync>(
        "SELECT sync_id, query_id, started, completed, insertions, max_timestamp, max_revised_timestamp
         FROM federation_syncs WHERE sync_id = $1",
    )
    .bind(sync_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyserver_models::Cursor;

    async fn test_pool() -> DbPool {
        let pool = crate::create_pool("sqlite::memory:", 1).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed_query(pool: &DbPool, query_id: &str) {
        federation_queries::create(pool, query_id, "https://remote.example", "aud", &[], &[], false, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn finalize_with_zero_insertions_does_not_advance_cursors() {
        let pool = test_pool().await;
        seed_query(&pool, "q1").await;
        let sync_id = start(&pool, "q1").await.unwrap();

        let final_state = FetchState {
            key_cursor: Cursor { timestamp: 100, next_token: String::new() },
            revised_key_cursor: Cursor { timestamp: 100, next_token: String::new() },
        };
        finalize(&pool, sync_id, "q1", &final_state, 0).await.unwrap();

        let query = federation_queries::get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(query.last_key_timestamp, 0);

        let sync = get(&pool, sync_id).await.unwrap().unwrap();
        assert!(!sync.is_open());
        assert_eq!(sync.insertions, 0);
    }

    #[tokio::test]
    async fn finalize_with_insertions_advances_both_cursors() {
        let pool = test_pool().await;
        seed_query(&pool, "q1").await;
        let sync_id = start(&pool, "q1").await.unwrap();

        let final_state = FetchState {
            key_cursor: Cursor { timestamp: 200, next_token: "k".into() },
            revised_key_cursor: Cursor { timestamp: 100, next_token: "r".into() },
        };
        finalize(&pool, sync_id, "q1", &final_state, 4).await.unwrap();

        let query = federation_queries::get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(query.last_key_timestamp, 200);
        assert_eq!(query.last_revised_timestamp, 100);

        let sync = get(&pool, sync_id).await.unwrap().unwrap();
        assert_eq!(sync.insertions, 4);
        assert_eq!(sync.max_timestamp, 200);
        assert_eq!(sync.max_revised_timestamp, 100);
    }
}
