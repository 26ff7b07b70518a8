use keyserver_models::FederationQuery;
use sqlx::Row;

use crate::{regions_from_db_text, regions_to_db_text, DbError, DbPool};

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for FederationQuery {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let include_regions: String = row.try_get("include_regions")?;
        let exclude_regions: String = row.try_get("exclude_regions")?;
        Ok(Self {
            query_id: row.try_get("query_id")?,
            server_addr: row.try_get("server_addr")?,
            audience: row.try_get("audience")?,
            include_regions: regions_from_db_text(&include_regions),
            exclude_regions: regions_from_db_text(&exclude_regions),
            only_travelers: crate::bool_from_any_row(row, "only_travelers")?,
            only_local_provenance: crate::bool_from_any_row(row, "only_local_provenance")?,
            last_key_cursor: row.try_get("last_key_cursor")?,
            last_key_timestamp: row.try_get("last_key_timestamp")?,
            last_revised_cursor: row.try_get("last_revised_cursor")?,
            last_revised_timestamp: row.try_get("last_revised_timestamp")?,
        })
    }
}

const SELECT_COLUMNS: &str = "query_id, server_addr, audience, include_regions, exclude_regions,
     only_travelers, only_local_provenance, last_key_cursor, last_key_timestamp,
     last_revised_cursor, last_revised_timestamp";

pub async fn get(pool: &DbPool, query_id: &str) -> Result<Option<FederationQuery>, DbError> {
    let row = sqlx::query_as::<_, FederationQuery>(&format!(
        "SELECT {SELECT_COLUMNS} FROM federation_queries WHERE query_id = $1"
    ))
    .bind(query_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &DbPool,
    query_id: &str,
    server_addr: &str,
    audience: &str,
    include_regions: &[String],
    exclude_regions: &[String],
    only_travelers: bool,
    only_local_provenance: bool,
) -> Result<FederationQuery, DbError> {
    sqlx::query(
        "INSERT INTO federation_queries
            (query_id, server_addr, audience, include_regions, exclude_regions,
             only_travelers, only_local_provenance,
             last_key_cursor, last_key_timestamp, last_revised_cursor, last_revised_timestamp)
         VALUES ($1, $2, $3, $4, $5, $6, $7, '', 0, '', 0)",
    )
    .bind(query_id)
    .bind(server_addr)
    .bind(audience)
    .bind(regions_to_db_text(include_regions))
    .bind(regions_to_db_text(exclude_regions))
    .bind(only_travelers)
    .bind(only_local_provenance)
    .execute(pool)
    .await?;

    get(pool, query_id).await?.ok_or(DbError::NotFound)
}

/// Advances the cursors on a query. Called only by the sync ledger's
/// finalize phase, inside the same transaction that closes the
/// `federation_syncs` row.
pub async fn advance_cursors(
    executor: impl sqlx::Executor<'_, Database = sqlx::Any>,
    query_id: &str,
    key_cursor: &str,
    key_timestamp: i64,
    revised_cursor: &str,
    revised_timestamp: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE federation_queries SET
             last_key_cursor = $2, last_key_timestamp = $3,
             last_revised_cursor = $4, last_revised_timestamp = $5
         WHERE query_id = $1",
    )
    .bind(query_id)
    .bind(key_cursor)
    .bind(key_timestamp)
    .bind(revised_cursor)
    .bind(revised_timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DbPool {
        let pool = crate::create_pool("sqlite::memory:", 1).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_get_round_trips_region_sets() {
        let pool = test_pool().await;
        let created = create(
            &pool,
            "q1",
            "https://remote.example",
            "aud",
            &["US".to_string(), "CA".to_string()],
            &["MX".to_string()],
            true,
            false,
        )
        .await
        .unwrap();
        assert_eq!(created.include_regions, vec!["US", "CA"]);
        assert_eq!(created.exclude_regions, vec!["MX"]);
        assert!(created.only_travelers);
        assert!(!created.only_local_provenance);

        let fetched = get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn get_missing_query_returns_none() {
        let pool = test_pool().await;
        assert!(get(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn advance_cursors_updates_both_streams_independently() {
        let pool = test_pool().await;
        create(&pool, "q1", "https://remote.example", "aud", &[], &[], false, false)
            .await
            .unwrap();

        advance_cursors(&pool, "q1", "tok-a", 200, "tok-b", 100)
            .await
            .unwrap();

        let fetched = get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(fetched.last_key_cursor, "tok-a");
        assert_eq!(fetched.last_key_timestamp, 200);
        assert_eq!(fetched.last_revised_cursor, "tok-b");
        assert_eq!(fetched.last_revised_timestamp, 100);
    }
}
