use std::collections::HashSet;

use keyserver_models::MirrorFile;
use sqlx::Row;

use crate::{active_database_engine, DatabaseEngine, DbError, DbPool};

pub async fn list(pool: &DbPool, mirror_id: i64) -> Result<Vec<MirrorFile>, DbError> {
    let rows = sqlx::query_as::<_, MirrorFile>(
        "SELECT mirror_id, filename, local_filename FROM mirror_files WHERE mirror_id = $1",
    )
    .bind(mirror_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Diffs `saved` against the current `MirrorFile` rows for `mirror_id` in a
/// single transaction: inserts rows for newly saved files, deletes rows for
/// files no longer present. On PostgreSQL the existing rows are locked with
/// `SELECT ... FOR UPDATE` first so a concurrent writer can't interleave;
/// SQLite has no row-level locking, so the surrounding transaction's
/// exclusive write lock (acquired by the first statement inside it) serves
/// the same purpose.
pub async fn save_files(
    pool: &DbPool,
    mirror_id: i64,
    saved: &[MirrorFile],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let existing_filenames: Vec<String> = match active_database_engine() {
        DatabaseEngine::Postgres => {
            let rows = sqlx::query(
                "SELECT filename FROM mirror_files WHERE mirror_id = $1 FOR UPDATE",
            )
            .bind(mirror_id)
            .fetch_all(&mut *tx)
            .await?;
            rows.into_iter()
                .map(|r| r.try_get::<String, _>("filename"))
                .collect::<Result<_, _>>()?
        }
        DatabaseEngine::Sqlite => {
            let rows = sqlx::query("SELECT filename FROM mirror_files WHERE mirror_id = $1")
                .bind(mirror_id)
                .fetch_all(&mut *tx)
                .await?;
            rows.into_iter()
                .map(|r| r.try_get::<String, _>("filename"))
                .collect::<Result<_, _>>()?
        }
    };
    let existing: HashSet<String> = existing_filenames.into_iter().collect();
    let wanted: HashSet<&str> = saved.iter().map(|f| f.filename.as_str()).collect();

    for stale in existing.iter().filter(|f| !wanted.contains(f.as_str())) {
        sqlx::query("DELETE FROM mirror_files WHERE mirror_id = $1 AND filename = $2")
            .bind(mirror_id)
            .bind(stale)
            .execute(&mut *tx)
            .await?;
    }

    for file in saved {
        if existing.contains(&file.filename) {
            sqlx::query(
                "UPDATE mirror_files SET local_filename = $3
                 WHERE mirror_id = $1 AND filename = $2",
            )
            .bind(mirror_id)
            .bind(&file.filename)
            .bind(&file.local_filename)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO mirror_files (mirror_id, filename, local_filename)
                 VALUES ($1, $2, $3)",
            )
            .bind(mirror_id)
            .bind(&file.filename)
            .bind(&file.local_filename)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirrors;

    async fn test_pool() -> DbPool {
        let pool = crate::create_pool("sqlite::memory:", 1).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        mirrors::create(&pool, 1, "https://a/index.txt", "https://a/export", "bucket", "us", None)
            .await
            .unwrap();
        pool
    }

    fn file(filename: &str, local: Option<&str>) -> MirrorFile {
        MirrorFile {
            mirror_id: 1,
            filename: filename.to_string(),
            local_filename: local.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn save_files_inserts_rows_on_empty_start() {
        let pool = test_pool().await;
        save_files(&pool, 1, &[file("a.zip", None), file("b.zip", None)])
            .await
            .unwrap();

        let rows = list(&pool, 1).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn save_files_deletes_rows_dropped_from_the_new_set() {
        let pool = test_pool().await;
        save_files(&pool, 1, &[file("a.zip", None), file("b.zip", None), file("c.zip", None)])
            .await
            .unwrap();

        save_files(&pool, 1, &[file("a.zip", None), file("b.zip", None)])
            .await
            .unwrap();

        let rows = list(&pool, 1).await.unwrap();
        let names: HashSet<_> = rows.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, HashSet::from(["a.zip", "b.zip"]));
    }

    #[tokio::test]
    async fn save_files_is_a_no_op_when_the_set_is_unchanged() {
        let pool = test_pool().await;
        let set = [file("a.zip", Some("A-0001.zip"))];
        save_files(&pool, 1, &set).await.unwrap();
        save_files(&pool, 1, &set).await.unwrap();

        let rows = list(&pool, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].local_filename.as_deref(), Some("A-0001.zip"));
    }
}
