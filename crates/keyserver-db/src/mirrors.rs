use keyserver_models::Mirror;

use crate::{DbError, DbPool};

const SELECT_COLUMNS: &str =
    "id, index_file, export_root, cloud_storage_bucket, filename_root, filename_rewrite";

pub async fn list(pool: &DbPool) -> Result<Vec<Mirror>, DbError> {
    let rows = sqlx::query_as::<_, Mirror>(&format!(
        "SELECT {SELECT_COLUMNS} FROM mirrors ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Option<Mirror>, DbError> {
    let row = sqlx::query_as::<_, Mirror>(&format!(
        "SELECT {SELECT_COLUMNS} FROM mirrors WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create(
    pool: &DbPool,
    id: i64,
    index_file: &str,
    export_root: &str,
    cloud_storage_bucket: &str,
    filename_root: &str,
    filename_rewrite: Option<&str>,
) -> Result<Mirror, DbError> {
    sqlx::query(
        "INSERT INTO mirrors (id, index_file, export_root, cloud_storage_bucket, filename_root, filename_rewrite)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(index_file)
    .bind(export_root)
    .bind(cloud_storage_bucket)
    .bind(filename_root)
    .bind(filename_rewrite)
    .execute(pool)
    .await?;

    get(pool, id).await?.ok_or(DbError::NotFound)
}
