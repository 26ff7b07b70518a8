use thiserror::Error;

use crate::{active_database_engine, DatabaseEngine, DbPool};

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lock '{0}' is already held")]
    AlreadyLocked(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// A held lease. Dropping it does not release the lock — call `release`
/// explicitly (or let it expire) since releasing needs a fallible DB round
/// trip the Drop impl can't perform.
#[derive(Debug, Clone)]
pub struct LeaseGuard {
    pub lock_id: String,
    pub holder_token: String,
}

/// Acquire at most one concurrent hold on `lock_id` for `ttl_seconds`,
/// using the database's own clock for both the conflict guard and the
/// stored expiry.
pub async fn acquire(
    pool: &DbPool,
    lock_id: &str,
    ttl_seconds: i64,
) -> Result<LeaseGuard, LeaseError> {
    let holder_token = uuid::Uuid::new_v4().to_string();

    match active_database_engine() {
        DatabaseEngine::Postgres => {
            let won: Option<String> = sqlx::query_scalar(
                "INSERT INTO leases (lock_id, holder_token, expires_at)
                 VALUES ($1, $2, now() + ($3 || ' seconds')::interval)
                 ON CONFLICT (lock_id) DO UPDATE SET
                     holder_token = excluded.holder_token,
                     expires_at = excluded.expires_at
                 WHERE leases.expires_at <= now()
                 RETURNING holder_token",
            )
            .bind(lock_id)
            .bind(&holder_token)
            .bind(ttl_seconds.to_string())
            .fetch_optional(pool)
            .await?;

            match won {
                Some(token) if token == holder_token => Ok(LeaseGuard {
                    lock_id: lock_id.to_string(),
                    holder_token,
                }),
                _ => Err(LeaseError::AlreadyLocked(lock_id.to_string())),
            }
        }
        DatabaseEngine::Sqlite => {
            sqlx::query(
                "INSERT INTO leases (lock_id, holder_token, expires_at)
                 VALUES ($1, $2, datetime(CURRENT_TIMESTAMP, $3))
                 ON CONFLICT (lock_id) DO UPDATE SET
                     holder_token = excluded.holder_token,
                     expires_at = excluded.expires_at
                 WHERE leases.expires_at <= CURRENT_TIMESTAMP",
            )
            .bind(lock_id)
            .bind(&holder_token)
            .bind(format!("+{ttl_seconds} seconds"))
            .execute(pool)
            .await?;

            // The upsert's WHERE guard silently no-ops on conflict-without-
            // match in SQLite, so a read-after-write is required to tell
            // "we won" apart from "someone else still holds it".
            let current: Option<String> =
                sqlx::query_scalar("SELECT holder_token FROM leases WHERE lock_id = $1")
                    .bind(lock_id)
                    .fetch_optional(pool)
                    .await?;

            match current {
                Some(token) if token == holder_token => Ok(LeaseGuard {
                    lock_id: lock_id.to_string(),
                    holder_token,
                }),
                _ => Err(LeaseError::AlreadyLocked(lock_id.to_string())),
            }
        }
    }
}

/// Idempotent: tolerates being called after the lease has already expired
/// or been taken over by another holder (zero rows affected is not an
/// error).
pub async fn release(pool: &DbPool, guard: &LeaseGuard) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM leases WHERE lock_id = $1 AND holder_token = $2")
        .bind(&guard.lock_id)
        .bind(&guard.holder_token)
        .execute(pool)
        .await?;
    Ok(())
}
