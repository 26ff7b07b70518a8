use keyserver_models::{Exposure, ReportType};
use sqlx::Row;
use std::str::FromStr;

use crate::{regions_from_db_text, regions_to_db_text, DbError, DbPool};

fn from_row(row: &sqlx::any::AnyRow) -> Result<Exposure, sqlx::Error> {
    let report_type_text: String = row.try_get("report_type")?;
    let report_type = ReportType::from_str(&report_type_text)
        .map_err(|e| sqlx::Error::Protocol(format!("invalid report_type column: {e}")))?;
    let regions: String = row.try_get("regions")?;

    Ok(Exposure {
        exposure_key: row.try_get("exposure_key")?,
        interval_number: row.try_get("interval_number")?,
        interval_count: row.try_get("interval_count")?,
        report_type,
        transmission_risk_level: row.try_get("transmission_risk_level")?,
        days_since_onset_of_symptoms: row.try_get("days_since_onset_of_symptoms")?,
        regions: regions_from_db_text(&regions),
        traveler: crate::bool_from_any_row(row, "traveler")?,
        local_provenance: crate::bool_from_any_row(row, "local_provenance")?,
        federation_sync_id: row.try_get("federation_sync_id")?,
        federation_query_id: row.try_get("federation_query_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// The Exposure Store adapter backing `keyserver_core::ExposureStore`
/// against a relational `exposures` table.
#[derive(Clone)]
pub struct DbExposureStore {
    pool: DbPool,
}

impl DbExposureStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent insert keyed on exposure-key identity: a row that already
    /// exists is left untouched. Returns the number of rows actually
    /// inserted (strictly less than `exposures.len()` when some keys were
    /// already present).
    pub async fn insert_skip_revisions(&self, exposures: &[Exposure]) -> Result<i64, DbError> {
        let mut inserted = 0i64;
        for exposure in exposures {
            let result = sqlx::query(
                "INSERT INTO exposures
                    (exposure_key, interval_number, interval_count, report_type,
                     transmission_risk_level, days_since_onset_of_symptoms, regions,
                     traveler, local_provenance, federation_sync_id, federation_query_id, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (exposure_key) DO NOTHING",
            )
            .bind(&exposure.exposure_key)
            .bind(exposure.interval_number)
            .bind(exposure.interval_count)
            .bind(exposure.report_type.as_str())
            .bind(exposure.transmission_risk_level)
            .bind(exposure.days_since_onset_of_symptoms)
            .bind(regions_to_db_text(&exposure.regions))
            .bind(exposure.traveler)
            .bind(exposure.local_provenance)
            .bind(exposure.federation_sync_id)
            .bind(&exposure.federation_query_id)
            .bind(exposure.created_at)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected() as i64;
        }
        Ok(inserted)
    }

    /// Update-only mode: a key is revised only when a row already exists
    /// under the same `federation_query_id`. Keys with no matching existing
    /// row are silently dropped. Returns the number of rows revised.
    pub async fn only_revise(&self, exposures: &[Exposure]) -> Result<i64, DbError> {
        let mut revised = 0i64;
        for exposure in exposures {
            let result = sqlx::query(
                "UPDATE exposures SET
                     interval_count = $3,
                     report_type = $4,
                     transmission_risk_level = $5,
                     days_since_onset_of_symptoms = $6,
                     regions = $7,
                     traveler = $8
                 WHERE exposure_key = $1 AND federation_query_id = $2",
            )
            .bind(&exposure.exposure_key)
            .bind(&exposure.federation_query_id)
            .bind(exposure.interval_count)
            .bind(exposure.report_type.as_str())
            .bind(exposure.transmission_risk_level)
            .bind(exposure.days_since_onset_of_symptoms)
            .bind(regions_to_db_text(&exposure.regions))
            .bind(exposure.traveler)
            .execute(&self.pool)
            .await?;
            revised += result.rows_affected() as i64;
        }
        Ok(revised)
    }

    pub async fn get(&self, exposure_key: &str) -> Result<Option<Exposure>, DbError> {
        let row = sqlx::query(
            "SELECT exposure_key, interval_number, interval_count, report_type,
                    transmission_risk_level, days_since_onset_of_symptoms, regions,
                    traveler, local_provenance, federation_sync_id, federation_query_id, created_at
             FROM exposures WHERE exposure_key = $1",
        )
        .bind(exposure_key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose().map_err(DbError::from)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exposures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
