use std::time::{Duration, Instant};

use chrono::Utc;
use keyserver_core::{
    transform_and_validate, CoreError, ExposureStore, ExposureStoreError, LeaseManager,
    SyncLedger, TransformPolicy,
};
use keyserver_db::leases::LeaseError;
use keyserver_db::DbPool;
use keyserver_models::{FederationQuery, FetchRequest, FetchState};
use thiserror::Error;

use crate::client::RemoteFederationClient;
use crate::FederationError;

#[derive(Debug, Error)]
pub enum PullError {
    #[error("unknown federation query '{0}'")]
    UnknownQuery(String),
    #[error(transparent)]
    Remote(#[from] FederationError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    ExposureStore(#[from] ExposureStoreError),
}

/// Tunables lifted from spec.md §6: `RPC_TIMEOUT` (the overall per-invocation
/// deadline, also used as the lease TTL), `MAX_EXPOSURE_KEYS` per fetch
/// request, and the Transform & Validate policy.
#[derive(Debug, Clone)]
pub struct PullerConfig {
    pub timeout_seconds: i64,
    pub max_exposure_keys: i32,
    pub transform_policy: TransformPolicy,
}

/// What happened on one puller invocation, for the HTTP trigger to report.
#[derive(Debug, Clone)]
pub enum PullOutcome {
    /// Another process holds the lease; no work was attempted.
    LockContention,
    Completed {
        sync_id: i64,
        insertions: i64,
        dropped: i64,
    },
}

/// The collaborators the puller needs: a database pool (to load the query
/// and drive the lease/ledger), the remote RPC client, and the exposure
/// store to upsert into. Generic over both capability traits so tests can
/// substitute in-memory fakes for either independently.
pub struct PullerDeps<C, E> {
    pub pool: DbPool,
    pub client: C,
    pub exposure_store: E,
}

/// Single-pass federation pull for one registered query, per spec.md §4.2.
pub async fn run_pull<C, E>(
    deps: &PullerDeps<C, E>,
    query_id: &str,
    config: &PullerConfig,
) -> Result<PullOutcome, PullError>
where
    C: RemoteFederationClient,
    E: ExposureStore,
{
    let lease_manager = LeaseManager::new(deps.pool.clone());
    let lock_id = format!("query_{query_id}");
    let guard = match lease_manager.acquire(&lock_id, config.timeout_seconds).await {
        Ok(guard) => guard,
        Err(LeaseError::AlreadyLocked(_)) => return Ok(PullOutcome::LockContention),
        Err(LeaseError::Db(err)) => return Err(CoreError::Database(err.into()).into()),
    };

    let result = run_pull_locked(deps, query_id, config).await;
    lease_manager.release(&guard).await;
    result
}

async fn run_pull_locked<C, E>(
    deps: &PullerDeps<C, E>,
    query_id: &str,
    config: &PullerConfig,
) -> Result<PullOutcome, PullError>
where
    C: RemoteFederationClient,
    E: ExposureStore,
{
    let query = keyserver_db::federation_queries::get(&deps.pool, query_id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| PullError::UnknownQuery(query_id.to_string()))?;

    let ledger = SyncLedger::new(deps.pool.clone());
    let sync_id = ledger.start(query_id).await?;
    tracing::info!(query_id, sync_id, "federation pull started");

    let deadline = Instant::now() + Duration::from_secs(config.timeout_seconds.max(0) as u64);
    let run_started_at = Utc::now();

    let mut state = query.resume_state();
    let mut running_state = state.clone();
    let mut total_written: i64 = 0;
    let mut total_dropped: i64 = 0;

    loop {
        if Instant::now() >= deadline {
            tracing::warn!(query_id, sync_id, "federation pull stopped: deadline exceeded");
            break;
        }

        let request = build_request(&query, &state, config.max_exposure_keys);
        let response = deps
            .client
            .fetch(&query.server_addr, &query.audience, &request)
            .await?;

        running_state = running_state.advance(&response.next_fetch_state);

        let (valid_keys, dropped) = transform_batch(
            &response.keys,
            config,
            run_started_at,
            sync_id,
            query_id,
        );
        total_dropped += dropped;
        if !valid_keys.is_empty() {
            total_written += deps.exposure_store.insert_skip_revisions(&valid_keys).await?;
        }

        let (valid_revised, dropped_revised) = transform_batch(
            &response.revised_keys,
            config,
            run_started_at,
            sync_id,
            query_id,
        );
        total_dropped += dropped_revised;
        if !valid_revised.is_empty() {
            total_written += deps.exposure_store.only_revise(&valid_revised).await?;
        }

        if !response.partial_response {
            break;
        }
        state = response.next_fetch_state;
    }

    ledger
        .finalize(sync_id, query_id, &running_state, total_written)
        .await?;

    tracing::info!(
        query_id,
        sync_id,
        insertions = total_written,
        dropped = total_dropped,
        "federation pull completed"
    );

    Ok(PullOutcome::Completed {
        sync_id,
        insertions: total_written,
        dropped: total_dropped,
    })
}

fn build_request(query: &FederationQuery, state: &FetchState, max_exposure_keys: i32) -> FetchRequest {
    FetchRequest {
        include_regions: query.include_regions.clone(),
        exclude_regions: query.exclude_regions.clone(),
        only_travelers: query.only_travelers,
        only_local_provenance: query.only_local_provenance,
        max_exposure_keys,
        state: state.clone(),
    }
}

fn transform_batch(
    keys: &[keyserver_models::ExposureKey],
    config: &PullerConfig,
    now: chrono::DateTime<Utc>,
    sync_id: i64,
    query_id: &str,
) -> (Vec<keyserver_models::Exposure>, i64) {
    let mut valid = Vec::with_capacity(keys.len());
    let mut dropped = 0i64;
    for key in keys {
        match transform_and_validate(key, &config.transform_policy, now, sync_id, query_id) {
            Ok(exposure) => valid.push(exposure),
            Err(err) => {
                dropped += 1;
                tracing::debug!(query_id, sync_id, error = %err, "dropped invalid exposure key");
            }
        }
    }
    (valid, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::ScriptedFederationClient;
    use keyserver_core::exposure_store::fake::InMemoryExposureStore;
    use keyserver_models::{Cursor, ExposureKey, FetchResponse, ReportTypeTag};

    async fn pool_with_query(query_id: &str) -> DbPool {
        let pool = keyserver_db::create_pool("sqlite::memory:", 1).await.unwrap();
        keyserver_db::run_migrations(&pool).await.unwrap();
        keyserver_db::federation_queries::create(
            &pool,
            query_id,
            "https://remote.example",
            "aud",
            &[],
            &[],
            false,
            false,
        )
        .await
        .unwrap();
        pool
    }

    fn policy() -> TransformPolicy {
        TransformPolicy {
            accept_self_report: false,
            accept_recursive: false,
            max_interval_age_seconds: 14 * 24 * 3600,
            max_magnitude_symptom_onset_days: 14,
        }
    }

    fn config() -> PullerConfig {
        PullerConfig {
            timeout_seconds: 600,
            max_exposure_keys: 500,
            transform_policy: policy(),
        }
    }

    fn key(id: &str) -> ExposureKey {
        let now = Utc::now();
        ExposureKey {
            key_data: id.to_string(),
            interval_number: (now.timestamp() / 600) as i32,
            interval_count: 144,
            report_type: Some(ReportTypeTag::ConfirmedTest),
            transmission_risk_level: 0,
            days_since_onset_of_symptoms: None,
            traveler: false,
            regions: vec!["US".to_string()],
        }
    }

    #[tokio::test]
    async fn empty_response_inserts_nothing_and_does_not_advance_cursors() {
        let pool = pool_with_query("q1").await;
        let client = ScriptedFederationClient::new(vec![FetchResponse {
            keys: vec![],
            revised_keys: vec![],
            partial_response: false,
            next_fetch_state: FetchState {
                key_cursor: Cursor { timestamp: 100, next_token: String::new() },
                revised_key_cursor: Cursor { timestamp: 100, next_token: String::new() },
            },
        }]);
        let deps = PullerDeps {
            pool: pool.clone(),
            client,
            exposure_store: InMemoryExposureStore::new(),
        };

        let outcome = run_pull(&deps, "q1", &config()).await.unwrap();
        match outcome {
            PullOutcome::Completed { insertions, .. } => assert_eq!(insertions, 0),
            _ => panic!("expected Completed"),
        }

        let query = keyserver_db::federation_queries::get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(query.last_key_timestamp, 0);
    }

    #[tokio::test]
    async fn partial_response_then_revision_advances_both_cursors() {
        let pool = pool_with_query("q1").await;
        let first = FetchResponse {
            keys: vec![key("aaa"), key("bbb")],
            revised_keys: vec![],
            partial_response: true,
            next_fetch_state: FetchState {
                key_cursor: Cursor { timestamp: 100, next_token: "bbbb".into() },
                revised_key_cursor: Cursor::default(),
            },
        };
        let mut revised = key("aaa");
        revised.report_type = Some(ReportTypeTag::ConfirmedTest);
        let second = FetchResponse {
            keys: vec![key("ccc"), key("ddd")],
            revised_keys: vec![revised],
            partial_response: false,
            next_fetch_state: FetchState {
                key_cursor: Cursor { timestamp: 200, next_token: String::new() },
                revised_key_cursor: Cursor { timestamp: 100, next_token: String::new() },
            },
        };

        let client = ScriptedFederationClient::new(vec![first, second]);
        let deps = PullerDeps {
            pool: pool.clone(),
            client,
            exposure_store: InMemoryExposureStore::new(),
        };

        let outcome = run_pull(&deps, "q1", &config()).await.unwrap();
        match outcome {
            PullOutcome::Completed { insertions, .. } => assert_eq!(insertions, 5),
            _ => panic!("expected Completed"),
        }

        let query = keyserver_db::federation_queries::get(&pool, "q1").await.unwrap().unwrap();
        assert_eq!(query.last_key_timestamp, 200);
        assert_eq!(query.last_revised_timestamp, 100);
    }

    #[tokio::test]
    async fn stale_key_is_dropped_but_the_run_still_succeeds() {
        let pool = pool_with_query("q1").await;
        let mut stale = key("stale");
        stale.interval_number = 1;
        let fresh = key("fresh");

        let client = ScriptedFederationClient::new(vec![FetchResponse {
            keys: vec![stale, fresh],
            revised_keys: vec![],
            partial_response: false,
            next_fetch_state: FetchState {
                key_cursor: Cursor { timestamp: 100, next_token: String::new() },
                revised_key_cursor: Cursor::default(),
            },
        }]);
        let deps = PullerDeps {
            pool,
            client,
            exposure_store: InMemoryExposureStore::new(),
        };

        let outcome = run_pull(&deps, "q1", &config()).await.unwrap();
        match outcome {
            PullOutcome::Completed { insertions, dropped } => {
                assert_eq!(insertions, 1);
                assert_eq!(dropped, 1);
            }
            _ => panic!("expected Completed"),
        }
    }

    #[tokio::test]
    async fn unknown_query_id_is_an_error() {
        let pool = keyserver_db::create_pool("sqlite::memory:", 1).await.unwrap();
        keyserver_db::run_migrations(&pool).await.unwrap();
        let deps = PullerDeps {
            pool,
            client: ScriptedFederationClient::new(vec![]),
            exposure_store: InMemoryExposureStore::new(),
        };
        let result = run_pull(&deps, "missing", &config()).await;
        assert!(matches!(result, Err(PullError::UnknownQuery(_))));
    }

    #[tokio::test]
    async fn contended_lock_is_reported_without_running_the_pull() {
        let pool = pool_with_query("q1").await;
        let lease_manager = LeaseManager::new(pool.clone());
        let _holder = lease_manager.acquire("query_q1", 300).await.unwrap();

        let deps = PullerDeps {
            pool,
            client: ScriptedFederationClient::new(vec![]),
            exposure_store: InMemoryExposureStore::new(),
        };
        let outcome = run_pull(&deps, "q1", &config()).await.unwrap();
        assert!(matches!(outcome, PullOutcome::LockContention));
    }
}
