use std::time::{Duration, Instant};

use futures_util::StreamExt;
use keyserver_core::reconcile;
use keyserver_core::LeaseManager;
use keyserver_db::leases::LeaseError;
use keyserver_db::DbPool;
use keyserver_models::{Action, Mirror, MirrorFile};
use keyserver_objectstore::ObjectStore;

use crate::rewrite::{self, RewriteState};
use crate::{index, MirrorError};

/// Tunables lifted from spec.md §6: `MAX_RUNTIME` (the run-wide budget the
/// 30-second finalization tail is carved out of), `MIRROR_LOCK_DURATION`
/// (the per-mirror lease TTL), and the byte caps / per-operation timeouts
/// named in §4.3.
#[derive(Debug, Clone)]
pub struct MirrorWorkerConfig {
    pub max_runtime: Duration,
    pub lease_ttl_seconds: i64,
    pub max_index_bytes: u64,
    pub max_zip_bytes: u64,
    pub index_file_download_timeout: Duration,
    pub export_file_download_timeout: Duration,
    pub export_file_upload_timeout: Duration,
    pub export_file_delete_timeout: Duration,
}

/// Per-mirror outcome for the HTTP trigger's JSON response body.
#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub id: i64,
    pub processed: bool,
    pub errors: Vec<String>,
}

/// Processes every registered `Mirror` in registry order, bounded by a
/// run-wide deadline, per spec.md §4.3.
pub async fn run_mirror_worker<O: ObjectStore>(
    pool: &DbPool,
    http: &reqwest::Client,
    object_store: &O,
    config: &MirrorWorkerConfig,
) -> Vec<MirrorReport> {
    let tail = Duration::from_secs(30);
    let budget = config.max_runtime.checked_sub(tail).unwrap_or_default();
    let deadline = Instant::now() + budget;

    let mirrors = match keyserver_db::mirrors::list(pool).await {
        Ok(mirrors) => mirrors,
        Err(err) => {
            tracing::error!(error = %err, "failed to list mirrors");
            return Vec::new();
        }
    };

    let mut reports = Vec::with_capacity(mirrors.len());
    for mirror in mirrors {
        if Instant::now() >= deadline {
            tracing::info!(mirror_id = mirror.id, "mirror skipped: deadline exceeded");
            reports.push(MirrorReport { id: mirror.id, processed: false, errors: Vec::new() });
            continue;
        }

        let lease_manager = LeaseManager::new(pool.clone());
        let lock_id = format!("mirror-lock-{}", mirror.id);
        let guard = match lease_manager.acquire(&lock_id, config.lease_ttl_seconds).await {
            Ok(guard) => guard,
            Err(LeaseError::AlreadyLocked(_)) => {
                tracing::info!(mirror_id = mirror.id, "mirror skipped: lock contention");
                reports.push(MirrorReport { id: mirror.id, processed: false, errors: Vec::new() });
                continue;
            }
            Err(LeaseError::Db(err)) => {
                reports.push(MirrorReport {
                    id: mirror.id,
                    processed: false,
                    errors: vec![err.to_string()],
                });
                continue;
            }
        };

        let report = process_mirror(pool, http, object_store, &mirror, config, deadline).await;
        lease_manager.release(&guard).await;
        reports.push(report);
    }

    reports
}

/// One entry in the published index being assembled: a file that is
/// present in the object store (downloaded this run or already known) and
/// still appears in the remote index.
struct IndexObject {
    order: usize,
    filename: String,
    local_filename: String,
}

async fn process_mirror<O: ObjectStore>(
    pool: &DbPool,
    http: &reqwest::Client,
    object_store: &O,
    mirror: &Mirror,
    config: &MirrorWorkerConfig,
    deadline: Instant,
) -> MirrorReport {
    let mut errors: Vec<String> = Vec::new();

    let known_files = match keyserver_db::mirror_files::list(pool, mirror.id).await {
        Ok(files) => files,
        Err(err) => {
            errors.push(format!("list known files: {err}"));
            return MirrorReport { id: mirror.id, processed: false, errors };
        }
    };

    let index_bytes = match download_capped(
        http,
        &mirror.index_file,
        config.index_file_download_timeout,
        config.max_index_bytes,
    )
    .await
    {
        Ok(bytes) => bytes,
        Err(err) => {
            errors.push(format!("download index file: {err}"));
            return MirrorReport { id: mirror.id, processed: false, errors };
        }
    };

    let index_body = String::from_utf8_lossy(&index_bytes).into_owned();
    let lines = index::parse_index(&index_body);
    let index_urls = index::resolve_index_urls(&mirror.export_root, &lines);

    let mut actions = reconcile(&known_files, &index_urls);

    // Deletions before downloads (spec.md §5 ordering guarantee).
    let delete_keys: Vec<String> = actions
        .iter()
        .filter(|(_, action)| action.needs_delete())
        .map(|(filename, _)| filename.clone())
        .collect();

    let mut retained_known: Vec<MirrorFile> = Vec::new();
    for filename in delete_keys {
        let action = actions.get(&filename).expect("key came from this map");
        let local_name = action.local_filename.clone().unwrap_or_else(|| action.filename.clone());
        let object_name = format!("{}/{}", mirror.filename_root, local_name);
        match delete_capped(
            object_store,
            &mirror.cloud_storage_bucket,
            &object_name,
            config.export_file_delete_timeout,
        )
        .await
        {
            Ok(()) => {
                actions.remove(&filename);
            }
            Err(err) => {
                errors.push(format!("delete {filename}: {err}"));
                // Left in place: the row stays known so the next run
                // retries the delete instead of resurrecting it.
                if let Some(mirror_file) = &action.mirror_file {
                    retained_known.push(mirror_file.clone());
                }
            }
        }
    }

    let mut index_objects: Vec<IndexObject> = actions
        .values()
        .filter(|action| !action.needs_download() && !action.needs_delete())
        .map(|action| IndexObject {
            order: action.order,
            filename: action.filename.clone(),
            local_filename: action
                .local_filename
                .clone()
                .unwrap_or_else(|| action.filename.clone()),
        })
        .collect();

    let mut downloads: Vec<Action> = actions
        .values()
        .filter(|action| action.needs_download())
        .cloned()
        .collect();
    downloads.sort_by_key(|action| action.order);

    let mut rewrite_state = RewriteState::new();
    for action in downloads {
        if Instant::now() >= deadline {
            tracing::info!(
                mirror_id = mirror.id,
                "mirror run stopped: deadline exceeded, remaining downloads dropped"
            );
            break;
        }
        let Some(download_path) = action.download_path.clone() else {
            continue;
        };

        let bytes = match download_capped(
            http,
            &download_path,
            config.export_file_download_timeout,
            config.max_zip_bytes,
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                errors.push(format!("download {}: {err}", action.filename));
                continue;
            }
        };

        let local_filename = match &mirror.filename_rewrite {
            Some(template) => match rewrite::substitute(template, &mut rewrite_state).await {
                Ok(name) => name,
                Err(err) => {
                    errors.push(format!("rewrite {}: {err}", action.filename));
                    continue;
                }
            },
            None => action.filename.clone(),
        };

        let object_name = format!("{}/{}", mirror.filename_root, local_filename);
        match upload_capped(
            object_store,
            &mirror.cloud_storage_bucket,
            &object_name,
            bytes,
            "zip",
            config.export_file_upload_timeout,
        )
        .await
        {
            Ok(()) => index_objects.push(IndexObject {
                order: action.order,
                filename: action.filename.clone(),
                local_filename,
            }),
            Err(err) => errors.push(format!("upload {}: {err}", action.filename)),
        }
    }

    index_objects.sort_by_key(|entry| entry.order);
    let published_index = index_objects
        .iter()
        .map(|entry| format!("{}/{}", mirror.filename_root, entry.local_filename))
        .collect::<Vec<_>>()
        .join("\n");
    let index_object_name = format!("{}/index.txt", mirror.filename_root);
    if let Err(err) = upload_capped(
        object_store,
        &mirror.cloud_storage_bucket,
        &index_object_name,
        published_index.into_bytes(),
        "text/plain",
        config.export_file_upload_timeout,
    )
    .await
    {
        errors.push(format!("publish index: {err}"));
    }

    let mut saved: Vec<MirrorFile> = index_objects
        .into_iter()
        .map(|entry| MirrorFile {
            mirror_id: mirror.id,
            local_filename: if entry.local_filename == entry.filename {
                None
            } else {
                Some(entry.local_filename)
            },
            filename: entry.filename,
        })
        .collect();
    saved.extend(retained_known);

    if let Err(err) = keyserver_db::mirror_files::save_files(pool, mirror.id, &saved).await {
        errors.push(format!("persist mirror files: {err}"));
    }

    MirrorReport { id: mirror.id, processed: true, errors }
}

async fn download_capped(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_bytes: u64,
) -> Result<Vec<u8>, MirrorError> {
    let fetch = async {
        let response = http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::NonSuccessStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(MirrorError::TooLarge { url: url.to_string(), limit: max_bytes });
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max_bytes {
                return Err(MirrorError::TooLarge { url: url.to_string(), limit: max_bytes });
            }
        }
        Ok(body)
    };

    tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| MirrorError::Timeout { url: url.to_string() })?
}

async fn upload_capped<O: ObjectStore>(
    object_store: &O,
    bucket: &str,
    object: &str,
    bytes: Vec<u8>,
    content_type: &str,
    timeout: Duration,
) -> Result<(), MirrorError> {
    let url = format!("{bucket}/{object}");
    tokio::time::timeout(timeout, object_store.put(bucket, object, bytes, content_type))
        .await
        .map_err(|_| MirrorError::Timeout { url })?
        .map_err(MirrorError::from)
}

async fn delete_capped<O: ObjectStore>(
    object_store: &O,
    bucket: &str,
    object: &str,
    timeout: Duration,
) -> Result<(), MirrorError> {
    let url = format!("{bucket}/{object}");
    tokio::time::timeout(timeout, object_store.delete(bucket, object))
        .await
        .map_err(|_| MirrorError::Timeout { url })?
        .map_err(MirrorError::from)
}
