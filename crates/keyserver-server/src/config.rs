use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

fn harden_secret_file_permissions(path: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            object_store: ObjectStoreConfig::default(),
            runtime: RuntimeConfig::default(),
            mirror: MirrorConfig::default(),
            federation: FederationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Sqlite,
    Postgres,
}

impl Default for DatabaseEngine {
    fn default() -> Self {
        Self::Sqlite
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub engine: DatabaseEngine,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: DatabaseEngine::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://./data/keyserver.db?mode=rwc".into()
}

fn default_max_connections() -> u32 {
    10
}

/// The Mirror Worker's object store backend. `local` roots buckets under a
/// directory on disk; `memory` keeps everything in process memory and is
/// meant for operators without a configured cloud bucket (spec.md §4.3
/// treats the object store as opaque, so no cloud-vendor SDK is wired in).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackendKind {
    Local,
    Memory,
}

impl Default for ObjectStoreBackendKind {
    fn default() -> Self {
        Self::Local
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub backend: ObjectStoreBackendKind,
    #[serde(default = "default_object_store_root")]
    pub root: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: ObjectStoreBackendKind::default(),
            root: default_object_store_root(),
        }
    }
}

fn default_object_store_root() -> String {
    "./data/objects".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// `MAX_RUNTIME`: the overall budget for one mirror-worker invocation,
    /// with a fixed 30s tail reserved for finalization (spec.md §4.3).
    #[serde(default = "default_max_runtime_seconds")]
    pub max_runtime_seconds: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_runtime_seconds: default_max_runtime_seconds() }
    }
}

fn default_max_runtime_seconds() -> i64 {
    14 * 60
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MirrorConfig {
    /// `MIRROR_LOCK_DURATION`: per-mirror lease TTL.
    #[serde(default = "default_mirror_lock_duration_seconds")]
    pub lock_duration_seconds: i64,
    #[serde(default = "default_max_index_bytes")]
    pub max_index_bytes: u64,
    #[serde(default = "default_max_zip_bytes")]
    pub max_zip_bytes: u64,
    #[serde(default = "default_index_file_download_timeout_seconds")]
    pub index_file_download_timeout_seconds: u64,
    #[serde(default = "default_export_file_download_timeout_seconds")]
    pub export_file_download_timeout_seconds: u64,
    #[serde(default = "default_export_file_upload_timeout_seconds")]
    pub export_file_upload_timeout_seconds: u64,
    #[serde(default = "default_export_file_delete_timeout_seconds")]
    pub export_file_delete_timeout_seconds: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            lock_duration_seconds: default_mirror_lock_duration_seconds(),
            max_index_bytes: default_max_index_bytes(),
            max_zip_bytes: default_max_zip_bytes(),
            index_file_download_timeout_seconds: default_index_file_download_timeout_seconds(),
            export_file_download_timeout_seconds: default_export_file_download_timeout_seconds(),
            export_file_upload_timeout_seconds: default_export_file_upload_timeout_seconds(),
            export_file_delete_timeout_seconds: default_export_file_delete_timeout_seconds(),
        }
    }
}

fn default_mirror_lock_duration_seconds() -> i64 {
    15 * 60
}
fn default_max_index_bytes() -> u64 {
    1024 * 1024
}
fn default_max_zip_bytes() -> u64 {
    20 * 1024 * 1024
}
fn default_index_file_download_timeout_seconds() -> u64 {
    30
}
fn default_export_file_download_timeout_seconds() -> u64 {
    60
}
fn default_export_file_upload_timeout_seconds() -> u64 {
    60
}
fn default_export_file_delete_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FederationConfig {
    /// `RPC_TIMEOUT`: both the per-invocation deadline and the query's lease
    /// TTL (spec.md §5).
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_timeout_seconds: i64,
    /// `TRUNCATE_WINDOW`: recognized option with no effect on this repo's
    /// scope (export-file generation is out of scope per spec.md §1).
    #[serde(default = "default_truncate_window_seconds")]
    pub truncate_window_seconds: i64,
    /// `MAX_INTERVAL_AGE`: seconds, feeds `TransformPolicy::max_interval_age_seconds`.
    #[serde(default = "default_max_interval_age_seconds")]
    pub max_interval_age_seconds: i64,
    /// `MAX_MAGNITUDE_SYMPTOM_ONSET_DAYS`.
    #[serde(default = "default_max_magnitude_symptom_onset_days")]
    pub max_magnitude_symptom_onset_days: i32,
    /// `RELEASE_SAME_DAY_KEYS`: recognized option with no effect on this
    /// repo's scope (export-file generation is out of scope).
    #[serde(default)]
    pub release_same_day_keys: bool,
    /// `ACCEPT_SELF_REPORT`.
    #[serde(default)]
    pub accept_self_report: bool,
    /// `ACCEPT_RECURSIVE`.
    #[serde(default)]
    pub accept_recursive: bool,
    #[serde(default = "default_max_exposure_keys")]
    pub max_exposure_keys: i32,
    /// `TLS_SKIP_VERIFY`: dev/test only.
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// `TLS_CERT_FILE`: extra trusted root CA (PEM) for private remotes.
    #[serde(default)]
    pub tls_cert_file: Option<String>,
    /// `CREDENTIALS_FILE`: bearer ID token source for `StaticFileIdTokenSource`.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_seconds: default_rpc_timeout_seconds(),
            truncate_window_seconds: default_truncate_window_seconds(),
            max_interval_age_seconds: default_max_interval_age_seconds(),
            max_magnitude_symptom_onset_days: default_max_magnitude_symptom_onset_days(),
            release_same_day_keys: false,
            accept_self_report: false,
            accept_recursive: false,
            max_exposure_keys: default_max_exposure_keys(),
            tls_skip_verify: false,
            tls_cert_file: None,
            credentials_file: default_credentials_file(),
        }
    }
}

fn default_rpc_timeout_seconds() -> i64 {
    10 * 60
}
fn default_truncate_window_seconds() -> i64 {
    60 * 60
}
fn default_max_interval_age_seconds() -> i64 {
    14 * 24 * 3600
}
fn default_max_magnitude_symptom_onset_days() -> i32 {
    14
}
fn default_max_exposure_keys() -> i32 {
    500
}
fn default_credentials_file() -> String {
    "config/credentials.txt".into()
}

fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# keyserver-server configuration
# Generated automatically on first run. Edit as needed.

[server]
port = {port}

[database]
engine = "{db_engine}"
url = "{db_url}"
max_connections = {max_connections}

[object_store]
# Backend for the Mirror Worker's export-file store: "local" or "memory".
backend = "{object_store_backend}"
root = "{object_store_root}"

[runtime]
# Overall per-invocation budget for the mirror worker, in seconds.
max_runtime_seconds = {max_runtime_seconds}

[mirror]
lock_duration_seconds = {lock_duration_seconds}
max_index_bytes = {max_index_bytes}
max_zip_bytes = {max_zip_bytes}
index_file_download_timeout_seconds = {index_file_download_timeout_seconds}
export_file_download_timeout_seconds = {export_file_download_timeout_seconds}
export_file_upload_timeout_seconds = {export_file_upload_timeout_seconds}
export_file_delete_timeout_seconds = {export_file_delete_timeout_seconds}

[federation]
rpc_timeout_seconds = {rpc_timeout_seconds}
truncate_window_seconds = {truncate_window_seconds}
max_interval_age_seconds = {max_interval_age_seconds}
max_magnitude_symptom_onset_days = {max_magnitude_symptom_onset_days}
release_same_day_keys = {release_same_day_keys}
accept_self_report = {accept_self_report}
accept_recursive = {accept_recursive}
max_exposure_keys = {max_exposure_keys}
tls_skip_verify = {tls_skip_verify}
# tls_cert_file = "config/federation-ca.pem"
credentials_file = "{credentials_file}"
"#,
        port = config.server.port,
        db_engine = match config.database.engine {
            DatabaseEngine::Sqlite => "sqlite",
            DatabaseEngine::Postgres => "postgres",
        },
        db_url = config.database.url,
        max_connections = config.database.max_connections,
        object_store_backend = match config.object_store.backend {
            ObjectStoreBackendKind::Local => "local",
            ObjectStoreBackendKind::Memory => "memory",
        },
        object_store_root = config.object_store.root,
        max_runtime_seconds = config.runtime.max_runtime_seconds,
        lock_duration_seconds = config.mirror.lock_duration_seconds,
        max_index_bytes = config.mirror.max_index_bytes,
        max_zip_bytes = config.mirror.max_zip_bytes,
        index_file_download_timeout_seconds = config.mirror.index_file_download_timeout_seconds,
        export_file_download_timeout_seconds = config.mirror.export_file_download_timeout_seconds,
        export_file_upload_timeout_seconds = config.mirror.export_file_upload_timeout_seconds,
        export_file_delete_timeout_seconds = config.mirror.export_file_delete_timeout_seconds,
        rpc_timeout_seconds = config.federation.rpc_timeout_seconds,
        truncate_window_seconds = config.federation.truncate_window_seconds,
        max_interval_age_seconds = config.federation.max_interval_age_seconds,
        max_magnitude_symptom_onset_days = config.federation.max_magnitude_symptom_onset_days,
        release_same_day_keys = config.federation.release_same_day_keys,
        accept_self_report = config.federation.accept_self_report,
        accept_recursive = config.federation.accept_recursive,
        max_exposure_keys = config.federation.max_exposure_keys,
        tls_skip_verify = config.federation.tls_skip_verify,
        credentials_file = config.federation.credentials_file,
    )
}

fn parse_env<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse::<T>() {
            *slot = parsed;
        }
    }
}

fn parse_env_bool(name: &str, slot: &mut bool) {
    if let Ok(value) = std::env::var(name) {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *slot = true,
            "0" | "false" | "no" | "off" => *slot = false,
            _ => {}
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!(path, "config file not found, generating defaults");
            let config = Config::default();

            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }

            let template = generate_config_template(&config);
            fs::write(path, &template)?;
            let _ = harden_secret_file_permissions(path);
            tracing::info!(path, "generated default config");
            config
        };
        let _ = harden_secret_file_permissions(path);

        // Environment variable overrides use the literal names from
        // spec.md §6 ("recognized options"), not an app-specific prefix,
        // since schedulers invoking this binary already depend on them.
        parse_env("PORT", &mut config.server.port);
        if let Ok(value) = std::env::var("MAX_RUNTIME") {
            if let Ok(parsed) = value.parse::<i64>() {
                config.runtime.max_runtime_seconds = parsed;
            }
        }
        parse_env("MIRROR_LOCK_DURATION", &mut config.mirror.lock_duration_seconds);
        parse_env("MAX_INDEX_BYTES", &mut config.mirror.max_index_bytes);
        parse_env("MAX_ZIP_BYTES", &mut config.mirror.max_zip_bytes);
        parse_env(
            "INDEX_FILE_DOWNLOAD_TIMEOUT",
            &mut config.mirror.index_file_download_timeout_seconds,
        );
        parse_env(
            "EXPORT_FILE_DOWNLOAD_TIMEOUT",
            &mut config.mirror.export_file_download_timeout_seconds,
        );
        parse_env(
            "EXPORT_FILE_UPLOAD_TIMEOUT",
            &mut config.mirror.export_file_upload_timeout_seconds,
        );
        parse_env(
            "EXPORT_FILE_DELETE_TIMEOUT",
            &mut config.mirror.export_file_delete_timeout_seconds,
        );
        parse_env("RPC_TIMEOUT", &mut config.federation.rpc_timeout_seconds);
        parse_env("TRUNCATE_WINDOW", &mut config.federation.truncate_window_seconds);
        parse_env("MAX_INTERVAL_AGE", &mut config.federation.max_interval_age_seconds);
        parse_env(
            "MAX_MAGNITUDE_SYMPTOM_ONSET_DAYS",
            &mut config.federation.max_magnitude_symptom_onset_days,
        );
        parse_env_bool("RELEASE_SAME_DAY_KEYS", &mut config.federation.release_same_day_keys);
        parse_env_bool("ACCEPT_SELF_REPORT", &mut config.federation.accept_self_report);
        parse_env_bool("ACCEPT_RECURSIVE", &mut config.federation.accept_recursive);
        parse_env_bool("TLS_SKIP_VERIFY", &mut config.federation.tls_skip_verify);
        if let Ok(value) = std::env::var("TLS_CERT_FILE") {
            config.federation.tls_cert_file = Some(value);
        }
        if let Ok(value) = std::env::var("CREDENTIALS_FILE") {
            config.federation.credentials_file = value;
        }

        if let Ok(value) = std::env::var("DATABASE_URL") {
            config.database.url = value;
        }
        if let Ok(value) = std::env::var("DATABASE_ENGINE") {
            match value.to_ascii_lowercase().as_str() {
                "sqlite" => config.database.engine = DatabaseEngine::Sqlite,
                "postgres" | "postgresql" => config.database.engine = DatabaseEngine::Postgres,
                other => tracing::warn!(engine = other, "unrecognized DATABASE_ENGINE, ignoring"),
            }
        }
        parse_env("DATABASE_MAX_CONNECTIONS", &mut config.database.max_connections);
        if let Ok(value) = std::env::var("OBJECT_STORE_ROOT") {
            config.object_store.root = value;
        }

        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.mirror.max_index_bytes == 0 {
        anyhow::bail!("mirror.max_index_bytes must be greater than zero");
    }
    if config.mirror.max_zip_bytes == 0 {
        anyhow::bail!("mirror.max_zip_bytes must be greater than zero");
    }
    if config.runtime.max_runtime_seconds <= 30 {
        anyhow::bail!("runtime.max_runtime_seconds must exceed the 30s finalization tail");
    }
    if config.federation.rpc_timeout_seconds <= 0 {
        anyhow::bail!("federation.rpc_timeout_seconds must be greater than zero");
    }
    Ok(())
}
