use serde::{Deserialize, Serialize};

/// Configuration for one mirror.
///
/// CRUD'd by the operator (out of scope here); consumed read-only by the
/// Mirror Worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Mirror {
    pub id: i64,
    /// Remote URL of the newline-delimited index file.
    pub index_file: String,
    /// URL prefix under which filenames in the index are resolved.
    pub export_root: String,
    pub cloud_storage_bucket: String,
    /// Local prefix in the object store, e.g. `"us"`.
    pub filename_root: String,
    /// Optional rewrite template; see `keyserver_mirror::rewrite` for the
    /// recognized `[timestamp]` / `[uuid]` / `[test]` tokens.
    pub filename_rewrite: Option<String>,
}

/// One local-object record tied to a mirror.
///
/// Invariant upheld by the Mirror Worker's finalize phase: the set of
/// `MirrorFile` rows for a given `mirror_id` equals the set of objects
/// present under that mirror's prefix in the object store, except for the
/// separately-overwritten `index.txt` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MirrorFile {
    pub mirror_id: i64,
    pub filename: String,
    /// The object-store name, if the mirror's `filename_rewrite` produced
    /// something other than `filename` verbatim.
    pub local_filename: Option<String>,
}

impl MirrorFile {
    /// The name this file is actually stored under in the object store.
    pub fn local_name(&self) -> &str {
        self.local_filename.as_deref().unwrap_or(&self.filename)
    }
}
