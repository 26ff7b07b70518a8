use crate::MirrorFile;

/// The per-file action computed by the File-Set Reconciler.
///
/// `needs_delete` ≡ `download_path.is_none()` (known locally, absent from
/// the remote index). `needs_download` ≡ `mirror_file.is_none()` (present
/// in the remote index, not known locally). Otherwise the file is present
/// in both and is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// 1-based position of this file's line in the remote index; `0` for an
    /// action that only exists because of a deletion (no remote line).
    pub order: usize,
    pub filename: String,
    pub local_filename: Option<String>,
    /// Absolute remote URL this file should be downloaded from, if it is
    /// still present in the remote index.
    pub download_path: Option<String>,
    /// The known local record, if this file was already in `MirrorFile`.
    pub mirror_file: Option<MirrorFile>,
}

impl Action {
    pub fn needs_delete(&self) -> bool {
        self.download_path.is_none()
    }

    pub fn needs_download(&self) -> bool {
        self.mirror_file.is_none()
    }
}
