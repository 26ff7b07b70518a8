use std::collections::HashMap;

use keyserver_models::{Action, MirrorFile};

/// Computes the per-file action set (download / keep / delete) from known
/// local state and a remote index. Pure and referentially transparent:
/// identical inputs always produce an identical action table (ignoring
/// iteration order, since the result is keyed by bare filename).
///
/// `index_urls` are already-resolved absolute remote URLs, in the order
/// they appeared in the index file.
pub fn reconcile(known_files: &[MirrorFile], index_urls: &[String]) -> HashMap<String, Action> {
    let mut actions: HashMap<String, Action> = known_files
        .iter()
        .map(|file| {
            (
                file.filename.clone(),
                Action {
                    order: 0,
                    filename: file.filename.clone(),
                    local_filename: file.local_filename.clone(),
                    download_path: None,
                    mirror_file: Some(file.clone()),
                },
            )
        })
        .collect();

    for (i, url) in index_urls.iter().enumerate() {
        let bare = bare_filename(url);
        let order = i + 1;
        actions
            .entry(bare.clone())
            .and_modify(|action| {
                action.download_path = Some(url.clone());
                action.order = order;
            })
            .or_insert_with(|| Action {
                order,
                filename: bare,
                local_filename: None,
                download_path: Some(url.clone()),
                mirror_file: None,
            });
    }

    actions
}

fn bare_filename(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(filename: &str, local: Option<&str>) -> MirrorFile {
        MirrorFile {
            mirror_id: 1,
            filename: filename.to_string(),
            local_filename: local.map(str::to_string),
        }
    }

    #[test]
    fn empty_start_marks_every_index_entry_as_a_download() {
        let actions = reconcile(
            &[],
            &[
                "https://export.example/us/1605818705-1605819005-00001.zip".to_string(),
                "https://export.example/us/1605818705-1605819005-00002.zip".to_string(),
            ],
        );
        assert_eq!(actions.len(), 2);
        for action in actions.values() {
            assert!(action.needs_download());
            assert!(!action.needs_delete());
        }
    }

    #[test]
    fn known_files_absent_from_the_index_need_delete() {
        let known_files = vec![known("A", None), known("B", None), known("C", None)];
        let actions = reconcile(&known_files, &["https://root/A".to_string()]);

        assert!(!actions["A"].needs_delete());
        assert!(actions["B"].needs_delete());
        assert!(actions["C"].needs_delete());
    }

    #[test]
    fn files_present_in_both_are_kept_and_preserve_local_filename() {
        let known_files = vec![known("a.zip", Some("REWRITTEN-0001.zip"))];
        let actions = reconcile(&known_files, &["https://root/us/a.zip".to_string()]);

        let action = &actions["a.zip"];
        assert!(!action.needs_delete());
        assert!(!action.needs_download());
        assert_eq!(action.local_filename.as_deref(), Some("REWRITTEN-0001.zip"));
    }

    #[test]
    fn order_follows_position_in_the_remote_index() {
        let actions = reconcile(
            &[],
            &[
                "https://root/A".to_string(),
                "https://root/B".to_string(),
                "https://root/F".to_string(),
            ],
        );
        assert_eq!(actions["A"].order, 1);
        assert_eq!(actions["B"].order, 2);
        assert_eq!(actions["F"].order, 3);
    }

    #[test]
    fn reconcile_is_referentially_transparent() {
        let known_files = vec![known("A", None), known("C", None)];
        let index = vec!["https://root/A".to_string(), "https://root/F".to_string()];
        let first = reconcile(&known_files, &index);
        let second = reconcile(&known_files, &index);
        let mut first_sorted: Vec<_> = first.into_iter().collect();
        let mut second_sorted: Vec<_> = second.into_iter().collect();
        first_sorted.sort_by(|a, b| a.0.cmp(&b.0));
        second_sorted.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(first_sorted, second_sorted);
    }
}
