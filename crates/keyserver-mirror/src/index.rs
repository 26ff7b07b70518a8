/// Joins a URL prefix and a path fragment, trimming exactly one trailing
/// slash from the prefix and one leading slash from the suffix — per
/// spec.md §4.3's `urlJoin` slash-handling rule.
pub fn url_join(prefix: &str, suffix: &str) -> String {
    let trimmed_prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    let trimmed_suffix = suffix.strip_prefix('/').unwrap_or(suffix);
    format!("{trimmed_prefix}/{trimmed_suffix}")
}

/// Parses a newline-delimited index file. Blank lines are ignored.
pub fn parse_index(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves every line of a parsed index against `export_root` into an
/// absolute remote URL, preserving line order.
pub fn resolve_index_urls(export_root: &str, lines: &[String]) -> Vec<String> {
    lines.iter().map(|line| url_join(export_root, line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_join_trims_exactly_one_slash_on_each_side() {
        assert_eq!(
            url_join("https://export.example/", "/us/a.zip"),
            "https://export.example/us/a.zip"
        );
        assert_eq!(
            url_join("https://export.example", "us/a.zip"),
            "https://export.example/us/a.zip"
        );
    }

    #[test]
    fn url_join_preserves_extra_leading_slashes_past_the_first() {
        assert_eq!(
            url_join("https://export.example/", "//us/a.zip"),
            "https://export.example//us/a.zip"
        );
    }

    #[test]
    fn parse_index_skips_blank_lines_and_trims_whitespace() {
        let body = "us/a.zip\n\n  us/b.zip  \n\n";
        assert_eq!(
            parse_index(body),
            vec!["us/a.zip".to_string(), "us/b.zip".to_string()]
        );
    }

    #[test]
    fn resolve_index_urls_preserves_order() {
        let lines = vec!["a.zip".to_string(), "b.zip".to_string()];
        let urls = resolve_index_urls("https://root", &lines);
        assert_eq!(urls, vec!["https://root/a.zip", "https://root/b.zip"]);
    }
}
