use std::time::Duration;

use chrono::Utc;

use crate::MirrorError;

/// Per-run state threaded through every `[timestamp]` substitution in one
/// mirror run, so that two files rewritten within the same wall-clock
/// second still get distinct names (spec.md §4.3, §8 "rewrite injectivity
/// within a run").
#[derive(Default)]
pub struct RewriteState {
    last_timestamp: Option<i64>,
}

impl RewriteState {
    pub fn new() -> Self {
        Self::default()
    }

    async fn next_timestamp(&mut self) -> i64 {
        loop {
            let now = Utc::now().timestamp();
            if self.last_timestamp == Some(now) {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            self.last_timestamp = Some(now);
            return now;
        }
    }
}

/// Applies `mirror.filename_rewrite`'s `[timestamp]` / `[uuid]` / `[test]`
/// tokens to produce a local object name. A template with no recognized
/// tokens is a configuration error.
pub async fn substitute(template: &str, state: &mut RewriteState) -> Result<String, MirrorError> {
    let mut result = template.to_string();

    if result.contains("[timestamp]") {
        let ts = state.next_timestamp().await;
        result = result.replace("[timestamp]", &ts.to_string());
    }
    if result.contains("[uuid]") {
        let id = uuid::Uuid::new_v4().to_string().to_uppercase();
        result = result.replace("[uuid]", &id);
    }
    if result.contains("[test]") {
        result = result.replace("[test]", "TEST");
    }

    if result == template {
        return Err(MirrorError::RewriteHasNoTokens(template.to_string()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uuid_token_is_replaced_with_an_uppercased_v4_uuid() {
        let mut state = RewriteState::new();
        let name = substitute("[uuid]-0001.zip", &mut state).await.unwrap();
        let uuid_part = name.strip_suffix("-0001.zip").unwrap();
        assert_eq!(uuid_part.len(), 36);
        assert_eq!(uuid_part, uuid_part.to_ascii_uppercase());
    }

    #[tokio::test]
    async fn test_token_is_replaced_with_the_literal_test_string() {
        let mut state = RewriteState::new();
        let name = substitute("[test]-export.zip", &mut state).await.unwrap();
        assert_eq!(name, "TEST-export.zip");
    }

    #[tokio::test]
    async fn template_with_no_tokens_is_a_configuration_error() {
        let mut state = RewriteState::new();
        assert!(substitute("static-name.zip", &mut state).await.is_err());
    }

    #[tokio::test]
    async fn two_timestamp_substitutions_in_the_same_run_never_collide() {
        let mut state = RewriteState::new();
        let first = substitute("[timestamp].zip", &mut state).await.unwrap();
        let second = substitute("[timestamp].zip", &mut state).await.unwrap();
        assert_ne!(first, second);
    }
}
