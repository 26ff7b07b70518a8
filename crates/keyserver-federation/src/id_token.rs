use crate::FederationError;

/// OIDC ID-token source for a given audience. The bootstrap mechanics of
/// obtaining and rotating credentials are out of scope here — only this
/// narrow capability is needed by the puller.
#[allow(async_fn_in_trait)]
pub trait IdTokenSource: Send + Sync {
    async fn token(&self, audience: &str) -> Result<String, FederationError>;
}

/// Reads a token string from a configured file, re-reading on every call so
/// an externally-rotated token (refreshed in place by another process) is
/// picked up without a restart.
pub struct StaticFileIdTokenSource {
    path: std::path::PathBuf,
}

impl StaticFileIdTokenSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdTokenSource for StaticFileIdTokenSource {
    async fn token(&self, _audience: &str) -> Result<String, FederationError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FederationError::Credentials(e.to_string()))?;
        let token = contents.trim().to_string();
        if token.is_empty() {
            return Err(FederationError::Credentials(format!(
                "credentials file {} is empty",
                self.path.display()
            )));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_the_trimmed_token_from_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  abc123  ").unwrap();
        let source = StaticFileIdTokenSource::new(file.path());
        assert_eq!(source.token("aud").await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn picks_up_a_rotated_token_without_restart() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first").unwrap();
        let source = StaticFileIdTokenSource::new(file.path());
        assert_eq!(source.token("aud").await.unwrap(), "first");

        std::fs::write(file.path(), "second").unwrap();
        assert_eq!(source.token("aud").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn empty_file_is_a_credentials_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = StaticFileIdTokenSource::new(file.path());
        assert!(source.token("aud").await.is_err());
    }
}
